//! Liveness endpoint

use axum::{Router, routing::get};

use crate::module::{AppState, HostEnvironment, HostModule};

pub const NAME: &str = "health";

pub struct HealthModule;

impl HostModule for HealthModule {
    fn name(&self) -> &str {
        NAME
    }

    fn configure_pipeline(
        &self,
        router: Router<AppState>,
        _env: &HostEnvironment,
    ) -> anyhow::Result<Router<AppState>> {
        Ok(router.route("/health", get(health_check)))
    }
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
