//! Caller identity endpoint

use axum::{Json, Router, routing::get};

use crate::auth::Principal;
use crate::module::{AppState, HostEnvironment, HostModule};

pub const NAME: &str = "account";

pub struct AccountModule;

impl HostModule for AccountModule {
    fn name(&self) -> &str {
        NAME
    }

    fn configure_pipeline(
        &self,
        router: Router<AppState>,
        _env: &HostEnvironment,
    ) -> anyhow::Result<Router<AppState>> {
        Ok(router.route("/account/me", get(me)))
    }
}

/// Return the authenticated caller
async fn me(principal: Principal) -> Json<Principal> {
    Json(principal)
}
