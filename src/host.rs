//! Host bootstrap
//!
//! Builds the shared context, activates modules and assembles the request
//! pipeline:
//!
//! ```text
//! static files ──▶ routing ──▶ CORS ──▶ key exchange ──▶ authentication ──▶ endpoints
//! ```

use axum::{
    Router,
    body::Body,
    http::{HeaderValue, Request},
    middleware::{self, Next},
    response::Response,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::auth::authenticate;
use crate::channel::ChannelRegistry;
use crate::config::{ApiInfo, HostConfig};
use crate::context::HostContext;
use crate::error::{HostError, Result};
use crate::gate::{GateState, exchange_legacy_key};
use crate::module::{AppState, HostEnvironment, ModuleRegistry, ServiceCollection};
use crate::modules::builtin_catalog;
use crate::token::{JwtMinter, TokenMinter};

/// A fully configured host, ready to serve
pub struct Host {
    pub router: Router,
    pub context: Arc<HostContext>,
    pub env: HostEnvironment,
}

/// Composition root
pub struct HostBootstrap {
    config: HostConfig,
    registry: Option<ModuleRegistry>,
    minter: Arc<dyn TokenMinter>,
}

impl HostBootstrap {
    pub fn new(config: HostConfig) -> Self {
        Self {
            config,
            registry: None,
            minter: Arc::new(JwtMinter),
        }
    }

    /// Use these modules instead of resolving `BOT_MODULES` against the
    /// built-in catalog
    pub fn with_registry(mut self, registry: ModuleRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_minter(mut self, minter: Arc<dyn TokenMinter>) -> Self {
        self.minter = minter;
        self
    }

    /// Build the host. Any failure here means the host must not serve.
    pub fn build(self) -> Result<Host> {
        let env = HostEnvironment::from_config(&self.config);
        if self.config.jwt.secret.is_none() {
            warn!("JWT_SECRET is not set, legacy keys will be rejected");
        }

        // Published before any module or request reads it
        let context = Arc::new(HostContext::from_config(self.config)?);
        let config = context.configuration()?.clone();

        let registry = match self.registry {
            Some(registry) => registry,
            None => ModuleRegistry::from_names(context.modules()?, &builtin_catalog())?,
        };
        info!("Activating modules: {:?}", registry.names());

        let mut services = ServiceCollection::new();
        services.add(ChannelRegistry::new());
        registry.register_all(&mut services, &context)?;

        let state = AppState {
            context: context.clone(),
            services: Arc::new(services.build()),
        };

        let routes = registry.configure_all(Router::new(), &env)?;
        let gate = GateState::new(context.clone(), self.minter)?;
        info!(
            "Legacy key exchange enabled for {}-character credentials",
            gate.legacy_key_length()
        );

        // Layers wrap outward: the last one added sees the request first
        let pipeline = routes
            .layer(middleware::from_fn_with_state(context.clone(), authenticate))
            .layer(middleware::from_fn_with_state(gate, exchange_legacy_key))
            .layer(cors_layer(&config.cors_origins)?)
            .with_state(state);

        let static_files = ServeDir::new(&env.web_root)
            .append_index_html_on_directories(true)
            .call_fallback_on_method_not_allowed(true)
            .fallback(pipeline);

        let router = Router::new()
            .fallback_service(static_files)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.request_timeout_secs,
            )))
            .layer(TraceLayer::new_for_http())
            .layer(middleware::from_fn(log_request));

        if env.is_development() {
            info!("Running in development mode");
        }
        log_banner(&config.api);

        Ok(Host {
            router,
            context,
            env,
        })
    }
}

/// CORS policy for the configured origins
fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        // Credentials rule out a literal wildcard
        AllowOrigin::mirror_request()
    } else {
        let origins = origins
            .iter()
            .map(|o| {
                HeaderValue::from_str(o)
                    .map_err(|_| HostError::Internal(format!("Invalid CORS origin: {}", o)))
            })
            .collect::<Result<Vec<_>>>()?;
        AllowOrigin::list(origins)
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request()))
}

/// Middleware to log all incoming HTTP requests
async fn log_request(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let query = uri.query().map(|q| format!("?{}", q)).unwrap_or_default();

    info!("HTTP {} {}{}", method, uri.path(), query);

    let response = next.run(req).await;

    info!("Response status: {}", response.status());

    response
}

fn log_banner(api: &ApiInfo) {
    info!("{} [{}] {}", api.title, api.version, api.license);
    info!("{}", api.description);
    if !api.contact.is_empty() {
        info!("{}", api.contact);
    }
}

/// Serve until Ctrl-C
pub async fn run(host: Host, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, host.router)
        .with_graceful_shutdown(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Shutdown signal received"),
                Err(err) => tracing::error!("Unable to listen for shutdown signal: {}", err),
            }
        })
        .await?;

    Ok(())
}
