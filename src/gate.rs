//! Legacy API key exchange
//!
//! Runs before authentication. A request whose `Authorization` credential has
//! the legacy key length gets the key swapped for a freshly minted bearer
//! token; every other request passes through untouched.

use axum::{
    extract::{Request, State},
    http::{HeaderValue, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::context::HostContext;
use crate::error::{HostError, Result};
use crate::token::TokenMinter;

/// Credential presented in an `Authorization` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credential<'a> {
    Absent,
    LegacyKey(&'a str),
    OpaqueToken(&'a str),
}

/// Classify a header value by the length of its last word.
///
/// An optional scheme word ("Bearer", "Basic", ...) is ignored.
pub fn classify(header: Option<&str>, legacy_key_length: usize) -> Credential<'_> {
    let Some(candidate) = header.and_then(|h| h.split_whitespace().last()) else {
        return Credential::Absent;
    };

    if candidate.chars().count() == legacy_key_length {
        Credential::LegacyKey(candidate)
    } else {
        Credential::OpaqueToken(candidate)
    }
}

/// State for the exchange middleware
#[derive(Clone)]
pub struct GateState {
    pub context: Arc<HostContext>,
    pub minter: Arc<dyn TokenMinter>,
    legacy_key_length: usize,
}

impl GateState {
    pub fn new(context: Arc<HostContext>, minter: Arc<dyn TokenMinter>) -> Result<Self> {
        let legacy_key_length = context.configuration()?.legacy_key_length;
        Ok(Self {
            context,
            minter,
            legacy_key_length,
        })
    }

    pub fn legacy_key_length(&self) -> usize {
        self.legacy_key_length
    }
}

/// Middleware swapping legacy keys for minted bearer tokens
pub async fn exchange_legacy_key(
    State(gate): State<GateState>,
    mut req: Request,
    next: Next,
) -> Result<Response> {
    // Non-ASCII header values can't be legacy keys; authentication rejects them
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let minted = match classify(header, gate.legacy_key_length) {
        Credential::LegacyKey(key) => Some(gate.minter.mint(key, &gate.context).map_err(|e| {
            warn!("Legacy key exchange failed for {} {}: {}", req.method(), req.uri().path(), e);
            HostError::AuthenticationFailure("Legacy key exchange failed".into())
        })?),
        Credential::Absent | Credential::OpaqueToken(_) => None,
    };

    if let Some(token) = minted {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
            warn!("Minted token is not a valid header value");
            HostError::AuthenticationFailure("Legacy key exchange failed".into())
        })?;
        value.set_sensitive(true);
        req.headers_mut().insert(AUTHORIZATION, value);
        debug!("Exchanged legacy key for bearer token on {}", req.uri().path());
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HostConfig;
    use crate::token::{JwtMinter, verify_token};
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{HeaderMap, StatusCode},
        middleware,
        routing::get,
    };
    use std::sync::atomic::{AtomicBool, Ordering};
    use tower::ServiceExt;

    const KEY: &str = "0123456789abcdef0123456789abcdef";
    const SECRET: &str = "gate-test-secret-that-is-long-enough";

    struct StaticMinter;

    impl TokenMinter for StaticMinter {
        fn mint(&self, legacy_key: &str, _context: &HostContext) -> Result<String> {
            Ok(format!("minted.{}", legacy_key))
        }
    }

    struct FailingMinter;

    impl TokenMinter for FailingMinter {
        fn mint(&self, _legacy_key: &str, _context: &HostContext) -> Result<String> {
            Err(HostError::SigningFailure("no".into()))
        }
    }

    fn context(secret: Option<&str>) -> Arc<HostContext> {
        let secret = secret.map(str::to_string);
        let config = HostConfig::from_lookup(move |key| match key {
            "JWT_SECRET" => secret.clone(),
            _ => None,
        })
        .unwrap();
        Arc::new(HostContext::from_config(config).unwrap())
    }

    /// Router echoing the Authorization header it receives
    fn app(minter: Arc<dyn TokenMinter>, reached: Arc<AtomicBool>) -> Router {
        let gate = GateState::new(context(Some(SECRET)), minter).unwrap();
        Router::new()
            .route(
                "/echo",
                get(move |headers: HeaderMap| async move {
                    reached.store(true, Ordering::SeqCst);
                    headers
                        .get(AUTHORIZATION)
                        .map(|v| v.to_str().unwrap().to_string())
                        .unwrap_or_else(|| "<none>".to_string())
                }),
            )
            .layer(middleware::from_fn_with_state(gate, exchange_legacy_key))
    }

    async fn send(app: Router, header: Option<&str>) -> (StatusCode, String) {
        let mut builder = axum::http::Request::builder().uri("/echo");
        if let Some(h) = header {
            builder = builder.header(AUTHORIZATION, h);
        }
        let response = app.oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(None, 32), Credential::Absent);
        assert_eq!(classify(Some(""), 32), Credential::Absent);
        assert_eq!(classify(Some("   "), 32), Credential::Absent);
        assert_eq!(
            classify(Some(&format!("Bearer {}", KEY)), 32),
            Credential::LegacyKey(KEY)
        );
        assert_eq!(classify(Some(KEY), 32), Credential::LegacyKey(KEY));
        assert_eq!(
            classify(Some(&format!("  Bearer   {}  ", KEY)), 32),
            Credential::LegacyKey(KEY)
        );
        assert_eq!(
            classify(Some("Bearer deadbeef"), 32),
            Credential::OpaqueToken("deadbeef")
        );
        assert_eq!(
            classify(Some("Bearer deadbeef"), 8),
            Credential::LegacyKey("deadbeef")
        );
    }

    #[test]
    fn test_classify_only_length_matters() {
        let key = "!".repeat(32);
        assert_eq!(classify(Some(&key), 32), Credential::LegacyKey(key.as_str()));
        let long = "a".repeat(33);
        assert_eq!(
            classify(Some(&long), 32),
            Credential::OpaqueToken(long.as_str())
        );
    }

    #[tokio::test]
    async fn test_legacy_key_is_exchanged() {
        let reached = Arc::new(AtomicBool::new(false));
        let (status, header) = send(
            app(Arc::new(StaticMinter), reached.clone()),
            Some(&format!("Bearer {}", KEY)),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(header, format!("Bearer minted.{}", KEY));
        assert!(reached.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_short_token_is_forwarded_unchanged() {
        let reached = Arc::new(AtomicBool::new(false));
        let (status, header) =
            send(app(Arc::new(StaticMinter), reached), Some("Bearer deadbeef")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(header, "Bearer deadbeef");
    }

    #[tokio::test]
    async fn test_absent_header_is_not_added() {
        let reached = Arc::new(AtomicBool::new(false));
        let (status, header) = send(app(Arc::new(StaticMinter), reached), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(header, "<none>");
    }

    #[tokio::test]
    async fn test_blank_header_is_forwarded_unchanged() {
        let reached = Arc::new(AtomicBool::new(false));
        let (status, header) = send(app(Arc::new(StaticMinter), reached), Some("   ")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(header, "   ");
    }

    #[tokio::test]
    async fn test_mint_failure_is_unauthorized() {
        let reached = Arc::new(AtomicBool::new(false));
        let (status, body) = send(
            app(Arc::new(FailingMinter), reached.clone()),
            Some(&format!("Bearer {}", KEY)),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(!body.contains(KEY));
        assert!(!reached.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_jwt_exchange_verifies() {
        let reached = Arc::new(AtomicBool::new(false));
        let (status, header) = send(
            app(Arc::new(JwtMinter), reached),
            Some("Bearer 0123456789abcdef0123456789abcdef"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let token = header.strip_prefix("Bearer ").unwrap();
        let ctx = context(Some(SECRET));
        let claims = verify_token(token, &ctx.configuration().unwrap().jwt).unwrap();
        assert_eq!(claims.sub, KEY);
    }

    #[tokio::test]
    async fn test_unrepresentable_lifetime_fails_request() {
        let mut config = HostConfig::from_lookup(|key: &str| match key {
            "JWT_SECRET" => Some(SECRET.to_string()),
            _ => None,
        })
        .unwrap();
        config.jwt.expiry_secs = i64::MAX as u64;
        let context = Arc::new(HostContext::from_config(config).unwrap());

        let reached = Arc::new(AtomicBool::new(false));
        let flag = reached.clone();
        let gate = GateState::new(context, Arc::new(JwtMinter)).unwrap();
        let app = Router::new()
            .route(
                "/echo",
                get(move || async move {
                    flag.store(true, Ordering::SeqCst);
                    "reached"
                }),
            )
            .layer(middleware::from_fn_with_state(gate, exchange_legacy_key));

        let (status, body) = send(app, Some(&format!("Bearer {}", KEY))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(!body.contains(KEY));
        assert!(!reached.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_missing_secret_fails_request() {
        let gate = GateState::new(context(None), Arc::new(JwtMinter)).unwrap();
        let app = Router::new()
            .route("/echo", get(|| async { "reached" }))
            .layer(middleware::from_fn_with_state(gate, exchange_legacy_key));

        let (status, body) = send(app, Some(KEY)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_ne!(body, "reached");
    }
}
