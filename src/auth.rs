//! Bearer authentication and the `Principal` extractor

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::context::HostContext;
use crate::error::HostError;
use crate::token::{Claims, verify_token};

/// Authenticated caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub subject: String,
    pub expires_at: DateTime<Utc>,
    pub token_id: String,
}

impl From<Claims> for Principal {
    fn from(claims: Claims) -> Self {
        Self {
            subject: claims.sub,
            expires_at: DateTime::from_timestamp(claims.exp, 0).unwrap_or_default(),
            token_id: claims.jti,
        }
    }
}

/// Extract the token from a `Bearer <token>` header value
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Middleware attaching a [`Principal`] to requests with a valid bearer token.
///
/// Requests without one continue anonymously; endpoints decide whether
/// that is acceptable by extracting `Principal`.
pub async fn authenticate(
    State(context): State<Arc<HostContext>>,
    mut req: Request,
    next: Next,
) -> Response {
    let principal = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
        .and_then(|token| {
            let verified = context
                .configuration()
                .and_then(|config| verify_token(token, &config.jwt));
            match verified {
                Ok(claims) => Some(Principal::from(claims)),
                Err(e) => {
                    debug!("Bearer token rejected: {}", e);
                    None
                }
            }
        });

    if let Some(principal) = principal {
        req.extensions_mut().insert(principal);
    }

    next.run(req).await
}

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = HostError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or_else(|| HostError::Unauthorized("Authentication required".into()))
    }
}
