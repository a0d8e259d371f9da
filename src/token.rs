//! Bearer token minting and verification
//!
//! Legacy keys are exchanged for HS256 JWTs signed with the configured
//! secret. Tokens carry the legacy key as subject plus a random `jti`, so two
//! tokens minted for the same key differ in bytes but verify identically.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtSettings;
use crate::context::HostContext;
use crate::error::{HostError, Result};

/// Payload stored in a minted token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// The legacy key the token was minted for
    pub sub: String,
    pub iss: String,
    pub aud: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Token id
    pub jti: String,
}

/// Exchanges a legacy key for a signed token
pub trait TokenMinter: Send + Sync {
    fn mint(&self, legacy_key: &str, context: &HostContext) -> Result<String>;
}

/// HS256 JWT minter reading its settings from the host configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct JwtMinter;

impl TokenMinter for JwtMinter {
    fn mint(&self, legacy_key: &str, context: &HostContext) -> Result<String> {
        let config = context.configuration()?;
        mint_token(legacy_key, &config.jwt)
    }
}

/// Sign a token for `legacy_key`
pub fn mint_token(legacy_key: &str, settings: &JwtSettings) -> Result<String> {
    let secret = signing_secret(settings)?;

    if legacy_key.is_empty() || !legacy_key.bytes().all(|b| b.is_ascii_graphic()) {
        return Err(HostError::SigningFailure("legacy key rejected".into()));
    }

    let now = Utc::now().timestamp();
    let exp = i64::try_from(settings.expiry_secs)
        .ok()
        .and_then(|secs| now.checked_add(secs))
        .ok_or_else(|| {
            HostError::SigningFailure(format!(
                "Token lifetime out of range: {}s",
                settings.expiry_secs
            ))
        })?;

    let claims = Claims {
        sub: legacy_key.to_string(),
        iss: settings.issuer.clone(),
        aud: settings.audience.clone(),
        iat: now,
        exp,
        jti: Uuid::new_v4().to_string(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| HostError::SigningFailure(format!("Failed to generate token: {}", e)))
}

/// Verify signature, issuer, audience and expiry of a token
pub fn verify_token(token: &str, settings: &JwtSettings) -> Result<Claims> {
    let secret = signing_secret(settings)
        .map_err(|_| HostError::AuthenticationFailure("Token signing is not configured".into()))?;

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[settings.issuer.as_str()]);
    validation.set_audience(&[settings.audience.as_str()]);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|err| {
        use jsonwebtoken::errors::ErrorKind;
        let message = match err.kind() {
            ErrorKind::ExpiredSignature => "Token expired",
            ErrorKind::InvalidToken => "Invalid token",
            ErrorKind::InvalidSignature => "Invalid signature",
            ErrorKind::InvalidIssuer => "Invalid issuer",
            ErrorKind::InvalidAudience => "Invalid audience",
            _ => "Token validation failed",
        };
        HostError::AuthenticationFailure(message.into())
    })
}

fn signing_secret(settings: &JwtSettings) -> Result<&str> {
    settings
        .secret
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HostError::ConfigurationMissing("JWT_SECRET".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HostConfig;
    use crate::context::HostContextBuilder;

    const KEY: &str = "0123456789abcdef0123456789abcdef";

    fn settings() -> JwtSettings {
        JwtSettings {
            secret: Some("test-secret-that-is-at-least-32-characters-long".into()),
            ..JwtSettings::default()
        }
    }

    fn context(secret: Option<&str>) -> HostContext {
        let secret = secret.map(str::to_string);
        let config = HostConfig::from_lookup(move |key| match key {
            "JWT_SECRET" => secret.clone(),
            _ => None,
        })
        .unwrap();
        HostContext::from_config(config).unwrap()
    }

    #[test]
    fn test_mint_and_verify() {
        let settings = settings();
        let token = mint_token(KEY, &settings).unwrap();

        let claims = verify_token(&token, &settings).unwrap();
        assert_eq!(claims.sub, KEY);
        assert_eq!(claims.iss, "bothost");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_tokens_differ_but_both_verify() {
        let settings = settings();
        let a = mint_token(KEY, &settings).unwrap();
        let b = mint_token(KEY, &settings).unwrap();
        assert_ne!(a, b);
        assert!(verify_token(&a, &settings).is_ok());
        assert!(verify_token(&b, &settings).is_ok());
    }

    #[test]
    fn test_wrong_secret() {
        let token = mint_token(KEY, &settings()).unwrap();
        let other = JwtSettings {
            secret: Some("different-secret-that-is-at-least-32-characters".into()),
            ..JwtSettings::default()
        };
        assert!(matches!(
            verify_token(&token, &other),
            Err(HostError::AuthenticationFailure(_))
        ));
    }

    #[test]
    fn test_wrong_audience() {
        let token = mint_token(KEY, &settings()).unwrap();
        let other = JwtSettings {
            audience: "someone-else".into(),
            ..settings()
        };
        assert!(verify_token(&token, &other).is_err());
    }

    #[test]
    fn test_expired_token() {
        let settings = settings();
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: KEY.into(),
            iss: settings.issuer.clone(),
            aud: settings.audience.clone(),
            iat: now - 7200,
            exp: now - 3600,
            jti: "old".into(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(settings.secret.as_deref().unwrap().as_bytes()),
        )
        .unwrap();

        match verify_token(&token, &settings) {
            Err(HostError::AuthenticationFailure(msg)) => assert_eq!(msg, "Token expired"),
            other => panic!("expected expiry failure, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_secret() {
        let err = mint_token(KEY, &JwtSettings::default()).unwrap_err();
        assert!(matches!(err, HostError::ConfigurationMissing(_)));
    }

    #[test]
    fn test_rejected_key() {
        assert!(matches!(
            mint_token("", &settings()),
            Err(HostError::SigningFailure(_))
        ));
    }

    #[test]
    fn test_lifetime_overflow_is_signing_failure() {
        for expiry_secs in [i64::MAX as u64, u64::MAX] {
            let settings = JwtSettings {
                expiry_secs,
                ..settings()
            };
            assert!(matches!(
                mint_token(KEY, &settings),
                Err(HostError::SigningFailure(_))
            ));
        }
    }

    #[test]
    fn test_minter_reads_context() {
        let minter = JwtMinter;
        let token = minter
            .mint(KEY, &context(Some("context-secret-that-is-32-chars-long!")))
            .unwrap();
        assert!(!token.is_empty());

        assert!(minter.mint(KEY, &context(None)).is_err());
        assert!(matches!(
            minter.mint(KEY, &HostContextBuilder::new().build()),
            Err(HostError::ConfigurationMissing(k)) if k == "Configuration"
        ));
    }
}
