//! Configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Host configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    // =========================================================================
    // Hosting
    // =========================================================================
    /// HTTP server bind address
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Environment name ("Development", "Production", ...)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Content root; static files live under `<content_root>/wwwroot`
    #[serde(default = "default_content_root")]
    pub content_root: PathBuf,

    /// Modules to activate, in order
    #[serde(default = "default_modules")]
    pub modules: Vec<String>,

    /// Origins allowed by the CORS policy
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    // =========================================================================
    // Credential exchange
    // =========================================================================
    /// Length that marks an Authorization credential as a legacy key
    #[serde(default = "default_legacy_key_length")]
    pub legacy_key_length: usize,

    /// Signing settings for minted tokens
    #[serde(default)]
    pub jwt: JwtSettings,

    // =========================================================================
    // Startup banner
    // =========================================================================
    #[serde(default)]
    pub api: ApiInfo,
}

/// Signing settings for minted bearer tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtSettings {
    /// HMAC secret. Minting fails while this is unset.
    pub secret: Option<String>,
    pub issuer: String,
    pub audience: String,
    pub expiry_secs: u64,
}

impl Default for JwtSettings {
    fn default() -> Self {
        Self {
            secret: None,
            issuer: "bothost".to_string(),
            audience: "bothost".to_string(),
            expiry_secs: 3600,
        }
    }
}

/// API description printed in the startup banner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiInfo {
    pub title: String,
    pub version: String,
    pub description: String,
    pub license: String,
    pub contact: String,
}

impl Default for ApiInfo {
    fn default() -> Self {
        Self {
            title: "Bot Host".to_string(),
            version: "v1".to_string(),
            description: "Modular chatbot platform".to_string(),
            license: "MIT".to_string(),
            contact: String::new(),
        }
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0:5500".to_string()
}

fn default_environment() -> String {
    "Production".to_string()
}

fn default_content_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_modules() -> Vec<String> {
    vec![
        "health".to_string(),
        "account".to_string(),
        "webchat".to_string(),
    ]
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:3110".to_string()]
}

fn default_request_timeout() -> u64 {
    30
}

fn default_legacy_key_length() -> usize {
    32
}

/// Longest lifetime accepted for a minted token (one year)
pub const MAX_TOKEN_EXPIRY_SECS: u64 = 366 * 24 * 60 * 60;

/// Split a comma-separated list, dropping empty entries
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl HostConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let legacy_key_length = match lookup("LEGACY_KEY_LENGTH") {
            Some(v) => v
                .trim()
                .parse()
                .context("LEGACY_KEY_LENGTH must be a positive integer")?,
            None => default_legacy_key_length(),
        };
        anyhow::ensure!(legacy_key_length > 0, "LEGACY_KEY_LENGTH must be positive");

        let defaults = JwtSettings::default();
        let jwt = JwtSettings {
            secret: lookup("JWT_SECRET").filter(|s| !s.trim().is_empty()),
            issuer: lookup("JWT_ISSUER").unwrap_or(defaults.issuer),
            audience: lookup("JWT_AUDIENCE").unwrap_or(defaults.audience),
            expiry_secs: match lookup("JWT_EXPIRY_SECS") {
                Some(v) => v
                    .trim()
                    .parse()
                    .context("JWT_EXPIRY_SECS must be a positive integer")?,
                None => defaults.expiry_secs,
            },
        };
        anyhow::ensure!(
            jwt.expiry_secs > 0 && jwt.expiry_secs <= MAX_TOKEN_EXPIRY_SECS,
            "JWT_EXPIRY_SECS must be between 1 and {}",
            MAX_TOKEN_EXPIRY_SECS
        );

        let request_timeout_secs = match lookup("REQUEST_TIMEOUT_SECS") {
            Some(v) => v
                .trim()
                .parse()
                .context("REQUEST_TIMEOUT_SECS must be a positive integer")?,
            None => default_request_timeout(),
        };
        anyhow::ensure!(
            request_timeout_secs > 0,
            "REQUEST_TIMEOUT_SECS must be positive"
        );

        let info = ApiInfo::default();
        let api = ApiInfo {
            title: lookup("API_TITLE").unwrap_or(info.title),
            version: lookup("API_VERSION").unwrap_or(info.version),
            description: lookup("API_DESCRIPTION").unwrap_or(info.description),
            license: lookup("API_LICENSE").unwrap_or(info.license),
            contact: lookup("API_CONTACT").unwrap_or(info.contact),
        };

        Ok(Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(default_bind_addr),
            environment: lookup("BOT_ENVIRONMENT").unwrap_or_else(default_environment),
            content_root: lookup("CONTENT_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(default_content_root),
            modules: lookup("BOT_MODULES")
                .map(|s| split_list(&s))
                .unwrap_or_else(default_modules),
            cors_origins: lookup("CORS_ORIGINS")
                .map(|s| split_list(&s))
                .unwrap_or_else(default_cors_origins),
            request_timeout_secs,
            legacy_key_length,
            jwt,
            api,
        })
    }

    /// Check if the host runs in development mode
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }
}
