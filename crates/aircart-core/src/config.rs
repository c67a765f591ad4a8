//! Environment-driven configuration for the cart synchronization layer.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

/// Settings consumed by the gateway client and the synchronizer.
#[derive(Clone)]
pub struct SyncConfig {
    /// GraphQL shop-API endpoint of the order service.
    pub shop_api_url: String,
    /// Optional channel token forwarded on every request.
    pub channel_token: Option<String>,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    /// Additional attempts after a transport failure. The synchronizer
    /// retries transport errors once by default.
    pub max_transport_retries: u32,
    pub retry_backoff_base_ms: u64,
    /// Where the session token is persisted. `None` keeps it in memory only.
    pub session_token_path: Option<PathBuf>,
}

impl std::fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncConfig")
            .field("shop_api_url", &self.shop_api_url)
            .field(
                "channel_token",
                &self.channel_token.as_ref().map(|_| "[redacted]"),
            )
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("max_transport_retries", &self.max_transport_retries)
            .field("retry_backoff_base_ms", &self.retry_backoff_base_ms)
            .field("session_token_path", &self.session_token_path)
            .finish()
    }
}

/// Load configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_config() -> Result<SyncConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_config_from_env()
}

/// Load configuration from environment variables already in the process.
///
/// Unlike [`load_config`], this does NOT load `.env` files. Useful for testing
/// or when the caller manages env setup.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_config_from_env() -> Result<SyncConfig, ConfigError> {
    build_config(|key| std::env::var(key))
}

/// Build configuration using the provided env-var lookup function.
///
/// This is the core parsing/validation logic, decoupled from the actual
/// environment so it can be tested with a pure `HashMap` lookup.
fn build_config<F>(lookup: F) -> Result<SyncConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let shop_api_url = require("AIRCART_SHOP_API_URL")?;
    let channel_token = lookup("AIRCART_CHANNEL_TOKEN").ok();

    let request_timeout_secs = parse_u64("AIRCART_REQUEST_TIMEOUT_SECS", "30")?;
    let user_agent = or_default("AIRCART_USER_AGENT", "aircart/0.1 (cart-sync)");
    let max_transport_retries = parse_u32("AIRCART_MAX_TRANSPORT_RETRIES", "1")?;
    let retry_backoff_base_ms = parse_u64("AIRCART_RETRY_BACKOFF_BASE_MS", "250")?;
    let session_token_path = lookup("AIRCART_SESSION_TOKEN_PATH").ok().map(PathBuf::from);

    Ok(SyncConfig {
        shop_api_url,
        channel_token,
        request_timeout_secs,
        user_agent,
        max_transport_retries,
        retry_backoff_base_ms,
        session_token_path,
    })
}
