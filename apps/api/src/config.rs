use anyhow::{Context, Result};

/// Fallback Orange Money number shown when the settings row has none.
const DEFAULT_PAYMENT_NUMBER: &str = "+224 622 00 00 00";

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub port: u16,
    pub rust_log: String,
    /// Lifetime of the cached diffusion settings and channel pricing.
    pub settings_cache_ttl_secs: u64,
    pub default_payment_number: String,
    pub currency: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            database_max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 10)?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            settings_cache_ttl_secs: parse_env("SETTINGS_CACHE_TTL_SECS", 300)?,
            default_payment_number: std::env::var("DEFAULT_PAYMENT_NUMBER")
                .unwrap_or_else(|_| DEFAULT_PAYMENT_NUMBER.to_string()),
            currency: std::env::var("CURRENCY").unwrap_or_else(|_| "GNF".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        Err(_) => Ok(default),
    }
}
