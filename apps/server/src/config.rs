//! Environment-driven configuration, mirroring how `apps/server`'s API
//! layer reads `CONNECT_API_URL`/`CONNECT_AUTH_URL` via `std::env::var`.

use chrono_tz::Tz;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub quote_provider_api_key: String,
    pub quote_provider_base_url: String,
    pub scheduler_tz: Tz,
}

const DEFAULT_QUOTE_PROVIDER_BASE_URL: &str = "https://api.twelvedata.com";

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;
        let quote_provider_api_key =
            std::env::var("QUOTE_PROVIDER_API_KEY").map_err(|_| ConfigError::Missing("QUOTE_PROVIDER_API_KEY"))?;
        let quote_provider_base_url = std::env::var("QUOTE_PROVIDER_BASE_URL")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_QUOTE_PROVIDER_BASE_URL.to_string());
        let scheduler_tz = match std::env::var("SCHEDULER_TZ") {
            Ok(raw) => raw
                .parse::<Tz>()
                .map_err(|_| ConfigError::Invalid { name: "SCHEDULER_TZ", value: raw })?,
            Err(_) => Tz::UTC,
        };
        Ok(Self {
            database_url,
            quote_provider_api_key,
            quote_provider_base_url,
            scheduler_tz,
        })
    }
}
