//! Environment-driven configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::normalize::ApiGeneration;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("{key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub sensor_id: String,
    pub generation: ApiGeneration,
    /// `x-api-key` for the v1 API.
    pub read_key: Option<String>,
    /// `key=` for the legacy `data.json` endpoint.
    pub legacy_key: Option<String>,
    pub legacy_url: String,
    pub api_url: String,
    pub http_timeout: Duration,
    pub max_retries: u32,
    pub secondary_backoff: Duration,
    pub retry_ceiling: Duration,
    pub influx_url: String,
    pub influx_db: String,
    pub strict_exit: bool,
    pub log_file: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read_env_optional = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let read_env =
            |key: &str, default: &str| read_env_optional(key).unwrap_or_else(|| default.to_string());

        let sensor_id =
            read_env_optional("PURPLEAIR_SENSOR_ID").ok_or(ConfigError::Missing("PURPLEAIR_SENSOR_ID"))?;
        let generation: ApiGeneration = read_env("PURPLEAIR_API", "legacy-show")
            .parse()
            .map_err(|reason| ConfigError::Invalid {
                key: "PURPLEAIR_API",
                reason,
            })?;
        let read_key = read_env_optional("PURPLEAIR_READ_KEY");
        let legacy_key = read_env_optional("PURPLEAIR_LEGACY_KEY");
        match generation {
            ApiGeneration::ApiV1 if read_key.is_none() => {
                return Err(ConfigError::Missing("PURPLEAIR_READ_KEY"));
            }
            ApiGeneration::LegacyDataJson if legacy_key.is_none() => {
                return Err(ConfigError::Missing("PURPLEAIR_LEGACY_KEY"));
            }
            _ => {}
        }

        let home = read_env("HOME", ".");
        let default_log = PathBuf::from(home).join(".log").join("purpleair.log");

        Ok(Self {
            sensor_id,
            generation,
            read_key,
            legacy_key,
            legacy_url: read_env("PURPLEAIR_LEGACY_URL", "https://www.purpleair.com"),
            api_url: read_env("PURPLEAIR_API_URL", "https://api.purpleair.com"),
            http_timeout: Duration::from_secs(parse_num(
                "PURPLEAIR_HTTP_TIMEOUT_SECS",
                &read_env("PURPLEAIR_HTTP_TIMEOUT_SECS", "10"),
            )?),
            max_retries: parse_num("PURPLEAIR_MAX_RETRIES", &read_env("PURPLEAIR_MAX_RETRIES", "5"))?,
            secondary_backoff: Duration::from_secs(parse_num(
                "PURPLEAIR_SECONDARY_BACKOFF_SECS",
                &read_env("PURPLEAIR_SECONDARY_BACKOFF_SECS", "5"),
            )?),
            retry_ceiling: Duration::from_secs(parse_num(
                "PURPLEAIR_RETRY_CEILING_SECS",
                &read_env("PURPLEAIR_RETRY_CEILING_SECS", "120"),
            )?),
            influx_url: read_env("INFLUX_URL", "http://localhost:8086"),
            influx_db: read_env("INFLUX_DB", "purpleair"),
            strict_exit: parse_bool("PURPLEAIR_STRICT_EXIT", &read_env("PURPLEAIR_STRICT_EXIT", "false"))?,
            log_file: read_env_optional("PURPLEAIR_LOG_FILE")
                .map(PathBuf::from)
                .unwrap_or(default_log),
        })
    }
}

fn parse_num<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.parse().map_err(|_| ConfigError::Invalid {
        key,
        reason: format!("'{raw}' is not a valid number"),
    })
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            reason: format!("'{raw}' is not a boolean"),
        }),
    }
}
