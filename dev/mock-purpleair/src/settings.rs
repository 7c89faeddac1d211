//! Environment settings for the mock upstream.

use anyhow::{Context, Result};
use std::str::FromStr;

use crate::types::MockSensor;

/// Trimmed value of `key`, or `default` when unset or blank.
pub fn read_env(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    match lookup(key) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => default.to_string(),
    }
}

/// Parsed value of `key`. A value that is set but does not parse is an error.
pub fn parse_env<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: &str,
) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = read_env(lookup, key, default);
    raw.parse().with_context(|| format!("invalid {key}: {raw:?}"))
}

pub struct MockSettings {
    pub sensor: MockSensor,
    pub fail_first: u32,
    pub malformed_data: bool,
    pub host: String,
    pub port: u16,
}

impl MockSettings {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            sensor: MockSensor {
                sensor_id: parse_env(&lookup, "MOCK_SENSOR_ID", "59873")?,
                label: read_env(&lookup, "MOCK_SENSOR_LABEL", "mock sensor"),
                pm1_0: parse_env(&lookup, "MOCK_PM1_0", "1.1")?,
                pm2_5: parse_env(&lookup, "MOCK_PM2_5", "3.2")?,
                pm10_0: parse_env(&lookup, "MOCK_PM10_0", "5.0")?,
                pm2_5_1minute: parse_env(&lookup, "MOCK_PM2_5_1MIN", "9.0")?,
                pm2_5_10minute: parse_env(&lookup, "MOCK_PM2_5_10MIN", "9.0")?,
            },
            fail_first: parse_env(&lookup, "MOCK_FAIL_FIRST", "0")?,
            malformed_data: parse_env(&lookup, "MOCK_MALFORMED_DATA", "false")?,
            host: read_env(&lookup, "MOCK_PURPLEAIR_HOST", "0.0.0.0"),
            port: parse_env(&lookup, "MOCK_PURPLEAIR_PORT", "8082")?,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}
