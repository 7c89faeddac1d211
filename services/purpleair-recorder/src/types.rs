use serde::Serialize;
use std::collections::BTreeMap;

/// Canonical sensor reading, built once from a single poll.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub sensor_id: String,
    /// Unix seconds as reported upstream; passed through unchanged.
    pub timestamp: i64,
    pub pm1_0: Option<f64>,
    pub pm2_5: Option<f64>,
    pub pm10_0: Option<f64>,
    /// Short-window PM2.5 average used for AQI, when the endpoint supplies one.
    pub pm2_5_for_aqi: Option<f64>,
}

impl Reading {
    /// Same reading with the AQI sample taken from a secondary document.
    pub fn with_aqi_sample(self, sample: Option<f64>) -> Self {
        Self {
            pm2_5_for_aqi: sample,
            ..self
        }
    }
}

pub const SERIES_PM10_0: &str = "pm10_0_atm";
pub const SERIES_PM2_5: &str = "pm2_5_atm";
pub const SERIES_PM1_0: &str = "pm1_0_atm";
pub const SERIES_AQI: &str = "aqi";

// One time-series point as written to the sink
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Point {
    pub series: &'static str,
    pub value: f64,
    pub tags: BTreeMap<String, String>,
    pub timestamp: i64,
}
