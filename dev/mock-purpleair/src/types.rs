use serde::{Deserialize, Serialize};
use serde_json::Value;

// Canned sensor served by every endpoint
#[derive(Debug, Clone)]
pub struct MockSensor {
    pub sensor_id: u64,
    pub label: String,
    pub pm1_0: f64,
    pub pm2_5: f64,
    pub pm10_0: f64,
    pub pm2_5_1minute: f64,
    pub pm2_5_10minute: f64,
}

#[derive(Debug, Deserialize)]
pub struct ShowQuery {
    pub show: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DataJsonQuery {
    pub key: Option<String>,
    pub show: Option<String>,
    pub fields: Option<String>,
}

// Response body for GET /json?show=<id>; legacy numbers are strings
#[derive(Debug, Serialize)]
pub struct LegacyShowResp {
    #[serde(rename = "mapVersion")]
    pub map_version: &'static str,
    pub results: Vec<LegacyResult>,
}

#[derive(Debug, Serialize)]
pub struct LegacyResult {
    #[serde(rename = "ID")]
    pub id: u64,
    #[serde(rename = "Label")]
    pub label: String,
    #[serde(rename = "LastSeen")]
    pub last_seen: String,
    pub pm1_0_atm: String,
    pub pm2_5_atm: String,
    pub pm10_0_atm: String,
}

// Response body for GET /data.json
#[derive(Debug, Serialize)]
pub struct DataJsonResp {
    pub version: &'static str,
    pub fields: Vec<String>,
    pub data: Vec<Vec<Value>>,
    pub count: usize,
    pub data_time_stamp: i64,
}

// Response body for GET /v1/sensors/:id
#[derive(Debug, Serialize)]
pub struct SensorResp {
    pub api_version: &'static str,
    pub time_stamp: i64,
    pub data_time_stamp: i64,
    pub sensor: SensorFields,
}

#[derive(Debug, Serialize)]
pub struct SensorFields {
    pub sensor_index: u64,
    pub name: String,
    pub last_seen: i64,
    #[serde(rename = "pm1.0_atm")]
    pub pm1_0_atm: f64,
    #[serde(rename = "pm2.5_atm")]
    pub pm2_5_atm: f64,
    #[serde(rename = "pm10.0_atm")]
    pub pm10_0_atm: f64,
    pub stats_a: SensorStats,
}

#[derive(Debug, Serialize)]
pub struct SensorStats {
    #[serde(rename = "pm2.5")]
    pub pm2_5: f64,
    #[serde(rename = "pm2.5_10minute")]
    pub pm2_5_10minute: f64,
}

#[derive(Debug, Serialize)]
pub struct ErrorResp {
    pub error: &'static str,
    pub description: String,
}
