//! Mapping of upstream documents onto [`Reading`].

use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::types::Reading;

/// Upstream endpoint shape, chosen from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiGeneration {
    /// `/json?show=<id>`: concentrations, no AQI sample.
    LegacyShow,
    /// `/data.json?...&fields=pm_1`: field-indexed rows, AQI sample only.
    LegacyDataJson,
    /// `/v1/sensors/<id>`: keyed REST API.
    ApiV1,
}

impl ApiGeneration {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LegacyShow => "legacy-show",
            Self::LegacyDataJson => "legacy-data-json",
            Self::ApiV1 => "v1",
        }
    }
}

impl fmt::Display for ApiGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApiGeneration {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy-show" | "legacy" => Ok(Self::LegacyShow),
            "legacy-data-json" | "data-json" => Ok(Self::LegacyDataJson),
            "v1" | "api-v1" => Ok(Self::ApiV1),
            other => Err(format!("unknown API generation '{other}'")),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum NormalizeError {
    #[error("{generation}: missing mandatory field '{field}'")]
    MissingField {
        generation: ApiGeneration,
        field: &'static str,
    },
    #[error("{generation}: unexpected document shape: {detail}")]
    Shape {
        generation: ApiGeneration,
        detail: String,
    },
}

/// Build a [`Reading`] from one upstream document.
///
/// `requested_id` stands in for the sensor id when the document cannot carry
/// one (an empty `data.json` row set).
pub fn normalize(
    generation: ApiGeneration,
    doc: &Value,
    requested_id: &str,
) -> Result<Reading, NormalizeError> {
    match generation {
        ApiGeneration::LegacyShow => normalize_legacy_show(doc),
        ApiGeneration::LegacyDataJson => normalize_legacy_data_json(doc, requested_id),
        ApiGeneration::ApiV1 => normalize_api_v1(doc),
    }
}

fn normalize_legacy_show(doc: &Value) -> Result<Reading, NormalizeError> {
    let generation = ApiGeneration::LegacyShow;
    let result = doc
        .get("results")
        .and_then(Value::as_array)
        .and_then(|results| results.first())
        .ok_or_else(|| NormalizeError::Shape {
            generation,
            detail: "no entries in 'results'".into(),
        })?;
    Ok(Reading {
        sensor_id: identifier(result.get("ID")).ok_or(NormalizeError::MissingField {
            generation,
            field: "ID",
        })?,
        timestamp: timestamp(result.get("LastSeen")).ok_or(NormalizeError::MissingField {
            generation,
            field: "LastSeen",
        })?,
        pm1_0: number(result.get("pm1_0_atm")),
        pm2_5: number(result.get("pm2_5_atm")),
        pm10_0: number(result.get("pm10_0_atm")),
        pm2_5_for_aqi: None,
    })
}

fn normalize_legacy_data_json(doc: &Value, requested_id: &str) -> Result<Reading, NormalizeError> {
    let generation = ApiGeneration::LegacyDataJson;
    let timestamp = timestamp(doc.get("data_time_stamp")).ok_or(NormalizeError::MissingField {
        generation,
        field: "data_time_stamp",
    })?;
    Ok(Reading {
        sensor_id: identifier(data_column(doc, "ID")).unwrap_or_else(|| requested_id.to_string()),
        timestamp,
        pm1_0: None,
        pm2_5: None,
        pm10_0: None,
        pm2_5_for_aqi: pm_1_sample(doc),
    })
}

/// The `pm_1` AQI sample from a `data.json` document.
///
/// Needs only `fields` and `data`; a document without rows has no sample.
pub fn pm_1_sample(doc: &Value) -> Option<f64> {
    let sample = number(data_column(doc, "pm_1"));
    if sample.is_none() {
        tracing::info!("no pm_1 sample in data rows, AQI unavailable");
    }
    sample
}

/// Cell of the first `data` row under the column named in `fields`.
fn data_column<'a>(doc: &'a Value, name: &str) -> Option<&'a Value> {
    let offset = doc
        .get("fields")?
        .as_array()?
        .iter()
        .position(|f| f.as_str() == Some(name))?;
    doc.get("data")?
        .as_array()?
        .first()?
        .as_array()?
        .get(offset)
}

fn normalize_api_v1(doc: &Value) -> Result<Reading, NormalizeError> {
    let generation = ApiGeneration::ApiV1;
    let sensor = doc
        .get("sensor")
        .filter(|s| s.is_object())
        .ok_or_else(|| NormalizeError::Shape {
            generation,
            detail: "missing 'sensor' object".into(),
        })?;
    Ok(Reading {
        sensor_id: identifier(sensor.get("sensor_index")).ok_or(NormalizeError::MissingField {
            generation,
            field: "sensor_index",
        })?,
        timestamp: timestamp(sensor.get("last_seen")).ok_or(NormalizeError::MissingField {
            generation,
            field: "last_seen",
        })?,
        pm1_0: number(sensor.get("pm1.0_atm")),
        pm2_5: number(sensor.get("pm2.5_atm")),
        pm10_0: number(sensor.get("pm10.0_atm")),
        pm2_5_for_aqi: number(sensor.get("stats_a").and_then(|s| s.get("pm2.5_10minute"))),
    })
}

/// Finite number from a JSON number or numeric string.
fn number(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn timestamp(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn identifier(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}
