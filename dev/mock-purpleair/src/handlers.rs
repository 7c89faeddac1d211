use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::types::{
    DataJsonQuery, DataJsonResp, ErrorResp, LegacyResult, LegacyShowResp, MockSensor, SensorFields,
    SensorResp, SensorStats, ShowQuery,
};

pub struct AppState {
    pub sensor: MockSensor,
    /// Answer this many requests with 502 before serving data.
    pub fail_first: u32,
    pub served_failures: AtomicU32,
    /// Emit the doubled-bracket `data.json` defect.
    pub malformed_data: bool,
}

type SharedState = Arc<AppState>;

fn injected_fault(state: &AppState) -> Option<Response> {
    let served = state
        .served_failures
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
            (n < state.fail_first).then_some(n + 1)
        })
        .ok()?;
    tracing::warn!(served = served + 1, fail_first = state.fail_first, "injecting 502");
    Some((StatusCode::BAD_GATEWAY, "Bad Gateway").into_response())
}

fn error(status: StatusCode, error: &'static str, description: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResp {
            error,
            description: description.into(),
        }),
    )
        .into_response()
}

pub async fn health() -> Json<Value> {
    Json(json!({"status": "healthy"}))
}

pub async fn legacy_show(
    State(state): State<SharedState>,
    Query(query): Query<ShowQuery>,
) -> Response {
    if let Some(fault) = injected_fault(&state) {
        return fault;
    }
    let sensor = &state.sensor;
    let wanted = query.show.as_deref() == Some(sensor.sensor_id.to_string().as_str());
    tracing::info!(show = ?query.show, wanted, "legacy show request");
    let results = if wanted {
        vec![LegacyResult {
            id: sensor.sensor_id,
            label: sensor.label.clone(),
            last_seen: Utc::now().timestamp().to_string(),
            pm1_0_atm: sensor.pm1_0.to_string(),
            pm2_5_atm: sensor.pm2_5.to_string(),
            pm10_0_atm: sensor.pm10_0.to_string(),
        }]
    } else {
        Vec::new()
    };
    Json(LegacyShowResp {
        map_version: "0.12",
        results,
    })
    .into_response()
}

pub async fn data_json(
    State(state): State<SharedState>,
    Query(query): Query<DataJsonQuery>,
) -> Response {
    if let Some(fault) = injected_fault(&state) {
        return fault;
    }
    if query.key.as_deref().is_none_or(str::is_empty) {
        return error(StatusCode::FORBIDDEN, "MissingKeyError", "a key is required");
    }
    let sensor = &state.sensor;
    let now = Utc::now().timestamp();
    if state.malformed_data {
        tracing::info!("serving malformed data.json");
        let body = format!(
            r#"{{"version":"7.0.19","fields":["ID","pm_1"],"data":[],],"count":0,"data_time_stamp":{now}}}"#
        );
        return ([(header::CONTENT_TYPE, "application/json")], body).into_response();
    }

    let mut fields = vec!["ID".to_string()];
    fields.extend(
        query
            .fields
            .as_deref()
            .unwrap_or("pm_1")
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty() && *f != "ID")
            .map(str::to_string),
    );
    let wanted = query.show.as_deref() == Some(sensor.sensor_id.to_string().as_str());
    let data = if wanted {
        vec![
            fields
                .iter()
                .map(|field| match field.as_str() {
                    "ID" => json!(sensor.sensor_id),
                    "pm_1" => json!(sensor.pm2_5_1minute),
                    "pm" | "pm_0" => json!(sensor.pm2_5),
                    _ => Value::Null,
                })
                .collect(),
        ]
    } else {
        Vec::new()
    };
    tracing::info!(show = ?query.show, rows = data.len(), "data.json request");
    Json(DataJsonResp {
        version: "7.0.19",
        count: data.len(),
        fields,
        data,
        data_time_stamp: now,
    })
    .into_response()
}

pub async fn sensor(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Some(fault) = injected_fault(&state) {
        return fault;
    }
    let key = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if key.trim().is_empty() {
        return error(
            StatusCode::FORBIDDEN,
            "MissingApiKeyError",
            "No API key was found in the request.",
        );
    }
    let sensor = &state.sensor;
    if id != sensor.sensor_id.to_string() {
        return error(
            StatusCode::NOT_FOUND,
            "NotFoundError",
            format!("Cannot find a sensor with the provided parameters: {id}"),
        );
    }
    let now = Utc::now().timestamp();
    tracing::info!(sensor_index = sensor.sensor_id, "v1 sensor request");
    Json(SensorResp {
        api_version: "V1.0.11-0.0.49",
        time_stamp: now,
        data_time_stamp: now,
        sensor: SensorFields {
            sensor_index: sensor.sensor_id,
            name: sensor.label.clone(),
            last_seen: now,
            pm1_0_atm: sensor.pm1_0,
            pm2_5_atm: sensor.pm2_5,
            pm10_0_atm: sensor.pm10_0,
            stats_a: SensorStats {
                pm2_5: sensor.pm2_5,
                pm2_5_10minute: sensor.pm2_5_10minute,
            },
        },
    })
    .into_response()
}
