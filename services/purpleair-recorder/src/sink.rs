//! Time-series sink for emitted points.

use reqwest::{Client, StatusCode};
use std::fmt::Write as _;
use std::future::Future;
use std::time::Duration;
use url::Url;

use crate::types::Point;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("influx write rejected with {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("influx write failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid influx url: {0}")]
    Url(#[from] url::ParseError),
}

/// Receives the complete point set of one cycle.
pub trait PointSink {
    fn write_points(&self, points: &[Point]) -> impl Future<Output = Result<(), SinkError>>;
}

/// InfluxDB 1.x HTTP write API.
#[derive(Clone)]
pub struct InfluxSink {
    http: Client,
    write_url: Url,
}

impl InfluxSink {
    pub fn new(base_url: &str, database: &str, timeout: Duration) -> Result<Self, SinkError> {
        let write_url = Url::parse_with_params(
            &format!("{}/write", base_url.trim_end_matches('/')),
            &[("db", database), ("precision", "s")],
        )?;
        Ok(Self {
            http: Client::builder().timeout(timeout).build()?,
            write_url,
        })
    }
}

impl PointSink for InfluxSink {
    async fn write_points(&self, points: &[Point]) -> Result<(), SinkError> {
        let body = line_protocol(points);
        let response = self
            .http
            .post(self.write_url.clone())
            .body(body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Status { status, body });
        }
        tracing::info!(points = points.len(), "points written to influx");
        Ok(())
    }
}

/// Render points as InfluxDB line protocol, one line per point.
pub fn line_protocol(points: &[Point]) -> String {
    let mut out = String::new();
    for point in points {
        out.push_str(&escape(point.series, &[',', ' ']));
        for (key, value) in &point.tags {
            let _ = write!(
                out,
                ",{}={}",
                escape(key, &[',', ' ', '=']),
                escape(value, &[',', ' ', '='])
            );
        }
        let _ = writeln!(out, " value={} {}", point.value, point.timestamp);
    }
    out
}

fn escape(raw: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if special.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
