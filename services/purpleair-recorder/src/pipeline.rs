//! One fetch-normalize-compute-emit cycle.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::Instrument;

use crate::aqi::aqi_point_value;
use crate::client::{FetchError, PRIMARY_FAULTS, RATE_LIMITED_FAULTS, SensorClient};
use crate::config::Config;
use crate::normalize::{ApiGeneration, NormalizeError, normalize, pm_1_sample};
use crate::retry::{RetryPolicy, with_retry};
use crate::sink::{PointSink, SinkError};
use crate::types::{Point, Reading, SERIES_AQI, SERIES_PM1_0, SERIES_PM2_5, SERIES_PM10_0};

/// Any fault that escapes its own tier and ends the cycle.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("normalization failed: {0}")]
    Normalize(#[from] NormalizeError),
    #[error("sink write failed: {0}")]
    Sink(#[from] SinkError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success { points: Vec<Point>, written: bool },
    Failure { reason: String },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub sensor_id: String,
    pub generation: ApiGeneration,
    pub read_key: Option<String>,
    pub legacy_key: Option<String>,
    pub primary_retry: RetryPolicy,
    pub secondary_retry: RetryPolicy,
    pub dry_run: bool,
}

impl PipelineSettings {
    pub fn from_config(cfg: &Config, dry_run: bool) -> Self {
        let base = RetryPolicy::default()
            .with_max_retries(cfg.max_retries)
            .with_ceiling(cfg.retry_ceiling);
        Self {
            sensor_id: cfg.sensor_id.clone(),
            generation: cfg.generation,
            read_key: cfg.read_key.clone(),
            legacy_key: cfg.legacy_key.clone(),
            primary_retry: base.clone(),
            secondary_retry: base.with_backoff(cfg.secondary_backoff),
            dry_run,
        }
    }
}

pub struct IngestPipeline<S> {
    client: SensorClient,
    sink: S,
    settings: PipelineSettings,
}

impl<S: PointSink> IngestPipeline<S> {
    pub fn new(client: SensorClient, sink: S, settings: PipelineSettings) -> Self {
        Self {
            client,
            sink,
            settings,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Run one cycle. Failures are logged and reported, never propagated.
    pub async fn run(&self) -> Outcome {
        let span = tracing::info_span!(
            "record_status",
            sensor_id = %self.settings.sensor_id,
            generation = %self.settings.generation,
        );
        async {
            tracing::info!("starting");
            match self.cycle().await {
                Ok((points, written)) => Outcome::Success { points, written },
                Err(err) => {
                    tracing::error!(error = %err, "cycle failed, no points written");
                    Outcome::Failure {
                        reason: err.to_string(),
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn cycle(&self) -> Result<(Vec<Point>, bool), PipelineError> {
        let reading = self.fetch_reading().await?;
        let points = assemble_points(&reading);
        if self.settings.dry_run {
            tracing::info!(points = points.len(), "dry run, skipping sink write");
            match serde_json::to_string(&points) {
                Ok(json) => tracing::info!(points = %json, "dry run output"),
                Err(err) => tracing::warn!(error = %err, "could not render dry run points"),
            }
            return Ok((points, false));
        }
        if points.is_empty() {
            tracing::warn!("reading produced no points, nothing to write");
            return Ok((points, false));
        }
        self.sink.write_points(&points).await?;
        Ok((points, true))
    }

    async fn fetch_reading(&self) -> Result<Reading, PipelineError> {
        let settings = &self.settings;
        let sensor_id = settings.sensor_id.as_str();
        let (url, api_key) = match settings.generation {
            ApiGeneration::LegacyShow => (self.client.legacy_show_url(sensor_id), None),
            ApiGeneration::LegacyDataJson => (
                self.client
                    .legacy_data_url(sensor_id, settings.legacy_key.as_deref().unwrap_or_default()),
                None,
            ),
            ApiGeneration::ApiV1 => (self.client.sensor_url(sensor_id), settings.read_key.as_deref()),
        };
        let url = url.map_err(FetchError::from)?;
        let client = &self.client;
        let doc = with_retry(&settings.primary_retry, PRIMARY_FAULTS, {
            let url = &url;
            move |_| client.get_json(url, api_key)
        })
        .await?;
        tracing::info!(document = %doc, "sensor reading");

        let mut reading = normalize(settings.generation, &doc, sensor_id)?;
        if let Some(seen) = DateTime::<Utc>::from_timestamp(reading.timestamp, 0) {
            tracing::debug!(last_seen = %seen.to_rfc3339(), "reading timestamp");
        }

        if settings.generation == ApiGeneration::LegacyShow {
            if let Some(key) = settings.legacy_key.as_deref() {
                let sample_url = self
                    .client
                    .legacy_data_url(sensor_id, key)
                    .map_err(FetchError::from)?;
                let sample_doc = with_retry(&settings.secondary_retry, RATE_LIMITED_FAULTS, {
                    let url = &sample_url;
                    move |_| client.get_json(url, None)
                })
                .await?;
                tracing::info!(document = %sample_doc, "aqi sample");
                reading = reading.with_aqi_sample(pm_1_sample(&sample_doc));
            }
        }
        Ok(reading)
    }
}

/// Points for one reading, in fixed series order, sharing tags and timestamp.
pub fn assemble_points(reading: &Reading) -> Vec<Point> {
    let tags = BTreeMap::from([("id".to_string(), reading.sensor_id.clone())]);
    let point = |series: &'static str, value: f64| Point {
        series,
        value,
        tags: tags.clone(),
        timestamp: reading.timestamp,
    };
    let mut points: Vec<Point> = [
        (SERIES_PM10_0, reading.pm10_0),
        (SERIES_PM2_5, reading.pm2_5),
        (SERIES_PM1_0, reading.pm1_0),
    ]
    .into_iter()
    .filter_map(|(series, value)| value.map(|v| point(series, v)))
    .collect();

    if let Some(aqi) = aqi_point_value(reading.pm2_5_for_aqi) {
        points.push(point(SERIES_AQI, aqi));
    } else if let Some(sample) = reading.pm2_5_for_aqi {
        tracing::warn!(sample, "AQI not computable from sample");
    } else {
        tracing::info!("no AQI sample available");
    }
    points
}
