//! Polls a PurpleAir sensor, derives the US EPA AQI from its PM2.5 sample and
//! records the readings as InfluxDB points.
//!
//! A cycle runs leaf-first through these pieces:
//! - [`client`] fetches the upstream document under [`retry`],
//!   with [`repair`] fixing the known malformed `data.json` shape.
//! - [`normalize`] maps the document of the configured [`ApiGeneration`]
//!   onto a [`Reading`].
//! - [`aqi`] converts the AQI sample and [`pipeline`] assembles the points
//!   and hands them to a [`PointSink`].

pub mod aqi;
pub mod client;
pub mod config;
pub mod normalize;
pub mod pipeline;
pub mod repair;
pub mod retry;
pub mod sink;
pub mod types;

pub use aqi::{NOT_COMPUTABLE, aqi_from_pm, aqi_point_value};
pub use client::{FetchError, SensorClient};
pub use config::{Config, ConfigError};
pub use normalize::{ApiGeneration, NormalizeError, normalize, pm_1_sample};
pub use pipeline::{IngestPipeline, Outcome, PipelineError, PipelineSettings, assemble_points};
pub use repair::{RepairError, parse_with_repair};
pub use retry::{Classify, FaultClass, RetryPolicy, with_retry};
pub use sink::{InfluxSink, PointSink, SinkError};
pub use types::{Point, Reading};
