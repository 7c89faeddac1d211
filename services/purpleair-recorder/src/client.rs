//! HTTP access to the PurpleAir endpoints.

use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use url::Url;

use crate::repair::{RepairError, parse_with_repair};
use crate::retry::{Classify, FaultClass};

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("{url} returned {status}")]
    Status { url: String, status: StatusCode },
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error(transparent)]
    Payload(#[from] RepairError),
    #[error("invalid endpoint url: {0}")]
    Url(#[from] url::ParseError),
}

impl FetchError {
    fn from_reqwest(url: &Url, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { url: redacted(url) }
        } else {
            Self::Transport {
                url: redacted(url),
                source: source.without_url(),
            }
        }
    }
}

impl Classify for FetchError {
    fn fault_class(&self) -> Option<FaultClass> {
        match self {
            Self::Status { status, .. } => match *status {
                StatusCode::BAD_GATEWAY => Some(FaultClass::BadGateway),
                StatusCode::GATEWAY_TIMEOUT => Some(FaultClass::GatewayTimeout),
                StatusCode::SERVICE_UNAVAILABLE => Some(FaultClass::ServiceUnavailable),
                StatusCode::TOO_MANY_REQUESTS => Some(FaultClass::TooManyRequests),
                StatusCode::INTERNAL_SERVER_ERROR => Some(FaultClass::InternalServerError),
                _ => None,
            },
            Self::Timeout { .. } => Some(FaultClass::Timeout),
            Self::Transport { .. } | Self::Payload(_) | Self::Url(_) => None,
        }
    }
}

/// Faults retried on the primary reading endpoints.
pub const PRIMARY_FAULTS: &[FaultClass] = &[
    FaultClass::BadGateway,
    FaultClass::GatewayTimeout,
    FaultClass::Timeout,
];

/// Faults retried on the rate-limited `data.json` endpoint.
pub const RATE_LIMITED_FAULTS: &[FaultClass] = &[
    FaultClass::BadGateway,
    FaultClass::GatewayTimeout,
    FaultClass::Timeout,
    FaultClass::TooManyRequests,
    FaultClass::InternalServerError,
    FaultClass::ServiceUnavailable,
];

#[derive(Clone)]
pub struct SensorClient {
    http: Client,
    legacy_base: String,
    api_base: String,
}

impl SensorClient {
    pub fn new(
        timeout: Duration,
        legacy_base: &str,
        api_base: &str,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: Client::builder().timeout(timeout).build()?,
            legacy_base: legacy_base.trim_end_matches('/').to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    pub fn legacy_show_url(&self, sensor_id: &str) -> Result<Url, url::ParseError> {
        Url::parse_with_params(&format!("{}/json", self.legacy_base), &[("show", sensor_id)])
    }

    pub fn legacy_data_url(&self, sensor_id: &str, key: &str) -> Result<Url, url::ParseError> {
        Url::parse_with_params(
            &format!("{}/data.json", self.legacy_base),
            &[
                ("key", key),
                ("fetch", "true"),
                ("show", sensor_id),
                ("fields", "pm_1"),
            ],
        )
    }

    pub fn sensor_url(&self, sensor_id: &str) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&format!("{}/v1/sensors/", self.api_base))?;
        url.path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .push(sensor_id);
        Ok(url)
    }

    /// One GET round-trip, returning the parsed (and possibly repaired) body.
    pub async fn get_json(&self, url: &Url, api_key: Option<&str>) -> Result<Value, FetchError> {
        let mut request = self.http.get(url.clone());
        if let Some(key) = api_key {
            request = request.header("x-api-key", key);
        }
        tracing::debug!(url = %redacted(url), "GET");
        let response = request
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: redacted(url),
                status,
            });
        }
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        tracing::debug!(%status, bytes = body.len(), "upstream response");
        Ok(parse_with_repair(&body)?)
    }
}

/// URL without its `key` query parameter, for logs and errors.
fn redacted(url: &Url) -> String {
    let mut clean = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "key")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if pairs.is_empty() {
        clean.set_query(None);
    } else {
        clean.query_pairs_mut().clear().extend_pairs(pairs);
    }
    clean.to_string()
}
