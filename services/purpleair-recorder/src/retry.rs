//! Bounded retry over a caller-chosen set of transient faults.

use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Transient fault kinds a call site may choose to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultClass {
    BadGateway,
    GatewayTimeout,
    ServiceUnavailable,
    TooManyRequests,
    InternalServerError,
    Timeout,
}

impl fmt::Display for FaultClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BadGateway => "bad_gateway",
            Self::GatewayTimeout => "gateway_timeout",
            Self::ServiceUnavailable => "service_unavailable",
            Self::TooManyRequests => "too_many_requests",
            Self::InternalServerError => "internal_server_error",
            Self::Timeout => "timeout",
        };
        f.write_str(name)
    }
}

/// Errors that can report which transient fault, if any, they represent.
pub trait Classify {
    fn fault_class(&self) -> Option<FaultClass>;
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
    /// Wall-clock ceiling for the whole sequence; no retry starts past it.
    pub ceiling: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff: Duration::ZERO,
            ceiling: None,
        }
    }
}

impl RetryPolicy {
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_ceiling(mut self, ceiling: Duration) -> Self {
        self.ceiling = Some(ceiling);
        self
    }
}

/// Run `op` until it succeeds, fails with a fault outside `retryable`, or has
/// been retried `policy.max_retries` times.
///
/// `op` receives the zero-based retry count. The counter lives in this call
/// only. When retries are exhausted the last fault is returned as-is.
pub async fn with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    retryable: &[FaultClass],
    mut op: F,
) -> Result<T, E>
where
    E: Classify + fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let started = Instant::now();
    let mut attempt: u32 = 0;
    loop {
        let err = match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        let Some(class) = err.fault_class().filter(|c| retryable.contains(c)) else {
            return Err(err);
        };
        attempt += 1;
        if attempt > policy.max_retries {
            tracing::warn!(fault = %class, max_retries = policy.max_retries, "retries exhausted");
            return Err(err);
        }
        if let Some(ceiling) = policy.ceiling {
            if started.elapsed() + policy.backoff > ceiling {
                tracing::warn!(fault = %class, attempt, ?ceiling, "retry ceiling reached");
                return Err(err);
            }
        }
        tracing::info!(
            fault = %class,
            error = %err,
            attempt,
            max_retries = policy.max_retries,
            "caught transient fault, retrying"
        );
        if !policy.backoff.is_zero() {
            tokio::time::sleep(policy.backoff).await;
        }
    }
}
