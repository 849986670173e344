//! Push error types.

use std::time::Duration;

use thiserror::Error;

use metricpush_labels::LabelError;

/// Result type alias for push setup.
pub type PushResult<T> = Result<T, PushError>;

/// Configuration faults, reported synchronously by [`crate::schedule`].
#[derive(Debug, Error)]
pub enum PushError {
    #[error("interval must be positive and at most one year; got {0:?}")]
    InvalidInterval(Duration),

    #[error("timeout must be positive; got {0:?}")]
    InvalidTimeout(Duration),

    #[error("invalid extra labels: {0}")]
    InvalidExtraLabels(#[from] LabelError),

    #[error("invalid push url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("push targets must be scheduled from within a tokio runtime")]
    NoRuntime,
}

/// A single failed delivery. Logged by the push loop, never returned.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("failed to build request: {0}")]
    Build(#[from] http::Error),

    #[error("request failed: {0}")]
    Request(#[from] hyper_util::client::legacy::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("unexpected status code {0}; expecting 2xx")]
    Status(u16),
}
