//! Push target configuration.
//!
//! `PushConfig` is plain data; validation happens in
//! [`crate::PushTarget::from_config`] so a config can be embedded in a
//! host application's own settings file and checked at startup.

use std::time::Duration;

use serde::{Deserialize, Deserializer};

/// Where, how often, and with which extra labels to push.
///
/// Deserializes from e.g.:
///
/// ```toml
/// push_url = "http://victoria:8428/api/v1/import/prometheus"
/// interval = "10s"
/// extra_labels = 'job="api",instance="web-1"'
/// timeout = "2s"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PushConfig {
    /// Collector endpoint. Plain `http://` only.
    pub push_url: String,
    /// Time between pushes. Must be non-zero.
    #[serde(deserialize_with = "deserialize_duration")]
    pub interval: Duration,
    /// Comma-separated `name="value"` pairs added to every metric line.
    #[serde(default)]
    pub extra_labels: String,
    /// Per-request timeout. Defaults to `interval`.
    #[serde(default, deserialize_with = "deserialize_opt_duration")]
    pub timeout: Option<Duration>,
}

impl PushConfig {
    pub fn new(push_url: impl Into<String>, interval: Duration) -> Self {
        Self {
            push_url: push_url.into(),
            interval,
            extra_labels: String::new(),
            timeout: None,
        }
    }

    pub fn with_extra_labels(mut self, extra_labels: impl Into<String>) -> Self {
        self.extra_labels = extra_labels.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The timeout applied to each push request.
    pub fn effective_timeout(&self) -> Duration {
        self.timeout.unwrap_or(self.interval)
    }
}

/// Parse a duration string like "5s", "500ms", "1m".
///
/// A bare number is taken as seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.trim()
            .parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Seconds(u64),
    Text(String),
}

impl RawDuration {
    fn into_duration<E: serde::de::Error>(self) -> Result<Duration, E> {
        match self {
            RawDuration::Seconds(secs) => Ok(Duration::from_secs(secs)),
            RawDuration::Text(text) => parse_duration(&text)
                .ok_or_else(|| E::custom(format!("invalid duration {text:?}"))),
        }
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    RawDuration::deserialize(deserializer)?.into_duration()
}

fn deserialize_opt_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<RawDuration>::deserialize(deserializer)?
        .map(RawDuration::into_duration)
        .transpose()
}
