//! metricpush-scheduler — periodic push of Prometheus text exposition.
//!
//! Each scheduled target owns one background task that renders a
//! snapshot, optionally injects extra labels, and POSTs the result to a
//! collector. Delivery failures are logged and never reach the caller.
//!
//! # Architecture
//!
//! ```text
//! schedule(PushConfig, SnapshotProducer) → PushHandle
//!   └── Per-target background task
//!       ├── tick (interval, missed ticks skipped)
//!       ├── producer.write_snapshot() → reused buffer
//!       ├── metricpush_labels::inject() → reused buffer (if labels set)
//!       └── PushClient::post() → text/plain, bounded by timeout
//! ```
//!
//! Configuration errors (zero interval, malformed labels, bad URL) are
//! returned synchronously from [`schedule`] before any task starts.

pub mod client;
pub mod config;
pub mod error;
pub mod producer;
pub mod scheduler;

pub use client::PushClient;
pub use config::PushConfig;
pub use error::{DeliveryError, PushError, PushResult};
pub use producer::{from_fn, Chain, SnapshotProducer, SnapshotProducerExt};
pub use scheduler::{
    schedule, PushHandle, PushScheduler, PushStatsSnapshot, PushTarget, MAX_INTERVAL,
};

pub use metricpush_labels::ExtraLabels;
