//! metricpush-labels — extra labels for Prometheus text exposition.
//!
//! Validates a static `name="value",...` label fragment once at setup time
//! and splices it into every metric line of a rendered snapshot.
//!
//! # Architecture
//!
//! ```text
//! ExtraLabels::parse("job=\"api\",zone=\"eu\"")   ← validated once
//!   └── inject(dst, snapshot, &labels)
//!         ├── foo{a="1"} 5   → foo{job="api",zone="eu",a="1"} 5
//!         ├── foo 5          → foo{job="api",zone="eu"} 5
//!         └── # HELP / blank → passed through
//! ```

pub mod error;
pub mod fragment;
pub mod inject;

pub use error::{LabelError, LabelResult};
pub use fragment::ExtraLabels;
pub use inject::{inject, inject_to_vec};
