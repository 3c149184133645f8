//! # appwatch-types
//!
//! Core types for application metric streams. This crate defines the
//! shapes shared between the streaming client and the backend adapters:
//! which collector a resource uses, what a complete reading of it looks
//! like, and the points kept for charting.
//!
//! ## Design Goals
//!
//! - **Zero required dependencies**: the types work without any serialization framework
//! - **Optional serialization**: enable the `serde` feature as needed
//! - **Closed schemas**: each collector type has its own snapshot variant, so
//!   a snapshot can never carry keys from another collector
//!
//! ## Example
//!
//! ```rust
//! use appwatch_types::{CollectorType, Metric, MetricSnapshot};
//!
//! let collector: CollectorType = "s3".parse().unwrap();
//! let snapshot = MetricSnapshot::zeroed(collector);
//!
//! assert_eq!(snapshot.collector_type(), CollectorType::ObjectStore);
//! assert_eq!(snapshot.get(Metric::ObjectCount), Some(0.0));
//! ```

mod collector;
mod metrics;
mod resource;
mod series;

pub use collector::*;
pub use metrics::*;
pub use resource::*;
pub use series::*;

/// Number of points retained per charted channel.
pub const DEFAULT_HISTORY_CAPACITY: usize = 20;
