//! # appwatch-adapters
//!
//! Adapters for the backend that collects application metrics.
//!
//! This crate talks to the collaborating HTTP service: it fetches the most
//! recent reading of a resource and opens its live server-sent event feed.
//! Payloads are handed back raw; decoding them into snapshots is the
//! streaming client's job.
//!
//! ## Features
//!
//! - **`http`** - the reqwest-based [`backend::BackendAdapter`]
//! - The [`sse`] framing parser is always available
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use appwatch_adapters::backend::BackendAdapter;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let adapter = BackendAdapter::builder()
//!         .endpoint("http://localhost:8000")
//!         .build()?;
//!
//!     if let Some(record) = adapter.latest_metrics("app-1", Some("token")).await? {
//!         println!("latest: {}", record);
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod sse;

#[cfg(feature = "http")]
pub mod backend;

pub use error::AdapterError;

// Re-export types for convenience
pub use appwatch_types::{CollectorType, MetricSnapshot, MonitoredResource};
