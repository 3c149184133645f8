//! # appwatch
//!
//! A real-time metrics client for monitored cloud applications.
//!
//! This crate subscribes to a backend's live metric feed for one resource
//! at a time, normalizes every record into a fixed per-collector schema and
//! keeps a short rolling history of each charted metric. Dropped feeds are
//! retried on a fixed interval without losing the history already drawn.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        StreamRegistry                        │
//! │                 (one Supervisor per resource)                │
//! │  ┌────────────┐    ┌──────────┐    ┌──────────────────────┐  │
//! │  │ Supervisor │───▶│ Session  │───▶│ MetricStore          │  │
//! │  │  (retry)   │    │ (1 feed) │    │  snapshot + history  │  │
//! │  └─────┬──────┘    └────┬─────┘    └──────────┬───────────┘  │
//! │        │                │                     │              │
//! │        ▼                ▼                     ▼              │
//! │  ConnectionStatus  ┌──────────┐         presentation layer   │
//! │   (watch)          │  source  │◀── HttpTransport |           │
//! │                    │ (input)  │    ChannelTransport          │
//! │                    └──────────┘                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`source`]**: Transport abstraction ([`MetricsTransport`] trait) with the
//!   HTTP/event-stream backend and an in-memory channel implementation
//! - **[`data`]**: Payload decoding, ring buffers and the per-resource [`MetricStore`]
//! - **[`stream`]**: Sessions, the reconnection [`Supervisor`] and the [`StreamRegistry`]
//! - **[`config`]**: Layered [`Settings`] for the backend and the streams
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Watch an EC2-style compute instance
//! appwatch --resource i-0abc --collector ec2 --token "$TOKEN"
//!
//! # Against a different backend, retrying every 2 seconds
//! appwatch --resource my-bucket --collector s3 \
//!     --endpoint https://metrics.example.com --retry-delay 2s
//! ```
//!
//! ### As a library
//!
//! ```
//! use std::sync::Arc;
//! use appwatch::{ChannelTransport, Indicator, StreamRegistry};
//!
//! # tokio_test::block_on(async {
//! let transport = ChannelTransport::new("memory");
//! let registry = StreamRegistry::new(Arc::new(transport.clone()));
//!
//! let view = registry.open("app-1", "lambda").unwrap();
//! assert_eq!(view.indicator(), Indicator::Loading);
//!
//! // Closing the detail view
//! registry.close("app-1");
//! assert_eq!(view.indicator(), Indicator::Closed);
//! # });
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod source;
pub mod stream;

// Re-export main types for convenience
pub use appwatch_types::{
    CollectorType, ComputeInstanceMetrics, Metric, MetricSnapshot, MonitoredResource,
    ObjectStoreMetrics, ServerlessFunctionMetrics, TimeSeriesPoint, UnknownCollectorType,
};
pub use config::Settings;
pub use data::{MetricHistory, MetricStore, RingBuffer};
pub use error::{DecodeError, StreamError, TransportError};
#[cfg(feature = "http")]
pub use source::HttpTransport;
pub use source::{ChannelTransport, CredentialSource, MetricsTransport, StaticToken};
pub use stream::{
    ConnectionStatus, Indicator, ResourceView, StreamOptions, StreamRegistry, Supervisor,
    SupervisorState,
};
