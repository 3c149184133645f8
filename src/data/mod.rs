//! Metric data handling: decoding, history and per-resource state.
//!
//! ## Submodules
//!
//! - [`decode`]: Raw feed payloads to [`MetricSnapshot`](appwatch_types::MetricSnapshot)
//! - [`history`]: Ring buffers per metric channel ([`RingBuffer`], [`MetricHistory`])
//! - [`store`]: Current snapshot plus history of one resource ([`MetricStore`])
//! - [`duration`]: Parsing and formatting of duration strings (e.g., "5s", "500ms")
//!
//! ## Data Flow
//!
//! ```text
//! raw payload (JSON text)
//!        │
//!        ▼
//! decode::decode(collector, raw)
//!        │
//!        ▼
//! MetricStore::apply()
//!        │
//!        ├──▶ current snapshot (watch channel)
//!        │
//!        └──▶ MetricHistory::record() (one point per channel)
//! ```

pub mod decode;
pub mod duration;
pub mod history;
pub mod store;

pub use decode::{decode, decode_value};
pub use history::{MetricHistory, RingBuffer};
pub use store::MetricStore;
