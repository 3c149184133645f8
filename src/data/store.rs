//! Per-resource metric state shared with the presentation layer.

use appwatch_types::{CollectorType, MetricSnapshot};
use tokio::sync::watch;

use super::history::MetricHistory;

/// Current snapshot plus recent history of one resource.
///
/// Written only by the resource's active session (and the one-off seed);
/// read by any number of observers. Snapshot changes are published on a
/// watch channel so a UI can redraw without polling.
#[derive(Debug)]
pub struct MetricStore {
    resource_id: String,
    history: MetricHistory,
    current: watch::Sender<Option<MetricSnapshot>>,
}

impl MetricStore {
    /// Create an empty store for a resource.
    pub fn new(resource_id: impl Into<String>, collector: CollectorType, capacity: usize) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            resource_id: resource_id.into(),
            history: MetricHistory::new(collector, capacity),
            current,
        }
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    pub fn collector_type(&self) -> CollectorType {
        self.history.collector_type()
    }

    /// Apply a sample received from the stream.
    ///
    /// Replaces the whole current snapshot and appends one point per channel.
    pub fn apply(&self, snapshot: MetricSnapshot, timestamp_ms: u64) {
        if self.history.record(&snapshot, timestamp_ms) {
            self.current.send_replace(Some(snapshot));
        }
    }

    /// Seed from an out-of-band reading.
    ///
    /// Ignored once the stream has delivered anything.
    pub fn seed(&self, snapshot: MetricSnapshot, timestamp_ms: u64) -> bool {
        if !self.history.seed(&snapshot, timestamp_ms) {
            return false;
        }
        self.current.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(snapshot);
                true
            } else {
                false
            }
        });
        true
    }

    /// The most recent snapshot, if any has arrived.
    pub fn current(&self) -> Option<MetricSnapshot> {
        *self.current.borrow()
    }

    /// Receiver notified on every snapshot change.
    pub fn subscribe(&self) -> watch::Receiver<Option<MetricSnapshot>> {
        self.current.subscribe()
    }

    pub fn history(&self) -> &MetricHistory {
        &self.history
    }
}
