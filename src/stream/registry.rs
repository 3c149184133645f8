//! One supervisor per watched resource.
//!
//! The registry is what a UI talks to: opening a resource's detail view
//! calls [`StreamRegistry::open`], closing it calls [`StreamRegistry::close`].
//! Opening a resource that is already watched replaces its stream, so there
//! is never more than one live subscription per resource id.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use appwatch_types::{CollectorType, MetricSnapshot};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;

use crate::data::MetricStore;
use crate::error::StreamError;
use crate::source::{CredentialSource, SharedTransport, StaticToken};

use super::status::{ConnectionStatus, Indicator};
use super::supervisor::{Supervisor, DEFAULT_RETRY_DELAY};

/// Settings applied to every stream the registry opens.
#[derive(Debug, Clone, Copy)]
pub struct StreamOptions {
    pub retry_delay: Duration,
    pub history_capacity: usize,
    /// Seed new streams from the backend's latest reading.
    pub seed: bool,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            retry_delay: DEFAULT_RETRY_DELAY,
            history_capacity: appwatch_types::DEFAULT_HISTORY_CAPACITY,
            seed: true,
        }
    }
}

/// Read-only handle to a watched resource.
///
/// Stays readable after the stream is closed; the data just stops changing.
#[derive(Debug, Clone)]
pub struct ResourceView {
    store: Arc<MetricStore>,
    status: watch::Receiver<ConnectionStatus>,
}

impl ResourceView {
    pub fn resource_id(&self) -> &str {
        self.store.resource_id()
    }

    pub fn collector_type(&self) -> CollectorType {
        self.store.collector_type()
    }

    pub fn store(&self) -> &Arc<MetricStore> {
        &self.store
    }

    pub fn snapshot(&self) -> Option<MetricSnapshot> {
        self.store.current()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    /// Receiver notified on every status change.
    pub fn status_receiver(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    pub fn indicator(&self) -> Indicator {
        self.status().indicator(self.store.current().is_some())
    }
}

/// Tracks the active stream of every watched resource.
pub struct StreamRegistry {
    transport: SharedTransport,
    credentials: Arc<dyn CredentialSource>,
    options: StreamOptions,
    active: Mutex<HashMap<String, Supervisor>>,
}

impl StreamRegistry {
    pub fn new(transport: SharedTransport) -> Self {
        Self {
            transport,
            credentials: Arc::new(StaticToken::none()),
            options: StreamOptions::default(),
            active: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_credentials(mut self, credentials: impl CredentialSource + 'static) -> Self {
        self.credentials = Arc::new(credentials);
        self
    }

    pub fn with_options(mut self, options: StreamOptions) -> Self {
        self.options = options;
        self
    }

    /// Start watching a resource, replacing any stream already open for it.
    ///
    /// The previous stream is stopped before the new one subscribes.
    pub fn open(&self, resource_id: &str, collector: &str) -> Result<ResourceView, StreamError> {
        let collector: CollectorType = collector.parse()?;

        let mut active = self.active.lock();
        if let Some(previous) = active.remove(resource_id) {
            debug!(resource_id = %resource_id, "replacing existing stream");
            previous.stop();
        }

        let supervisor = Supervisor::builder(self.transport.clone())
            .shared_credentials(self.credentials.clone())
            .retry_delay(self.options.retry_delay)
            .history_capacity(self.options.history_capacity)
            .seed(self.options.seed)
            .start_typed(resource_id, collector)?;

        let view = ResourceView {
            store: supervisor.store(),
            status: supervisor.subscribe_status(),
        };
        active.insert(resource_id.to_string(), supervisor);
        Ok(view)
    }

    /// Stop watching a resource. Returns false if it was not watched.
    pub fn close(&self, resource_id: &str) -> bool {
        let removed = self.active.lock().remove(resource_id);
        match removed {
            Some(supervisor) => {
                supervisor.stop();
                true
            }
            None => false,
        }
    }

    /// Stop every stream.
    pub fn close_all(&self) {
        let drained: Vec<Supervisor> = self.active.lock().drain().map(|(_, s)| s).collect();
        for supervisor in drained {
            supervisor.stop();
        }
    }

    /// A view of a watched resource.
    pub fn view(&self, resource_id: &str) -> Option<ResourceView> {
        self.active.lock().get(resource_id).map(|supervisor| ResourceView {
            store: supervisor.store(),
            status: supervisor.subscribe_status(),
        })
    }

    pub fn is_watching(&self, resource_id: &str) -> bool {
        self.active.lock().contains_key(resource_id)
    }

    /// Ids of every watched resource, sorted.
    pub fn resource_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.active.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.active.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.lock().is_empty()
    }
}

impl Drop for StreamRegistry {
    fn drop(&mut self) {
        self.close_all();
    }
}

impl std::fmt::Debug for StreamRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamRegistry")
            .field("transport", &self.transport.description())
            .field("options", &self.options)
            .field("active", &self.resource_ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ChannelTransport;
    use crate::stream::SupervisorState;
    use appwatch_types::Metric;

    fn registry(transport: &ChannelTransport) -> StreamRegistry {
        StreamRegistry::new(Arc::new(transport.clone())).with_options(StreamOptions {
            seed: false,
            ..StreamOptions::default()
        })
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_returns_live_view() {
        let transport = ChannelTransport::new("test");
        let registry = registry(&transport).with_credentials(StaticToken::new("secret"));

        let view = registry.open("r1", "s3").unwrap();
        assert_eq!(view.collector_type(), CollectorType::ObjectStore);
        assert_eq!(view.indicator(), Indicator::Loading);

        let feed = transport.last_feed().unwrap();
        assert_eq!(feed.token(), Some("secret"));
        feed.open();
        feed.message(r#"{"bucket_size_bytes": 5, "number_of_objects": 1}"#);
        view.status_receiver()
            .wait_for(|s| s.state == SupervisorState::Live)
            .await
            .unwrap();
        settle().await;

        assert_eq!(view.indicator(), Indicator::Live);
        assert_eq!(view.snapshot().unwrap().get(Metric::ObjectCount), Some(1.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reopen_supersedes_previous_stream() {
        let transport = ChannelTransport::new("test");
        let registry = registry(&transport);

        let old = registry.open("r1", "s3").unwrap();
        let new = registry.open("r1", "s3").unwrap();
        settle().await;

        assert_eq!(registry.len(), 1);
        assert_eq!(transport.subscription_count(), 2);
        assert_eq!(transport.open_feeds(), 1);
        assert!(transport.feed(0).unwrap().is_closed());
        assert_eq!(old.status().state, SupervisorState::Closed);
        assert_eq!(new.status().state, SupervisorState::Connecting);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resources_are_independent() {
        let transport = ChannelTransport::new("test");
        let registry = registry(&transport);

        let a = registry.open("a", "ec2").unwrap();
        let b = registry.open("b", "lambda").unwrap();
        assert_eq!(registry.resource_ids(), vec!["a".to_string(), "b".to_string()]);

        transport.feed(0).unwrap().fail("down");
        a.status_receiver()
            .wait_for(|s| s.state == SupervisorState::Reconnecting)
            .await
            .unwrap();

        assert_eq!(b.status().state, SupervisorState::Connecting);
        assert!(registry.close("a"));
        assert!(!registry.close("a"));
        assert!(registry.is_watching("b"));
        assert!(!registry.is_watching("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_collector_leaves_existing_stream() {
        let transport = ChannelTransport::new("test");
        let registry = registry(&transport);
        registry.open("r1", "s3").unwrap();

        let result = registry.open("r1", "mainframe");
        assert!(matches!(result, Err(StreamError::InvalidConfiguration(_))));
        assert!(registry.is_watching("r1"));
        assert_eq!(transport.open_feeds(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_all_stops_every_stream() {
        let transport = ChannelTransport::new("test");
        let registry = registry(&transport);
        let view = registry.open("a", "s3").unwrap();
        registry.open("b", "s3").unwrap();

        registry.close_all();
        settle().await;

        assert!(registry.is_empty());
        assert_eq!(transport.open_feeds(), 0);
        assert_eq!(view.indicator(), Indicator::Closed);
        assert!(registry.view("a").is_none());
    }
}
