//! One subscription to one resource's live feed.
//!
//! A session opens the feed, decodes every record into the resource's
//! [`MetricStore`] and reports when it goes live or dies. It never
//! reconnects itself; that is the supervisor's job.

use std::sync::Arc;

use appwatch_types::current_timestamp_ms;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::data::decode;
use crate::data::MetricStore;
use crate::error::{StreamError, TransportError};
use crate::source::{FeedEvent, FeedReceiver, MetricsTransport};

use super::status::SessionState;

/// Lifecycle notifications sent from a session to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The feed was confirmed open.
    Live { session: u64 },
    /// The feed failed or closed. The session is finished.
    Terminated { session: u64, error: TransportError },
}

/// State shared between the session handle and its dispatcher task.
///
/// The dispatcher holds the lock while it applies an event, and `dispose`
/// takes the same lock, so nothing is applied after `dispose` returns.
#[derive(Debug)]
struct Gate {
    state: SessionState,
    disposed: bool,
}

/// A single live subscription.
///
/// Dropping the session disposes it.
#[derive(Debug)]
pub struct Session {
    id: u64,
    resource_id: String,
    gate: Arc<Mutex<Gate>>,
    task: JoinHandle<()>,
}

impl Session {
    /// Subscribe to the store's resource and start dispatching its feed.
    ///
    /// Lifecycle changes are reported on `events`, tagged with `id`.
    pub fn open(
        id: u64,
        transport: &dyn MetricsTransport,
        token: Option<String>,
        store: Arc<MetricStore>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<Self, StreamError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| StreamError::NoRuntime)?;

        let resource_id = store.resource_id().to_string();
        debug!(
            resource_id = %resource_id,
            session = id,
            transport = transport.description(),
            "opening metrics stream"
        );

        let gate = Arc::new(Mutex::new(Gate {
            state: SessionState::Opening,
            disposed: false,
        }));
        let feed = transport.subscribe(&resource_id, token);

        let dispatcher = Dispatcher {
            id,
            gate: gate.clone(),
            store,
            events,
        };
        let task = runtime.spawn(dispatcher.run(feed));

        Ok(Self {
            id,
            resource_id,
            gate,
            task,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    pub fn state(&self) -> SessionState {
        self.gate.lock().state
    }

    /// Close the subscription.
    ///
    /// Idempotent and safe in any state. No store update or lifecycle event
    /// comes from this session once it returns, even if the network
    /// teardown is still in flight.
    pub fn dispose(&self) {
        {
            let mut gate = self.gate.lock();
            if !gate.disposed {
                gate.disposed = true;
                gate.state = SessionState::Terminated;
                debug!(resource_id = %self.resource_id, session = self.id, "session disposed");
            }
        }
        // Dropping the dispatcher drops the feed receiver, which closes the
        // subscription on the transport side.
        self.task.abort();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.dispose();
    }
}

struct Dispatcher {
    id: u64,
    gate: Arc<Mutex<Gate>>,
    store: Arc<MetricStore>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl Dispatcher {
    async fn run(self, mut feed: FeedReceiver) {
        while let Some(event) = feed.recv().await {
            if !self.handle(event) {
                return;
            }
        }

        // Transport dropped its sender without reporting why.
        self.handle(FeedEvent::Error(TransportError::Closed));
    }

    /// Apply one event. Returns false once the session is finished.
    fn handle(&self, event: FeedEvent) -> bool {
        let mut gate = self.gate.lock();
        if gate.disposed || gate.state == SessionState::Terminated {
            return false;
        }

        let resource_id = self.store.resource_id();
        match event {
            FeedEvent::Open => {
                if gate.state == SessionState::Opening {
                    gate.state = SessionState::Live;
                    info!(resource_id = %resource_id, session = self.id, "metrics stream live");
                    let _ = self.events.send(SessionEvent::Live { session: self.id });
                }
                true
            }
            FeedEvent::Message(raw) => {
                let decoded = decode::parse(&raw).and_then(|value| {
                    let snapshot = decode::decode_value(self.store.collector_type(), &value)?;
                    if let Some(reported) = decode::collector_error(&value) {
                        warn!(resource_id = %resource_id, error = %reported, "collector reported an error");
                    }
                    Ok(snapshot)
                });
                match decoded {
                    Ok(snapshot) => self.store.apply(snapshot, current_timestamp_ms()),
                    Err(e) => {
                        debug!(resource_id = %resource_id, session = self.id, error = %e, "skipping sample");
                    }
                }
                true
            }
            FeedEvent::Error(error) => {
                gate.state = SessionState::Terminated;
                warn!(resource_id = %resource_id, session = self.id, error = %error, "metrics stream lost");
                let _ = self.events.send(SessionEvent::Terminated {
                    session: self.id,
                    error,
                });
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ChannelTransport;
    use appwatch_types::{CollectorType, Metric, MetricSnapshot, ObjectStoreMetrics};
    use std::time::Duration;

    struct Harness {
        transport: ChannelTransport,
        store: Arc<MetricStore>,
        events: mpsc::UnboundedReceiver<SessionEvent>,
        session: Session,
    }

    fn open(collector: CollectorType) -> Harness {
        let transport = ChannelTransport::new("test");
        let store = Arc::new(MetricStore::new("r1", collector, 20));
        let (tx, events) = mpsc::unbounded_channel();
        let session = Session::open(7, &transport, Some("tok".to_string()), store.clone(), tx)
            .expect("inside a runtime");
        Harness {
            transport,
            store,
            events,
            session,
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_subscribes_with_token() {
        let h = open(CollectorType::ObjectStore);
        assert_eq!(h.session.state(), SessionState::Opening);
        assert_eq!(h.session.resource_id(), "r1");

        let feed = h.transport.last_feed().unwrap();
        assert_eq!(feed.resource_id(), "r1");
        assert_eq!(feed.token(), Some("tok"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_confirmation_goes_live() {
        let mut h = open(CollectorType::ObjectStore);
        h.transport.last_feed().unwrap().open();

        assert_eq!(h.events.recv().await, Some(SessionEvent::Live { session: 7 }));
        assert_eq!(h.session.state(), SessionState::Live);
    }

    #[tokio::test(start_paused = true)]
    async fn test_message_updates_snapshot_and_buffers() {
        let h = open(CollectorType::ObjectStore);
        let feed = h.transport.last_feed().unwrap();
        feed.open();
        feed.message(r#"{"bucket_size_bytes": 1024, "number_of_objects": 5}"#);
        settle().await;

        assert_eq!(
            h.store.current(),
            Some(MetricSnapshot::ObjectStore(ObjectStoreMetrics {
                bucket_size_bytes: 1024,
                object_count: 5,
            }))
        );
        assert_eq!(h.store.history().series(Metric::BucketSizeBytes).len(), 1);
        assert_eq!(h.store.history().series(Metric::ObjectCount).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_undecodable_message_is_dropped() {
        let h = open(CollectorType::ObjectStore);
        let feed = h.transport.last_feed().unwrap();
        feed.open();
        feed.message("12");
        feed.message("{not json");
        settle().await;

        assert!(h.store.current().is_none());
        assert_eq!(h.store.history().samples_recorded(), 0);
        // The session survives bad samples
        assert_eq!(h.session.state(), SessionState::Live);

        feed.message(r#"{"number_of_objects": 2}"#);
        settle().await;
        assert_eq!(h.store.history().samples_recorded(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_message_with_collector_error_is_still_applied() {
        let h = open(CollectorType::ObjectStore);
        let feed = h.transport.last_feed().unwrap();
        feed.open();
        feed.message(r#"{"number_of_objects": 3, "error": "AccessDenied"}"#);
        settle().await;

        assert_eq!(h.store.current().unwrap().get(Metric::ObjectCount), Some(3.0));
        assert_eq!(h.session.state(), SessionState::Live);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_error_terminates() {
        let mut h = open(CollectorType::ComputeInstance);
        let feed = h.transport.last_feed().unwrap();
        feed.open();
        feed.fail("connection reset");

        assert_eq!(h.events.recv().await, Some(SessionEvent::Live { session: 7 }));
        assert_eq!(
            h.events.recv().await,
            Some(SessionEvent::Terminated {
                session: 7,
                error: TransportError::Feed("connection reset".to_string()),
            })
        );
        assert_eq!(h.session.state(), SessionState::Terminated);

        // Nothing is applied after termination
        feed.message(r#"{"cpu": 50}"#);
        settle().await;
        assert!(h.store.current().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_before_open_terminates() {
        let mut h = open(CollectorType::ComputeInstance);
        h.transport
            .last_feed()
            .unwrap()
            .send(FeedEvent::Error(TransportError::Open("refused".to_string())));

        let event = h.events.recv().await.unwrap();
        assert!(matches!(event, SessionEvent::Terminated { session: 7, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_stops_callbacks_and_closes_feed() {
        let mut h = open(CollectorType::ObjectStore);
        let feed = h.transport.last_feed().unwrap();
        feed.open();
        assert!(h.events.recv().await.is_some());

        h.session.dispose();
        assert_eq!(h.session.state(), SessionState::Terminated);

        feed.message(r#"{"number_of_objects": 2}"#);
        feed.fail("late");
        settle().await;

        assert!(h.store.current().is_none());
        assert!(h.events.try_recv().is_err());
        assert!(feed.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_is_idempotent() {
        let h = open(CollectorType::ObjectStore);
        h.session.dispose();
        h.session.dispose();
        drop(h.session);
        settle().await;
        assert_eq!(h.transport.open_feeds(), 0);
    }

    #[test]
    fn test_open_requires_runtime() {
        let transport = ChannelTransport::new("test");
        let store = Arc::new(MetricStore::new("r1", CollectorType::ObjectStore, 20));
        let (tx, _rx) = mpsc::unbounded_channel();

        let result = Session::open(1, &transport, None, store, tx);
        assert!(matches!(result, Err(StreamError::NoRuntime)));
        assert_eq!(transport.subscription_count(), 0);
    }
}
