//! Channel-based transport.
//!
//! Serves feeds from in-memory channels instead of the network. Whoever
//! holds the [`ChannelTransport`] plays the server: it sees every
//! subscription request and pushes events into it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use super::{FeedEvent, FeedReceiver, MetricsTransport, FEED_BUFFER};
use crate::error::TransportError;

/// A transport whose feeds are driven by hand.
///
/// Cloning shares the same set of subscriptions.
///
/// # Example
///
/// ```
/// use appwatch::source::{ChannelTransport, MetricsTransport};
///
/// # tokio_test::block_on(async {
/// let transport = ChannelTransport::new("memory");
/// let _feed = transport.subscribe("app-1", Some("token".to_string()));
///
/// let server_side = transport.last_feed().unwrap();
/// assert_eq!(server_side.resource_id(), "app-1");
/// assert!(server_side.message(r#"{"cpu": 12}"#));
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    description: String,
    inner: Arc<Mutex<ChannelInner>>,
}

#[derive(Debug, Default)]
struct ChannelInner {
    feeds: Vec<FeedSender>,
    latest: HashMap<String, Value>,
    latest_error: Option<TransportError>,
}

impl ChannelTransport {
    /// Create a transport with no subscriptions.
    pub fn new(description: &str) -> Self {
        Self {
            description: format!("channel: {}", description),
            inner: Arc::new(Mutex::new(ChannelInner::default())),
        }
    }

    /// Set the reading returned by `latest_metrics` for a resource.
    pub fn set_latest(&self, resource_id: &str, record: Value) {
        self.inner.lock().latest.insert(resource_id.to_string(), record);
    }

    /// Make every `latest_metrics` call fail with `error` (or succeed again
    /// with `None`).
    pub fn fail_latest(&self, error: Option<TransportError>) {
        self.inner.lock().latest_error = error;
    }

    /// Number of subscriptions requested so far.
    pub fn subscription_count(&self) -> usize {
        self.inner.lock().feeds.len()
    }

    /// Server side of the `index`-th subscription.
    pub fn feed(&self, index: usize) -> Option<FeedSender> {
        self.inner.lock().feeds.get(index).cloned()
    }

    /// Server side of the most recent subscription.
    pub fn last_feed(&self) -> Option<FeedSender> {
        self.inner.lock().feeds.last().cloned()
    }

    /// Subscriptions whose receiver is still alive.
    pub fn open_feeds(&self) -> usize {
        self.inner
            .lock()
            .feeds
            .iter()
            .filter(|feed| !feed.is_closed())
            .count()
    }
}

#[async_trait]
impl MetricsTransport for ChannelTransport {
    async fn latest_metrics(
        &self,
        resource_id: &str,
        _token: Option<&str>,
    ) -> Result<Option<Value>, TransportError> {
        let inner = self.inner.lock();
        if let Some(err) = &inner.latest_error {
            return Err(err.clone());
        }
        Ok(inner.latest.get(resource_id).cloned())
    }

    fn subscribe(&self, resource_id: &str, token: Option<String>) -> FeedReceiver {
        let (tx, rx) = mpsc::channel(FEED_BUFFER);
        self.inner.lock().feeds.push(FeedSender {
            resource_id: resource_id.to_string(),
            token,
            tx,
        });
        rx
    }

    fn description(&self) -> &str {
        &self.description
    }
}

/// The server side of one subscription.
#[derive(Debug, Clone)]
pub struct FeedSender {
    resource_id: String,
    token: Option<String>,
    tx: mpsc::Sender<FeedEvent>,
}

impl FeedSender {
    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    /// Credential the subscriber presented.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Confirm the subscription.
    pub fn open(&self) -> bool {
        self.send(FeedEvent::Open)
    }

    /// Push one raw record.
    pub fn message(&self, raw: impl Into<String>) -> bool {
        self.send(FeedEvent::Message(raw.into()))
    }

    /// Fail the feed.
    pub fn fail(&self, reason: &str) -> bool {
        self.send(FeedEvent::Error(TransportError::Feed(reason.to_string())))
    }

    /// Send an arbitrary event. Returns false if the subscriber is gone or
    /// its buffer is full.
    pub fn send(&self, event: FeedEvent) -> bool {
        self.tx.try_send(event).is_ok()
    }

    /// Whether the subscriber has dropped its end.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
