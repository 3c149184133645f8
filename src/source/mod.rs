//! Transport abstraction for receiving live metric feeds.
//!
//! This module provides a trait-based seam between the streaming core and
//! whatever serves the metrics: the HTTP backend in production, an
//! in-memory channel in tests or when embedding the client.

mod channel;
#[cfg(feature = "http")]
mod http;

pub use channel::{ChannelTransport, FeedSender};
#[cfg(feature = "http")]
pub use http::HttpTransport;

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::TransportError;

/// Buffer size of the per-subscription event channel.
pub const FEED_BUFFER: usize = 16;

/// One event from a resource's push feed.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// The subscription was accepted by the server.
    Open,
    /// One raw record (the text of one event).
    Message(String),
    /// The feed failed or was closed; no further events follow.
    Error(TransportError),
}

/// Receiving end of one subscription.
///
/// Dropping it closes the subscription.
pub type FeedReceiver = mpsc::Receiver<FeedEvent>;

/// Source of live metric feeds and one-shot readings.
///
/// # Example
///
/// ```
/// use appwatch::source::{ChannelTransport, MetricsTransport};
///
/// # tokio_test::block_on(async {
/// let transport = ChannelTransport::new("memory");
/// let mut feed = transport.subscribe("app-1", None);
///
/// transport.last_feed().unwrap().open();
/// assert!(feed.recv().await.is_some());
/// # });
/// ```
#[async_trait]
pub trait MetricsTransport: Send + Sync + Debug {
    /// Fetch the most recent reading of a resource.
    ///
    /// `Ok(None)` means the backend has nothing yet.
    async fn latest_metrics(
        &self,
        resource_id: &str,
        token: Option<&str>,
    ) -> Result<Option<Value>, TransportError>;

    /// Open a push feed for a resource.
    ///
    /// Returns immediately; the outcome arrives as [`FeedEvent`]s. Must be
    /// called from within a tokio runtime.
    fn subscribe(&self, resource_id: &str, token: Option<String>) -> FeedReceiver;

    /// Human-readable description of the transport, for logs and status lines.
    fn description(&self) -> &str;
}

/// Supplies the bearer credential for each (re)connect.
///
/// Resolved immediately before every subscription and seed fetch, so a
/// token refreshed by the login layer is picked up on the next retry.
pub trait CredentialSource: Send + Sync {
    fn current_token(&self) -> Option<String>;
}

impl<F> CredentialSource for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn current_token(&self) -> Option<String> {
        self()
    }
}

/// A credential that never changes.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(pub Option<String>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    /// No credential at all.
    pub fn none() -> Self {
        Self(None)
    }
}

impl CredentialSource for StaticToken {
    fn current_token(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Shared handle to a transport.
pub type SharedTransport = Arc<dyn MetricsTransport>;
