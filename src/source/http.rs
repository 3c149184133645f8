//! HTTP transport backed by the metrics backend adapter.
//!
//! Each subscription spawns a background task that opens the backend's
//! server-sent event feed and forwards its records as [`FeedEvent`]s. The
//! task ends when the feed ends or when the receiver is dropped.

use appwatch_adapters::backend::BackendAdapter;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::{FeedEvent, FeedReceiver, MetricsTransport, FEED_BUFFER};
use crate::error::TransportError;

/// Transport over the backend's REST and event-stream endpoints.
///
/// # Example
///
/// ```no_run
/// use appwatch::source::HttpTransport;
/// use appwatch_adapters::backend::BackendAdapter;
///
/// let adapter = BackendAdapter::builder()
///     .endpoint("http://localhost:8000")
///     .build()
///     .unwrap();
/// let transport = HttpTransport::new(adapter);
/// ```
#[derive(Debug, Clone)]
pub struct HttpTransport {
    adapter: BackendAdapter,
    description: String,
}

impl HttpTransport {
    pub fn new(adapter: BackendAdapter) -> Self {
        let description = format!("http: {}", adapter.endpoint());
        Self {
            adapter,
            description,
        }
    }
}

#[async_trait]
impl MetricsTransport for HttpTransport {
    async fn latest_metrics(
        &self,
        resource_id: &str,
        token: Option<&str>,
    ) -> Result<Option<Value>, TransportError> {
        Ok(self.adapter.latest_metrics(resource_id, token).await?)
    }

    fn subscribe(&self, resource_id: &str, token: Option<String>) -> FeedReceiver {
        let (tx, rx) = mpsc::channel(FEED_BUFFER);
        let adapter = self.adapter.clone();
        let resource_id = resource_id.to_string();

        tokio::spawn(async move {
            let outcome = tokio::select! {
                outcome = forward(&adapter, &resource_id, token.as_deref(), &tx) => outcome,
                // Subscriber went away: stop reading and drop the connection.
                _ = tx.closed() => return,
            };

            if let Err(err) = outcome {
                debug!(resource_id = %resource_id, error = %err, "metrics feed ended");
                let _ = tx.send(FeedEvent::Error(err)).await;
            }
        });

        rx
    }

    fn description(&self) -> &str {
        &self.description
    }
}

/// Pump one feed into `tx` until it ends. Always ends in an error: a feed
/// that closes cleanly is still a lost connection.
async fn forward(
    adapter: &BackendAdapter,
    resource_id: &str,
    token: Option<&str>,
    tx: &mpsc::Sender<FeedEvent>,
) -> Result<(), TransportError> {
    let mut stream = adapter.subscribe(resource_id, token).await?;
    if tx.send(FeedEvent::Open).await.is_err() {
        return Ok(());
    }

    while let Some(record) = stream.next_record().await {
        let data = record.map_err(|e| TransportError::Feed(e.to_string()))?;
        trace!(resource_id = %resource_id, bytes = data.len(), "metrics record");
        if tx.send(FeedEvent::Message(data)).await.is_err() {
            return Ok(());
        }
    }

    Err(TransportError::Closed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn unreachable() -> HttpTransport {
        let adapter = BackendAdapter::builder()
            .endpoint("http://127.0.0.1:1")
            .timeout(Duration::from_secs(2))
            .connect_timeout(Duration::from_secs(2))
            .build()
            .unwrap();
        HttpTransport::new(adapter)
    }

    #[test]
    fn test_description_names_endpoint() {
        assert_eq!(unreachable().description(), "http: http://127.0.0.1:1");
    }

    #[tokio::test]
    async fn test_unreachable_backend_fails_to_open() {
        let transport = unreachable();
        let mut feed = transport.subscribe("r1", Some("t".to_string()));

        match feed.recv().await {
            Some(FeedEvent::Error(TransportError::Open(_))) => {}
            other => panic!("expected open failure, got {:?}", other),
        }
        assert!(feed.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_backend_latest_metrics_errors() {
        let transport = unreachable();
        assert!(transport.latest_metrics("r1", None).await.is_err());
    }
}
