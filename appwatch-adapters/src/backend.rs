//! HTTP adapter for the application metrics backend.
//!
//! The backend exposes two endpoints per application:
//!
//! - `GET /metrics/{id}` - the latest collected reading, used to seed charts
//! - `GET /metrics/{id}/realtime` - a server-sent event feed with one JSON
//!   record per event
//!
//! ## Example
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
//!     let mut stream = adapter.subscribe("app-1", Some("token")).await?;
//!     while let Some(record) = stream.next_record().await {
//!         println!("{}", record?);
//!     }
//!
//!     Ok(())
//! }
//! ```

use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;

use crate::sse::SseParser;
use crate::AdapterError;

type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, reqwest::Error>> + Send>>;

/// Adapter for the metrics backend's REST and event-stream endpoints.
#[derive(Debug, Clone)]
pub struct BackendAdapter {
    client: Client,
    stream_client: Client,
    endpoint: String,
    token_in_query: bool,
}

impl BackendAdapter {
    /// Create a new builder for configuring the adapter.
    pub fn builder() -> BackendAdapterBuilder {
        BackendAdapterBuilder::default()
    }

    /// The configured base URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fetch the latest metric record for a resource.
    ///
    /// Returns `Ok(None)` when the backend has not collected anything yet.
    pub async fn latest_metrics(
        &self,
        resource_id: &str,
        token: Option<&str>,
    ) -> Result<Option<Value>, AdapterError> {
        let url = format!("{}/metrics/{}", self.endpoint, urlencoded(resource_id));

        let response = with_bearer(self.client.get(&url), token).send().await?;
        let response = check_status(response, resource_id)?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| AdapterError::Parse(e.to_string()))?;

        Ok(latest_record(body))
    }

    /// Open the server-sent event feed for a resource.
    ///
    /// Resolves once the backend has accepted the subscription.
    pub async fn subscribe(
        &self,
        resource_id: &str,
        token: Option<&str>,
    ) -> Result<MetricStream, AdapterError> {
        let url = format!(
            "{}/metrics/{}/realtime",
            self.endpoint,
            urlencoded(resource_id)
        );

        let mut request = self
            .stream_client
            .get(&url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .header(reqwest::header::CACHE_CONTROL, "no-cache");
        if self.token_in_query {
            if let Some(token) = token {
                request = request.query(&[("token", token)]);
            }
        }

        let response = with_bearer(request, token).send().await?;
        let response = check_status(response, resource_id)?;

        let bytes = response.bytes_stream().map(|chunk| chunk.map(|b| b.to_vec()));

        Ok(MetricStream {
            inner: Box::pin(bytes),
            parser: SseParser::new(),
            pending: VecDeque::new(),
        })
    }
}

/// An open event feed for one resource.
pub struct MetricStream {
    inner: ByteStream,
    parser: SseParser,
    pending: VecDeque<String>,
}

impl MetricStream {
    /// Wait for the next record's raw `data` payload.
    ///
    /// Returns `None` once the server closes the stream.
    pub async fn next_record(&mut self) -> Option<Result<String, AdapterError>> {
        loop {
            if let Some(data) = self.pending.pop_front() {
                return Some(Ok(data));
            }

            match self.inner.next().await? {
                Ok(chunk) => match self.parser.feed(&chunk) {
                    Ok(events) => self.pending.extend(events.into_iter().map(|event| event.data)),
                    Err(e) => return Some(Err(e)),
                },
                Err(e) => return Some(Err(AdapterError::from(e))),
            }
        }
    }
}

impl std::fmt::Debug for MetricStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricStream")
            .field("pending", &self.pending.len())
            .finish()
    }
}

/// Builder for BackendAdapter.
#[derive(Debug, Default)]
pub struct BackendAdapterBuilder {
    endpoint: Option<String>,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    token_in_query: Option<bool>,
}

impl BackendAdapterBuilder {
    /// Set the backend base URL (e.g., "http://localhost:8000").
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the timeout for one-shot requests (default: 10 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the connect timeout for event feeds (default: 5 seconds).
    ///
    /// Feeds have no total timeout; they stay open until either side closes.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Also pass the credential as a `token` query parameter on feeds
    /// (default: true).
    pub fn token_in_query(mut self, enabled: bool) -> Self {
        self.token_in_query = Some(enabled);
        self
    }

    /// Build the adapter.
    pub fn build(self) -> Result<BackendAdapter, AdapterError> {
        let timeout = self.timeout.unwrap_or(Duration::from_secs(10));
        let connect_timeout = self.connect_timeout.unwrap_or(Duration::from_secs(5));

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AdapterError::Http(e.to_string()))?;
        let stream_client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| AdapterError::Http(e.to_string()))?;

        Ok(BackendAdapter {
            client,
            stream_client,
            endpoint: self
                .endpoint
                .unwrap_or_else(|| "http://127.0.0.1:8000".to_string())
                .trim_end_matches('/')
                .to_string(),
            token_in_query: self.token_in_query.unwrap_or(true),
        })
    }
}

fn with_bearer(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

fn check_status(response: Response, resource_id: &str) -> Result<Response, AdapterError> {
    match response.status() {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(AdapterError::Auth("Invalid or expired credential".to_string()))
        }
        StatusCode::NOT_FOUND => Err(AdapterError::NotFound(resource_id.to_string())),
        status if !status.is_success() => {
            Err(AdapterError::Http(format!("API returned status {}", status)))
        }
        _ => Ok(response),
    }
}

/// Pick the metric record out of a latest-metrics response body.
///
/// The backend wraps the record as `{"formatted": {...}}` and answers
/// `{"message": ...}` without a record when nothing was collected yet.
fn latest_record(body: Value) -> Option<Value> {
    let Value::Object(mut map) = body else {
        return None;
    };

    match map.remove("formatted") {
        Some(formatted @ Value::Object(_)) => Some(formatted),
        Some(_) => None,
        None if map.contains_key("message") && map.len() <= 2 => None,
        None => Some(Value::Object(map)),
    }
}

// URL encode a path segment
fn urlencoded(s: &str) -> String {
    s.replace('%', "%25").replace('/', "%2F").replace(' ', "%20")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_defaults() {
        let adapter = BackendAdapter::builder().build().unwrap();
        assert_eq!(adapter.endpoint, "http://127.0.0.1:8000");
        assert!(adapter.token_in_query);
    }

    #[test]
    fn test_builder_custom() {
        let adapter = BackendAdapter::builder()
            .endpoint("http://metrics.local:9000/")
            .timeout(Duration::from_secs(3))
            .token_in_query(false)
            .build()
            .unwrap();

        assert_eq!(adapter.endpoint(), "http://metrics.local:9000");
        assert!(!adapter.token_in_query);
    }

    #[test]
    fn test_urlencoded() {
        assert_eq!(urlencoded("abc-123"), "abc-123");
        assert_eq!(urlencoded("a/b"), "a%2Fb");
        assert_eq!(urlencoded("50% off"), "50%25%20off");
    }

    #[test]
    fn test_latest_record_unwraps_formatted() {
        let body = json!({
            "application_id": "app-1",
            "timestamp": "2024-01-01T00:00:00Z",
            "metrics": {"cpu_utilization": 12.0},
            "formatted": {"cpu": 12.0, "memory": 40.0}
        });
        assert_eq!(latest_record(body), Some(json!({"cpu": 12.0, "memory": 40.0})));
    }

    #[test]
    fn test_latest_record_unavailable() {
        let body = json!({
            "message": "No metrics available yet",
            "application_id": "app-1"
        });
        assert_eq!(latest_record(body), None);
        assert_eq!(latest_record(json!([1, 2])), None);
    }

    #[test]
    fn test_latest_record_accepts_bare_record() {
        let body = json!({"bucket_size_bytes": 1024, "number_of_objects": 5});
        assert_eq!(latest_record(body.clone()), Some(body));
    }
}
