//! Error types for the streaming client.

use appwatch_types::UnknownCollectorType;
use thiserror::Error;

/// A payload that could not be turned into a snapshot.
///
/// Decode errors are local: the sample is skipped and the stream carries on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The payload is not valid JSON.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// The payload is valid JSON but not a field mapping.
    #[error("payload is {0}, expected an object")]
    NotAMapping(&'static str),
}

/// Failure talking to the metrics backend.
///
/// Covers both the live feed (open failures, drops) and the one-shot
/// latest-metrics fetch. Never fatal: feeds are retried by the supervisor
/// and a failed fetch just leaves the charts empty until data streams in.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The subscription or request could not be established.
    #[error("failed to open metrics stream: {0}")]
    Open(String),

    /// The backend rejected the credential.
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// The backend ended the feed.
    #[error("metrics stream closed by server")]
    Closed,

    /// The feed broke after it was opened.
    #[error("metrics stream failed: {0}")]
    Feed(String),
}

#[cfg(feature = "http")]
impl From<appwatch_adapters::AdapterError> for TransportError {
    fn from(err: appwatch_adapters::AdapterError) -> Self {
        use appwatch_adapters::AdapterError;

        match err {
            AdapterError::Auth(msg) => TransportError::Auth(msg),
            other => TransportError::Open(other.to_string()),
        }
    }
}

/// Errors returned when starting to watch a resource.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The resource names a collector type this client does not know.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(#[from] UnknownCollectorType),

    /// Streams need a running tokio runtime to spawn onto.
    #[error("no tokio runtime available to run the metrics stream")]
    NoRuntime,
}
