//! Time-series points recorded per metric channel.

/// One sample of one metric channel.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimeSeriesPoint {
    /// Unix timestamp in milliseconds when the sample was received.
    pub timestamp_ms: u64,
    pub value: f64,
}

impl TimeSeriesPoint {
    pub const fn new(timestamp_ms: u64, value: f64) -> Self {
        Self {
            timestamp_ms,
            value,
        }
    }
}

/// Current Unix time in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
