//! Decoding of raw feed payloads into metric snapshots.
//!
//! Decoding is lenient by contract: every canonical field of the collector
//! type is read from the payload, and anything missing, `null` or
//! non-numeric becomes `0`. Only a payload that is not a field mapping at
//! all is rejected.

use appwatch_types::{
    CollectorType, ComputeInstanceMetrics, Metric, MetricSnapshot, ObjectStoreMetrics,
    ServerlessFunctionMetrics,
};
use serde_json::{Map, Value};

use crate::error::DecodeError;

/// Decode a raw payload (one event's text) for the given collector type.
///
/// # Example
///
/// ```
/// use appwatch::data::decode::decode;
/// use appwatch::{CollectorType, Metric};
///
/// let raw = r#"{"bucket_size_bytes": 1024, "number_of_objects": 5}"#;
/// let snapshot = decode(CollectorType::ObjectStore, raw).unwrap();
///
/// assert_eq!(snapshot.get(Metric::BucketSizeBytes), Some(1024.0));
/// assert_eq!(snapshot.get(Metric::ObjectCount), Some(5.0));
/// ```
pub fn decode(collector: CollectorType, raw: &str) -> Result<MetricSnapshot, DecodeError> {
    decode_value(collector, &parse(raw)?)
}

/// Decode an already-parsed payload.
pub fn decode_value(collector: CollectorType, value: &Value) -> Result<MetricSnapshot, DecodeError> {
    let fields = value
        .as_object()
        .ok_or_else(|| DecodeError::NotAMapping(kind(value)))?;

    let snapshot = match collector {
        CollectorType::ComputeInstance => {
            // `network` is derived inside `new`, after the raw counters are read.
            let mut metrics = ComputeInstanceMetrics::new(
                number(fields, Metric::Cpu),
                number(fields, Metric::Memory),
                number(fields, Metric::Disk),
                number(fields, Metric::NetworkIn),
                number(fields, Metric::NetworkOut),
            );
            // Latest-metrics records carry only the combined rate.
            if absent(fields, Metric::NetworkIn) && absent(fields, Metric::NetworkOut) {
                if let Some(network) = finite(fields.get(COMBINED_NETWORK)) {
                    metrics.network = network;
                }
            }
            MetricSnapshot::ComputeInstance(metrics)
        }
        CollectorType::ObjectStore => MetricSnapshot::ObjectStore(ObjectStoreMetrics {
            bucket_size_bytes: count(fields, Metric::BucketSizeBytes),
            object_count: count(fields, Metric::ObjectCount),
        }),
        CollectorType::ServerlessFunction => {
            MetricSnapshot::ServerlessFunction(ServerlessFunctionMetrics {
                invocations: count(fields, Metric::Invocations),
                errors: count(fields, Metric::Errors),
                throttles: count(fields, Metric::Throttles),
                concurrent_executions: count(fields, Metric::ConcurrentExecutions),
                duration_avg: number(fields, Metric::DurationAvg).max(0.0),
                duration_max: number(fields, Metric::DurationMax).max(0.0),
            })
        }
    };

    Ok(snapshot)
}

/// Parse a raw payload once, returning the JSON value for [`decode_value`]
/// and [`collector_error`].
pub fn parse(raw: &str) -> Result<Value, DecodeError> {
    serde_json::from_str(raw.trim()).map_err(|e| DecodeError::Malformed(e.to_string()))
}

/// Error text the backend's collector attached to a payload, if any.
pub fn collector_error(value: &Value) -> Option<&str> {
    match value.get("error")? {
        Value::String(msg) if !msg.is_empty() => Some(msg),
        _ => None,
    }
}

/// Wire name of the pre-combined network rate of compute instances.
const COMBINED_NETWORK: &str = "network";

fn number(fields: &Map<String, Value>, metric: Metric) -> f64 {
    finite(metric.wire_name().and_then(|name| fields.get(name))).unwrap_or(0.0)
}

fn finite(value: Option<&Value>) -> Option<f64> {
    value.and_then(Value::as_f64).filter(|v| v.is_finite())
}

fn absent(fields: &Map<String, Value>, metric: Metric) -> bool {
    metric
        .wire_name()
        .and_then(|name| fields.get(name))
        .map_or(true, Value::is_null)
}

fn count(fields: &Map<String, Value>, metric: Metric) -> u64 {
    let value = number(fields, metric);
    if value <= 0.0 {
        0
    } else {
        value.round() as u64
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
