//! Metric snapshots - one complete reading of a resource.

use crate::{CollectorType, Metric};

/// Latest reading of a compute instance.
///
/// Utilisation values are percentages, network values are rates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ComputeInstanceMetrics {
    pub cpu: f64,
    pub memory: f64,
    pub disk: f64,
    pub network_in: f64,
    pub network_out: f64,
    /// `network_in + network_out`, or the backend's combined rate when it
    /// reports neither counter.
    pub network: f64,
}

impl ComputeInstanceMetrics {
    /// Build a reading from raw counters, deriving `network`.
    pub fn new(cpu: f64, memory: f64, disk: f64, network_in: f64, network_out: f64) -> Self {
        Self {
            cpu,
            memory,
            disk,
            network_in,
            network_out,
            network: network_in + network_out,
        }
    }
}

/// Latest reading of an object-store bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ObjectStoreMetrics {
    pub bucket_size_bytes: u64,
    pub object_count: u64,
}

/// Latest reading of a serverless function.
///
/// Durations are in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ServerlessFunctionMetrics {
    pub invocations: u64,
    pub errors: u64,
    pub throttles: u64,
    pub concurrent_executions: u64,
    pub duration_avg: f64,
    pub duration_max: f64,
}

/// One complete reading of a monitored resource.
///
/// The variant is determined by the resource's [`CollectorType`], so the
/// set of keys a snapshot exposes is always exactly the canonical set for
/// that collector.
///
/// # Example
///
/// ```rust
/// use appwatch_types::{ComputeInstanceMetrics, Metric, MetricSnapshot};
///
/// let snapshot = MetricSnapshot::ComputeInstance(ComputeInstanceMetrics::new(
///     45.2, 62.8, 30.0, 100.0, 134.0,
/// ));
///
/// assert_eq!(snapshot.get(Metric::Network), Some(234.0));
/// assert_eq!(snapshot.get(Metric::ObjectCount), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "collectorType", rename_all = "kebab-case"))]
pub enum MetricSnapshot {
    ComputeInstance(ComputeInstanceMetrics),
    ObjectStore(ObjectStoreMetrics),
    ServerlessFunction(ServerlessFunctionMetrics),
}

impl MetricSnapshot {
    /// An all-zero snapshot for the given collector type.
    pub fn zeroed(collector: CollectorType) -> Self {
        match collector {
            CollectorType::ComputeInstance => {
                MetricSnapshot::ComputeInstance(ComputeInstanceMetrics::default())
            }
            CollectorType::ObjectStore => MetricSnapshot::ObjectStore(ObjectStoreMetrics::default()),
            CollectorType::ServerlessFunction => {
                MetricSnapshot::ServerlessFunction(ServerlessFunctionMetrics::default())
            }
        }
    }

    /// The collector type this snapshot belongs to.
    pub fn collector_type(&self) -> CollectorType {
        match self {
            MetricSnapshot::ComputeInstance(_) => CollectorType::ComputeInstance,
            MetricSnapshot::ObjectStore(_) => CollectorType::ObjectStore,
            MetricSnapshot::ServerlessFunction(_) => CollectorType::ServerlessFunction,
        }
    }

    /// Value of a single metric, or `None` if the metric does not belong
    /// to this snapshot's collector type.
    pub fn get(&self, metric: Metric) -> Option<f64> {
        let value = match (self, metric) {
            (MetricSnapshot::ComputeInstance(m), Metric::Cpu) => m.cpu,
            (MetricSnapshot::ComputeInstance(m), Metric::Memory) => m.memory,
            (MetricSnapshot::ComputeInstance(m), Metric::Disk) => m.disk,
            (MetricSnapshot::ComputeInstance(m), Metric::NetworkIn) => m.network_in,
            (MetricSnapshot::ComputeInstance(m), Metric::NetworkOut) => m.network_out,
            (MetricSnapshot::ComputeInstance(m), Metric::Network) => m.network,
            (MetricSnapshot::ObjectStore(m), Metric::BucketSizeBytes) => m.bucket_size_bytes as f64,
            (MetricSnapshot::ObjectStore(m), Metric::ObjectCount) => m.object_count as f64,
            (MetricSnapshot::ServerlessFunction(m), Metric::Invocations) => m.invocations as f64,
            (MetricSnapshot::ServerlessFunction(m), Metric::Errors) => m.errors as f64,
            (MetricSnapshot::ServerlessFunction(m), Metric::Throttles) => m.throttles as f64,
            (MetricSnapshot::ServerlessFunction(m), Metric::ConcurrentExecutions) => {
                m.concurrent_executions as f64
            }
            (MetricSnapshot::ServerlessFunction(m), Metric::DurationAvg) => m.duration_avg,
            (MetricSnapshot::ServerlessFunction(m), Metric::DurationMax) => m.duration_max,
            _ => return None,
        };
        Some(value)
    }

    /// All `(metric, value)` pairs, in canonical key order.
    pub fn values(&self) -> Vec<(Metric, f64)> {
        self.collector_type()
            .keys()
            .iter()
            .filter_map(|&metric| self.get(metric).map(|v| (metric, v)))
            .collect()
    }

    /// The values of the charted channels, in channel order.
    pub fn channel_values(&self) -> Vec<(Metric, f64)> {
        self.collector_type()
            .channels()
            .iter()
            .filter_map(|&metric| self.get(metric).map(|v| (metric, v)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_set_matches_collector() {
        for collector in CollectorType::ALL {
            let snapshot = MetricSnapshot::zeroed(collector);
            let keys: Vec<Metric> = snapshot.values().into_iter().map(|(m, _)| m).collect();
            assert_eq!(keys, collector.keys());
            assert!(snapshot.values().iter().all(|(_, v)| *v == 0.0));
        }
    }

    #[test]
    fn compute_instance_derives_network() {
        let m = ComputeInstanceMetrics::new(45.2, 62.8, 30.0, 100.0, 134.0);
        assert_eq!(m.network, 234.0);
    }

    #[test]
    fn get_rejects_foreign_metrics() {
        let snapshot = MetricSnapshot::ObjectStore(ObjectStoreMetrics {
            bucket_size_bytes: 1024,
            object_count: 5,
        });
        assert_eq!(snapshot.get(Metric::BucketSizeBytes), Some(1024.0));
        assert_eq!(snapshot.get(Metric::Cpu), None);
        assert_eq!(snapshot.channel_values().len(), 2);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serializes_with_camel_case_keys() {
        let snapshot = MetricSnapshot::ObjectStore(ObjectStoreMetrics {
            bucket_size_bytes: 1024,
            object_count: 5,
        });
        let json = serde_json::to_value(snapshot).unwrap();
        assert_eq!(json["collectorType"], "object-store");
        assert_eq!(json["bucketSizeBytes"], 1024);
        assert_eq!(json["objectCount"], 5);
    }
}
