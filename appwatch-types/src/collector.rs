//! Collector types and the metric channels each one produces.

use std::fmt;
use std::str::FromStr;

/// The category of a monitored resource.
///
/// The collector type decides which metric fields are meaningful for a
/// resource and is fixed for the resource's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum CollectorType {
    /// A virtual machine (EC2 instance and similar).
    ComputeInstance,
    /// An object-store bucket (S3 and similar).
    ObjectStore,
    /// A serverless function (Lambda and similar).
    ServerlessFunction,
}

impl CollectorType {
    /// All collector types, in declaration order.
    pub const ALL: [CollectorType; 3] = [
        CollectorType::ComputeInstance,
        CollectorType::ObjectStore,
        CollectorType::ServerlessFunction,
    ];

    /// Canonical name, as used in configuration and logs.
    pub const fn as_str(&self) -> &'static str {
        match self {
            CollectorType::ComputeInstance => "compute-instance",
            CollectorType::ObjectStore => "object-store",
            CollectorType::ServerlessFunction => "serverless-function",
        }
    }

    /// The complete key set of a snapshot for this collector type.
    pub const fn keys(&self) -> &'static [Metric] {
        match self {
            CollectorType::ComputeInstance => &[
                Metric::Cpu,
                Metric::Memory,
                Metric::Disk,
                Metric::NetworkIn,
                Metric::NetworkOut,
                Metric::Network,
            ],
            CollectorType::ObjectStore => &[Metric::BucketSizeBytes, Metric::ObjectCount],
            CollectorType::ServerlessFunction => &[
                Metric::Invocations,
                Metric::Errors,
                Metric::Throttles,
                Metric::ConcurrentExecutions,
                Metric::DurationAvg,
                Metric::DurationMax,
            ],
        }
    }

    /// The channels that keep a recent-history buffer for charting.
    ///
    /// Raw network counters of compute instances are only charted through
    /// their combined `network` value.
    pub const fn channels(&self) -> &'static [Metric] {
        match self {
            CollectorType::ComputeInstance => {
                &[Metric::Cpu, Metric::Memory, Metric::Network, Metric::Disk]
            }
            CollectorType::ObjectStore | CollectorType::ServerlessFunction => self.keys(),
        }
    }
}

impl fmt::Display for CollectorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CollectorType {
    type Err = UnknownCollectorType;

    /// Parse a collector type, accepting the canonical names and the short
    /// names used by the backend (`ec2`, `s3`, `lambda`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compute-instance" | "ec2" => Ok(CollectorType::ComputeInstance),
            "object-store" | "s3" => Ok(CollectorType::ObjectStore),
            "serverless-function" | "lambda" => Ok(CollectorType::ServerlessFunction),
            _ => Err(UnknownCollectorType(s.to_string())),
        }
    }
}

/// A collector type string that names none of the known collectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCollectorType(pub String);

impl fmt::Display for UnknownCollectorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown collector type '{}'", self.0)
    }
}

impl std::error::Error for UnknownCollectorType {}

/// A single metric channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum Metric {
    Cpu,
    Memory,
    Disk,
    NetworkIn,
    NetworkOut,
    /// Derived: `networkIn + networkOut`.
    Network,
    BucketSizeBytes,
    ObjectCount,
    Invocations,
    Errors,
    Throttles,
    ConcurrentExecutions,
    DurationAvg,
    DurationMax,
}

impl Metric {
    /// Snapshot key (camelCase).
    pub const fn key(&self) -> &'static str {
        match self {
            Metric::Cpu => "cpu",
            Metric::Memory => "memory",
            Metric::Disk => "disk",
            Metric::NetworkIn => "networkIn",
            Metric::NetworkOut => "networkOut",
            Metric::Network => "network",
            Metric::BucketSizeBytes => "bucketSizeBytes",
            Metric::ObjectCount => "objectCount",
            Metric::Invocations => "invocations",
            Metric::Errors => "errors",
            Metric::Throttles => "throttles",
            Metric::ConcurrentExecutions => "concurrentExecutions",
            Metric::DurationAvg => "durationAvg",
            Metric::DurationMax => "durationMax",
        }
    }

    /// Field name in payloads received from the backend.
    ///
    /// `None` for derived metrics, which are never read off the wire.
    pub const fn wire_name(&self) -> Option<&'static str> {
        match self {
            Metric::Cpu => Some("cpu"),
            Metric::Memory => Some("memory"),
            Metric::Disk => Some("disk"),
            Metric::NetworkIn => Some("network_in"),
            Metric::NetworkOut => Some("network_out"),
            Metric::Network => None,
            Metric::BucketSizeBytes => Some("bucket_size_bytes"),
            Metric::ObjectCount => Some("number_of_objects"),
            Metric::Invocations => Some("invocations"),
            Metric::Errors => Some("errors"),
            Metric::Throttles => Some("throttles"),
            Metric::ConcurrentExecutions => Some("concurrent_executions"),
            Metric::DurationAvg => Some("duration_avg"),
            Metric::DurationMax => Some("duration_max"),
        }
    }

    /// Short human-readable label.
    pub const fn label(&self) -> &'static str {
        match self {
            Metric::Cpu => "CPU %",
            Metric::Memory => "Memory %",
            Metric::Disk => "Disk %",
            Metric::NetworkIn => "Net in",
            Metric::NetworkOut => "Net out",
            Metric::Network => "Network",
            Metric::BucketSizeBytes => "Bucket size",
            Metric::ObjectCount => "Objects",
            Metric::Invocations => "Invocations",
            Metric::Errors => "Errors",
            Metric::Throttles => "Throttles",
            Metric::ConcurrentExecutions => "Concurrent",
            Metric::DurationAvg => "Duration avg ms",
            Metric::DurationMax => "Duration max ms",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_and_short_names() {
        assert_eq!(
            "compute-instance".parse::<CollectorType>(),
            Ok(CollectorType::ComputeInstance)
        );
        assert_eq!("EC2".parse::<CollectorType>(), Ok(CollectorType::ComputeInstance));
        assert_eq!("s3".parse::<CollectorType>(), Ok(CollectorType::ObjectStore));
        assert_eq!(
            " lambda ".parse::<CollectorType>(),
            Ok(CollectorType::ServerlessFunction)
        );
    }

    #[test]
    fn rejects_unknown_collector() {
        let err = "rds".parse::<CollectorType>().unwrap_err();
        assert_eq!(err, UnknownCollectorType("rds".to_string()));
        assert_eq!(err.to_string(), "unknown collector type 'rds'");
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for collector in CollectorType::ALL {
            assert_eq!(collector.to_string().parse::<CollectorType>(), Ok(collector));
        }
    }

    #[test]
    fn charted_channels_are_subset_of_keys() {
        for collector in CollectorType::ALL {
            for channel in collector.channels() {
                assert!(collector.keys().contains(channel));
            }
        }
        assert_eq!(CollectorType::ComputeInstance.channels().len(), 4);
        assert_eq!(CollectorType::ObjectStore.channels().len(), 2);
        assert_eq!(CollectorType::ServerlessFunction.channels().len(), 6);
    }

    #[test]
    fn only_derived_metrics_lack_wire_names() {
        for collector in CollectorType::ALL {
            for metric in collector.keys() {
                assert_eq!(metric.wire_name().is_none(), *metric == Metric::Network);
            }
        }
    }
}
