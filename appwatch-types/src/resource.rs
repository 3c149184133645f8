//! Monitored resources as supplied by the application registry.

use crate::CollectorType;

/// A resource whose metrics are being observed.
///
/// Only `id` and `collector_type` matter to the streaming client; the
/// descriptive fields are carried along for display.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MonitoredResource {
    pub id: String,
    pub collector_type: CollectorType,
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub region: Option<String>,
    /// Instance id, bucket name or function name, depending on the collector.
    #[cfg_attr(feature = "serde", serde(default))]
    pub target: Option<String>,
}

impl MonitoredResource {
    /// Create a resource with no descriptive fields.
    pub fn new(id: impl Into<String>, collector_type: CollectorType) -> Self {
        Self {
            id: id.into(),
            collector_type,
            name: None,
            region: None,
            target: None,
        }
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}
