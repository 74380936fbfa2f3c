//! Point-in-time resource measurements.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::context::IdentityLabelSet;

/// Raw readings taken by the sampler during one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceReadings {
    /// CPU utilisation, percent.
    pub cpu_percent: f64,
    /// Memory in use, KiB.
    pub mem_used_kb: f64,
    /// Bytes received per second on the sampled interface.
    pub net_rx_rate: f64,
    /// Bytes transmitted per second on the sampled interface.
    pub net_tx_rate: f64,
    /// KiB read per second on the sampled device.
    pub disk_read_rate: f64,
    /// KiB written per second on the sampled device.
    pub disk_write_rate: f64,
}

/// A tagged measurement bag. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSample {
    /// When the readings were taken, in epoch milliseconds.
    pub timestamp_ms: i64,
    /// The readings.
    pub readings: ResourceReadings,
    /// The identity every sample is tagged with.
    pub labels: Arc<IdentityLabelSet>,
}

impl MetricSample {
    /// Creates a sample.
    #[must_use]
    pub fn new(timestamp_ms: i64, readings: ResourceReadings, labels: Arc<IdentityLabelSet>) -> Self {
        Self {
            timestamp_ms,
            readings,
            labels,
        }
    }
}
