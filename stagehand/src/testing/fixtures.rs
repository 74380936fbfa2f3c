//! Canned requests, labels and readings.

use std::sync::Arc;

use crate::context::IdentityLabelSet;
use crate::core::{MetricSample, ResourceReadings, TaskRequest};

/// The request of the reference scenario: run `run.sh --x` reading `a.txt`
/// and producing `out.txt`, all under `b/p`.
#[must_use]
pub fn sample_request_json() -> String {
    serde_json::json!({
        "executable": "run.sh",
        "args": ["--x"],
        "options": {"bucket": "b", "prefix": "p"},
        "inputs": [{"name": "a.txt"}],
        "outputs": [{"name": "out.txt"}]
    })
    .to_string()
}

/// [`sample_request_json`] as a value.
#[must_use]
pub fn sample_request() -> TaskRequest {
    TaskRequest::new("run.sh", "b", "p")
        .with_arg("--x")
        .with_input("a.txt")
        .with_output("out.txt")
}

/// Identity labels with one static label.
#[must_use]
pub fn test_labels() -> Arc<IdentityLabelSet> {
    Arc::new(IdentityLabelSet::new(
        "container-1",
        "task-1",
        vec![("workflow".to_string(), "montage".to_string())],
    ))
}

/// Non-zero readings with distinct values per metric.
#[must_use]
pub fn sample_readings() -> ResourceReadings {
    ResourceReadings {
        cpu_percent: 12.5,
        mem_used_kb: 2048.0,
        net_rx_rate: 300.0,
        net_tx_rate: 400.0,
        disk_read_rate: 5.0,
        disk_write_rate: 6.0,
    }
}

/// A sample carrying [`sample_readings`] and [`test_labels`].
#[must_use]
pub fn sample_metric(timestamp_ms: i64) -> MetricSample {
    MetricSample::new(timestamp_ms, sample_readings(), test_labels())
}
