//! Time-series database backend.
//!
//! Two measurements: `performance` receives resource samples, one write per
//! metric group, and `task` receives named facts tagged with the fact name.

use std::sync::Arc;
use tracing::debug;

use super::check_status;
use super::line_protocol::{encode_points, Point};
use crate::context::IdentityLabelSet;
use crate::core::{Fact, MetricSample};
use crate::errors::MetricsError;

/// Measurement receiving resource samples.
pub const PERFORMANCE_MEASUREMENT: &str = "performance";

/// Measurement receiving facts.
pub const TASK_MEASUREMENT: &str = "task";

/// Writes line-protocol points over HTTP.
#[derive(Debug, Clone)]
pub struct TimeSeriesReporter {
    client: reqwest::Client,
    write_url: String,
    database: String,
    labels: Arc<IdentityLabelSet>,
}

impl TimeSeriesReporter {
    /// Creates a writer for `<url>/write`, posting to `database` with
    /// millisecond precision.
    #[must_use]
    pub fn new(url: &str, database: &str, labels: Arc<IdentityLabelSet>) -> Self {
        Self {
            client: reqwest::Client::new(),
            write_url: format!("{}/write", url.trim_end_matches('/')),
            database: database.to_string(),
            labels,
        }
    }

    /// Returns the write URL, without the query.
    #[must_use]
    pub fn write_url(&self) -> &str {
        &self.write_url
    }

    /// Writes one fact to the task measurement.
    pub async fn write_fact(&self, fact: &Fact) -> Result<(), MetricsError> {
        let point = fact_point(fact, &self.labels);
        if !point.has_fields() {
            debug!(fact = %fact.name, "Skipping fact without fields");
            return Ok(());
        }
        self.write(&[point]).await
    }

    /// Writes one sample, one point per metric group.
    pub async fn write_sample(&self, sample: &MetricSample) -> Result<(), MetricsError> {
        for point in sample_points(sample) {
            self.write(&[point]).await?;
        }
        Ok(())
    }

    async fn write(&self, points: &[Point]) -> Result<(), MetricsError> {
        let response = self
            .client
            .post(&self.write_url)
            .query(&[("db", self.database.as_str()), ("precision", "ms")])
            .body(encode_points(points))
            .send()
            .await?;
        check_status(response).await
    }
}

fn tagged(measurement: &str, timestamp_ms: i64, labels: &IdentityLabelSet) -> Point {
    labels
        .pairs()
        .into_iter()
        .fold(Point::new(measurement, timestamp_ms), |point, (k, v)| point.tag(k, v))
}

/// Builds the task point of a fact.
#[must_use]
pub fn fact_point(fact: &Fact, labels: &IdentityLabelSet) -> Point {
    fact.fields.iter().fold(
        tagged(TASK_MEASUREMENT, fact.timestamp_ms, labels).tag("fact", fact.name.as_str()),
        |point, (key, value)| point.field(key.as_str(), value.clone()),
    )
}

/// Builds the performance points of a sample: cpu, memory, network, disk.
#[must_use]
pub fn sample_points(sample: &MetricSample) -> Vec<Point> {
    let base = || tagged(PERFORMANCE_MEASUREMENT, sample.timestamp_ms, &sample.labels);
    let r = &sample.readings;
    vec![
        base().field("cpu_usage", r.cpu_percent),
        base().field("memory_usage", r.mem_used_kb),
        base()
            .field("connection_received", r.net_rx_rate)
            .field("connection_transferred", r.net_tx_rate),
        base()
            .field("disc_read", r.disk_read_rate)
            .field("disc_write", r.disk_write_rate),
    ]
}
