//! Push-gateway backend.
//!
//! Holds a fixed registry of gauges and one histogram, all labelled with the
//! worker identity. Every write updates the registry and pushes the whole
//! snapshot to the gateway with push-add semantics.

use prometheus::{Encoder, Gauge, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use reqwest::header::CONTENT_TYPE;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::check_status;
use crate::context::IdentityLabelSet;
use crate::core::{CompletionRecord, Fact, MetricSample};
use crate::errors::MetricsError;

/// Bucket upper bounds of the task duration histogram, in milliseconds.
pub const TASK_DURATION_BUCKETS_MS: &[f64] = &[
    100.0, 250.0, 500.0, 1_000.0, 2_500.0, 5_000.0, 10_000.0, 30_000.0, 60_000.0, 300_000.0,
    900_000.0, 3_600_000.0,
];

/// Pushes registry snapshots to a push-gateway.
#[derive(Clone)]
pub struct PushGatewayReporter {
    client: reqwest::Client,
    endpoint: String,
    labels: Arc<IdentityLabelSet>,
    registry: Registry,
    cpu_usage: GaugeVec,
    memory_usage: GaugeVec,
    connection_received: GaugeVec,
    connection_transferred: GaugeVec,
    disc_read: GaugeVec,
    disc_write: GaugeVec,
    task_start_time: GaugeVec,
    task_end_time: GaugeVec,
    task_execution_time: GaugeVec,
    task_execution_time_buckets: HistogramVec,
}

impl PushGatewayReporter {
    /// Creates the registry and binds it to `<url>/metrics/job/<job>`.
    pub fn new(
        url: &str,
        job: &str,
        labels: Arc<IdentityLabelSet>,
    ) -> Result<Self, MetricsError> {
        let registry = Registry::new();
        let names = labels.label_names();

        let gauge = |name: &str, help: &str| -> Result<GaugeVec, MetricsError> {
            let vec = GaugeVec::new(Opts::new(name, help), &names)?;
            registry.register(Box::new(vec.clone()))?;
            Ok(vec)
        };

        let cpu_usage = gauge("hyperflow_cpu_usage", "CPU usage")?;
        let memory_usage = gauge("hyperflow_memory_usage", "Memory usage")?;
        let connection_received =
            gauge("hyperflow_connection_received", "Received bytes per second")?;
        let connection_transferred =
            gauge("hyperflow_connection_transferred", "Transferred bytes per second")?;
        let disc_read = gauge("hyperflow_disc_read", "Read kB per second")?;
        let disc_write = gauge("hyperflow_disc_write", "Write kB per second")?;
        let task_start_time = gauge("hyperflow_task_start_time", "Task start timestamp")?;
        let task_end_time = gauge("hyperflow_task_end_time", "Task end timestamp")?;
        let task_execution_time = gauge(
            "hyperflow_task_execution_time",
            "Task execution time in milliseconds",
        )?;

        let task_execution_time_buckets = HistogramVec::new(
            HistogramOpts::new(
                "hyperflow_task_execution_time_buckets",
                "Task execution time in milliseconds",
            )
            .buckets(TASK_DURATION_BUCKETS_MS.to_vec()),
            &names,
        )?;
        registry.register(Box::new(task_execution_time_buckets.clone()))?;

        Ok(Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/metrics/job/{job}", url.trim_end_matches('/')),
            labels,
            registry,
            cpu_usage,
            memory_usage,
            connection_received,
            connection_transferred,
            disc_read,
            disc_write,
            task_start_time,
            task_end_time,
            task_execution_time,
            task_execution_time_buckets,
        })
    }

    /// Returns the push endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Encodes the registry in the text exposition format.
    pub fn encode_text(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| MetricsError::Encoding(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| MetricsError::Encoding(e.to_string()))
    }

    /// Updates the task timing gauges from a completion fact and pushes.
    ///
    /// Facts without `start` and `end` only trigger a push.
    pub async fn write_fact(&self, fact: &Fact) -> Result<(), MetricsError> {
        if let (Some(start), Some(end)) = (fact.number("start"), fact.number("end")) {
            let values = self.labels.label_values();
            let duration = fact.number("duration").unwrap_or(end - start);
            self.task_start_time.get_metric_with_label_values(&values)?.set(start);
            self.task_end_time.get_metric_with_label_values(&values)?.set(end);
            self.task_execution_time.get_metric_with_label_values(&values)?.set(duration);
            self.task_execution_time_buckets
                .get_metric_with_label_values(&values)?
                .observe(duration);
        } else if fact.name != CompletionRecord::FACT_NAME {
            debug!(fact = %fact.name, "Fact has no timing fields, pushing snapshot only");
        }
        self.push().await
    }

    /// Updates the resource gauges from a sample and pushes.
    pub async fn write_sample(&self, sample: &MetricSample) -> Result<(), MetricsError> {
        let values = sample.labels.label_values();
        let set = |vec: &GaugeVec, value: f64| -> Result<(), MetricsError> {
            let gauge: Gauge = vec.get_metric_with_label_values(&values)?;
            gauge.set(value);
            Ok(())
        };
        let r = &sample.readings;
        set(&self.cpu_usage, r.cpu_percent)?;
        set(&self.memory_usage, r.mem_used_kb)?;
        set(&self.connection_received, r.net_rx_rate)?;
        set(&self.connection_transferred, r.net_tx_rate)?;
        set(&self.disc_read, r.disk_read_rate)?;
        set(&self.disc_write, r.disk_write_rate)?;
        self.push().await
    }

    async fn push(&self) -> Result<(), MetricsError> {
        let body = self.encode_text()?;
        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, TextEncoder::new().format_type())
            .body(body)
            .send()
            .await?;
        check_status(response).await?;
        debug!(endpoint = %self.endpoint, "Pushed metrics to gateway");
        Ok(())
    }
}

impl fmt::Debug for PushGatewayReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushGatewayReporter")
            .field("endpoint", &self.endpoint)
            .field("labels", &self.labels)
            .finish_non_exhaustive()
    }
}
