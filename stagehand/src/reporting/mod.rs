//! Telemetry reporting.
//!
//! A [`Reporter`] is selected once from configuration and shared read-only by
//! the pipeline and the resource sampler. It accepts two things: named facts
//! and resource samples. Backend failures are logged here and never reach
//! the caller.

mod collecting;
pub mod line_protocol;
mod push_gateway;
mod time_series;

pub use collecting::CollectingReporter;
pub use line_protocol::{encode_points, Point};
pub use push_gateway::{PushGatewayReporter, TASK_DURATION_BUCKETS_MS};
pub use time_series::{
    fact_point, sample_points, TimeSeriesReporter, PERFORMANCE_MEASUREMENT, TASK_MEASUREMENT,
};

use std::sync::Arc;
use tracing::warn;

use crate::config::MetricsBackendConfig;
use crate::context::IdentityLabelSet;
use crate::core::{Fact, MetricSample};
use crate::errors::MetricsError;

const MAX_ERROR_BODY: usize = 512;

/// The configured telemetry sink.
#[derive(Debug, Clone, Default)]
pub enum Reporter {
    /// Discards everything.
    #[default]
    NoOp,
    /// Pushes registry snapshots to a push-gateway.
    PushGateway(PushGatewayReporter),
    /// Writes points to a time-series database.
    TimeSeries(TimeSeriesReporter),
    /// Keeps everything in memory.
    Collecting(Arc<CollectingReporter>),
}

impl Reporter {
    /// Builds the backend named by the configuration.
    pub fn from_config(
        config: &MetricsBackendConfig,
        labels: Arc<IdentityLabelSet>,
    ) -> Result<Self, MetricsError> {
        Ok(match config {
            MetricsBackendConfig::None => Self::NoOp,
            MetricsBackendConfig::PushGateway { url, job } => {
                Self::PushGateway(PushGatewayReporter::new(url, job, labels)?)
            }
            MetricsBackendConfig::TimeSeries { url, database } => {
                Self::TimeSeries(TimeSeriesReporter::new(url, database, labels))
            }
        })
    }

    /// Creates an in-memory reporter and returns a handle to its records.
    #[must_use]
    pub fn collecting() -> (Self, Arc<CollectingReporter>) {
        let collector = Arc::new(CollectingReporter::new());
        (Self::Collecting(Arc::clone(&collector)), collector)
    }

    /// Short backend name for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoOp => "noop",
            Self::PushGateway(_) => "pushgateway",
            Self::TimeSeries(_) => "timeseries",
            Self::Collecting(_) => "collecting",
        }
    }

    /// Writes a fact, returning the backend error.
    pub async fn try_write_fact(&self, fact: &Fact) -> Result<(), MetricsError> {
        match self {
            Self::NoOp => Ok(()),
            Self::PushGateway(backend) => backend.write_fact(fact).await,
            Self::TimeSeries(backend) => backend.write_fact(fact).await,
            Self::Collecting(backend) => {
                backend.record_fact(fact);
                Ok(())
            }
        }
    }

    /// Writes a sample, returning the backend error.
    pub async fn try_write_sample(&self, sample: &MetricSample) -> Result<(), MetricsError> {
        match self {
            Self::NoOp => Ok(()),
            Self::PushGateway(backend) => backend.write_sample(sample).await,
            Self::TimeSeries(backend) => backend.write_sample(sample).await,
            Self::Collecting(backend) => {
                backend.record_sample(sample);
                Ok(())
            }
        }
    }

    /// Writes a fact. Failures are logged.
    pub async fn write_fact(&self, fact: &Fact) {
        if let Err(e) = self.try_write_fact(fact).await {
            warn!(backend = self.kind(), fact = %fact.name, error = %e, "Failed to write fact");
        }
    }

    /// Writes a sample. Failures are logged.
    pub async fn write_sample(&self, sample: &MetricSample) {
        if let Err(e) = self.try_write_sample(sample).await {
            warn!(backend = self.kind(), error = %e, "Failed to write resource sample");
        }
    }
}

pub(crate) async fn check_status(response: reqwest::Response) -> Result<(), MetricsError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let cut = (0..=MAX_ERROR_BODY)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        body.truncate(cut);
    }
    Err(MetricsError::Rejected {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ResourceReadings;
    use crate::testing::RecordingEndpoint;

    fn labels() -> Arc<IdentityLabelSet> {
        Arc::new(IdentityLabelSet::new("c1", "t1", vec![]))
    }

    #[test]
    fn test_from_config_selects_backend() {
        let noop = Reporter::from_config(&MetricsBackendConfig::None, labels()).unwrap();
        assert_eq!(noop.kind(), "noop");

        let pushgw = Reporter::from_config(
            &MetricsBackendConfig::PushGateway {
                url: "http://gw:9091".to_string(),
                job: "hyperflow-service".to_string(),
            },
            labels(),
        )
        .unwrap();
        assert_eq!(pushgw.kind(), "pushgateway");

        let influx = Reporter::from_config(
            &MetricsBackendConfig::TimeSeries {
                url: "http://db:8086".to_string(),
                database: "hyperflow_tasks".to_string(),
            },
            labels(),
        )
        .unwrap();
        assert_eq!(influx.kind(), "timeseries");
    }

    #[tokio::test]
    async fn test_noop_accepts_everything() {
        let reporter = Reporter::NoOp;
        reporter.try_write_fact(&Fact::new("x")).await.unwrap();
        reporter
            .try_write_sample(&MetricSample::new(1, ResourceReadings::default(), labels()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_collecting_handle_sees_writes() {
        let (reporter, collector) = Reporter::collecting();
        reporter.write_fact(&Fact::new("task_completed")).await;
        reporter
            .write_sample(&MetricSample::new(1, ResourceReadings::default(), labels()))
            .await;

        assert_eq!(collector.facts_named("task_completed").len(), 1);
        assert_eq!(collector.sample_count(), 1);
    }

    #[tokio::test]
    async fn test_backend_failure_is_absorbed() {
        let endpoint = RecordingEndpoint::start_with_status(503).await.unwrap();
        let reporter = Reporter::TimeSeries(TimeSeriesReporter::new(&endpoint.url(), "db", labels()));

        let fact = Fact::new("task_completed").add_field("duration", 5_i64);
        assert!(reporter.try_write_fact(&fact).await.is_err());
        // the logging form never fails
        reporter.write_fact(&fact).await;
        assert_eq!(endpoint.requests().len(), 2);
    }
}
