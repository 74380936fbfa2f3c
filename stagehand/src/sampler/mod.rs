//! Periodic resource sampling.
//!
//! The sampler is started once per process and runs until the process
//! exits. It shares only the reporter and the identity labels with task
//! pipelines, both read-only.

mod probe;

pub use probe::{parse_diskstats, ResourceProbe, SystemProbe};

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::context::IdentityLabelSet;
use crate::core::MetricSample;
use crate::reporting::Reporter;
use crate::utils::epoch_millis;

/// Forwards one [`MetricSample`] to the reporter per interval tick.
#[derive(Debug, Clone)]
pub struct ResourceSampler {
    interval: Duration,
    labels: Arc<IdentityLabelSet>,
    reporter: Arc<Reporter>,
}

impl ResourceSampler {
    /// Creates a sampler.
    #[must_use]
    pub fn new(interval: Duration, labels: Arc<IdentityLabelSet>, reporter: Arc<Reporter>) -> Self {
        Self {
            interval,
            labels,
            reporter,
        }
    }

    /// Returns the tick interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Starts the sampling loop on the runtime.
    ///
    /// The first tick fires immediately. The returned handle is only needed
    /// to stop the loop early.
    pub fn spawn<P>(self, mut probe: P) -> JoinHandle<()>
    where
        P: ResourceProbe + 'static,
    {
        info!(
            interval_ms = u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX),
            backend = self.reporter.kind(),
            "Starting resource sampler"
        );
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let sample = self.sample_once(&mut probe).await;
                debug!(cpu = sample.readings.cpu_percent, "Collected resource sample");
                self.reporter.write_sample(&sample).await;
            }
        })
    }

    /// Takes one reading and tags it.
    pub async fn sample_once<P: ResourceProbe + ?Sized>(&self, probe: &mut P) -> MetricSample {
        let readings = probe.read().await;
        MetricSample::new(epoch_millis(), readings, Arc::clone(&self.labels))
    }
}
