//! Process-wide worker context.

use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use super::{IdentityLabelSet, IdentityResolver};
use crate::config::WorkerConfig;
use crate::reporting::Reporter;
use crate::sampler::{ResourceSampler, SystemProbe};
use crate::storage::{build_object_store, ObjectStore};

/// Everything a pipeline or the sampler needs, built once at start-up.
///
/// Cloning is cheap; every component is shared and never mutated.
#[derive(Clone)]
pub struct WorkerContext {
    config: Arc<WorkerConfig>,
    labels: Arc<IdentityLabelSet>,
    reporter: Arc<Reporter>,
    store: Arc<dyn ObjectStore>,
}

impl WorkerContext {
    /// Assembles a context from already-built parts.
    #[must_use]
    pub fn new(
        config: WorkerConfig,
        labels: IdentityLabelSet,
        reporter: Reporter,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            labels: Arc::new(labels),
            reporter: Arc::new(reporter),
            store,
        }
    }

    /// Resolves the identity and builds the reporter and object store.
    ///
    /// Never fails: an unusable metrics backend degrades to the no-op
    /// reporter.
    pub async fn initialize(config: WorkerConfig) -> Self {
        let resolver = IdentityResolver::new(config.identity.metadata_uri.clone());
        let labels = Arc::new(
            resolver
                .resolve_labels(config.identity.task_id.clone(), config.identity.labels.clone())
                .await,
        );

        let reporter = Reporter::from_config(&config.metrics, Arc::clone(&labels)).unwrap_or_else(|e| {
            warn!(error = %e, "Metrics backend unavailable, reporting disabled");
            Reporter::NoOp
        });
        let store = build_object_store(&config.storage).await;

        info!(
            container_id = %labels.container_id(),
            task_id = %labels.task_id(),
            backend = reporter.kind(),
            "Worker context initialized"
        );

        Self {
            config: Arc::new(config),
            labels,
            reporter: Arc::new(reporter),
            store,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Returns the identity labels.
    #[must_use]
    pub fn labels(&self) -> &Arc<IdentityLabelSet> {
        &self.labels
    }

    /// Returns the reporter.
    #[must_use]
    pub fn reporter(&self) -> &Arc<Reporter> {
        &self.reporter
    }

    /// Returns the object store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Builds the resource sampler for this context.
    #[must_use]
    pub fn sampler(&self) -> ResourceSampler {
        ResourceSampler::new(
            self.config.sampler.interval,
            Arc::clone(&self.labels),
            Arc::clone(&self.reporter),
        )
    }

    /// Starts the sampler on the host's interface and disk device.
    pub fn start_sampler(&self) -> tokio::task::JoinHandle<()> {
        let probe = SystemProbe::new(
            self.config.sampler.interface.clone(),
            self.config.sampler.disk_device.clone(),
        );
        self.sampler().spawn(probe)
    }
}

impl fmt::Debug for WorkerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerContext")
            .field("labels", &self.labels)
            .field("reporter", &self.reporter.kind())
            .finish_non_exhaustive()
    }
}
