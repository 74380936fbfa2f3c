//! Deterministic resource probe.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::core::ResourceReadings;
use crate::sampler::ResourceProbe;

/// Replays a fixed list of readings, cycling when it runs out.
#[derive(Debug, Clone)]
pub struct ScriptedProbe {
    script: Vec<ResourceReadings>,
    reads: Arc<AtomicUsize>,
}

impl ScriptedProbe {
    /// Creates a probe replaying `script`. An empty script reads zeros.
    #[must_use]
    pub fn new(script: Vec<ResourceReadings>) -> Self {
        Self {
            script,
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Creates a probe that always returns `readings`.
    #[must_use]
    pub fn constant(readings: ResourceReadings) -> Self {
        Self::new(vec![readings])
    }

    /// Shared counter of reads, usable after the probe has been moved.
    #[must_use]
    pub fn read_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.reads)
    }
}

#[async_trait]
impl ResourceProbe for ScriptedProbe {
    async fn read(&mut self) -> ResourceReadings {
        let n = self.reads.fetch_add(1, Ordering::SeqCst);
        if self.script.is_empty() {
            ResourceReadings::default()
        } else {
            self.script[n % self.script.len()]
        }
    }
}
