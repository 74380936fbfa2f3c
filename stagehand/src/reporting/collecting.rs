//! In-memory reporter.

use parking_lot::RwLock;

use crate::core::{Fact, MetricSample};

/// Records every fact and sample it receives.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    facts: RwLock<Vec<Fact>>,
    samples: RwLock<Vec<MetricSample>>,
}

impl CollectingReporter {
    /// Creates an empty reporter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a fact.
    pub fn record_fact(&self, fact: &Fact) {
        self.facts.write().push(fact.clone());
    }

    /// Records a sample.
    pub fn record_sample(&self, sample: &MetricSample) {
        self.samples.write().push(sample.clone());
    }

    /// Returns all recorded facts.
    #[must_use]
    pub fn facts(&self) -> Vec<Fact> {
        self.facts.read().clone()
    }

    /// Returns the facts with the given name.
    #[must_use]
    pub fn facts_named(&self, name: &str) -> Vec<Fact> {
        self.facts
            .read()
            .iter()
            .filter(|f| f.name == name)
            .cloned()
            .collect()
    }

    /// Returns all recorded samples.
    #[must_use]
    pub fn samples(&self) -> Vec<MetricSample> {
        self.samples.read().clone()
    }

    /// Number of recorded samples.
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.samples.read().len()
    }

    /// Clears everything.
    pub fn clear(&self) {
        self.facts.write().clear();
        self.samples.write().clear();
    }
}
