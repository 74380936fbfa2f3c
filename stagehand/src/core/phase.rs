//! Phase names, per-phase timing records and the completion record.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::FieldValue;
use crate::utils::epoch_millis;
use std::collections::BTreeMap;

/// A named, timed segment of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseName {
    /// Stage-in.
    Download,
    /// Running the executable.
    Execute,
    /// Stage-out.
    Upload,
    /// The whole pipeline.
    Overall,
}

impl fmt::Display for PhaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Download => write!(f, "download"),
            Self::Execute => write!(f, "execute"),
            Self::Upload => write!(f, "upload"),
            Self::Overall => write!(f, "overall"),
        }
    }
}

/// Start and end of one phase, in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseRecord {
    /// Which phase.
    pub phase: PhaseName,
    /// Start time.
    pub start_ms: i64,
    /// End time.
    pub end_ms: i64,
}

impl PhaseRecord {
    /// Duration of the phase in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }
}

/// Measures one phase.
#[derive(Debug)]
pub struct PhaseTimer {
    phase: PhaseName,
    start_ms: i64,
}

impl PhaseTimer {
    /// Starts timing a phase.
    #[must_use]
    pub fn start(phase: PhaseName) -> Self {
        Self {
            phase,
            start_ms: epoch_millis(),
        }
    }

    /// Returns the phase being timed.
    #[must_use]
    pub fn phase(&self) -> PhaseName {
        self.phase
    }

    /// Stops the timer and produces the record.
    #[must_use]
    pub fn finish(self) -> PhaseRecord {
        PhaseRecord {
            phase: self.phase,
            start_ms: self.start_ms,
            // the wall clock can step backwards
            end_ms: epoch_millis().max(self.start_ms),
        }
    }
}

/// Append-only list of completed phases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTimeline {
    records: Vec<PhaseRecord>,
}

impl PhaseTimeline {
    /// Creates an empty timeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a completed phase.
    pub fn push(&mut self, record: PhaseRecord) {
        self.records.push(record);
    }

    /// Looks up a phase.
    #[must_use]
    pub fn get(&self, phase: PhaseName) -> Option<&PhaseRecord> {
        self.records.iter().find(|r| r.phase == phase)
    }

    /// All records in completion order.
    #[must_use]
    pub fn records(&self) -> &[PhaseRecord] {
        &self.records
    }

    /// Number of recorded phases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns true if download, execute and upload are non-overlapping and in order.
    #[must_use]
    pub fn is_sequential(&self) -> bool {
        let mut last_end = i64::MIN;
        for phase in [PhaseName::Download, PhaseName::Execute, PhaseName::Upload] {
            let Some(record) = self.get(phase) else {
                continue;
            };
            if record.start_ms < last_end || record.end_ms < record.start_ms {
                return false;
            }
            last_end = record.end_ms;
        }
        true
    }
}

/// Everything reported about a successful pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRecord {
    /// The executable that ran.
    pub executable: String,
    /// Its arguments.
    pub args: Vec<String>,
    /// Raw exit code of the child, when it exited normally.
    pub exit_code: Option<i32>,
    /// Overall start/end plus every phase.
    pub timeline: PhaseTimeline,
}

impl CompletionRecord {
    /// Fact name used when reporting a completed task.
    pub const FACT_NAME: &'static str = "task_completed";

    /// Overall start, falling back to the first phase.
    #[must_use]
    pub fn start_ms(&self) -> i64 {
        self.timeline
            .get(PhaseName::Overall)
            .or_else(|| self.timeline.records().first())
            .map_or(0, |r| r.start_ms)
    }

    /// Overall end, falling back to the last phase.
    #[must_use]
    pub fn end_ms(&self) -> i64 {
        self.timeline
            .get(PhaseName::Overall)
            .or_else(|| self.timeline.records().last())
            .map_or(0, |r| r.end_ms)
    }

    /// Overall duration in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> i64 {
        self.end_ms() - self.start_ms()
    }

    /// Flattens the record into a field bag.
    ///
    /// Phase boundaries become `<phase>_start` / `<phase>_end`.
    #[must_use]
    pub fn to_fields(&self) -> BTreeMap<String, FieldValue> {
        let mut fields = BTreeMap::new();
        for record in self.timeline.records() {
            if record.phase == PhaseName::Overall {
                continue;
            }
            fields.insert(format!("{}_start", record.phase), FieldValue::Int(record.start_ms));
            fields.insert(format!("{}_end", record.phase), FieldValue::Int(record.end_ms));
        }
        fields.insert("start".to_string(), FieldValue::Int(self.start_ms()));
        fields.insert("end".to_string(), FieldValue::Int(self.end_ms()));
        fields.insert("duration".to_string(), FieldValue::Int(self.duration_ms()));
        fields.insert(
            "executable".to_string(),
            FieldValue::Str(self.executable.clone()),
        );
        if let Some(code) = self.exit_code {
            fields.insert("exit_code".to_string(), FieldValue::Int(i64::from(code)));
        }
        fields
    }
}
