//! Core domain model types for stagehand.
//!
//! This module contains the fundamental types used throughout the worker:
//! - The task request and its file references
//! - Phase names, timing records and the completion record
//! - Facts and resource samples handed to reporters
//! - The per-task working area

mod fact;
mod phase;
mod request;
mod sample;
mod working_area;

pub use fact::{Fact, FieldValue};
pub use phase::{CompletionRecord, PhaseName, PhaseRecord, PhaseTimeline, PhaseTimer};
pub use request::{FileRef, StorageOptions, TaskRequest};
pub use sample::{MetricSample, ResourceReadings};
pub use working_area::{ensure_parent_dir, WorkingArea};
