//! # Stagehand
//!
//! The worker unit of a distributed workflow platform. One invocation
//! receives a task request, stages its inputs in from object storage, runs
//! the task's executable, stages its outputs back and reports telemetry.
//!
//! Stagehand provides:
//!
//! - **Staged execution**: stage-in, execute and stage-out, strictly in order,
//!   each phase timed
//! - **Fail-fast transfers**: unbounded concurrent downloads and uploads that
//!   report the first failure without cancelling siblings
//! - **Pluggable reporting**: push-gateway, time-series, in-memory or no-op
//!   backends selected once from configuration
//! - **Resource sampling**: a process-lifetime loop forwarding CPU, memory,
//!   network and disk rates to the reporter
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stagehand::prelude::*;
//!
//! let ctx = WorkerContext::initialize(WorkerConfig::from_env()?).await;
//! let _sampler = ctx.start_sampler();
//!
//! let request = TaskRequest::from_json(&raw)?;
//! let record = Pipeline::from_context(&ctx).run(&request).await?;
//! println!("took {} ms", record.duration_ms());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod host;
pub mod observability;
pub mod pipeline;
pub mod reporting;
pub mod sampler;
pub mod stages;
pub mod storage;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{
        LogFormat, MetricsBackendConfig, PipelineConfig, StorageBackendConfig, WorkerConfig,
    };
    pub use crate::context::{IdentityLabelSet, IdentityResolver, WorkerContext};
    pub use crate::core::{
        CompletionRecord, Fact, FieldValue, MetricSample, PhaseName, PhaseRecord, PhaseTimeline,
        ResourceReadings, TaskRequest, WorkingArea,
    };
    pub use crate::errors::{
        DownloadError, MetricsError, PipelineError, RequestError, SpawnError, StagehandError,
        StorageError, UploadError,
    };
    pub use crate::pipeline::Pipeline;
    pub use crate::reporting::Reporter;
    pub use crate::sampler::{ResourceProbe, ResourceSampler, SystemProbe};
    pub use crate::stages::{ExecutionOutcome, LaunchStrategy, ProcessExecutor, TaskRunner};
    pub use crate::storage::{LocalObjectStore, ObjectStore};
    pub use crate::utils::epoch_millis;
}
