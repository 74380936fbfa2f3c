//! Worker identity and the process-wide context.
//!
//! This module provides:
//! - The identity label set attached to every metric and fact
//! - Container identity resolution over the metadata endpoint
//! - The immutable worker context shared by pipelines and the sampler

mod identity;
mod worker;

pub use identity::{
    parse_labels, IdentityLabelSet, IdentityResolver, CONTAINER_ID_LABEL, SENTINEL_CONTAINER_ID,
    TASK_ID_LABEL,
};
pub use worker::WorkerContext;
