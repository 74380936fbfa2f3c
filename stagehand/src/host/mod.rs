//! Process hosts around the pipeline.
//!
//! - [`batch`]: run one request and exit 0 or 1
//! - [`server`]: accept requests over HTTP
//! - [`monitor`]: run only the resource sampler
//! - [`source`]: parse inline or pointer requests

pub mod batch;
pub mod monitor;
pub mod server;
pub mod source;

pub use batch::{exit_code, run_batch, run_batch_with, BatchInput, EXIT_FAILURE, EXIT_SUCCESS};
pub use monitor::run_monitor;
pub use server::{build_router, router, serve, serve_on};
pub use source::{read_request, read_request_file, RequestEnvelope, RequestPointer};

use crate::core::CompletionRecord;

/// Log line written by the batch host after a successful task.
#[must_use]
pub fn exit_summary(record: &CompletionRecord) -> String {
    format!(
        "Task exit: duration {} ms, executable: {}, args: {}",
        record.duration_ms(),
        record.executable,
        record.args.join(",")
    )
}

/// Body of a successful HTTP response.
#[must_use]
pub fn response_summary(record: &CompletionRecord) -> String {
    format!(
        "Task exit: duration {} ms, executable: {} args: {}",
        record.duration_ms(),
        record.executable,
        record.args.join(",")
    )
}
