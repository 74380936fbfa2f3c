//! One-shot host: run a single task and exit.

use std::path::PathBuf;
use tracing::{error, info};

use super::exit_summary;
use super::source::{read_request, read_request_file};
use crate::context::WorkerContext;
use crate::core::CompletionRecord;
use crate::errors::{RequestError, StagehandError};
use crate::pipeline::Pipeline;

/// Where the batch host reads its request from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchInput {
    /// Request text given directly.
    Inline(String),
    /// A file containing the request text.
    File(PathBuf),
}

/// Process exit code for a successful task.
pub const EXIT_SUCCESS: i32 = 0;
/// Process exit code for any failure.
pub const EXIT_FAILURE: i32 = 1;

/// Runs the task described by `input` through a process-backed pipeline.
pub async fn run_batch(
    ctx: &WorkerContext,
    input: BatchInput,
) -> Result<CompletionRecord, StagehandError> {
    run_batch_with(ctx, &Pipeline::from_context(ctx), input).await
}

/// Runs the task described by `input` through `pipeline`.
pub async fn run_batch_with(
    ctx: &WorkerContext,
    pipeline: &Pipeline,
    input: BatchInput,
) -> Result<CompletionRecord, StagehandError> {
    let text = match input {
        BatchInput::Inline(text) => text,
        BatchInput::File(path) => read_request_file(path).await?,
    };
    let request = match read_request(&text, ctx.store().as_ref()).await {
        Ok(request) => request,
        Err(RequestError::Empty) => {
            error!("Received empty request, exiting");
            return Err(RequestError::Empty.into());
        }
        Err(e) => return Err(e.into()),
    };

    let record = pipeline.run(&request).await?;
    info!("{}", exit_summary(&record));
    Ok(record)
}

/// Maps a batch result to the process exit code.
#[must_use]
pub fn exit_code<T>(result: &Result<T, StagehandError>) -> i32 {
    match result {
        Ok(_) => EXIT_SUCCESS,
        Err(_) => EXIT_FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PipelineConfig, WorkerConfig};
    use crate::context::IdentityLabelSet;
    use crate::errors::PipelineError;
    use crate::reporting::Reporter;
    use crate::stages::{ExecutionOutcome, LaunchStrategy, MockTaskRunner};
    use crate::testing::{sample_request_json, MemoryObjectStore};
    use std::sync::Arc;

    fn context(store: Arc<MemoryObjectStore>) -> WorkerContext {
        WorkerContext::new(
            WorkerConfig::default(),
            IdentityLabelSet::new("c", "t", vec![]),
            Reporter::NoOp,
            store,
        )
    }

    fn pipeline(root: &std::path::Path, store: Arc<MemoryObjectStore>, runs: usize) -> Pipeline {
        let mut runner = MockTaskRunner::new();
        runner.expect_run().times(runs).returning(|_, area| {
            std::fs::write(area.path().join("out.txt"), "x").unwrap();
            Ok(ExecutionOutcome {
                strategy: LaunchStrategy::Direct,
                exit_code: Some(0),
                success: true,
                stdout_lines: 0,
                stderr_lines: 0,
            })
        });
        Pipeline::new(
            PipelineConfig::default().with_work_root(root),
            store,
            Arc::new(runner),
            Arc::new(Reporter::NoOp),
        )
    }

    fn seeded() -> Arc<MemoryObjectStore> {
        Arc::new(
            MemoryObjectStore::new()
                .with_object("b", "p/run.sh", "#!/bin/sh\n")
                .with_object("b", "p/a.txt", "a"),
        )
    }

    #[tokio::test]
    async fn test_inline_request_succeeds() {
        let tmp = tempfile::tempdir().unwrap();
        let store = seeded();
        let ctx = context(store.clone());

        let result = run_batch_with(
            &ctx,
            &pipeline(tmp.path(), store.clone(), 1),
            BatchInput::Inline(sample_request_json()),
        )
        .await;

        assert_eq!(exit_code(&result), EXIT_SUCCESS);
        assert_eq!(store.object("b", "p/out.txt").unwrap(), b"x");
    }

    #[tokio::test]
    async fn test_file_request_succeeds() {
        let tmp = tempfile::tempdir().unwrap();
        let request_path = tmp.path().join("request.json");
        std::fs::write(&request_path, sample_request_json()).unwrap();
        let store = seeded();
        let ctx = context(store.clone());

        let result = run_batch_with(
            &ctx,
            &pipeline(tmp.path(), store, 1),
            BatchInput::File(request_path),
        )
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_empty_request_exits_with_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let store = seeded();
        let ctx = context(store.clone());

        let result = run_batch_with(
            &ctx,
            &pipeline(tmp.path(), store, 0),
            BatchInput::Inline(String::new()),
        )
        .await;

        assert_eq!(exit_code(&result), EXIT_FAILURE);
        assert!(matches!(result, Err(StagehandError::Request(RequestError::Empty))));
    }

    #[tokio::test]
    async fn test_pipeline_failure_exits_with_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryObjectStore::new());
        let ctx = context(store.clone());

        let result = run_batch_with(
            &ctx,
            &pipeline(tmp.path(), store, 0),
            BatchInput::Inline(sample_request_json()),
        )
        .await;

        assert_eq!(exit_code(&result), EXIT_FAILURE);
        assert!(matches!(
            result,
            Err(StagehandError::Pipeline(PipelineError::Download(_)))
        ));
    }
}
