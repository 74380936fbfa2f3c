//! Sequences stage-in, execute and stage-out for one task.

use std::fmt;
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};

use crate::config::PipelineConfig;
use crate::context::WorkerContext;
use crate::core::{
    CompletionRecord, Fact, PhaseName, PhaseRecord, PhaseTimeline, PhaseTimer, TaskRequest,
    WorkingArea,
};
use crate::errors::PipelineError;
use crate::reporting::Reporter;
use crate::stages::{ObjectStager, ProcessExecutor, TaskRunner};
use crate::storage::ObjectStore;
use crate::utils::{generate_run_id, millis_to_datetime};

/// State threaded through the phases.
#[derive(Debug, Default)]
struct Progress {
    timeline: PhaseTimeline,
    exit_code: Option<i32>,
}

impl Progress {
    fn record(&mut self, record: PhaseRecord) {
        info!(
            phase = %record.phase,
            duration_ms = record.duration_ms(),
            "Phase complete"
        );
        self.timeline.push(record);
    }
}

/// Runs task requests through the three-phase pipeline.
///
/// Phases never overlap. The first failing phase aborts the run and the
/// remaining phases are skipped. Only a fully successful run is reported
/// to the [`Reporter`].
#[derive(Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    stager: ObjectStager,
    runner: Arc<dyn TaskRunner>,
    reporter: Arc<Reporter>,
}

impl Pipeline {
    /// Creates a pipeline from its collaborators.
    #[must_use]
    pub fn new(
        config: PipelineConfig,
        store: Arc<dyn ObjectStore>,
        runner: Arc<dyn TaskRunner>,
        reporter: Arc<Reporter>,
    ) -> Self {
        Self {
            config,
            stager: ObjectStager::new(store),
            runner,
            reporter,
        }
    }

    /// Creates a pipeline that runs real processes with the context's
    /// store and reporter.
    #[must_use]
    pub fn from_context(ctx: &WorkerContext) -> Self {
        let runner = ProcessExecutor::new(ctx.config().executor.clone());
        Self::new(
            ctx.config().pipeline.clone(),
            Arc::clone(ctx.store()),
            Arc::new(runner),
            Arc::clone(ctx.reporter()),
        )
    }

    /// Returns the pipeline settings.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs one task to a terminal outcome.
    ///
    /// The working area is removed afterwards, on success and on failure,
    /// unless cleanup is disabled.
    pub async fn run(&self, request: &TaskRequest) -> Result<CompletionRecord, PipelineError> {
        let span = info_span!("task", run_id = %generate_run_id(), executable = %request.executable);
        self.run_task(request).instrument(span).await
    }

    async fn run_task(&self, request: &TaskRequest) -> Result<CompletionRecord, PipelineError> {
        let overall = PhaseTimer::start(PhaseName::Overall);
        let area = WorkingArea::create(&self.config.work_root)
            .await
            .map_err(PipelineError::WorkingArea)?;
        info!(
            executable = %request.executable,
            area = %area.path().display(),
            "Starting task"
        );

        let result = self.run_phases(request, &area).await.map(|mut progress| {
            progress.timeline.push(overall.finish());
            CompletionRecord {
                executable: request.executable.clone(),
                args: request.args.clone(),
                exit_code: progress.exit_code,
                timeline: progress.timeline,
            }
        });

        match &result {
            Ok(record) => {
                let fact = Fact::with_fields(CompletionRecord::FACT_NAME, record.to_fields());
                self.reporter.write_fact(&fact).await;
                info!(
                    started_at = ?millis_to_datetime(record.start_ms()),
                    duration_ms = record.duration_ms(),
                    exit_code = ?record.exit_code,
                    "Task completed"
                );
            }
            Err(e) => error!(phase = %e.phase(), error = %e, "Task failed"),
        }

        if self.config.cleanup_working_area {
            area.cleanup().await;
        }
        result
    }

    async fn run_phases(
        &self,
        request: &TaskRequest,
        area: &WorkingArea,
    ) -> Result<Progress, PipelineError> {
        let progress = self.stage_in(request, area, Progress::default()).await?;
        let progress = self.execute(request, area, progress).await?;
        self.stage_out(request, area, progress).await
    }

    async fn stage_in(
        &self,
        request: &TaskRequest,
        area: &WorkingArea,
        mut progress: Progress,
    ) -> Result<Progress, PipelineError> {
        let timer = PhaseTimer::start(PhaseName::Download);
        self.stager
            .stage_in(
                request.bucket(),
                request.prefix(),
                &request.stage_in_names(),
                area,
                Some(request.executable.as_str()),
            )
            .await?;
        progress.record(timer.finish());
        Ok(progress)
    }

    async fn execute(
        &self,
        request: &TaskRequest,
        area: &WorkingArea,
        mut progress: Progress,
    ) -> Result<Progress, PipelineError> {
        let timer = PhaseTimer::start(PhaseName::Execute);
        let outcome = self.runner.run(request, area).await?;
        if !outcome.success {
            if self.config.fail_on_nonzero_exit {
                return Err(PipelineError::NonZeroExit {
                    executable: request.executable.clone(),
                    code: outcome.exit_code,
                });
            }
            warn!(
                executable = %request.executable,
                exit_code = ?outcome.exit_code,
                "Executable exited unsuccessfully, treating phase as complete"
            );
        }
        progress.exit_code = outcome.exit_code;
        progress.record(timer.finish());
        Ok(progress)
    }

    async fn stage_out(
        &self,
        request: &TaskRequest,
        area: &WorkingArea,
        mut progress: Progress,
    ) -> Result<Progress, PipelineError> {
        let timer = PhaseTimer::start(PhaseName::Upload);
        self.stager
            .stage_out(request.bucket(), request.prefix(), &request.output_names(), area)
            .await?;
        progress.record(timer.finish());
        Ok(progress)
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("reporter", &self.reporter.kind())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{SpawnError, UploadError};
    use crate::stages::{ExecutionOutcome, LaunchStrategy, MockTaskRunner};
    use crate::testing::MemoryObjectStore;

    fn outcome(code: i32) -> ExecutionOutcome {
        ExecutionOutcome {
            strategy: LaunchStrategy::Direct,
            exit_code: Some(code),
            success: code == 0,
            stdout_lines: 0,
            stderr_lines: 0,
        }
    }

    fn store() -> Arc<MemoryObjectStore> {
        Arc::new(
            MemoryObjectStore::new()
                .with_object("b", "p/run.sh", "#!/bin/sh\n")
                .with_object("b", "p/a.txt", "alpha"),
        )
    }

    fn request() -> TaskRequest {
        TaskRequest::new("run.sh", "b", "p")
            .with_input("a.txt")
            .with_output("out.txt")
    }

    fn pipeline(
        root: &std::path::Path,
        store: Arc<MemoryObjectStore>,
        runner: MockTaskRunner,
        strict: bool,
    ) -> (Pipeline, Arc<crate::reporting::CollectingReporter>) {
        let (reporter, collected) = Reporter::collecting();
        let config = PipelineConfig::default()
            .with_work_root(root)
            .with_fail_on_nonzero_exit(strict);
        let pipeline = Pipeline::new(config, store, Arc::new(runner), Arc::new(reporter));
        (pipeline, collected)
    }

    #[tokio::test]
    async fn test_nonzero_exit_completes_by_default() {
        let tmp = tempfile::tempdir().unwrap();
        let mut runner = MockTaskRunner::new();
        runner.expect_run().times(1).returning(|_, area| {
            std::fs::write(area.path().join("out.txt"), "partial").unwrap();
            Ok(outcome(3))
        });
        let (pipeline, collected) = pipeline(tmp.path(), store(), runner, false);

        let record = pipeline.run(&request()).await.unwrap();
        assert_eq!(record.exit_code, Some(3));
        assert_eq!(collected.facts_named(CompletionRecord::FACT_NAME).len(), 1);
    }

    #[tokio::test]
    async fn test_strict_mode_fails_execute_phase() {
        let tmp = tempfile::tempdir().unwrap();
        let mut runner = MockTaskRunner::new();
        runner.expect_run().times(1).returning(|_, _| Ok(outcome(3)));
        let store = store();
        let (pipeline, collected) = pipeline(tmp.path(), store.clone(), runner, true);

        let err = pipeline.run(&request()).await.unwrap_err();
        assert!(matches!(err, PipelineError::NonZeroExit { code: Some(3), .. }));
        assert_eq!(err.phase(), PhaseName::Execute);
        assert_eq!(store.put_count(), 0);
        assert!(collected.facts().is_empty());
    }

    #[tokio::test]
    async fn test_spawn_error_skips_upload() {
        let tmp = tempfile::tempdir().unwrap();
        let mut runner = MockTaskRunner::new();
        runner.expect_run().times(1).returning(|_, _| {
            Err(SpawnError::Launch {
                program: "run.sh".to_string(),
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            })
        });
        let store = store();
        let (pipeline, collected) = pipeline(tmp.path(), store.clone(), runner, false);

        let err = pipeline.run(&request()).await.unwrap_err();
        assert_eq!(err.phase(), PhaseName::Execute);
        assert_eq!(store.put_count(), 0);
        assert!(collected.facts().is_empty());
    }

    #[tokio::test]
    async fn test_missing_output_fails_upload_phase() {
        let tmp = tempfile::tempdir().unwrap();
        let mut runner = MockTaskRunner::new();
        runner.expect_run().times(1).returning(|_, _| Ok(outcome(0)));
        let (pipeline, collected) = pipeline(tmp.path(), store(), runner, false);

        let err = pipeline.run(&request()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Upload(UploadError::Read { .. })));
        assert!(collected.facts().is_empty());
    }

    #[tokio::test]
    async fn test_working_area_removed_after_success_and_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let mut writes_output = MockTaskRunner::new();
        writes_output.expect_run().times(1).returning(|_, area| {
            std::fs::write(area.path().join("out.txt"), "x").unwrap();
            Ok(outcome(0))
        });
        let (succeeding, _) = pipeline(tmp.path(), store(), writes_output, false);
        succeeding.run(&request()).await.unwrap();
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);

        let mut writes_nothing = MockTaskRunner::new();
        writes_nothing.expect_run().times(1).returning(|_, _| Ok(outcome(0)));
        let (failing, _) = pipeline(tmp.path(), store(), writes_nothing, false);
        failing.run(&request()).await.unwrap_err();
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_failed_stage_in_leaves_no_area_behind() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryObjectStore::new().with_object("b", "p/run.sh", "#!/bin/sh\n"));
        store.set_delay("p/run.sh", std::time::Duration::from_millis(300));
        let mut runner = MockTaskRunner::new();
        runner.expect_run().never();
        let (pipeline, collected) = pipeline(tmp.path(), store, runner, false);

        let err = pipeline.run(&request()).await.unwrap_err();
        assert_eq!(err.phase(), PhaseName::Download);
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);

        // the detached run.sh download settles after cleanup
        tokio::time::sleep(std::time::Duration::from_millis(700)).await;
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
        assert!(collected.facts().is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_disabled_keeps_area() {
        let tmp = tempfile::tempdir().unwrap();
        let mut runner = MockTaskRunner::new();
        runner.expect_run().returning(|_, area| {
            std::fs::write(area.path().join("out.txt"), "x").unwrap();
            Ok(outcome(0))
        });
        let (reporter, _) = Reporter::collecting();
        let config = PipelineConfig::default()
            .with_work_root(tmp.path())
            .with_cleanup(false);
        let pipeline = Pipeline::new(config, store(), Arc::new(runner), Arc::new(reporter));

        pipeline.run(&request()).await.unwrap();
        let areas: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(areas.len(), 1);
        assert!(areas[0].join("a.txt").is_file());
        assert!(areas[0].join("out.txt").is_file());
    }
}
