//! End-to-end pipeline scenarios over an in-memory store and real processes.

#[cfg(all(test, unix))]
mod tests {
    use crate::config::{ExecutorConfig, PipelineConfig};
    use crate::core::{CompletionRecord, FieldValue, PhaseName, TaskRequest};
    use crate::errors::{DownloadError, PipelineError, StorageError};
    use crate::pipeline::Pipeline;
    use crate::reporting::{CollectingReporter, Reporter};
    use crate::stages::{MockTaskRunner, ProcessExecutor};
    use crate::testing::MemoryObjectStore;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    const RUN_SH: &str = "#!/bin/sh\ncat a.txt > out.txt\necho \"$1\" >> out.txt\n";

    fn run_request() -> TaskRequest {
        TaskRequest::from_json(
            r#"{
                "executable": "run.sh",
                "args": ["--x"],
                "options": {"bucket": "b", "prefix": "p"},
                "inputs": [{"name": "a.txt"}],
                "outputs": [{"name": "out.txt"}]
            }"#,
        )
        .unwrap()
    }

    fn seeded_store() -> Arc<MemoryObjectStore> {
        Arc::new(
            MemoryObjectStore::new()
                .with_object("b", "p/run.sh", RUN_SH)
                .with_object("b", "p/a.txt", "alpha\n"),
        )
    }

    fn process_pipeline(
        root: &std::path::Path,
        store: Arc<MemoryObjectStore>,
        config: PipelineConfig,
    ) -> (Pipeline, Arc<CollectingReporter>) {
        let (reporter, collected) = Reporter::collecting();
        let pipeline = Pipeline::new(
            config.with_work_root(root),
            store,
            Arc::new(ProcessExecutor::new(ExecutorConfig::default())),
            Arc::new(reporter),
        );
        (pipeline, collected)
    }

    #[tokio::test]
    async fn test_end_to_end_success() {
        let tmp = tempfile::tempdir().unwrap();
        let store = seeded_store();
        let (pipeline, collected) =
            process_pipeline(tmp.path(), store.clone(), PipelineConfig::default());

        let record = pipeline.run(&run_request()).await.unwrap();

        assert_eq!(store.object("b", "p/out.txt").unwrap(), b"alpha\n--x\n");
        assert_eq!(store.keys("b"), vec!["p/a.txt", "p/out.txt", "p/run.sh"]);
        assert_eq!(record.exit_code, Some(0));
        assert!(record.timeline.is_sequential());

        let download = record.timeline.get(PhaseName::Download).unwrap();
        let execute = record.timeline.get(PhaseName::Execute).unwrap();
        let upload = record.timeline.get(PhaseName::Upload).unwrap();
        let overall = record.timeline.get(PhaseName::Overall).unwrap();
        assert!(download.start_ms <= download.end_ms);
        assert!(download.end_ms <= execute.start_ms);
        assert!(execute.start_ms <= execute.end_ms);
        assert!(execute.end_ms <= upload.start_ms);
        assert!(upload.start_ms <= upload.end_ms);
        assert!(overall.start_ms <= download.start_ms);
        assert!(upload.end_ms <= overall.end_ms);

        let facts = collected.facts_named(CompletionRecord::FACT_NAME);
        assert_eq!(facts.len(), 1);
        let fact = &facts[0];
        assert_eq!(fact.number("download_start"), Some(download.start_ms as f64));
        assert_eq!(fact.number("upload_end"), Some(upload.end_ms as f64));
        assert_eq!(
            fact.fields.get("executable"),
            Some(&FieldValue::Str("run.sh".to_string()))
        );
    }

    #[tokio::test]
    async fn test_missing_input_fails_download_without_executing() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryObjectStore::new().with_object("b", "p/run.sh", RUN_SH));
        let mut runner = MockTaskRunner::new();
        runner.expect_run().never();
        let (reporter, collected) = Reporter::collecting();
        let pipeline = Pipeline::new(
            PipelineConfig::default().with_work_root(tmp.path()),
            store.clone(),
            Arc::new(runner),
            Arc::new(reporter),
        );

        let err = pipeline.run(&run_request()).await.unwrap_err();

        assert_eq!(err.phase(), PhaseName::Download);
        assert!(matches!(
            err,
            PipelineError::Download(DownloadError::Fetch {
                source: StorageError::NotFound { .. },
                ..
            })
        ));
        assert_eq!(store.put_count(), 0);
        assert!(collected.facts().is_empty());
    }

    #[tokio::test]
    async fn test_rerun_uploads_identical_outputs() {
        let tmp = tempfile::tempdir().unwrap();
        let store = seeded_store();
        let (pipeline, _) = process_pipeline(tmp.path(), store.clone(), PipelineConfig::default());

        pipeline.run(&run_request()).await.unwrap();
        let first = store.object("b", "p/out.txt").unwrap();
        pipeline.run(&run_request()).await.unwrap();
        let second = store.object("b", "p/out.txt").unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_concurrent_runs_use_distinct_areas() {
        let tmp = tempfile::tempdir().unwrap();
        let store = seeded_store();
        let (pipeline, collected) = process_pipeline(
            tmp.path(),
            store.clone(),
            PipelineConfig::default().with_cleanup(false),
        );

        let request = run_request();
        let (a, b) = tokio::join!(pipeline.run(&request), pipeline.run(&request));
        a.unwrap();
        b.unwrap();

        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 2);
        assert_eq!(collected.facts().len(), 2);
    }

    #[tokio::test]
    async fn test_nonzero_exit_strict_and_lenient() {
        let script = "#!/bin/sh\necho done > out.txt\nexit 4\n";
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(
            MemoryObjectStore::new()
                .with_object("b", "p/run.sh", script)
                .with_object("b", "p/a.txt", "alpha\n"),
        );

        let (lenient, _) = process_pipeline(tmp.path(), store.clone(), PipelineConfig::default());
        let record = lenient.run(&run_request()).await.unwrap();
        assert_eq!(record.exit_code, Some(4));
        assert_eq!(store.object("b", "p/out.txt").unwrap(), b"done\n");

        let (strict, collected) = process_pipeline(
            tmp.path(),
            Arc::new(
                MemoryObjectStore::new()
                    .with_object("b", "p/run.sh", script)
                    .with_object("b", "p/a.txt", "alpha\n"),
            ),
            PipelineConfig::default().with_fail_on_nonzero_exit(true),
        );
        let err = strict.run(&run_request()).await.unwrap_err();
        assert!(matches!(err, PipelineError::NonZeroExit { code: Some(4), .. }));
        assert!(collected.facts().is_empty());
    }

    #[tokio::test]
    async fn test_stdout_capture_is_uploaded() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(
            MemoryObjectStore::new()
                .with_object("b", "p/say.sh", "#!/bin/sh\necho \"hello $1\"\n"),
        );
        let (pipeline, _) = process_pipeline(tmp.path(), store.clone(), PipelineConfig::default());
        let request = TaskRequest::new("say.sh", "b", "p")
            .with_arg("world")
            .with_stdout("say.log")
            .with_output("say.log");

        pipeline.run(&request).await.unwrap();
        assert_eq!(store.object("b", "p/say.log").unwrap(), b"hello world\n");
    }
}
