//! Runs the task executable inside its working area.
//!
//! The executor moves through `NotStarted -> Spawned -> (Errored |
//! PhaseComplete)`. The phase completes once the child has exited and its
//! output streams have closed, whatever the exit status. The status is
//! reported in the [`ExecutionOutcome`] so callers can be stricter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::ExecutorConfig;
use crate::core::{TaskRequest, WorkingArea};
use crate::errors::SpawnError;

#[cfg(test)]
use mockall::automock;

/// How an executable is launched, chosen from its file suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchStrategy {
    /// `.js`: run by the script runtime.
    Script,
    /// `.jar`: run by the JVM with `-jar`.
    Jar,
    /// Anything else: executed directly, output lines logged.
    Direct,
}

impl LaunchStrategy {
    /// Picks the strategy for an executable name.
    #[must_use]
    pub fn for_executable(name: &str) -> Self {
        if name.ends_with(".js") {
            Self::Script
        } else if name.ends_with(".jar") {
            Self::Jar
        } else {
            Self::Direct
        }
    }
}

impl fmt::Display for LaunchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Script => write!(f, "script"),
            Self::Jar => write!(f, "jar"),
            Self::Direct => write!(f, "direct"),
        }
    }
}

/// Executor lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    /// Nothing launched yet.
    NotStarted,
    /// The child is running.
    Spawned,
    /// The child could not be launched or awaited.
    Errored,
    /// The child exited and its streams closed.
    PhaseComplete,
}

/// What happened when the executable ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    /// The strategy used.
    pub strategy: LaunchStrategy,
    /// Exit code, `None` when the child was killed by a signal.
    pub exit_code: Option<i32>,
    /// True if the child exited with status zero.
    pub success: bool,
    /// Lines seen on standard output.
    pub stdout_lines: usize,
    /// Lines seen on standard error.
    pub stderr_lines: usize,
}

/// Port for running a task's executable.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TaskRunner: Send + Sync {
    /// Runs `request.executable` inside `area` and waits for it.
    async fn run(
        &self,
        request: &TaskRequest,
        area: &WorkingArea,
    ) -> Result<ExecutionOutcome, SpawnError>;
}

/// Launches executables as child processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor {
    config: ExecutorConfig,
}

impl ProcessExecutor {
    /// Creates an executor using the given runtimes.
    #[must_use]
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    /// Builds the command for `path` under `strategy`.
    #[must_use]
    pub fn command(&self, strategy: LaunchStrategy, path: &Path, args: &[String]) -> Command {
        let mut command = match strategy {
            LaunchStrategy::Script => {
                let mut c = Command::new(&self.config.node_bin);
                c.arg(path);
                c
            }
            LaunchStrategy::Jar => {
                let mut c = Command::new(&self.config.java_bin);
                c.arg("-jar").arg(path);
                c
            }
            LaunchStrategy::Direct => Command::new(path),
        };
        command.args(args);
        command
    }

    fn program(&self, strategy: LaunchStrategy, path: &Path) -> String {
        match strategy {
            LaunchStrategy::Script => self.config.node_bin.clone(),
            LaunchStrategy::Jar => self.config.java_bin.clone(),
            LaunchStrategy::Direct => path.display().to_string(),
        }
    }
}

#[async_trait]
impl TaskRunner for ProcessExecutor {
    async fn run(
        &self,
        request: &TaskRequest,
        area: &WorkingArea,
    ) -> Result<ExecutionOutcome, SpawnError> {
        let executable = request.executable.as_str();
        let path = area
            .resolve(executable)
            .ok_or_else(|| SpawnError::InvalidName(executable.to_string()))?;
        let strategy = LaunchStrategy::for_executable(executable);
        let program = self.program(strategy, &path);

        let capture_path = match request.stdout_capture() {
            Some(name) => {
                let capture_path = area
                    .resolve(name)
                    .ok_or_else(|| SpawnError::InvalidName(name.to_string()))?;
                area.ensure_parent(&capture_path)
                    .await
                    .map_err(|e| capture_err(&capture_path, e))?;
                Some(capture_path)
            }
            None => None,
        };

        let log_lines = strategy == LaunchStrategy::Direct;
        let mut command = self.command(strategy, &path, &request.args);
        command
            .current_dir(area.path())
            .stdin(Stdio::null())
            .stdout(if log_lines || capture_path.is_some() {
                Stdio::piped()
            } else {
                Stdio::inherit()
            })
            .stderr(if log_lines { Stdio::piped() } else { Stdio::inherit() });

        info!(executable, strategy = %strategy, args = ?request.args, "Running executable");
        let mut child = command.spawn().map_err(|source| {
            debug!(state = ?ExecutorState::Errored, executable, "Spawn failed");
            SpawnError::Launch {
                program: program.clone(),
                source,
            }
        })?;
        debug!(state = ?ExecutorState::Spawned, executable, pid = child.id(), "Child started");

        let capture = match capture_path {
            Some(capture_path) => match File::create(&capture_path).await {
                Ok(file) => Some((capture_path, file)),
                Err(e) => {
                    if let Err(kill_err) = child.kill().await {
                        debug!(executable, error = %kill_err, "Failed to kill child");
                    }
                    debug!(state = ?ExecutorState::Errored, executable, "Capture file unavailable");
                    return Err(capture_err(&capture_path, e));
                }
            },
            None => None,
        };

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (status, stdout_lines, stderr_lines) = tokio::join!(
            child.wait(),
            pump(stdout, executable, "stdout", log_lines, capture),
            pump(stderr, executable, "stderr", log_lines, None),
        );

        let status = status.map_err(|source| SpawnError::Wait {
            program: program.clone(),
            source,
        })?;
        let stdout_lines = stdout_lines?;
        let stderr_lines = stderr_lines?;

        let outcome = ExecutionOutcome {
            strategy,
            exit_code: status.code(),
            success: status.success(),
            stdout_lines,
            stderr_lines,
        };
        info!(
            state = ?ExecutorState::PhaseComplete,
            executable,
            exit_code = ?outcome.exit_code,
            success = outcome.success,
            "Executable finished"
        );
        Ok(outcome)
    }
}

/// Drains one output stream until it closes.
///
/// Each chunk up to and including a newline is copied verbatim to the
/// capture file and, when `log_lines` is set, logged as one event.
async fn pump<R>(
    stream: Option<R>,
    executable: &str,
    stream_name: &'static str,
    log_lines: bool,
    capture: Option<(PathBuf, File)>,
) -> Result<usize, SpawnError>
where
    R: AsyncRead + Unpin,
{
    let Some(stream) = stream else {
        return Ok(0);
    };
    let mut capture = capture;
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    let mut lines = 0;
    loop {
        buf.clear();
        let read = match reader.read_until(b'\n', &mut buf).await {
            Ok(read) => read,
            Err(e) => {
                debug!(executable, stream = stream_name, error = %e, "Output stream read failed");
                break;
            }
        };
        if read == 0 {
            break;
        }
        lines += 1;
        if let Some((path, file)) = capture.as_mut() {
            file.write_all(&buf).await.map_err(|e| capture_err(path, e))?;
        }
        if log_lines {
            let text = String::from_utf8_lossy(&buf);
            info!(executable, stream = stream_name, "{}", text.trim_end_matches(['\r', '\n']));
        }
    }
    if let Some((path, mut file)) = capture {
        file.flush().await.map_err(|e| capture_err(&path, e))?;
        file.sync_all().await.map_err(|e| capture_err(&path, e))?;
    }
    Ok(lines)
}

fn capture_err(path: &Path, source: std::io::Error) -> SpawnError {
    SpawnError::Capture {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    async fn area_with_script(name: &str, body: &str) -> (tempfile::TempDir, WorkingArea) {
        let tmp = tempfile::tempdir().unwrap();
        let area = WorkingArea::create(tmp.path()).await.unwrap();
        let path = area.path().join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        (tmp, area)
    }

    fn request(executable: &str) -> TaskRequest {
        TaskRequest::new(executable, "b", "p")
    }

    #[test]
    fn test_strategy_from_suffix() {
        assert_eq!(LaunchStrategy::for_executable("main.js"), LaunchStrategy::Script);
        assert_eq!(LaunchStrategy::for_executable("tool.jar"), LaunchStrategy::Jar);
        assert_eq!(LaunchStrategy::for_executable("run.sh"), LaunchStrategy::Direct);
        assert_eq!(LaunchStrategy::for_executable("mProjectPP"), LaunchStrategy::Direct);
        assert_eq!(LaunchStrategy::for_executable("js"), LaunchStrategy::Direct);
    }

    #[test]
    fn test_command_lines() {
        let executor = ProcessExecutor::new(ExecutorConfig {
            node_bin: "/opt/node".to_string(),
            java_bin: "/opt/java".to_string(),
        });
        let args = vec!["--x".to_string()];
        let path = Path::new("/w/task_abc/tool.jar");

        let jar = executor.command(LaunchStrategy::Jar, path, &args);
        let std_cmd = jar.as_std();
        assert_eq!(std_cmd.get_program(), "/opt/java");
        let jar_args: Vec<_> = std_cmd.get_args().collect();
        assert_eq!(jar_args, vec!["-jar", "/w/task_abc/tool.jar", "--x"]);

        let script = executor.command(LaunchStrategy::Script, Path::new("/w/main.js"), &args);
        assert_eq!(script.as_std().get_program(), "/opt/node");

        let direct = executor.command(LaunchStrategy::Direct, Path::new("/w/run.sh"), &args);
        assert_eq!(direct.as_std().get_program(), "/w/run.sh");
    }

    #[tokio::test]
    async fn test_runs_in_working_area() {
        let (_tmp, area) = area_with_script("run.sh", r#"echo "$1" > out.txt"#).await;
        let outcome = ProcessExecutor::default()
            .run(&request("run.sh").with_arg("--x"), &area)
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.exit_code, Some(0));
        assert_eq!(outcome.strategy, LaunchStrategy::Direct);
        assert_eq!(std::fs::read_to_string(area.path().join("out.txt")).unwrap(), "--x\n");
    }

    #[tokio::test]
    async fn test_nonzero_exit_still_completes() {
        let (_tmp, area) = area_with_script("fail.sh", "echo oops >&2\nexit 3").await;
        let outcome = ProcessExecutor::default()
            .run(&request("fail.sh"), &area)
            .await
            .unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.exit_code, Some(3));
        assert_eq!(outcome.stderr_lines, 1);
    }

    #[tokio::test]
    async fn test_stdout_capture_truncates_and_tees() {
        let (_tmp, area) = area_with_script("run.sh", "echo hello\necho world").await;
        std::fs::write(area.path().join("stdout.log"), "stale content that is longer").unwrap();

        let outcome = ProcessExecutor::default()
            .run(&request("run.sh").with_stdout("stdout.log"), &area)
            .await
            .unwrap();

        assert_eq!(outcome.stdout_lines, 2);
        assert_eq!(
            std::fs::read_to_string(area.path().join("stdout.log")).unwrap(),
            "hello\nworld\n"
        );
    }

    #[tokio::test]
    async fn test_nested_capture_name_gets_its_directory() {
        let (_tmp, area) = area_with_script("run.sh", "echo nested").await;

        let outcome = ProcessExecutor::default()
            .run(&request("run.sh").with_stdout("logs/stdout.txt"), &area)
            .await
            .unwrap();

        assert_eq!(outcome.stdout_lines, 1);
        assert_eq!(
            std::fs::read_to_string(area.path().join("logs/stdout.txt")).unwrap(),
            "nested\n"
        );
    }

    #[tokio::test]
    async fn test_spawn_failure_leaves_no_capture_file() {
        let tmp = tempfile::tempdir().unwrap();
        let area = WorkingArea::create(tmp.path()).await.unwrap();

        let err = ProcessExecutor::default()
            .run(&request("absent.sh").with_stdout("stdout.log"), &area)
            .await
            .unwrap_err();
        assert!(matches!(err, SpawnError::Launch { .. }));
        assert!(!area.path().join("stdout.log").exists());
    }

    #[tokio::test]
    async fn test_missing_executable_is_spawn_error() {
        let tmp = tempfile::tempdir().unwrap();
        let area = WorkingArea::create(tmp.path()).await.unwrap();
        let err = ProcessExecutor::default()
            .run(&request("absent.sh"), &area)
            .await
            .unwrap_err();
        assert!(matches!(err, SpawnError::Launch { .. }));
    }

    #[tokio::test]
    async fn test_non_executable_file_is_spawn_error() {
        let (_tmp, area) = area_with_script("run.sh", "exit 0").await;
        let path = area.path().join("run.sh");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let err = ProcessExecutor::default()
            .run(&request("run.sh"), &area)
            .await
            .unwrap_err();
        assert!(matches!(err, SpawnError::Launch { .. }));
    }

    #[tokio::test]
    async fn test_script_strategy_uses_configured_runtime() {
        let (_tmp, area) = area_with_script("fake-node", r#"echo "$@" > argv.txt"#).await;
        std::fs::write(area.path().join("main.js"), "console.log('hi')").unwrap();
        let node = area.path().join("fake-node").display().to_string();

        let executor = ProcessExecutor::new(ExecutorConfig {
            node_bin: node,
            java_bin: "java".to_string(),
        });
        let outcome = executor
            .run(&request("main.js").with_arg("7"), &area)
            .await
            .unwrap();

        assert_eq!(outcome.strategy, LaunchStrategy::Script);
        let argv = std::fs::read_to_string(area.path().join("argv.txt")).unwrap();
        assert!(argv.trim_end().ends_with("main.js 7"));
    }

    #[tokio::test]
    async fn test_escaping_names_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let area = WorkingArea::create(tmp.path()).await.unwrap();
        let err = ProcessExecutor::default()
            .run(&request("../bin/sh"), &area)
            .await
            .unwrap_err();
        assert!(matches!(err, SpawnError::InvalidName(_)));
    }
}
