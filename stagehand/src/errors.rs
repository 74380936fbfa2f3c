//! Error types for the stagehand worker.
//!
//! Each failure domain has its own enum. Stage and execute failures are
//! surfaced to the host; metrics and identity failures are always absorbed
//! where they happen and only ever logged.

use std::path::PathBuf;
use thiserror::Error;

use crate::core::PhaseName;

/// The main error type for stagehand operations.
#[derive(Debug, Error)]
pub enum StagehandError {
    /// The pipeline failed in one of its phases.
    #[error("{0}")]
    Pipeline(#[from] PipelineError),

    /// The task request could not be obtained or parsed.
    #[error("{0}")]
    Request(#[from] RequestError),

    /// The environment configuration is invalid.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// A telemetry backend could not be constructed.
    #[error("{0}")]
    Metrics(#[from] MetricsError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors reported by an object store backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The object does not exist.
    #[error("object not found: {bucket}/{key}")]
    NotFound {
        /// The bucket name.
        bucket: String,
        /// The object key.
        key: String,
    },

    /// Local IO failure inside a filesystem-backed store.
    #[error("storage IO error for {bucket}/{key}: {source}")]
    Io {
        /// The bucket name.
        bucket: String,
        /// The object key.
        key: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The remote backend rejected or failed the request.
    #[error("storage backend error for {bucket}/{key}: {message}")]
    Backend {
        /// The bucket name.
        bucket: String,
        /// The object key.
        key: String,
        /// Backend-provided description.
        message: String,
    },
}

impl StorageError {
    /// Creates a backend error.
    #[must_use]
    pub fn backend(
        bucket: impl Into<String>,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Backend {
            bucket: bucket.into(),
            key: key.into(),
            message: message.into(),
        }
    }

    /// Returns true if the object was missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Errors raised while staging objects into the working area.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The object could not be fetched.
    #[error("failed to download {key}: {source}")]
    Fetch {
        /// The object key.
        key: String,
        /// The storage failure.
        #[source]
        source: StorageError,
    },

    /// The fetched bytes could not be written locally.
    #[error("unable to save file {}: {source}", path.display())]
    Write {
        /// The local destination.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The name does not resolve to a path inside the working area.
    #[error("invalid file name '{0}'")]
    InvalidName(String),

    /// A transfer task ended without reporting an outcome.
    #[error("download task aborted: {0}")]
    Aborted(String),
}

impl From<tokio::task::JoinError> for DownloadError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Aborted(err.to_string())
    }
}

/// Errors raised while staging local files back to the object store.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The local file could not be read.
    #[error("error reading file {}: {source}", path.display())]
    Read {
        /// The local source path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The object could not be written.
    #[error("failed to upload {key}: {source}")]
    Put {
        /// The object key.
        key: String,
        /// The storage failure.
        #[source]
        source: StorageError,
    },

    /// The name does not resolve to a path inside the working area.
    #[error("invalid file name '{0}'")]
    InvalidName(String),

    /// A transfer task ended without reporting an outcome.
    #[error("upload task aborted: {0}")]
    Aborted(String),
}

impl From<tokio::task::JoinError> for UploadError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Aborted(err.to_string())
    }
}

/// Errors raised before the child process is running.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// The launch primitive refused to start the program.
    #[error("failed to spawn {program}: {source}")]
    Launch {
        /// The program that was launched.
        program: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The stdout capture file could not be opened.
    #[error("failed to open capture file {}: {source}", path.display())]
    Capture {
        /// The capture path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Waiting on the child failed.
    #[error("failed to wait for {program}: {source}")]
    Wait {
        /// The program being waited on.
        program: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The executable name does not resolve inside the working area.
    #[error("invalid executable name '{0}'")]
    InvalidName(String),
}

/// A pipeline failure, attributed to the phase that produced it.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The working area could not be created.
    #[error("failed to create working area: {0}")]
    WorkingArea(#[source] std::io::Error),

    /// Stage-in failed.
    #[error("download phase failed: {0}")]
    Download(#[from] DownloadError),

    /// The executable could not be run.
    #[error("execute phase failed: {0}")]
    Execute(#[from] SpawnError),

    /// The executable exited non-zero and strict exit checking is enabled.
    #[error("execute phase failed: {executable} exited with {}", exit_label(.code))]
    NonZeroExit {
        /// The executable name.
        executable: String,
        /// The exit code, if the child exited normally.
        code: Option<i32>,
    },

    /// Stage-out failed.
    #[error("upload phase failed: {0}")]
    Upload(#[from] UploadError),
}

impl PipelineError {
    /// Returns the phase this error is attributed to.
    #[must_use]
    pub fn phase(&self) -> PhaseName {
        match self {
            Self::WorkingArea(_) | Self::Download(_) => PhaseName::Download,
            Self::Execute(_) | Self::NonZeroExit { .. } => PhaseName::Execute,
            Self::Upload(_) => PhaseName::Upload,
        }
    }
}

/// Errors collecting or emitting telemetry.
///
/// These never abort a task; callers log them and continue.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Failed to register a metric.
    #[error("failed to register metric: {0}")]
    Registration(#[from] prometheus::Error),

    /// Failed to encode the registry snapshot.
    #[error("failed to encode metrics: {0}")]
    Encoding(String),

    /// The HTTP request to the backend failed.
    #[error("metrics transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("metrics backend returned {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },
}

/// Errors resolving the container identity.
///
/// Always recovered with a fallback identity.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// No metadata endpoint is configured.
    #[error("metadata endpoint not configured")]
    NotConfigured,

    /// The metadata request failed.
    #[error("metadata request failed: {0}")]
    Fetch(#[from] reqwest::Error),

    /// The metadata document lists no containers.
    #[error("metadata lists no containers")]
    NoContainers,
}

/// Errors obtaining a task request.
#[derive(Debug, Error)]
pub enum RequestError {
    /// No request was supplied.
    #[error("received empty request")]
    Empty,

    /// The request is not valid JSON of the expected shape.
    #[error("malformed task request: {0}")]
    Parse(#[from] serde_json::Error),

    /// The request pointer could not be fetched.
    #[error("failed to fetch request pointer: {0}")]
    Pointer(#[source] StorageError),

    /// The request file could not be read.
    #[error("failed to read request file: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors reading the environment configuration.
#[derive(Debug, Clone, Error)]
#[error("invalid value '{value}' for {var}: {reason}")]
pub struct ConfigError {
    /// The environment variable.
    pub var: String,
    /// The rejected value.
    pub value: String,
    /// Why it was rejected.
    pub reason: String,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(var: impl Into<String>, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            var: var.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

#[allow(clippy::ref_option)]
fn exit_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |code| format!("status {code}"))
}
