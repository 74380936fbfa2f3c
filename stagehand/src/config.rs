//! Worker configuration read from the environment.
//!
//! Every setting has a default so a bare container starts with a no-op
//! reporter, S3 storage and a one-second sampling interval.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::context::parse_labels;
use crate::errors::ConfigError;

/// Default sampling interval.
pub const DEFAULT_COLLECT_INTERVAL_MS: u64 = 1000;

/// Default push-gateway job name.
pub const DEFAULT_PUSH_GW_JOB: &str = "hyperflow-service";

/// Which reporting backend to construct.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MetricsBackendConfig {
    /// Discard everything.
    #[default]
    None,
    /// Push registry snapshots to a push-gateway.
    PushGateway {
        /// Gateway base URL.
        url: String,
        /// Job name snapshots are grouped under.
        job: String,
    },
    /// Write points to a time-series database.
    TimeSeries {
        /// Database base URL.
        url: String,
        /// Database name.
        database: String,
    },
}

/// Which object store to construct.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StorageBackendConfig {
    /// S3 through the standard AWS credential chain.
    #[default]
    S3,
    /// A local directory laid out as `<root>/<bucket>/<key>`.
    Local {
        /// Root directory.
        root: PathBuf,
    },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Settings of the pipeline coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Parent directory of per-task working areas.
    pub work_root: PathBuf,
    /// Remove the working area once the pipeline is done.
    pub cleanup_working_area: bool,
    /// Fail the execute phase when the child exits non-zero.
    pub fail_on_nonzero_exit: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            work_root: std::env::temp_dir(),
            cleanup_working_area: true,
            fail_on_nonzero_exit: false,
        }
    }
}

impl PipelineConfig {
    /// Sets the working-area root.
    #[must_use]
    pub fn with_work_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.work_root = root.into();
        self
    }

    /// Enables or disables working-area cleanup.
    #[must_use]
    pub fn with_cleanup(mut self, cleanup: bool) -> Self {
        self.cleanup_working_area = cleanup;
        self
    }

    /// Enables or disables strict exit-status checking.
    #[must_use]
    pub fn with_fail_on_nonzero_exit(mut self, strict: bool) -> Self {
        self.fail_on_nonzero_exit = strict;
        self
    }
}

/// Runtimes used by the launch strategies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Runtime for `.js` executables.
    pub node_bin: String,
    /// Runtime for `.jar` executables.
    pub java_bin: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            node_bin: "node".to_string(),
            java_bin: "java".to_string(),
        }
    }
}

/// Settings of the resource sampler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerConfig {
    /// Network interface to sample.
    pub interface: String,
    /// Block device to sample.
    pub disk_device: String,
    /// Tick interval.
    pub interval: Duration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interface: "eth0".to_string(),
            disk_device: "xvda1".to_string(),
            interval: Duration::from_millis(DEFAULT_COLLECT_INTERVAL_MS),
        }
    }
}

/// Inputs to identity resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityConfig {
    /// Task identifier label.
    pub task_id: String,
    /// Static user-supplied labels, in declaration order.
    pub labels: Vec<(String, String)>,
    /// Link-local metadata endpoint.
    pub metadata_uri: Option<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            task_id: "undefinedTaskId".to_string(),
            labels: Vec::new(),
            metadata_uri: None,
        }
    }
}

/// HTTP host bind address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    /// Returns `host:port`.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Complete worker configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Pipeline settings.
    pub pipeline: PipelineConfig,
    /// Executor runtimes.
    pub executor: ExecutorConfig,
    /// Sampler settings.
    pub sampler: SamplerConfig,
    /// Identity inputs.
    pub identity: IdentityConfig,
    /// Reporting backend.
    pub metrics: MetricsBackendConfig,
    /// Object store backend.
    pub storage: StorageBackendConfig,
    /// HTTP host settings.
    pub server: ServerConfig,
    /// Log output format.
    pub log_format: LogFormat,
}

impl WorkerConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let pipeline = PipelineConfig {
            work_root: get("WORK_ROOT").map_or(defaults.pipeline.work_root, PathBuf::from),
            cleanup_working_area: parse_or(&get, "CLEANUP_WORKING_AREA", true)?,
            fail_on_nonzero_exit: parse_or(&get, "FAIL_ON_NONZERO_EXIT", false)?,
        };

        let executor = ExecutorConfig {
            node_bin: get("NODE_BIN").unwrap_or(defaults.executor.node_bin),
            java_bin: get("JAVA_BIN").unwrap_or(defaults.executor.java_bin),
        };

        let interval_ms: u64 = parse_or(&get, "COLLECT_INTERVAL_MS", DEFAULT_COLLECT_INTERVAL_MS)?;
        if interval_ms == 0 {
            return Err(ConfigError::new("COLLECT_INTERVAL_MS", "0", "interval must be positive"));
        }
        let sampler = SamplerConfig {
            interface: get("INTERFACE").unwrap_or(defaults.sampler.interface),
            disk_device: get("DISK_DEVICE").unwrap_or(defaults.sampler.disk_device),
            interval: Duration::from_millis(interval_ms),
        };

        let identity = IdentityConfig {
            task_id: get("TASK_ID").unwrap_or(defaults.identity.task_id),
            labels: get("LABELS").map(|s| parse_labels(&s)).unwrap_or_default(),
            metadata_uri: get("ECS_CONTAINER_METADATA_URI"),
        };

        let metrics = match get("METRICS_BACKEND").as_deref().map(str::to_ascii_lowercase) {
            None => MetricsBackendConfig::None,
            Some(kind) => match kind.as_str() {
                "none" | "noop" => MetricsBackendConfig::None,
                "pushgateway" | "prometheus" => MetricsBackendConfig::PushGateway {
                    url: get("PUSH_GW_URL").unwrap_or_else(|| "http://localhost:9091".to_string()),
                    job: get("PUSH_GW_JOB").unwrap_or_else(|| DEFAULT_PUSH_GW_JOB.to_string()),
                },
                "timeseries" | "influx" | "influxdb" => MetricsBackendConfig::TimeSeries {
                    url: get("INFLUX_URL").unwrap_or_else(|| "http://localhost:8086".to_string()),
                    database: get("INFLUX_DB").unwrap_or_else(|| "hyperflow_tasks".to_string()),
                },
                _ => {
                    return Err(ConfigError::new(
                        "METRICS_BACKEND",
                        kind.clone(),
                        "expected none, pushgateway or timeseries",
                    ))
                }
            },
        };

        let storage = match get("STORAGE_BACKEND").as_deref().map(str::to_ascii_lowercase) {
            None => StorageBackendConfig::S3,
            Some(kind) => match kind.as_str() {
                "s3" => StorageBackendConfig::S3,
                "local" => StorageBackendConfig::Local {
                    root: get("LOCAL_STORAGE_ROOT").map_or_else(|| PathBuf::from("./storage"), PathBuf::from),
                },
                _ => {
                    return Err(ConfigError::new("STORAGE_BACKEND", kind.clone(), "expected s3 or local"))
                }
            },
        };

        let server = ServerConfig {
            host: get("HOST").unwrap_or(defaults.server.host),
            port: parse_or(&get, "PORT", defaults.server.port)?,
        };

        let log_format = match get("LOG_FORMAT").as_deref().map(str::to_ascii_lowercase) {
            None => LogFormat::Text,
            Some(kind) => match kind.as_str() {
                "text" => LogFormat::Text,
                "json" => LogFormat::Json,
                _ => return Err(ConfigError::new("LOG_FORMAT", kind.clone(), "expected text or json")),
            },
        };

        Ok(Self {
            pipeline,
            executor,
            sampler,
            identity,
            metrics,
            storage,
            server,
            log_format,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::new(key, raw.clone(), e.to_string())),
    }
}
