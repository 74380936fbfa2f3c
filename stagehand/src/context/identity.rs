//! Identity labels attached to every emitted metric and fact.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

use crate::errors::IdentityError;

/// Container id used when none can be resolved.
pub const SENTINEL_CONTAINER_ID: &str = "undefinedContainerId";

/// Label name carrying the container id.
pub const CONTAINER_ID_LABEL: &str = "containerID";

/// Label name carrying the task id.
pub const TASK_ID_LABEL: &str = "taskID";

static LABEL_NAME: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").unwrap()
});

/// The fixed set of tags identifying this worker.
///
/// Built once at process start and shared read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityLabelSet {
    container_id: String,
    task_id: String,
    #[serde(default)]
    extra: Vec<(String, String)>,
}

impl IdentityLabelSet {
    /// Creates a label set.
    ///
    /// Static labels that would shadow `containerID` or `taskID` are dropped.
    #[must_use]
    pub fn new(
        container_id: impl Into<String>,
        task_id: impl Into<String>,
        extra: Vec<(String, String)>,
    ) -> Self {
        let extra = extra
            .into_iter()
            .filter(|(k, _)| k != CONTAINER_ID_LABEL && k != TASK_ID_LABEL)
            .collect();
        Self {
            container_id: container_id.into(),
            task_id: task_id.into(),
            extra,
        }
    }

    /// Returns the container id.
    #[must_use]
    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    /// Returns the task id.
    #[must_use]
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Label names, container and task first, then static labels in order.
    #[must_use]
    pub fn label_names(&self) -> Vec<&str> {
        let mut names = vec![CONTAINER_ID_LABEL, TASK_ID_LABEL];
        names.extend(self.extra.iter().map(|(k, _)| k.as_str()));
        names
    }

    /// Label values, in the same order as [`Self::label_names`].
    #[must_use]
    pub fn label_values(&self) -> Vec<&str> {
        let mut values = vec![self.container_id.as_str(), self.task_id.as_str()];
        values.extend(self.extra.iter().map(|(_, v)| v.as_str()));
        values
    }

    /// Name/value pairs in label order.
    #[must_use]
    pub fn pairs(&self) -> Vec<(&str, &str)> {
        self.label_names().into_iter().zip(self.label_values()).collect()
    }

    /// Converts to a sorted map.
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.pairs()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

/// Splits `key1=val1,key2=val2` into ordered pairs.
///
/// Entries without `=` or with a key that is not a valid label name are
/// skipped. A repeated key keeps its first position and its last value.
#[must_use]
pub fn parse_labels(raw: &str) -> Vec<(String, String)> {
    let mut labels: Vec<(String, String)> = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let Some((key, value)) = entry.split_once('=') else {
            warn!(entry, "Ignoring label without '='");
            continue;
        };
        let key = key.trim();
        if !LABEL_NAME.is_match(key) {
            warn!(key, "Ignoring label with invalid name");
            continue;
        }
        let value = value.trim().to_string();
        match labels.iter_mut().find(|(k, _)| k == key) {
            Some(existing) => existing.1 = value,
            None => labels.push((key.to_string(), value)),
        }
    }
    labels
}

#[derive(Debug, Deserialize)]
struct TaskMetadata {
    #[serde(default, alias = "Containers")]
    containers: Vec<ContainerMetadata>,
}

#[derive(Debug, Deserialize)]
struct ContainerMetadata {
    #[serde(alias = "DockerId")]
    id: String,
}

/// Resolves the container id from the link-local metadata endpoint.
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    client: reqwest::Client,
    metadata_uri: Option<String>,
}

impl IdentityResolver {
    /// Creates a resolver for the given metadata endpoint.
    #[must_use]
    pub fn new(metadata_uri: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self {
            client,
            metadata_uri,
        }
    }

    /// Fetches `<uri>/task` and returns the first container id.
    pub async fn fetch_container_id(&self) -> Result<String, IdentityError> {
        let uri = self.metadata_uri.as_deref().ok_or(IdentityError::NotConfigured)?;
        let url = format!("{}/task", uri.trim_end_matches('/'));

        let metadata: TaskMetadata = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        metadata
            .containers
            .into_iter()
            .map(|c| c.id)
            .find(|id| !id.is_empty())
            .ok_or(IdentityError::NoContainers)
    }

    /// Resolves the container id. Never fails.
    ///
    /// Falls back to the last path segment of the metadata URI, then to
    /// [`SENTINEL_CONTAINER_ID`].
    pub async fn resolve(&self) -> String {
        match self.fetch_container_id().await {
            Ok(id) => {
                debug!(container_id = %id, "Resolved container identity");
                id
            }
            Err(IdentityError::NotConfigured) => SENTINEL_CONTAINER_ID.to_string(),
            Err(e) => {
                let fallback = self
                    .metadata_uri
                    .as_deref()
                    .and_then(last_path_segment)
                    .unwrap_or(SENTINEL_CONTAINER_ID)
                    .to_string();
                warn!(error = %e, container_id = %fallback, "Container identity lookup failed");
                fallback
            }
        }
    }

    /// Resolves the full label set.
    pub async fn resolve_labels(
        &self,
        task_id: impl Into<String>,
        extra: Vec<(String, String)>,
    ) -> IdentityLabelSet {
        IdentityLabelSet::new(self.resolve().await, task_id, extra)
    }
}

fn last_path_segment(uri: &str) -> Option<&str> {
    let path = uri.split_once("://").map_or(uri, |(_, rest)| rest);
    let (_, path) = path.split_once('/')?;
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
}
