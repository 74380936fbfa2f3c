//! Where task requests come from.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::core::TaskRequest;
use crate::errors::RequestError;
use crate::storage::ObjectStore;

/// Location of a request stored as an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestPointer {
    /// Bucket holding the request.
    pub bucket: String,
    /// Object key of the request.
    pub key: String,
}

/// A request as received: either the request itself or a pointer to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestEnvelope {
    /// The task request inline.
    Direct(TaskRequest),
    /// `{"pointer": {"bucket": ..., "key": ...}}`.
    Pointer(RequestPointer),
}

impl RequestEnvelope {
    /// Parses raw request text.
    pub fn parse(text: &str) -> Result<Self, RequestError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(RequestError::Empty);
        }
        let mut value: serde_json::Value = serde_json::from_str(text)?;
        if let Some(pointer) = value.get_mut("pointer") {
            return Ok(Self::Pointer(serde_json::from_value(pointer.take())?));
        }
        Ok(Self::Direct(serde_json::from_value(value)?))
    }

    /// Produces the task request, fetching it through `store` if needed.
    pub async fn resolve(self, store: &dyn ObjectStore) -> Result<TaskRequest, RequestError> {
        match self {
            Self::Direct(request) => Ok(request),
            Self::Pointer(pointer) => {
                debug!(bucket = %pointer.bucket, key = %pointer.key, "Fetching request pointer");
                let bytes = store
                    .get(&pointer.bucket, &pointer.key)
                    .await
                    .map_err(RequestError::Pointer)?;
                Ok(serde_json::from_slice(&bytes)?)
            }
        }
    }
}

/// Parses `text` and resolves it into a task request.
pub async fn read_request(text: &str, store: &dyn ObjectStore) -> Result<TaskRequest, RequestError> {
    RequestEnvelope::parse(text)?.resolve(store).await
}

/// Reads request text from a file.
pub async fn read_request_file(path: impl AsRef<Path>) -> Result<String, RequestError> {
    Ok(tokio::fs::read_to_string(path).await?)
}
