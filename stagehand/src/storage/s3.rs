//! S3 object store.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::debug;

use super::{content_md5, ObjectStore};
use crate::errors::StorageError;

/// S3 backend using the standard AWS credential and region chain.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    /// Wraps an existing client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a client from the environment.
    pub async fn from_env() -> Self {
        let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        Self::new(Client::new(&config))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                let missing = err
                    .as_service_error()
                    .is_some_and(|e| e.is_no_such_key())
                    || matches!(&err, SdkError::ServiceError(e) if e.raw().status().as_u16() == 404);
                if missing {
                    StorageError::NotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    StorageError::backend(bucket, key, DisplayErrorContext(&err).to_string())
                }
            })?;

        let body = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::backend(bucket, key, e.to_string()))?;
        let bytes = body.into_bytes().to_vec();
        debug!(bucket, key, size = bytes.len(), "Fetched object");
        Ok(bytes)
    }

    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), StorageError> {
        let size = body.len();
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_md5(content_md5(&body))
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|err| StorageError::backend(bucket, key, DisplayErrorContext(&err).to_string()))?;
        debug!(bucket, key, size, "Stored object");
        Ok(())
    }
}
