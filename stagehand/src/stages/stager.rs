//! Moves objects between the object store and a working area.

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::FailFastGroup;
use crate::core::WorkingArea;
use crate::errors::{DownloadError, UploadError};
use crate::storage::{object_key, ObjectStore};

/// Mode given to the executable after download.
pub const EXECUTABLE_MODE: u32 = 0o755;

/// Stage-in and stage-out over one object store.
///
/// Both directions fan out one operation per file and fail fast: the first
/// failure is returned while the other transfers keep running detached.
#[derive(Clone)]
pub struct ObjectStager {
    store: Arc<dyn ObjectStore>,
}

impl ObjectStager {
    /// Creates a stager over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Fetches `prefix/name` for every name into `area/name`.
    ///
    /// The file named `executable`, if any, is made runnable once written.
    pub async fn stage_in(
        &self,
        bucket: &str,
        prefix: &str,
        names: &[String],
        area: &WorkingArea,
        executable: Option<&str>,
    ) -> Result<usize, DownloadError> {
        let targets = names
            .iter()
            .map(|name| {
                area.resolve(name)
                    .map(|path| (name.clone(), path))
                    .ok_or_else(|| DownloadError::InvalidName(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut group = FailFastGroup::<DownloadError>::new();
        for (name, path) in targets {
            let store = Arc::clone(&self.store);
            let bucket = bucket.to_string();
            let key = object_key(prefix, &name);
            let runnable = executable == Some(name.as_str());
            let area = area.clone();
            group.spawn(async move {
                debug!(bucket = %bucket, key = %key, "Downloading");
                let bytes = store
                    .get(&bucket, &key)
                    .await
                    .map_err(|source| DownloadError::Fetch {
                        key: key.clone(),
                        source,
                    })?;
                save(&area, &path, &bytes, runnable)
                    .await
                    .map_err(|source| DownloadError::Write { path: path.clone(), source })?;
                debug!(key = %key, path = %path.display(), size = bytes.len(), "Downloaded and saved file");
                Ok(())
            });
        }

        let count = group.wait().await?;
        info!(bucket, prefix, count, "All files have been downloaded");
        Ok(count)
    }

    /// Writes `area/name` to `prefix/name` for every declared output.
    ///
    /// Files in the area that are not named are never uploaded.
    pub async fn stage_out(
        &self,
        bucket: &str,
        prefix: &str,
        names: &[String],
        area: &WorkingArea,
    ) -> Result<usize, UploadError> {
        let sources = names
            .iter()
            .map(|name| {
                area.resolve(name)
                    .map(|path| (name.clone(), path))
                    .ok_or_else(|| UploadError::InvalidName(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut group = FailFastGroup::<UploadError>::new();
        for (name, path) in sources {
            let store = Arc::clone(&self.store);
            let bucket = bucket.to_string();
            let key = object_key(prefix, &name);
            group.spawn(async move {
                let body = tokio::fs::read(&path)
                    .await
                    .map_err(|source| UploadError::Read { path: path.clone(), source })?;
                let size = body.len();
                store
                    .put(&bucket, &key, body)
                    .await
                    .map_err(|source| UploadError::Put {
                        key: key.clone(),
                        source,
                    })?;
                debug!(bucket = %bucket, key = %key, size, "Uploaded file");
                Ok(())
            });
        }

        let count = group.wait().await?;
        info!(bucket, prefix, count, "All files have been uploaded");
        Ok(count)
    }
}

impl std::fmt::Debug for ObjectStager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStager").finish_non_exhaustive()
    }
}

/// Writes a downloaded file. Fails rather than recreating a removed area.
async fn save(
    area: &WorkingArea,
    path: &Path,
    bytes: &[u8],
    runnable: bool,
) -> std::io::Result<()> {
    area.ensure_parent(path).await?;
    tokio::fs::write(path, bytes).await?;
    if runnable {
        make_runnable(path).await?;
    }
    Ok(())
}

#[cfg(unix)]
async fn make_runnable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(EXECUTABLE_MODE)).await
}

#[cfg(not(unix))]
async fn make_runnable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
