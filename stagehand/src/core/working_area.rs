//! Per-task isolated directory.

use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

use crate::utils::random_token;

const CREATE_ATTEMPTS: usize = 8;

/// An isolated directory owning every file of one task.
///
/// Every path handed out by [`WorkingArea::resolve`] stays inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingArea {
    root: PathBuf,
    token: String,
}

impl WorkingArea {
    /// Creates a fresh area `<parent>/task_<token>`.
    ///
    /// The leaf is created exclusively, so two tasks never share an area.
    pub async fn create(parent: impl AsRef<Path>) -> io::Result<Self> {
        let parent = parent.as_ref();
        tokio::fs::create_dir_all(parent).await?;

        let mut last_err = None;
        for _ in 0..CREATE_ATTEMPTS {
            let token = random_token();
            let root = parent.join(format!("task_{token}"));
            match tokio::fs::create_dir(&root).await {
                Ok(()) => {
                    debug!(path = %root.display(), "Created working area");
                    return Ok(Self { root, token });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => last_err = Some(e),
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or_else(|| io::Error::other("working area token space exhausted")))
    }

    /// Returns the directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Returns the unique token.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Resolves a relative name inside the area.
    ///
    /// Absolute names and names escaping through `..` resolve to `None`.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        let relative = Path::new(name);
        if name.is_empty() {
            return None;
        }
        let contained = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        contained.then(|| self.root.join(relative))
    }

    /// Creates the directories between the area root and `path`.
    ///
    /// The root itself is never created, so once the area has been removed
    /// this fails with `NotFound` instead of bringing it back.
    pub async fn ensure_parent(&self, path: &Path) -> io::Result<()> {
        let Some(parent) = path.parent() else {
            return Ok(());
        };
        let relative = parent.strip_prefix(&self.root).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "path is outside the working area")
        })?;
        let mut dir = self.root.clone();
        for component in relative.components() {
            dir.push(component);
            if let Err(e) = tokio::fs::create_dir(&dir).await {
                if e.kind() != io::ErrorKind::AlreadyExists {
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Removes the area and everything in it.
    ///
    /// Failures are logged; an area that is already gone is not an error.
    pub async fn cleanup(&self) {
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => debug!(path = %self.root.display(), "Removed working area"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.root.display(), error = %e, "Failed to remove working area"),
        }
    }
}

/// Creates the parent directories of `path`. Existing directories are fine.
pub async fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => tokio::fs::create_dir_all(parent).await,
        _ => Ok(()),
    }
}
