//! Scoped ownership of the transient PDF written for one dispatch.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, warn};

/// Owns an artifact path and removes the file exactly once.
///
/// [`ArtifactGuard::cleanup`] is the normal exit. If the guard is dropped
/// without it (the request future was cancelled) `Drop` removes the file on
/// the blocking pool, or inline when no runtime is running.
#[derive(Debug)]
pub struct ArtifactGuard {
    path: PathBuf,
    released: bool,
}

impl ArtifactGuard {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            released: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the artifact if it exists. Failures are logged, never returned.
    pub async fn cleanup(mut self) {
        self.released = true;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => debug!("Removed artifact {}", self.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove artifact {}: {}", self.path.display(), e),
        }
    }
}

impl Drop for ArtifactGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let path = std::mem::take(&mut self.path);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || remove_abandoned(&path));
            }
            Err(_) => remove_abandoned(&path),
        }
    }
}

fn remove_abandoned(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed abandoned artifact {}", path.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove artifact {}: {}", path.display(), e),
    }
}
