//! Ephemeral per-job directories.
//!
//! Every job gets its own directory under a shared root. The [`Workspace`]
//! guard removes it exactly once, either through [`Workspace::release`] or on
//! drop, so early returns and cancelled requests clean up too.

use crate::error::JobError;
use anyhow::Context;
use std::{
    io,
    path::{Path, PathBuf},
};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct WorkspaceRoot {
    path: PathBuf,
}

impl WorkspaceRoot {
    /// Creates the root if absent. Safe to call concurrently.
    pub fn ensure(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        std::fs::create_dir_all(&path)
            .with_context(|| format!("failed to create workspace root at {}", path.display()))?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn acquire(&self) -> Result<Workspace, JobError> {
        let id = Uuid::new_v4();
        let path = self.path.join(format!("job-{id}"));
        tokio::fs::create_dir(&path)
            .await
            .map_err(|e| JobError::packaging(format!("failed to create workspace: {e}")))?;
        tracing::debug!(workspace = %path.display(), "workspace acquired");
        Ok(Workspace {
            id,
            path,
            released: false,
        })
    }
}

#[derive(Debug)]
pub struct Workspace {
    id: Uuid,
    path: PathBuf,
    released: bool,
}

impl Workspace {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn release(mut self) {
        self.released = true;
        let result = tokio::fs::remove_dir_all(&self.path).await;
        log_removal(&self.path, result);
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let path = std::mem::take(&mut self.path);
        // Inside a runtime the removal must not block a worker thread.
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || log_removal(&path, std::fs::remove_dir_all(&path)));
            }
            Err(_) => log_removal(&path, std::fs::remove_dir_all(&path)),
        }
    }
}

fn log_removal(path: &Path, result: io::Result<()>) {
    match result {
        Ok(()) => tracing::debug!(workspace = %path.display(), "workspace released"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(workspace = %path.display(), error = %e, "failed to remove workspace"),
    }
}
