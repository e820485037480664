use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use doccrawl_core::error::AppError;
use doccrawl_core::traits::ArtifactStore;

/// Writes one markdown file per page into a single output directory.
///
/// Each file is written to a hidden temporary sibling first and then
/// renamed into place, so a reader never sees a half-written artifact.
#[derive(Clone, Debug)]
pub struct FsArtifactStore {
    dir: PathBuf,
    seq: Arc<AtomicU64>,
}

impl FsArtifactStore {
    /// Create the output directory (and parents) if needed.
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self, AppError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            AppError::PersistenceError(format!("Cannot create {}: {e}", dir.display()))
        })?;
        Ok(Self {
            dir,
            seq: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ArtifactStore for FsArtifactStore {
    async fn save(&self, file_name: &str, content: &str) -> Result<PathBuf, AppError> {
        if file_name.is_empty() || file_name.contains(['/', '\\']) || file_name.starts_with('.') {
            return Err(AppError::PersistenceError(format!(
                "Refusing to write unsafe file name {file_name:?}"
            )));
        }

        let target = self.dir.join(file_name);
        let tmp = self.dir.join(format!(
            ".{file_name}.{}.{}.tmp",
            std::process::id(),
            self.seq.fetch_add(1, Ordering::Relaxed)
        ));

        if let Err(e) = tokio::fs::write(&tmp, content.as_bytes()).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(AppError::PersistenceError(format!(
                "Cannot write {}: {e}",
                tmp.display()
            )));
        }
        if let Err(e) = tokio::fs::rename(&tmp, &target).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(AppError::PersistenceError(format!(
                "Cannot move {} into place: {e}",
                target.display()
            )));
        }

        tracing::debug!(path = %target.display(), bytes = content.len(), "Wrote artifact");
        Ok(target)
    }
}
