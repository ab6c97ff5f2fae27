//! Upload volume.
//!
//! The upload directory is a mounted volume. The service makes sure it exists
//! at startup and the readiness probe checks that it is still a writable
//! directory. Files are not written here by any endpoint.

use crate::error::{AppError, AppResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

#[derive(Debug, Clone)]
pub struct UploadStorage {
    root: PathBuf,
}

impl UploadStorage {
    /// Create the upload directory (and parents) if it is missing.
    pub async fn prepare(root: impl Into<PathBuf>) -> AppResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|e| {
            AppError::Internal(format!(
                "Failed to create upload directory {}: {}",
                root.display(),
                e
            ))
        })?;
        info!(path = %root.display(), "Upload directory ready");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Check the directory exists and accepts writes.
    pub async fn probe(&self) -> AppResult<()> {
        let metadata = fs::metadata(&self.root).await.map_err(|e| {
            let root = self.root.display();
            AppError::ServiceUnavailable(format!("{} is not accessible: {}", root, e))
        })?;
        if !metadata.is_dir() {
            return Err(AppError::ServiceUnavailable(format!(
                "{} is not a directory",
                self.root.display()
            )));
        }

        let marker = self.root.join(format!(".probe-{}", uuid::Uuid::new_v4()));
        fs::write(&marker, b"ok").await.map_err(|e| {
            AppError::ServiceUnavailable(format!("{} is not writable: {}", self.root.display(), e))
        })?;
        fs::remove_file(&marker).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_prepare_creates_nested_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested").join("uploads");

        let storage = UploadStorage::prepare(&root).await.unwrap();
        assert!(root.is_dir());
        assert!(storage.probe().await.is_ok());
        // The probe leaves nothing behind
        assert_eq!(std::fs::read_dir(&root).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_probe_fails_when_directory_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("uploads");
        let storage = UploadStorage::prepare(&root).await.unwrap();

        std::fs::remove_dir(&root).unwrap();
        assert!(matches!(
            storage.probe().await,
            Err(AppError::ServiceUnavailable(_))
        ));
    }
}
