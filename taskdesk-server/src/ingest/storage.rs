//! Temporary upload storage
//!
//! Uploaded files are written to disk for the duration of one job and removed
//! afterwards. The path is reserved before any content is written, and
//! [`TempFileGuard`] ties its removal to scope so every exit path, including a
//! cancelled or timed-out job, deletes the file exactly once.

use async_trait::async_trait;
use chrono::Utc;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

/// File storage collaborator for upload jobs
///
/// A job first reserves its path, hands it to a [`TempFileGuard`], and only
/// then writes content into it.
#[async_trait]
pub trait TempStorage: Send + Sync {
    /// Create an empty temp file for an upload and return its path
    fn reserve_temp(&self, original_name: &str) -> io::Result<PathBuf>;

    /// Fill a reserved temp file; the file is removed again if the write fails
    ///
    /// A path that has already been deleted is not recreated.
    async fn write_temp(&self, path: &Path, data: &[u8]) -> io::Result<()>;

    /// Remove a temp file; a file that is already gone is not an error
    fn delete_temp(&self, path: &Path) -> io::Result<()>;
}

/// Temp files under one directory, named `<epoch-ms>-<uuid>-<sanitized name>`
#[derive(Debug, Clone)]
pub struct DiskTempStorage {
    dir: PathBuf,
}

impl DiskTempStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the upload directory if missing
    pub fn ensure_dir(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.dir)
    }
}

/// Write into an existing file only
async fn write_existing(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(path)
        .await?;
    file.write_all(data).await?;
    file.flush().await
}

#[async_trait]
impl TempStorage for DiskTempStorage {
    fn reserve_temp(&self, original_name: &str) -> io::Result<PathBuf> {
        self.ensure_dir()?;

        let file_name = format!(
            "{}-{}-{}",
            Utc::now().timestamp_millis(),
            Uuid::new_v4().simple(),
            sanitize_file_name(original_name)
        );
        let path = self.dir.join(file_name);

        std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;

        Ok(path)
    }

    async fn write_temp(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        match write_existing(path, data).await {
            Ok(()) => {
                debug!(path = %path.display(), bytes = data.len(), "Temp upload written");
                Ok(())
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Temp upload write failed");
                if let Err(cleanup) = self.delete_temp(path) {
                    warn!(
                        path = %path.display(),
                        error = %cleanup,
                        "Failed to remove partial temp upload"
                    );
                }
                Err(e)
            }
        }
    }

    fn delete_temp(&self, path: &Path) -> io::Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Keep only the final path component, restricted to `[A-Za-z0-9._-]`
fn sanitize_file_name(original_name: &str) -> String {
    let base = original_name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .take(100)
        .collect();

    if cleaned.trim_matches('.').is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// Scoped owner of one temp file
///
/// `release` deletes eagerly; `Drop` covers any path that never reached it.
pub struct TempFileGuard {
    storage: Arc<dyn TempStorage>,
    path: PathBuf,
    released: bool,
}

impl TempFileGuard {
    pub fn new(storage: Arc<dyn TempStorage>, path: PathBuf) -> Self {
        Self {
            storage,
            path,
            released: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn release(mut self) {
        self.cleanup();
    }

    fn cleanup(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        match self.storage.delete_temp(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Temp upload removed"),
            Err(e) => warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove temp upload"
            ),
        }
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        self.cleanup();
    }
}
