//! Local resource handles backed by spooled temporary files.

use crate::CacheError;
use api_client::PhotoId;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tempfile::TempPath;

#[derive(Debug, Default)]
struct SpoolStats {
    allocated: AtomicU64,
    revoked: AtomicU64,
}

/// Directory that photo payloads are materialized into.
#[derive(Debug, Clone)]
pub struct Spool {
    dir: PathBuf,
    stats: Arc<SpoolStats>,
}

impl Spool {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| CacheError::Io(format!("Failed to create spool directory: {}", e)))?;
        Ok(Self {
            dir,
            stats: Arc::new(SpoolStats::default()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `data` to a fresh spool file and hand out the only handle to it.
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self, data)))]
    pub async fn materialize(
        &self,
        id: PhotoId,
        data: &[u8],
        mime_type: Option<String>,
    ) -> Result<PhotoHandle, CacheError> {
        let file = tempfile::Builder::new()
            .prefix(&format!("photo-{}-", id))
            .suffix(extension_for(mime_type.as_deref()))
            .tempfile_in(&self.dir)
            .map_err(|e| CacheError::Io(format!("Failed to create spool file: {}", e)))?;
        let path = file.into_temp_path();
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| CacheError::Io(format!("Failed to write spool file: {}", e)))?;

        self.stats.allocated.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(id, bytes = data.len(), "materialized photo");
        Ok(PhotoHandle {
            id,
            local_ref: LocalRef {
                path: Some(path),
                len: data.len() as u64,
                mime_type,
                stats: Arc::clone(&self.stats),
            },
        })
    }

    pub fn allocated(&self) -> u64 {
        self.stats.allocated.load(Ordering::Relaxed)
    }

    pub fn revoked(&self) -> u64 {
        self.stats.revoked.load(Ordering::Relaxed)
    }

    /// Handles handed out by this spool that have not been revoked yet.
    pub fn live_handles(&self) -> u64 {
        self.allocated().saturating_sub(self.revoked())
    }
}

fn extension_for(mime_type: Option<&str>) -> &'static str {
    let essence = mime_type
        .and_then(|m| m.split(';').next())
        .map(str::trim)
        .unwrap_or_default();
    match essence {
        "image/jpeg" | "image/jpg" => ".jpg",
        "image/png" => ".png",
        "image/gif" => ".gif",
        "image/webp" => ".webp",
        "image/bmp" => ".bmp",
        "image/tiff" => ".tiff",
        "image/heic" => ".heic",
        _ => ".bin",
    }
}

/// Process-local reference to a spooled payload.
///
/// Not `Clone`: the owning [`PhotoHandle`] is the only way to reach the file.
#[derive(Debug)]
pub struct LocalRef {
    path: Option<TempPath>,
    len: u64,
    mime_type: Option<String>,
    stats: Arc<SpoolStats>,
}

impl LocalRef {
    pub fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or_else(|| Path::new(""))
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    fn release(&mut self) -> std::io::Result<()> {
        match self.path.take() {
            Some(path) => {
                self.stats.revoked.fetch_add(1, Ordering::Relaxed);
                path.close()
            }
            None => Ok(()),
        }
    }
}

impl Drop for LocalRef {
    fn drop(&mut self) {
        if self.path.is_none() {
            return;
        }
        tracing::warn!(path = ?self.path(), "photo handle dropped without being revoked");
        if let Err(e) = self.release() {
            tracing::error!(error = %e, "failed to remove spool file");
        }
    }
}

#[derive(Debug)]
pub struct PhotoHandle {
    id: PhotoId,
    local_ref: LocalRef,
}

impl PhotoHandle {
    pub fn id(&self) -> PhotoId {
        self.id
    }

    pub fn local_ref(&self) -> &LocalRef {
        &self.local_ref
    }

    /// Read the payload back, e.g. for rendering.
    pub async fn read(&self) -> Result<Vec<u8>, CacheError> {
        tokio::fs::read(self.local_ref.path())
            .await
            .map_err(|e| CacheError::Io(format!("Failed to read photo {}: {}", self.id, e)))
    }

    /// Release the underlying file. Consumes the handle so it cannot be used afterwards.
    pub fn revoke(mut self) -> Result<(), CacheError> {
        self.local_ref
            .release()
            .map_err(|e| CacheError::Io(format!("Failed to revoke photo {}: {}", self.id, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn materialize_and_revoke() {
        let dir = tempdir().unwrap();
        let spool = Spool::new(dir.path().join("spool")).unwrap();

        let handle = spool
            .materialize(7, b"jpeg-bytes", Some("image/jpeg".into()))
            .await
            .unwrap();
        let path = handle.local_ref().path().to_path_buf();
        assert!(path.exists());
        assert_eq!(path.extension().unwrap(), "jpg");
        assert_eq!(handle.local_ref().len(), 10);
        assert_eq!(handle.read().await.unwrap(), b"jpeg-bytes");
        assert_eq!(spool.live_handles(), 1);

        handle.revoke().unwrap();
        assert!(!path.exists());
        assert_eq!(spool.allocated(), 1);
        assert_eq!(spool.revoked(), 1);
        assert_eq!(spool.live_handles(), 0);
    }

    #[tokio::test]
    async fn dropped_handle_is_still_released() {
        let dir = tempdir().unwrap();
        let spool = Spool::new(dir.path()).unwrap();
        let handle = spool.materialize(1, b"x", None).await.unwrap();
        let path = handle.local_ref().path().to_path_buf();
        assert_eq!(path.extension().unwrap(), "bin");

        drop(handle);
        assert!(!path.exists());
        assert_eq!(spool.live_handles(), 0);
    }

    #[test]
    fn extension_ignores_parameters() {
        assert_eq!(extension_for(Some("image/png; charset=binary")), ".png");
        assert_eq!(extension_for(Some("application/octet-stream")), ".bin");
        assert_eq!(extension_for(None), ".bin");
    }
}
