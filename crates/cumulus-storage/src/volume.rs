//! Blob volume: the physical home of originals and their thumbnails.
//!
//! Originals live under an uploads root, thumbnails under a parallel
//! thumbnails root with the same filename (images) or the same stem plus
//! `.jpg` (video-derived). Cleanup depends on this path-substitution
//! convention, so it is owned here and nowhere else.

use std::path::{Path, PathBuf};

use sysinfo::Disks;
use tokio::fs;
use uuid::Uuid;

use cumulus_core::models::{DiskStats, ResourceKind};

use crate::error::{StorageError, StorageResult};

#[derive(Clone)]
pub struct BlobVolume {
    uploads_root: PathBuf,
    thumbnails_root: PathBuf,
}

impl BlobVolume {
    /// Create a new volume, creating both roots if needed.
    pub async fn new(
        uploads_root: impl Into<PathBuf>,
        thumbnails_root: impl Into<PathBuf>,
    ) -> StorageResult<Self> {
        let uploads_root = uploads_root.into();
        let thumbnails_root = thumbnails_root.into();

        for root in [&uploads_root, &thumbnails_root] {
            fs::create_dir_all(root).await.map_err(|e| {
                StorageError::ConfigError(format!(
                    "Failed to create storage directory {}: {}",
                    root.display(),
                    e
                ))
            })?;
        }

        Ok(BlobVolume {
            uploads_root,
            thumbnails_root,
        })
    }

    pub fn uploads_root(&self) -> &Path {
        &self.uploads_root
    }

    /// Generate a unique on-disk name for a new blob, keeping only the
    /// extension of the user-supplied name. The display name never reaches
    /// the filesystem.
    pub fn allocate_blob_name(original_name: &str) -> String {
        match Path::new(original_name)
            .extension()
            .and_then(|e| e.to_str())
        {
            Some(ext) if !ext.is_empty() => format!("{}.{}", Uuid::new_v4(), ext.to_lowercase()),
            _ => Uuid::new_v4().to_string(),
        }
    }

    /// Resolve a blob name to its path under the uploads root.
    ///
    /// Blob names are single generated filenames; anything that could walk
    /// out of the root is rejected.
    pub fn original_path(&self, blob_name: &str) -> StorageResult<PathBuf> {
        Self::validate_name(blob_name)?;
        Ok(self.uploads_root.join(blob_name))
    }

    /// The thumbnail path for a blob, by kind: images share the filename,
    /// videos swap the extension for `.jpg`. Other kinds have none.
    pub fn thumbnail_path(&self, blob_name: &str, kind: ResourceKind) -> StorageResult<Option<PathBuf>> {
        Self::validate_name(blob_name)?;
        let path = match kind {
            ResourceKind::Image => Some(self.thumbnails_root.join(blob_name)),
            ResourceKind::Video => {
                let stem = Path::new(blob_name)
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or(blob_name);
                Some(self.thumbnails_root.join(format!("{}.jpg", stem)))
            }
            ResourceKind::Audio | ResourceKind::File => None,
        };
        Ok(path)
    }

    /// Delete the original blob. Missing files are fine: the Catalog is
    /// authoritative and the blob may already be gone.
    pub async fn delete_original(&self, blob_name: &str) -> StorageResult<bool> {
        let path = self.original_path(blob_name)?;
        Self::remove_if_present(&path).await
    }

    /// Delete the blob's thumbnail, trying the same-name path first and the
    /// `.jpg`-stem fallback second, since the recorded kind may be gone by
    /// the time cleanup runs.
    pub async fn delete_thumbnail(&self, blob_name: &str) -> StorageResult<bool> {
        Self::validate_name(blob_name)?;

        let same_name = self.thumbnails_root.join(blob_name);
        if Self::remove_if_present(&same_name).await? {
            return Ok(true);
        }

        let stem = Path::new(blob_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(blob_name);
        let jpg = self.thumbnails_root.join(format!("{}.jpg", stem));
        Self::remove_if_present(&jpg).await
    }

    /// Size in bytes of a stored blob.
    pub async fn blob_size(&self, blob_name: &str) -> StorageResult<u64> {
        let path = self.original_path(blob_name)?;
        let meta = fs::metadata(&path).await?;
        Ok(meta.len())
    }

    pub async fn blob_exists(&self, blob_name: &str) -> bool {
        match self.original_path(blob_name) {
            Ok(path) => fs::try_exists(&path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Free/used/total bytes of the disk backing the uploads root.
    ///
    /// The whole volume is a ceiling shared by all users, regardless of
    /// individual quota caps.
    pub fn disk_stats(&self) -> StorageResult<DiskStats> {
        let probe = self
            .uploads_root
            .canonicalize()
            .unwrap_or_else(|_| self.uploads_root.clone());

        let disks = Disks::new_with_refreshed_list();
        let best = disks
            .list()
            .iter()
            .filter(|d| probe.starts_with(d.mount_point()))
            .max_by_key(|d| d.mount_point().as_os_str().len())
            .ok_or_else(|| {
                StorageError::ConfigError(format!(
                    "No disk found for uploads root {}",
                    probe.display()
                ))
            })?;

        let total = best.total_space();
        let free = best.available_space();
        Ok(DiskStats {
            total,
            used: total.saturating_sub(free),
            free,
        })
    }

    fn validate_name(blob_name: &str) -> StorageResult<()> {
        if blob_name.is_empty()
            || blob_name.contains("..")
            || blob_name.contains('/')
            || blob_name.contains('\\')
        {
            return Err(StorageError::InvalidName(blob_name.to_string()));
        }
        Ok(())
    }

    async fn remove_if_present(path: &Path) -> StorageResult<bool> {
        if !fs::try_exists(path).await.unwrap_or(false) {
            return Ok(false);
        }
        fs::remove_file(path).await.map_err(|e| {
            StorageError::DeleteFailed(format!("Failed to delete {}: {}", path.display(), e))
        })?;
        tracing::debug!(path = %path.display(), "Deleted blob file");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn volume() -> (tempfile::TempDir, BlobVolume) {
        let dir = tempdir().unwrap();
        let vol = BlobVolume::new(dir.path().join("uploads"), dir.path().join("thumbnails"))
            .await
            .unwrap();
        (dir, vol)
    }

    #[test]
    fn test_allocate_blob_name_keeps_extension() {
        let name = BlobVolume::allocate_blob_name("Holiday Photo.JPG");
        assert!(name.ends_with(".jpg"));
        assert!(!name.contains("Holiday"));

        let bare = BlobVolume::allocate_blob_name("README");
        assert!(!bare.contains('.'));
    }

    #[test]
    fn test_allocate_blob_name_is_unique() {
        let a = BlobVolume::allocate_blob_name("a.png");
        let b = BlobVolume::allocate_blob_name("a.png");
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let (_dir, vol) = volume().await;
        assert!(matches!(
            vol.original_path("../../etc/passwd"),
            Err(StorageError::InvalidName(_))
        ));
        assert!(matches!(
            vol.delete_original("a/b.png").await,
            Err(StorageError::InvalidName(_))
        ));
    }

    #[tokio::test]
    async fn test_thumbnail_convention() {
        let (_dir, vol) = volume().await;

        let image = vol
            .thumbnail_path("abc.png", ResourceKind::Image)
            .unwrap()
            .unwrap();
        assert!(image.ends_with("thumbnails/abc.png"));

        let video = vol
            .thumbnail_path("abc.mp4", ResourceKind::Video)
            .unwrap()
            .unwrap();
        assert!(video.ends_with("thumbnails/abc.jpg"));

        assert!(vol
            .thumbnail_path("abc.pdf", ResourceKind::File)
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_delete_original_tolerates_missing() {
        let (_dir, vol) = volume().await;
        assert!(!vol.delete_original("nonexistent.png").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_thumbnail_falls_back_to_jpg_stem() {
        let (_dir, vol) = volume().await;

        // Video thumbnail stored under the .jpg stem, not the original name.
        let jpg = vol
            .thumbnail_path("clip.mp4", ResourceKind::Video)
            .unwrap()
            .unwrap();
        tokio::fs::write(&jpg, b"thumb").await.unwrap();

        assert!(vol.delete_thumbnail("clip.mp4").await.unwrap());
        assert!(!tokio::fs::try_exists(&jpg).await.unwrap());
    }

    #[tokio::test]
    async fn test_blob_size_and_exists() {
        let (_dir, vol) = volume().await;
        let path = vol.original_path("blob.bin").unwrap();
        tokio::fs::write(&path, vec![0u8; 1234]).await.unwrap();

        assert!(vol.blob_exists("blob.bin").await);
        assert_eq!(vol.blob_size("blob.bin").await.unwrap(), 1234);

        assert!(vol.delete_original("blob.bin").await.unwrap());
        assert!(!vol.blob_exists("blob.bin").await);
    }

    #[tokio::test]
    async fn test_disk_stats_reports_capacity() {
        let (_dir, vol) = volume().await;
        let stats = vol.disk_stats().unwrap();
        assert!(stats.total > 0);
        assert_eq!(stats.used, stats.total - stats.free);
    }
}
