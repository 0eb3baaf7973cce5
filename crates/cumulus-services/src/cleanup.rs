//! Post-commit physical deletion.
//!
//! Catalog commits are authoritative. Blob and thumbnail removal never runs
//! in the request path: callers enqueue the blob name after their commit and
//! a single worker task drains the queue, deleting best-effort. A lost item
//! costs disk space, never consistency.

use cumulus_storage::BlobVolume;
use tokio::sync::mpsc;

/// One blob whose physical files should go away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDeletion {
    pub blob_path: String,
}

/// Sending half of the deletion queue, cloned into every service that
/// retires blobs.
#[derive(Clone)]
pub struct DeletionQueue {
    tx: mpsc::UnboundedSender<PendingDeletion>,
}

impl DeletionQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PendingDeletion>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueue a blob for deletion. Failure means the worker is gone; the
    /// blob stays on disk and the next purge-style sweep can pick it up.
    pub fn enqueue(&self, blob_path: impl Into<String>) {
        let item = PendingDeletion {
            blob_path: blob_path.into(),
        };
        if self.tx.send(item).is_err() {
            tracing::warn!("Deletion queue receiver is gone, blob left on disk");
        }
    }
}

/// Drain the queue until every sender is dropped.
pub fn start_deletion_worker(
    volume: BlobVolume,
    mut rx: mpsc::UnboundedReceiver<PendingDeletion>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(item) = rx.recv().await {
            if let Err(e) = volume.delete_original(&item.blob_path).await {
                tracing::error!(error = %e, blob = %item.blob_path, "Failed to delete blob");
            }
            if let Err(e) = volume.delete_thumbnail(&item.blob_path).await {
                tracing::error!(error = %e, blob = %item.blob_path, "Failed to delete thumbnail");
            }
            tracing::debug!(blob = %item.blob_path, "Processed pending deletion");
        }
        tracing::info!("Deletion queue closed, worker exiting");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_worker_deletes_original_and_thumbnail() {
        let dir = tempdir().unwrap();
        let volume = BlobVolume::new(dir.path().join("uploads"), dir.path().join("thumbnails"))
            .await
            .unwrap();

        let original = volume.original_path("gone.png").unwrap();
        tokio::fs::write(&original, b"data").await.unwrap();
        let thumb = dir.path().join("thumbnails/gone.png");
        tokio::fs::write(&thumb, b"thumb").await.unwrap();

        let (queue, rx) = DeletionQueue::new();
        let handle = start_deletion_worker(volume, rx);

        queue.enqueue("gone.png");
        drop(queue);
        handle.await.unwrap();

        assert!(!tokio::fs::try_exists(&original).await.unwrap());
        assert!(!tokio::fs::try_exists(&thumb).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_files_are_not_an_error() {
        let dir = tempdir().unwrap();
        let volume = BlobVolume::new(dir.path().join("uploads"), dir.path().join("thumbnails"))
            .await
            .unwrap();

        let (queue, rx) = DeletionQueue::new();
        let handle = start_deletion_worker(volume, rx);
        queue.enqueue("never-existed.png");
        drop(queue);
        handle.await.unwrap();
    }
}
