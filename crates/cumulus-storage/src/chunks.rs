//! Chunked upload sessions.
//!
//! Each session is a directory of `part_{index}` files under the chunk
//! temp dir, named by a server-issued session id. Chunks arrive in any
//! order and may be re-sent; completion verifies every part is present
//! before a single byte is assembled, so a failed completion leaves the
//! session intact for retry.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};

#[derive(Clone)]
pub struct ChunkSessionStore {
    temp_dir: PathBuf,
}

impl ChunkSessionStore {
    pub async fn new(temp_dir: impl Into<PathBuf>) -> StorageResult<Self> {
        let temp_dir = temp_dir.into();
        fs::create_dir_all(&temp_dir).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create chunk temp dir {}: {}",
                temp_dir.display(),
                e
            ))
        })?;
        Ok(ChunkSessionStore { temp_dir })
    }

    /// Open a new session and return its id.
    pub async fn init_session(&self) -> StorageResult<Uuid> {
        let session_id = Uuid::new_v4();
        fs::create_dir(self.session_dir(session_id)).await?;
        tracing::debug!(session_id = %session_id, "Opened upload session");
        Ok(session_id)
    }

    /// Persist one chunk. Re-sending an index overwrites the previous copy,
    /// so retries after a network failure are harmless.
    pub async fn store_chunk(
        &self,
        session_id: Uuid,
        index: u32,
        data: Bytes,
    ) -> StorageResult<()> {
        let dir = self.session_dir(session_id);
        if !fs::try_exists(&dir).await.unwrap_or(false) {
            return Err(StorageError::SessionNotFound(session_id));
        }

        let mut file = fs::File::create(dir.join(Self::part_name(index))).await?;
        file.write_all(&data).await?;
        file.flush().await?;
        Ok(())
    }

    /// Concatenate all parts into `dest`, in index order, then remove the
    /// session.
    ///
    /// Presence of every part is verified first; a missing chunk aborts
    /// before `dest` is touched and keeps the session on disk so the client
    /// can re-send just that chunk. Total bytes written are returned.
    pub async fn assemble_into(
        &self,
        session_id: Uuid,
        total_chunks: u32,
        dest: &Path,
    ) -> StorageResult<u64> {
        let dir = self.session_dir(session_id);
        if !fs::try_exists(&dir).await.unwrap_or(false) {
            return Err(StorageError::SessionNotFound(session_id));
        }

        for index in 0..total_chunks {
            let part = dir.join(Self::part_name(index));
            if !fs::try_exists(&part).await.unwrap_or(false) {
                return Err(StorageError::MissingChunk { index });
            }
        }

        let result = self.concatenate(&dir, total_chunks, dest).await;
        if result.is_err() {
            // Assembly already consumed the session either way.
            let _ = fs::remove_file(dest).await;
        }
        let _ = fs::remove_dir_all(&dir).await;
        result
    }

    /// Drop a session and everything it holds.
    pub async fn discard(&self, session_id: Uuid) -> StorageResult<()> {
        let dir = self.session_dir(session_id);
        if fs::try_exists(&dir).await.unwrap_or(false) {
            fs::remove_dir_all(&dir).await?;
            tracing::debug!(session_id = %session_id, "Discarded upload session");
        }
        Ok(())
    }

    /// Remove sessions whose directory has not been touched within `ttl`.
    /// Returns how many were reaped.
    pub async fn reap_stale(&self, ttl: Duration) -> StorageResult<u64> {
        let cutoff = SystemTime::now() - ttl;
        let mut reaped = 0u64;

        let mut entries = fs::read_dir(&self.temp_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            // Non-session directories in the temp dir are left alone.
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if Uuid::parse_str(&name).is_err() {
                continue;
            }

            let modified = entry.metadata().await?.modified()?;
            if modified < cutoff {
                fs::remove_dir_all(entry.path()).await?;
                reaped += 1;
                tracing::info!(session = %name, "Reaped stale upload session");
            }
        }

        Ok(reaped)
    }

    async fn concatenate(
        &self,
        dir: &Path,
        total_chunks: u32,
        dest: &Path,
    ) -> StorageResult<u64> {
        let mut out = fs::File::create(dest).await?;
        let mut written = 0u64;
        for index in 0..total_chunks {
            let mut part = fs::File::open(dir.join(Self::part_name(index))).await?;
            written += tokio::io::copy(&mut part, &mut out).await?;
        }
        out.flush().await?;
        Ok(written)
    }

    fn session_dir(&self, session_id: Uuid) -> PathBuf {
        self.temp_dir.join(session_id.to_string())
    }

    fn part_name(index: u32) -> String {
        format!("part_{}", index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn store() -> (tempfile::TempDir, ChunkSessionStore) {
        let dir = tempdir().unwrap();
        let store = ChunkSessionStore::new(dir.path().join("chunks"))
            .await
            .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_assemble_in_index_order() {
        let (dir, store) = store().await;
        let session = store.init_session().await.unwrap();

        // Out-of-order arrival.
        store
            .store_chunk(session, 2, Bytes::from_static(b"!"))
            .await
            .unwrap();
        store
            .store_chunk(session, 0, Bytes::from_static(b"hello "))
            .await
            .unwrap();
        store
            .store_chunk(session, 1, Bytes::from_static(b"world"))
            .await
            .unwrap();

        let dest = dir.path().join("out.bin");
        let written = store.assemble_into(session, 3, &dest).await.unwrap();

        assert_eq!(written, 12);
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), b"hello world!");
        // Session is gone after assembly.
        assert!(matches!(
            store.store_chunk(session, 0, Bytes::new()).await,
            Err(StorageError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_chunk_keeps_session_for_retry() {
        let (dir, store) = store().await;
        let session = store.init_session().await.unwrap();
        store
            .store_chunk(session, 0, Bytes::from_static(b"aa"))
            .await
            .unwrap();
        store
            .store_chunk(session, 2, Bytes::from_static(b"cc"))
            .await
            .unwrap();

        let dest = dir.path().join("out.bin");
        let err = store.assemble_into(session, 3, &dest).await.unwrap_err();
        assert!(matches!(err, StorageError::MissingChunk { index: 1 }));
        assert!(!tokio::fs::try_exists(&dest).await.unwrap());

        // The session survived, so the client only re-sends chunk 1.
        store
            .store_chunk(session, 1, Bytes::from_static(b"bb"))
            .await
            .unwrap();
        store.assemble_into(session, 3, &dest).await.unwrap();
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), b"aabbcc");
    }

    #[tokio::test]
    async fn test_resent_chunk_overwrites() {
        let (dir, store) = store().await;
        let session = store.init_session().await.unwrap();

        store
            .store_chunk(session, 0, Bytes::from_static(b"first"))
            .await
            .unwrap();
        store
            .store_chunk(session, 0, Bytes::from_static(b"second"))
            .await
            .unwrap();

        let dest = dir.path().join("out.bin");
        store.assemble_into(session, 1, &dest).await.unwrap();
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_store_chunk_unknown_session() {
        let (_dir, store) = store().await;
        let err = store
            .store_chunk(Uuid::new_v4(), 0, Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn test_discard_is_idempotent() {
        let (_dir, store) = store().await;
        let session = store.init_session().await.unwrap();
        store.discard(session).await.unwrap();
        store.discard(session).await.unwrap();
    }

    #[tokio::test]
    async fn test_reap_stale_only_removes_old_sessions() {
        let (_dir, store) = store().await;
        let fresh = store.init_session().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        // ttl of zero reaps everything already on disk.
        let reaped = store.reap_stale(Duration::from_secs(0)).await.unwrap();
        assert_eq!(reaped, 1);

        let fresh2 = store.init_session().await.unwrap();
        let reaped = store.reap_stale(Duration::from_secs(3600)).await.unwrap();
        assert_eq!(reaped, 0);
        store
            .store_chunk(fresh2, 0, Bytes::from_static(b"x"))
            .await
            .unwrap();

        let _ = fresh;
    }
}
