//! Upload ingestion pipeline.
//!
//! Chunks are staged in a session directory, assembled under a generated
//! blob name, admitted against the quota, and committed to the Catalog in a
//! single transaction. Any failure after assembly removes the assembled file
//! so the volume never accumulates blobs the Catalog does not know about.

use std::sync::Arc;

use bytes::Bytes;
use uuid::Uuid;
use validator::Validate;

use cumulus_core::{
    models::{NewUpload, Resource},
    AppError,
};
use cumulus_db::{AlbumRepository, IngestRequest, ResourceRepository};
use cumulus_storage::{BlobVolume, ChunkSessionStore, StorageError};

use crate::cleanup::DeletionQueue;
use crate::transcoder::Thumbnailer;

pub struct UploadPipeline {
    chunks: ChunkSessionStore,
    volume: BlobVolume,
    resources: ResourceRepository,
    albums: AlbumRepository,
    deletions: DeletionQueue,
    thumbnailer: Arc<dyn Thumbnailer>,
}

impl UploadPipeline {
    pub fn new(
        chunks: ChunkSessionStore,
        volume: BlobVolume,
        resources: ResourceRepository,
        albums: AlbumRepository,
        deletions: DeletionQueue,
        thumbnailer: Arc<dyn Thumbnailer>,
    ) -> Self {
        Self {
            chunks,
            volume,
            resources,
            albums,
            deletions,
            thumbnailer,
        }
    }

    pub async fn init_session(&self) -> Result<Uuid, AppError> {
        self.chunks.init_session().await.map_err(storage_error)
    }

    /// Stage one chunk. Safe to call again with the same index after a
    /// network failure.
    pub async fn store_chunk(
        &self,
        session: Uuid,
        index: u32,
        data: Bytes,
    ) -> Result<(), AppError> {
        match self.chunks.store_chunk(session, index, data).await {
            Ok(()) => Ok(()),
            Err(StorageError::SessionNotFound(id)) => {
                Err(AppError::NotFound(format!("Upload session {}", id)))
            }
            Err(e) => Err(storage_error(e)),
        }
    }

    pub async fn discard_session(&self, session: Uuid) -> Result<(), AppError> {
        self.chunks.discard(session).await.map_err(storage_error)
    }

    /// Finish a chunked upload and hand back the committed resource.
    #[tracing::instrument(skip(self, upload), fields(user_id = person_id, session = %session))]
    pub async fn complete_upload(
        &self,
        person_id: i64,
        session: Uuid,
        upload: NewUpload,
    ) -> Result<Resource, AppError> {
        upload.validate()?;

        // Placing into an album requires membership, checked up front so a
        // rejected caller costs no assembly work.
        if let Some(album_id) = upload.target_album {
            self.albums
                .get(album_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Album {}", album_id)))?;
            if self.albums.role_of(album_id, person_id).await?.is_none() {
                return Err(AppError::InsufficientRole(format!(
                    "Not a member of album {}",
                    album_id
                )));
            }
        }

        let blob_name = BlobVolume::allocate_blob_name(&upload.display_name);
        let dest = self.volume.original_path(&blob_name).map_err(storage_error)?;

        // A missing chunk leaves the session intact so the client re-sends
        // just that part. Everything else consumes the session.
        let byte_size = match self
            .chunks
            .assemble_into(session, upload.total_chunks, &dest)
            .await
        {
            Ok(n) => n as i64,
            Err(StorageError::MissingChunk { index }) => {
                return Err(AppError::IncompleteUpload {
                    missing_index: index,
                })
            }
            Err(StorageError::SessionNotFound(id)) => {
                return Err(AppError::NotFound(format!("Upload session {}", id)))
            }
            Err(e) => return Err(storage_error(e)),
        };

        // Physical ceiling, regardless of the user's logical cap.
        match self.volume.disk_stats() {
            Ok(disk) if (byte_size as u64) > disk.free => {
                let _ = self.volume.delete_original(&blob_name).await;
                return Err(AppError::CapacityExceeded(format!(
                    "{} bytes requested, {} free on volume",
                    byte_size, disk.free
                )));
            }
            Ok(_) => {}
            Err(e) => {
                let _ = self.volume.delete_original(&blob_name).await;
                return Err(storage_error(e));
            }
        }

        let outcome = self
            .resources
            .ingest(IngestRequest {
                creator_id: person_id,
                display_name: upload.display_name,
                kind: upload.kind,
                blob_path: blob_name.clone(),
                byte_size,
                target_album: upload.target_album,
                replace: upload.replace,
                captured_at: upload.captured_at,
            })
            .await;

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                // No orphan blobs: the Catalog rejected it, the file goes.
                let _ = self.volume.delete_original(&blob_name).await;
                return Err(e);
            }
        };

        if let Some(old_blob) = outcome.replaced_blob {
            self.deletions.enqueue(old_blob);
        }

        self.request_thumbnail(&outcome.resource);

        tracing::info!(
            resource_id = outcome.resource.id,
            byte_size,
            "Upload committed"
        );
        Ok(outcome.resource)
    }

    /// Fire-and-forget: a transcoder failure is logged, never surfaced.
    fn request_thumbnail(&self, resource: &Resource) {
        if !resource.kind.has_thumbnail() {
            return;
        }

        let original = match self.volume.original_path(&resource.blob_path) {
            Ok(p) => p,
            Err(_) => return,
        };
        let thumbnail = match self.volume.thumbnail_path(&resource.blob_path, resource.kind) {
            Ok(Some(p)) => p,
            _ => return,
        };

        let thumbnailer = Arc::clone(&self.thumbnailer);
        let kind = resource.kind;
        let resource_id = resource.id;
        tokio::spawn(async move {
            if let Err(e) = thumbnailer
                .generate_thumbnail(&original, &thumbnail, kind)
                .await
            {
                tracing::warn!(error = %e, resource_id, "Thumbnail generation failed");
            }
        });
    }
}

fn storage_error(e: StorageError) -> AppError {
    AppError::Storage(e.to_string())
}

/// Periodically sweep upload sessions nobody finished. Runs until aborted.
pub fn start_session_reaper(
    chunks: ChunkSessionStore,
    ttl: std::time::Duration,
    interval_secs: u64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(std::time::Duration::from_secs(interval_secs));

        loop {
            tick.tick().await;
            match chunks.reap_stale(ttl).await {
                Ok(0) => {}
                Ok(reaped) => tracing::info!(reaped, "Reaped stale upload sessions"),
                Err(e) => tracing::error!(error = %e, "Session reap failed"),
            }
        }
    })
}
