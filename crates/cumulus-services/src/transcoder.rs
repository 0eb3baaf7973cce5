//! Seam to the external media transcoder.
//!
//! Thumbnail generation is someone else's job. The pipeline only knows where
//! the original sits and where the thumbnail should land, and it never lets
//! a transcoder failure fail an upload.

use std::path::Path;

use async_trait::async_trait;
use cumulus_core::models::ResourceKind;

#[async_trait]
pub trait Thumbnailer: Send + Sync {
    /// Produce a thumbnail for `original` at `thumbnail`.
    async fn generate_thumbnail(
        &self,
        original: &Path,
        thumbnail: &Path,
        kind: ResourceKind,
    ) -> anyhow::Result<()>;
}

/// Default implementation that generates nothing. Used in tests and in
/// deployments where a separate process watches the uploads directory.
pub struct NoopThumbnailer;

#[async_trait]
impl Thumbnailer for NoopThumbnailer {
    async fn generate_thumbnail(
        &self,
        original: &Path,
        thumbnail: &Path,
        kind: ResourceKind,
    ) -> anyhow::Result<()> {
        tracing::debug!(
            original = %original.display(),
            thumbnail = %thumbnail.display(),
            ?kind,
            "Thumbnail generation skipped"
        );
        Ok(())
    }
}
