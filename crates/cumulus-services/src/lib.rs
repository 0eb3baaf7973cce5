//! Cumulus Services Layer
//!
//! Business orchestration over the Catalog repositories and the blob volume:
//! upload ingestion, quota admission, the album hierarchy, trash lifecycle,
//! sharing, and the background jobs that keep disk and Catalog in step. An
//! edge layer (HTTP or otherwise) is expected to sit on top of this facade.

pub mod albums;
pub mod cleanup;
pub mod metadata;
pub mod quota;
pub mod sharing;
pub mod transcoder;
pub mod trash;
pub mod upload;

pub use albums::AlbumService;
pub use cleanup::{start_deletion_worker, DeletionQueue, PendingDeletion};
pub use metadata::MetadataService;
pub use quota::QuotaLedger;
pub use sharing::SharingService;
pub use transcoder::{NoopThumbnailer, Thumbnailer};
pub use trash::{PurgeSummary, TrashPurger, TrashService};
pub use upload::{start_session_reaper, UploadPipeline};
