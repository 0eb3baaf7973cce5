//! Cumulus Storage Library
//!
//! Filesystem-backed blob storage: the uploads/thumbnails volume and the
//! chunked upload session store. The Catalog (database) is authoritative;
//! everything here tolerates files that are already gone.

pub mod chunks;
pub mod error;
pub mod volume;

pub use chunks::ChunkSessionStore;
pub use error::{StorageError, StorageResult};
pub use volume::BlobVolume;
