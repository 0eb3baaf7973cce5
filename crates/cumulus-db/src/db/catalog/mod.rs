//! Catalog repositories, one per aggregate.

pub mod albums;
pub mod members;
pub mod quotas;
pub mod resources;
pub mod shares;
pub mod trash;

pub use albums::{AlbumRepository, OrphanedBlob};
pub use members::MembershipRepository;
pub use quotas::QuotaRepository;
pub use resources::{IngestOutcome, IngestRequest, ResourceRepository};
pub use shares::ShareRepository;
pub use trash::TrashRepository;
