//! Domain models shared across all Cumulus components.

pub mod album;
pub mod person;
pub mod quota;
pub mod resource;
pub mod share;

pub use album::{Album, AlbumInvitation, AlbumRole, AlbumView, Membership, NewAlbum};
pub use person::{Person, PersonUsage};
pub use quota::{DiskStats, QuotaOverview, QuotaUsage};
pub use resource::{NewUpload, Resource, ResourceKind};
pub use share::{ShareRequest, ShareState, SharedResource};
