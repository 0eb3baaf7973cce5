//! Database repositories for the Catalog.
//!
//! Each repository owns the SQL for one aggregate and takes an injected
//! `PgPool`; multi-statement mutations go through `TransactionGuard` so a
//! failure anywhere rolls the whole mutation back.

pub mod catalog;
pub mod transaction;

pub use catalog::{
    AlbumRepository, IngestOutcome, IngestRequest, MembershipRepository, OrphanedBlob,
    QuotaRepository, ResourceRepository, ShareRepository, TrashRepository,
};
pub use transaction::TransactionGuard;
