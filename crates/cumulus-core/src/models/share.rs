use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "sqlx")]
use sqlx::FromRow;

use super::resource::ResourceKind;

/// Lifecycle of a share request: `NONE -> PENDING -> {ACCEPTED, REJECTED}`.
/// Friend-to-friend shares skip PENDING entirely and materialize an access
/// grant directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "share_state", rename_all = "UPPERCASE")
)]
#[serde(rename_all = "UPPERCASE")]
pub enum ShareState {
    Pending,
    Accepted,
    Rejected,
}

impl ShareState {
    /// Only a pending request may be resolved; resolving anything else is a
    /// NOT_FOUND as far as the caller is concerned.
    pub fn is_resolvable(self) -> bool {
        self == ShareState::Pending
    }
}

/// A share request between two people over one resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(FromRow))]
pub struct ShareRequest {
    pub resource_id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub state: ShareState,
    pub created_at: DateTime<Utc>,
}

/// Listing row for "shared with me": the resource plus who shared it.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "sqlx", derive(FromRow))]
pub struct SharedResource {
    pub resource_id: i64,
    pub kind: ResourceKind,
    pub display_name: String,
    pub byte_size: i64,
    pub sender_id: i64,
    pub sender_name: String,
    pub shared_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_pending_is_resolvable() {
        assert!(ShareState::Pending.is_resolvable());
        assert!(!ShareState::Accepted.is_resolvable());
        assert!(!ShareState::Rejected.is_resolvable());
    }
}
