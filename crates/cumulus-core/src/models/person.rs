use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "sqlx")]
use sqlx::FromRow;

/// An account known to the store. Identity (authentication) is handled by an
/// external provider; the store only trusts the id it is handed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(FromRow))]
pub struct Person {
    pub id: i64,
    pub display_name: String,
    pub email: String,
    /// Logical byte allowance. `None` = unlimited, still subject to the
    /// physical free space of the volume.
    pub storage_cap: Option<i64>,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// Per-user usage row for the admin overview.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "sqlx", derive(FromRow))]
pub struct PersonUsage {
    pub person_id: i64,
    pub display_name: String,
    pub storage_cap: Option<i64>,
    pub used_bytes: i64,
}
