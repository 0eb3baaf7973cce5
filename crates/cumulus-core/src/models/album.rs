use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[cfg(feature = "sqlx")]
use sqlx::FromRow;

/// Per-member role within an album.
///
/// Exactly one CREATOR exists per album, assigned atomically at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "album_role", rename_all = "UPPERCASE")
)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlbumRole {
    Creator,
    Admin,
    Collaborator,
}

impl AlbumRole {
    /// Roles allowed to create subfolders, move the album, and invite members.
    pub fn can_manage(self) -> bool {
        matches!(self, AlbumRole::Creator | AlbumRole::Admin)
    }
}

/// A hierarchical folder-like grouping of resources.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(FromRow))]
pub struct Album {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    /// Stored parent. `None` means a true root of the forest.
    pub parent_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// An album as one member sees it.
///
/// `parent_id` here is the *effective* parent: when the stored parent is an
/// album the viewer cannot see, the entry is presented as a top-level folder.
#[derive(Debug, Clone, Serialize)]
pub struct AlbumView {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<i64>,
    pub role: AlbumRole,
    pub created_at: DateTime<Utc>,
}

/// (album, person) membership row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(FromRow))]
pub struct Membership {
    pub album_id: i64,
    pub person_id: i64,
    pub role: AlbumRole,
    pub joined_at: DateTime<Utc>,
}

/// A pending invitation; at most one per (album, invitee) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(FromRow))]
pub struct AlbumInvitation {
    pub album_id: i64,
    pub inviter_id: i64,
    pub invitee_id: i64,
    pub role: AlbumRole,
    pub created_at: DateTime<Utc>,
}

/// Parameters for creating an album.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewAlbum {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(max = 1024))]
    pub description: Option<String>,
    pub parent_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn test_role_management_rights() {
        assert!(AlbumRole::Creator.can_manage());
        assert!(AlbumRole::Admin.can_manage());
        assert!(!AlbumRole::Collaborator.can_manage());
    }

    #[test]
    fn test_new_album_name_bounds() {
        let album = NewAlbum {
            name: String::new(),
            description: None,
            parent_id: None,
        };
        assert!(album.validate().is_err());

        let album = NewAlbum {
            name: "Summer 2025".into(),
            description: Some("Trip photos".into()),
            parent_id: Some(9),
        };
        assert!(album.validate().is_ok());
    }

    #[test]
    fn test_role_serde_uppercase() {
        assert_eq!(
            serde_json::to_string(&AlbumRole::Collaborator).unwrap(),
            "\"COLLABORATOR\""
        );
    }
}
