use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[cfg(feature = "sqlx")]
use sqlx::FromRow;

/// Resource kind enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "resource_kind", rename_all = "UPPERCASE")
)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResourceKind {
    Image,
    Video,
    Audio,
    File,
}

impl ResourceKind {
    /// Kinds for which the transcoder produces a thumbnail. Derived files for
    /// a video carry a `.jpg` extension; images reuse the original filename.
    pub fn has_thumbnail(self) -> bool {
        matches!(self, ResourceKind::Image | ResourceKind::Video)
    }
}

/// An uploaded file with ownership and sharing metadata.
///
/// A non-null `trashed_at` means the resource sits in the trash: hidden from
/// normal listings and excluded from quota sums until restored or purged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(FromRow))]
pub struct Resource {
    pub id: i64,
    pub creator_id: i64,
    pub kind: ResourceKind,
    pub display_name: String,
    /// Path of the original blob relative to the uploads root. Always a
    /// generated name, never the user-supplied one.
    pub blob_path: String,
    pub byte_size: i64,
    pub captured_at: Option<DateTime<Utc>>,
    pub uploaded_at: DateTime<Utc>,
    pub trashed_at: Option<DateTime<Utc>>,
    pub favorite: bool,
}

impl Resource {
    pub fn is_trashed(&self) -> bool {
        self.trashed_at.is_some()
    }
}

/// Parameters for completing a chunked upload.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewUpload {
    #[validate(length(min = 1, max = 255))]
    pub display_name: String,
    #[validate(range(min = 1))]
    pub total_chunks: u32,
    pub kind: ResourceKind,
    pub target_album: Option<i64>,
    /// Overwrite an existing resource with the same name in the same place.
    #[serde(default)]
    pub replace: bool,
    pub captured_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn test_new_upload_rejects_empty_name() {
        let upload = NewUpload {
            display_name: String::new(),
            total_chunks: 3,
            kind: ResourceKind::Image,
            target_album: None,
            replace: false,
            captured_at: None,
        };
        assert!(upload.validate().is_err());
    }

    #[test]
    fn test_new_upload_rejects_zero_chunks() {
        let upload = NewUpload {
            display_name: "photo.jpg".into(),
            total_chunks: 0,
            kind: ResourceKind::Image,
            target_album: None,
            replace: false,
            captured_at: None,
        };
        assert!(upload.validate().is_err());
    }

    #[test]
    fn test_thumbnail_kinds() {
        assert!(ResourceKind::Image.has_thumbnail());
        assert!(ResourceKind::Video.has_thumbnail());
        assert!(!ResourceKind::Audio.has_thumbnail());
        assert!(!ResourceKind::File.has_thumbnail());
    }

    #[test]
    fn test_kind_serde_uppercase() {
        assert_eq!(
            serde_json::to_string(&ResourceKind::Image).unwrap(),
            "\"IMAGE\""
        );
        let kind: ResourceKind = serde_json::from_str("\"VIDEO\"").unwrap();
        assert_eq!(kind, ResourceKind::Video);
    }
}
