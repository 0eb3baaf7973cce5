//! Resource metadata edits: favorite flag, display name, capture date.

use chrono::{DateTime, Utc};

use cumulus_core::{models::Resource, AppError};
use cumulus_db::ResourceRepository;

use crate::cleanup::DeletionQueue;

pub struct MetadataService {
    resources: ResourceRepository,
    deletions: DeletionQueue,
}

impl MetadataService {
    pub fn new(resources: ResourceRepository, deletions: DeletionQueue) -> Self {
        Self {
            resources,
            deletions,
        }
    }

    pub async fn set_favorite(
        &self,
        person_id: i64,
        resource_id: i64,
        favorite: bool,
    ) -> Result<(), AppError> {
        self.require_owned(person_id, resource_id).await?;
        self.resources.set_favorite(resource_id, favorite).await?;
        Ok(())
    }

    /// Rename with the same duplicate rules as upload: a clash in the same
    /// place is rejected, unless `replace` retires the clashing resource.
    pub async fn rename(
        &self,
        person_id: i64,
        resource_id: i64,
        new_name: &str,
        replace: bool,
    ) -> Result<Resource, AppError> {
        if new_name.is_empty() || new_name.len() > 255 {
            return Err(AppError::InvalidInput(
                "Display name must be 1..=255 characters".into(),
            ));
        }

        self.require_owned(person_id, resource_id).await?;

        let album = self.resources.linked_album(resource_id).await?;
        if let Some(clash) = self
            .resources
            .find_duplicate(person_id, new_name, album)
            .await?
        {
            if clash.id != resource_id {
                if !replace {
                    return Err(AppError::DuplicateName(new_name.to_string()));
                }
                if let Some(blob) = self.resources.delete_row(clash.id).await? {
                    self.deletions.enqueue(blob);
                }
            }
        }

        self.resources.update_display_name(resource_id, new_name).await
    }

    pub async fn set_captured_at(
        &self,
        person_id: i64,
        resource_id: i64,
        captured_at: Option<DateTime<Utc>>,
    ) -> Result<(), AppError> {
        self.require_owned(person_id, resource_id).await?;
        self.resources
            .set_captured_at(resource_id, captured_at)
            .await?;
        Ok(())
    }

    async fn require_owned(&self, person_id: i64, resource_id: i64) -> Result<(), AppError> {
        let resource = self
            .resources
            .get(resource_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Resource {}", resource_id)))?;
        if resource.creator_id != person_id {
            return Err(AppError::NotOwner(format!(
                "Resource {} belongs to someone else",
                resource_id
            )));
        }
        Ok(())
    }
}
