//! Album hierarchy manager: role-gated operations over the album forest.

use cumulus_core::{
    models::{Album, AlbumInvitation, AlbumRole, AlbumView, Membership, NewAlbum, Resource},
    AppError,
};
use cumulus_db::{AlbumRepository, MembershipRepository, OrphanedBlob, ResourceRepository};
use validator::Validate;

use crate::cleanup::DeletionQueue;

pub struct AlbumService {
    albums: AlbumRepository,
    members: MembershipRepository,
    resources: ResourceRepository,
    deletions: DeletionQueue,
}

impl AlbumService {
    pub fn new(
        albums: AlbumRepository,
        members: MembershipRepository,
        resources: ResourceRepository,
        deletions: DeletionQueue,
    ) -> Self {
        Self {
            albums,
            members,
            resources,
            deletions,
        }
    }

    async fn require_role(&self, album_id: i64, person_id: i64) -> Result<AlbumRole, AppError> {
        self.albums
            .get(album_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Album {}", album_id)))?;
        self.albums
            .role_of(album_id, person_id)
            .await?
            .ok_or_else(|| {
                AppError::InsufficientRole(format!("Not a member of album {}", album_id))
            })
    }

    async fn require_manager(&self, album_id: i64, person_id: i64) -> Result<AlbumRole, AppError> {
        let role = self.require_role(album_id, person_id).await?;
        if !role.can_manage() {
            return Err(AppError::InsufficientRole(format!(
                "Collaborators cannot manage album {}",
                album_id
            )));
        }
        Ok(role)
    }

    /// Create an album. A parent requires CREATOR or ADMIN on the parent;
    /// the caller becomes CREATOR of the new album atomically.
    pub async fn create(&self, person_id: i64, album: NewAlbum) -> Result<Album, AppError> {
        album.validate()?;

        if let Some(parent) = album.parent_id {
            self.require_manager(parent, person_id).await?;
        }

        self.albums
            .create(
                person_id,
                &album.name,
                album.description.as_deref(),
                album.parent_id,
            )
            .await
    }

    /// Reparent an album. The cycle check runs inside the repository's
    /// transaction; a move into the album's own subtree comes back as
    /// `CyclicMove`.
    pub async fn move_album(
        &self,
        person_id: i64,
        album_id: i64,
        new_parent: Option<i64>,
    ) -> Result<Album, AppError> {
        self.require_manager(album_id, person_id).await?;
        if let Some(parent) = new_parent {
            self.require_role(parent, person_id).await?;
        }
        self.albums.move_album(album_id, new_parent).await
    }

    /// Every album the person belongs to, with stored parents rewritten so
    /// invisible ancestors never leak.
    pub async fn list_for_user(&self, person_id: i64) -> Result<Vec<AlbumView>, AppError> {
        self.albums.list_for_user(person_id).await
    }

    pub async fn list_resources(
        &self,
        person_id: i64,
        album_id: i64,
    ) -> Result<Vec<Resource>, AppError> {
        self.require_role(album_id, person_id).await?;
        self.albums.list_resources(album_id).await
    }

    /// Resources in the person's root: accessible, unlinked, not trashed.
    pub async fn list_root(&self, person_id: i64) -> Result<Vec<Resource>, AppError> {
        self.resources.list_root_for(person_id).await
    }

    pub async fn members(
        &self,
        person_id: i64,
        album_id: i64,
    ) -> Result<Vec<Membership>, AppError> {
        self.require_role(album_id, person_id).await?;
        self.members.members_of(album_id).await
    }

    /// Delete the album and its whole subtree. CREATOR only. Resources that
    /// end up with an empty access set lose their Catalog rows in the same
    /// transaction and their files via the deletion queue afterwards.
    pub async fn recursive_delete(
        &self,
        person_id: i64,
        album_id: i64,
    ) -> Result<Vec<OrphanedBlob>, AppError> {
        let role = self.require_role(album_id, person_id).await?;
        if role != AlbumRole::Creator {
            return Err(AppError::InsufficientRole(
                "Only the creator can delete an album".into(),
            ));
        }

        let orphans = self.albums.recursive_delete(person_id, album_id).await?;
        for orphan in &orphans {
            self.deletions.enqueue(orphan.blob_path.clone());
        }
        Ok(orphans)
    }

    /// Change a member's role. Collaborators change nothing; admins cannot
    /// touch admins or the creator; nobody reassigns CREATOR.
    pub async fn change_role(
        &self,
        actor_id: i64,
        target_id: i64,
        album_id: i64,
        new_role: AlbumRole,
    ) -> Result<(), AppError> {
        if new_role == AlbumRole::Creator {
            return Err(AppError::InvalidInput(
                "The creator role is assigned at creation only".into(),
            ));
        }

        let actor_role = self.require_manager(album_id, actor_id).await?;
        let target_role = self
            .albums
            .role_of(album_id, target_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Person {} is not a member", target_id))
            })?;

        if target_role == AlbumRole::Creator {
            return Err(AppError::InsufficientRole(
                "The creator's role cannot be changed".into(),
            ));
        }
        if actor_role == AlbumRole::Admin && target_role == AlbumRole::Admin {
            return Err(AppError::InsufficientRole(
                "Admins cannot change other admins".into(),
            ));
        }

        self.members.change_role(album_id, target_id, new_role).await?;
        Ok(())
    }

    /// Invite someone. One open invitation per (album, invitee).
    pub async fn invite(
        &self,
        actor_id: i64,
        invitee_id: i64,
        album_id: i64,
        role: AlbumRole,
    ) -> Result<(), AppError> {
        if role == AlbumRole::Creator {
            return Err(AppError::InvalidInput(
                "Cannot invite someone as creator".into(),
            ));
        }

        self.require_manager(album_id, actor_id).await?;

        if self.albums.role_of(album_id, invitee_id).await?.is_some() {
            return Err(AppError::InvalidInput(format!(
                "Person {} is already a member",
                invitee_id
            )));
        }

        if !self
            .members
            .invite(album_id, actor_id, invitee_id, role)
            .await?
        {
            return Err(AppError::AlreadyPending(format!(
                "Person {} is already invited to album {}",
                invitee_id, album_id
            )));
        }
        Ok(())
    }

    /// Invitations waiting on the person, newest first.
    pub async fn invitations(&self, person_id: i64) -> Result<Vec<AlbumInvitation>, AppError> {
        self.members.invitations_for(person_id).await
    }

    /// Accepting turns the invitation into a membership atomically;
    /// rejecting just drops it.
    pub async fn respond_invitation(
        &self,
        invitee_id: i64,
        album_id: i64,
        accept: bool,
    ) -> Result<(), AppError> {
        let resolved = if accept {
            self.members
                .accept_invitation(album_id, invitee_id)
                .await?
                .is_some()
        } else {
            self.members.reject_invitation(album_id, invitee_id).await?
        };

        if !resolved {
            return Err(AppError::NotFound(format!(
                "No invitation to album {}",
                album_id
            )));
        }
        Ok(())
    }

    /// Link an owned resource into an album the owner is a member of.
    pub async fn add_resource(
        &self,
        person_id: i64,
        resource_id: i64,
        album_id: i64,
    ) -> Result<(), AppError> {
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

        self.require_role(album_id, person_id).await?;
        self.albums.add_resource_link(resource_id, album_id).await?;
        Ok(())
    }

    /// Unlink a resource. Allowed for the resource owner and for album
    /// managers.
    pub async fn remove_resource(
        &self,
        person_id: i64,
        resource_id: i64,
        album_id: i64,
    ) -> Result<(), AppError> {
        let resource = self
            .resources
            .get(resource_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Resource {}", resource_id)))?;

        if resource.creator_id != person_id {
            let role = self.require_role(album_id, person_id).await?;
            if !role.can_manage() {
                return Err(AppError::InsufficientRole(
                    "Only managers may remove someone else's resource".into(),
                ));
            }
        }

        if !self
            .albums
            .remove_resource_link(resource_id, album_id)
            .await?
        {
            return Err(AppError::NotFound(format!(
                "Resource {} is not in album {}",
                resource_id, album_id
            )));
        }
        Ok(())
    }

    /// Batch re-link owned resources to `dest` (None = the owner's root).
    pub async fn move_resources(
        &self,
        person_id: i64,
        resource_ids: &[i64],
        dest: Option<i64>,
    ) -> Result<(), AppError> {
        if let Some(album_id) = dest {
            self.require_role(album_id, person_id).await?;
        }

        for &id in resource_ids {
            let resource = self
                .resources
                .get(id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Resource {}", id)))?;
            if resource.creator_id != person_id {
                return Err(AppError::NotOwner(format!(
                    "Resource {} belongs to someone else",
                    id
                )));
            }
        }

        self.albums.relink_resources(resource_ids, dest).await
    }

    /// A non-creator member exits the album.
    pub async fn leave(&self, person_id: i64, album_id: i64) -> Result<(), AppError> {
        let role = self.require_role(album_id, person_id).await?;
        if role == AlbumRole::Creator {
            return Err(AppError::InvalidInput(
                "The creator cannot leave; delete the album instead".into(),
            ));
        }
        self.members.remove_member(album_id, person_id).await?;
        Ok(())
    }
}
