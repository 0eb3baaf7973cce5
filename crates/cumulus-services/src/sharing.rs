//! Sharing state machine.
//!
//! `NONE -> PENDING -> {ACCEPTED, REJECTED}` for strangers; friends skip
//! PENDING and get an access grant in one step. Every transition and its
//! access-row side effect commit together in the repository layer.

use cumulus_core::{
    models::{ShareRequest, ShareState, SharedResource},
    AppError,
};
use cumulus_db::{ResourceRepository, ShareRepository};

pub struct SharingService {
    shares: ShareRepository,
    resources: ResourceRepository,
}

impl SharingService {
    pub fn new(shares: ShareRepository, resources: ResourceRepository) -> Self {
        Self { shares, resources }
    }

    /// Offer a resource to someone. The sender needs access themselves;
    /// friendship decides between an instant grant and a pending request.
    pub async fn request_share(
        &self,
        sender_id: i64,
        receiver_id: i64,
        resource_id: i64,
    ) -> Result<ShareState, AppError> {
        if sender_id == receiver_id {
            return Err(AppError::InvalidInput("Cannot share with yourself".into()));
        }

        self.resources
            .get(resource_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Resource {}", resource_id)))?;

        if !self.resources.has_access(resource_id, sender_id).await? {
            return Err(AppError::NotOwner(format!(
                "No access to resource {}",
                resource_id
            )));
        }

        if self.resources.has_access(resource_id, receiver_id).await? {
            return Err(AppError::AlreadyShared(format!(
                "Person {} already has access",
                receiver_id
            )));
        }

        if self.shares.are_friends(sender_id, receiver_id).await? {
            if !self
                .shares
                .direct_grant(resource_id, sender_id, receiver_id)
                .await?
            {
                return Err(AppError::AlreadyShared(format!(
                    "Resource {} was already shared with person {}",
                    resource_id, receiver_id
                )));
            }
            tracing::info!(resource_id, sender_id, receiver_id, "Shared with friend");
            return Ok(ShareState::Accepted);
        }

        match self
            .shares
            .get_request(resource_id, sender_id, receiver_id)
            .await?
        {
            None => {
                self.shares
                    .insert_pending(resource_id, sender_id, receiver_id)
                    .await?;
            }
            Some(existing) if existing.state == ShareState::Rejected => {
                // A rejected offer may be made again.
                self.shares
                    .reopen(resource_id, sender_id, receiver_id)
                    .await?;
            }
            Some(existing) if existing.state == ShareState::Accepted => {
                return Err(AppError::AlreadyShared(format!(
                    "Resource {} was already shared with person {}",
                    resource_id, receiver_id
                )));
            }
            Some(_) => {
                return Err(AppError::AlreadyPending(format!(
                    "A request for resource {} is already open",
                    resource_id
                )));
            }
        }

        tracing::info!(resource_id, sender_id, receiver_id, "Share request opened");
        Ok(ShareState::Pending)
    }

    /// Resolve a pending request. Anything not currently PENDING is
    /// `NotFound` as far as the receiver can tell.
    pub async fn respond_share(
        &self,
        receiver_id: i64,
        resource_id: i64,
        sender_id: i64,
        accept: bool,
    ) -> Result<(), AppError> {
        if !self
            .shares
            .resolve(resource_id, sender_id, receiver_id, accept)
            .await?
        {
            return Err(AppError::NotFound(format!(
                "No pending request for resource {}",
                resource_id
            )));
        }
        Ok(())
    }

    pub async fn pending_for(&self, receiver_id: i64) -> Result<Vec<ShareRequest>, AppError> {
        self.shares.pending_for(receiver_id).await
    }

    pub async fn shared_with(&self, receiver_id: i64) -> Result<Vec<SharedResource>, AppError> {
        self.shares.shared_with(receiver_id).await
    }

    /// Take one person's access away. Creator only; the creator's own row
    /// is not revocable this way.
    pub async fn revoke_access(
        &self,
        owner_id: i64,
        resource_id: i64,
        person_id: i64,
    ) -> Result<(), AppError> {
        let resource = self
            .resources
            .get(resource_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Resource {}", resource_id)))?;
        if resource.creator_id != owner_id {
            return Err(AppError::NotOwner(format!(
                "Resource {} belongs to someone else",
                resource_id
            )));
        }
        if person_id == owner_id {
            return Err(AppError::InvalidInput(
                "Use delete to give up your own access".into(),
            ));
        }

        self.resources.revoke_access(resource_id, person_id).await?;
        Ok(())
    }

    /// Take everyone's access away except the creator's.
    pub async fn revoke_all(&self, creator_id: i64, resource_id: i64) -> Result<u64, AppError> {
        let resource = self
            .resources
            .get(resource_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Resource {}", resource_id)))?;
        if resource.creator_id != creator_id {
            return Err(AppError::NotOwner(format!(
                "Resource {} belongs to someone else",
                resource_id
            )));
        }

        let revoked = self
            .resources
            .revoke_all_except(resource_id, creator_id)
            .await?;
        tracing::info!(resource_id, revoked, "Revoked all shared access");
        Ok(revoked)
    }
}
