use cumulus_core::{
    models::{AlbumInvitation, AlbumRole, Membership},
    AppError,
};
use sqlx::{PgPool, Postgres};

use crate::db::transaction::TransactionGuard;

/// Repository for album memberships and invitations
#[derive(Clone)]
pub struct MembershipRepository {
    pool: PgPool,
}

impl MembershipRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self), fields(db.table = "album_members", db.operation = "select"))]
    pub async fn members_of(&self, album_id: i64) -> Result<Vec<Membership>, AppError> {
        let members = sqlx::query_as::<Postgres, Membership>(
            "SELECT album_id, person_id, role, joined_at FROM album_members \
             WHERE album_id = $1 ORDER BY joined_at ASC",
        )
        .bind(album_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(members)
    }

    #[tracing::instrument(skip(self), fields(db.table = "album_members", db.operation = "update"))]
    pub async fn change_role(
        &self,
        album_id: i64,
        person_id: i64,
        role: AlbumRole,
    ) -> Result<bool, AppError> {
        let rows = sqlx::query(
            "UPDATE album_members SET role = $1 WHERE album_id = $2 AND person_id = $3",
        )
        .bind(role)
        .bind(album_id)
        .bind(person_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows > 0)
    }

    #[tracing::instrument(skip(self), fields(db.table = "album_members", db.operation = "delete"))]
    pub async fn remove_member(&self, album_id: i64, person_id: i64) -> Result<bool, AppError> {
        let rows = sqlx::query("DELETE FROM album_members WHERE album_id = $1 AND person_id = $2")
            .bind(album_id)
            .bind(person_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows > 0)
    }

    /// Insert an invitation. Returns false when one is already open for this
    /// (album, invitee) pair.
    #[tracing::instrument(skip(self), fields(db.table = "album_invitations", db.operation = "insert"))]
    pub async fn invite(
        &self,
        album_id: i64,
        inviter_id: i64,
        invitee_id: i64,
        role: AlbumRole,
    ) -> Result<bool, AppError> {
        let rows = sqlx::query(
            "INSERT INTO album_invitations (album_id, inviter_id, invitee_id, role) \
             VALUES ($1, $2, $3, $4) ON CONFLICT DO NOTHING",
        )
        .bind(album_id)
        .bind(inviter_id)
        .bind(invitee_id)
        .bind(role)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows > 0)
    }

    #[tracing::instrument(skip(self), fields(db.table = "album_invitations", db.operation = "select"))]
    pub async fn invitations_for(
        &self,
        invitee_id: i64,
    ) -> Result<Vec<AlbumInvitation>, AppError> {
        let invitations = sqlx::query_as::<Postgres, AlbumInvitation>(
            "SELECT album_id, inviter_id, invitee_id, role, created_at \
             FROM album_invitations WHERE invitee_id = $1 ORDER BY created_at DESC",
        )
        .bind(invitee_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(invitations)
    }

    /// Accept: the invitation row becomes a membership with the proposed
    /// role, atomically. Returns the granted role, or None when no
    /// invitation was open.
    #[tracing::instrument(skip(self), fields(db.table = "album_invitations", db.operation = "delete"))]
    pub async fn accept_invitation(
        &self,
        album_id: i64,
        invitee_id: i64,
    ) -> Result<Option<AlbumRole>, AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;

        let role: Option<AlbumRole> = sqlx::query_scalar(
            "DELETE FROM album_invitations WHERE album_id = $1 AND invitee_id = $2 \
             RETURNING role",
        )
        .bind(album_id)
        .bind(invitee_id)
        .fetch_optional(&mut **tx)
        .await?;

        let Some(role) = role else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query(
            "INSERT INTO album_members (album_id, person_id, role) VALUES ($1, $2, $3) \
             ON CONFLICT (album_id, person_id) DO UPDATE SET role = EXCLUDED.role",
        )
        .bind(album_id)
        .bind(invitee_id)
        .bind(role)
        .execute(&mut **tx)
        .await?;

        tx.commit().await?;
        Ok(Some(role))
    }

    #[tracing::instrument(skip(self), fields(db.table = "album_invitations", db.operation = "delete"))]
    pub async fn reject_invitation(
        &self,
        album_id: i64,
        invitee_id: i64,
    ) -> Result<bool, AppError> {
        let rows =
            sqlx::query("DELETE FROM album_invitations WHERE album_id = $1 AND invitee_id = $2")
                .bind(album_id)
                .bind(invitee_id)
                .execute(&self.pool)
                .await?
                .rows_affected();

        Ok(rows > 0)
    }
}
