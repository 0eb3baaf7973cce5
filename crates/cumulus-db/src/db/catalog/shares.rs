use cumulus_core::{
    models::{ShareRequest, ShareState, SharedResource},
    AppError,
};
use sqlx::{PgPool, Postgres};

use crate::db::transaction::TransactionGuard;

const SHARE_COLUMNS: &str = "resource_id, sender_id, receiver_id, state, created_at";

/// Repository for share requests, access grants that come from them, and the
/// friendship gate
#[derive(Clone)]
pub struct ShareRepository {
    pool: PgPool,
}

impl ShareRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Friendship rows are stored with the smaller id first.
    #[tracing::instrument(skip(self), fields(db.table = "friendships", db.operation = "select"))]
    pub async fn are_friends(&self, a: i64, b: i64) -> Result<bool, AppError> {
        if a == b {
            return Ok(false);
        }
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };

        let accepted: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM friendships \
             WHERE person_a = $1 AND person_b = $2 AND state = 'ACCEPTED')",
        )
        .bind(lo)
        .bind(hi)
        .fetch_one(&self.pool)
        .await?;

        Ok(accepted)
    }

    #[tracing::instrument(skip(self), fields(db.table = "share_requests", db.operation = "select"))]
    pub async fn get_request(
        &self,
        resource_id: i64,
        sender_id: i64,
        receiver_id: i64,
    ) -> Result<Option<ShareRequest>, AppError> {
        let request = sqlx::query_as::<Postgres, ShareRequest>(&format!(
            "SELECT {SHARE_COLUMNS} FROM share_requests \
             WHERE resource_id = $1 AND sender_id = $2 AND receiver_id = $3"
        ))
        .bind(resource_id)
        .bind(sender_id)
        .bind(receiver_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(request)
    }

    /// Open a PENDING request. Returns false when any request already exists
    /// for this (resource, sender, receiver) triple.
    #[tracing::instrument(skip(self), fields(db.table = "share_requests", db.operation = "insert"))]
    pub async fn insert_pending(
        &self,
        resource_id: i64,
        sender_id: i64,
        receiver_id: i64,
    ) -> Result<bool, AppError> {
        let rows = sqlx::query(
            "INSERT INTO share_requests (resource_id, sender_id, receiver_id, state) \
             VALUES ($1, $2, $3, 'PENDING') ON CONFLICT DO NOTHING",
        )
        .bind(resource_id)
        .bind(sender_id)
        .bind(receiver_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows > 0)
    }

    /// A rejected request may be opened again. Returns false when the row is
    /// not in REJECTED state.
    #[tracing::instrument(skip(self), fields(db.table = "share_requests", db.operation = "update"))]
    pub async fn reopen(
        &self,
        resource_id: i64,
        sender_id: i64,
        receiver_id: i64,
    ) -> Result<bool, AppError> {
        let rows = sqlx::query(
            "UPDATE share_requests SET state = 'PENDING', created_at = NOW() \
             WHERE resource_id = $1 AND sender_id = $2 AND receiver_id = $3 \
               AND state = 'REJECTED'",
        )
        .bind(resource_id)
        .bind(sender_id)
        .bind(receiver_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows > 0)
    }

    /// Friend-to-friend share: record the request as ACCEPTED and grant
    /// access in the same transaction, skipping PENDING entirely.
    #[tracing::instrument(skip(self), fields(db.table = "share_requests", db.operation = "insert"))]
    pub async fn direct_grant(
        &self,
        resource_id: i64,
        sender_id: i64,
        receiver_id: i64,
    ) -> Result<bool, AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;

        let rows = sqlx::query(
            "INSERT INTO share_requests (resource_id, sender_id, receiver_id, state) \
             VALUES ($1, $2, $3, 'ACCEPTED') ON CONFLICT DO NOTHING",
        )
        .bind(resource_id)
        .bind(sender_id)
        .bind(receiver_id)
        .execute(&mut **tx)
        .await?
        .rows_affected();

        if rows == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO resource_access (resource_id, person_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(resource_id)
        .bind(receiver_id)
        .execute(&mut **tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Resolve a PENDING request. Accepting inserts the access row in the
    /// same transaction. Returns false when nothing was pending.
    #[tracing::instrument(skip(self), fields(db.table = "share_requests", db.operation = "update"))]
    pub async fn resolve(
        &self,
        resource_id: i64,
        sender_id: i64,
        receiver_id: i64,
        accept: bool,
    ) -> Result<bool, AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;

        let next = if accept {
            ShareState::Accepted
        } else {
            ShareState::Rejected
        };

        let rows = sqlx::query(
            "UPDATE share_requests SET state = $1 \
             WHERE resource_id = $2 AND sender_id = $3 AND receiver_id = $4 \
               AND state = 'PENDING'",
        )
        .bind(next)
        .bind(resource_id)
        .bind(sender_id)
        .bind(receiver_id)
        .execute(&mut **tx)
        .await?
        .rows_affected();

        if rows == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        if accept {
            sqlx::query(
                "INSERT INTO resource_access (resource_id, person_id) VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(resource_id)
            .bind(receiver_id)
            .execute(&mut **tx)
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    #[tracing::instrument(skip(self), fields(db.table = "share_requests", db.operation = "select"))]
    pub async fn pending_for(&self, receiver_id: i64) -> Result<Vec<ShareRequest>, AppError> {
        let requests = sqlx::query_as::<Postgres, ShareRequest>(&format!(
            "SELECT {SHARE_COLUMNS} FROM share_requests \
             WHERE receiver_id = $1 AND state = 'PENDING' ORDER BY created_at DESC"
        ))
        .bind(receiver_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(requests)
    }

    /// Resources shared with the person, with who sent them. Trashed
    /// resources disappear from this listing like any other.
    #[tracing::instrument(skip(self), fields(db.table = "share_requests", db.operation = "select"))]
    pub async fn shared_with(&self, receiver_id: i64) -> Result<Vec<SharedResource>, AppError> {
        let shared = sqlx::query_as::<Postgres, SharedResource>(
            "SELECT r.id AS resource_id, r.kind, r.display_name, r.byte_size, \
                    sr.sender_id, p.display_name AS sender_name, sr.created_at AS shared_at \
             FROM share_requests sr \
             JOIN resources r ON r.id = sr.resource_id \
             JOIN persons p ON p.id = sr.sender_id \
             WHERE sr.receiver_id = $1 AND sr.state = 'ACCEPTED' AND r.trashed_at IS NULL \
             ORDER BY sr.created_at DESC",
        )
        .bind(receiver_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(shared)
    }
}
