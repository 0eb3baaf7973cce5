use std::collections::HashSet;

use cumulus_core::{
    models::{Album, AlbumRole, AlbumView, Resource},
    tree, AppError,
};
use sqlx::{PgPool, Postgres};

use crate::db::transaction::TransactionGuard;

const ALBUM_COLUMNS: &str = "id, name, description, parent_id, created_at";

/// A resource left with an empty access set by a recursive delete. Its
/// Catalog row is gone; the physical files are the caller's to remove.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrphanedBlob {
    pub resource_id: i64,
    pub blob_path: String,
}

/// Repository for albums, the membership-scoped views over them, and the
/// resource links that place uploads inside them
#[derive(Clone)]
pub struct AlbumRepository {
    pool: PgPool,
}

impl AlbumRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert the album and its CREATOR membership in one transaction, so an
    /// album can never exist without exactly one creator.
    #[tracing::instrument(skip(self), fields(db.table = "albums", db.operation = "insert"))]
    pub async fn create(
        &self,
        creator_id: i64,
        name: &str,
        description: Option<&str>,
        parent_id: Option<i64>,
    ) -> Result<Album, AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;

        let album = sqlx::query_as::<Postgres, Album>(&format!(
            "INSERT INTO albums (name, description, parent_id) \
             VALUES ($1, $2, $3) RETURNING {ALBUM_COLUMNS}"
        ))
        .bind(name)
        .bind(description)
        .bind(parent_id)
        .fetch_one(&mut **tx)
        .await?;

        sqlx::query("INSERT INTO album_members (album_id, person_id, role) VALUES ($1, $2, $3)")
            .bind(album.id)
            .bind(creator_id)
            .bind(AlbumRole::Creator)
            .execute(&mut **tx)
            .await?;

        tx.commit().await?;
        Ok(album)
    }

    #[tracing::instrument(skip(self), fields(db.table = "albums", db.operation = "select", db.record_id = %id))]
    pub async fn get(&self, id: i64) -> Result<Option<Album>, AppError> {
        let album = sqlx::query_as::<Postgres, Album>(&format!(
            "SELECT {ALBUM_COLUMNS} FROM albums WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(album)
    }

    #[tracing::instrument(skip(self), fields(db.table = "album_members", db.operation = "select"))]
    pub async fn role_of(
        &self,
        album_id: i64,
        person_id: i64,
    ) -> Result<Option<AlbumRole>, AppError> {
        let role = sqlx::query_scalar::<Postgres, AlbumRole>(
            "SELECT role FROM album_members WHERE album_id = $1 AND person_id = $2",
        )
        .bind(album_id)
        .bind(person_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(role)
    }

    /// Reparent an album. The cycle check and the update share one
    /// transaction: the moved row and the new parent's ancestor chain are
    /// locked row by row, so a concurrent move cannot sneak a loop past the
    /// walk, and albums outside that chain stay untouched.
    #[tracing::instrument(skip(self), fields(db.table = "albums", db.operation = "update", db.record_id = %album_id))]
    pub async fn move_album(
        &self,
        album_id: i64,
        new_parent: Option<i64>,
    ) -> Result<Album, AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;

        let moved: Option<i64> =
            sqlx::query_scalar("SELECT id FROM albums WHERE id = $1 FOR UPDATE")
                .bind(album_id)
                .fetch_optional(&mut **tx)
                .await?;
        if moved.is_none() {
            return Err(AppError::NotFound(format!("Album {}", album_id)));
        }

        if let Some(parent) = new_parent {
            // Walk upward from the new parent, locking each ancestor before
            // reading its parent. Meeting the moved album means the
            // destination sits inside its own subtree.
            let mut seen = HashSet::new();
            let mut cursor = parent;
            loop {
                if cursor == album_id || !seen.insert(cursor) {
                    return Err(AppError::CyclicMove(format!(
                        "Album {} is inside the subtree of album {}",
                        parent, album_id
                    )));
                }

                let row: Option<Option<i64>> = sqlx::query_scalar(
                    "SELECT parent_id FROM albums WHERE id = $1 FOR UPDATE",
                )
                .bind(cursor)
                .fetch_optional(&mut **tx)
                .await?;

                match row {
                    None => {
                        if cursor == parent {
                            return Err(AppError::NotFound(format!("Album {}", parent)));
                        }
                        break;
                    }
                    Some(None) => break,
                    Some(Some(next)) => cursor = next,
                }
            }
        }

        let album = sqlx::query_as::<Postgres, Album>(&format!(
            "UPDATE albums SET parent_id = $1 WHERE id = $2 RETURNING {ALBUM_COLUMNS}"
        ))
        .bind(new_parent)
        .bind(album_id)
        .fetch_one(&mut **tx)
        .await?;

        tx.commit().await?;
        Ok(album)
    }

    /// Albums the person is a member of, with the stored parent rewritten to
    /// the effective one: a parent the viewer cannot see makes the album a
    /// top-level entry.
    #[tracing::instrument(skip(self), fields(db.table = "albums", db.operation = "select"))]
    pub async fn list_for_user(&self, person_id: i64) -> Result<Vec<AlbumView>, AppError> {
        let rows: Vec<(Album, AlbumRole)> = sqlx::query_as::<
            Postgres,
            (i64, String, Option<String>, Option<i64>, chrono::DateTime<chrono::Utc>, AlbumRole),
        >(
            "SELECT a.id, a.name, a.description, a.parent_id, a.created_at, m.role \
             FROM albums a JOIN album_members m ON m.album_id = a.id \
             WHERE m.person_id = $1 ORDER BY a.name ASC",
        )
        .bind(person_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|(id, name, description, parent_id, created_at, role)| {
            (
                Album {
                    id,
                    name,
                    description,
                    parent_id,
                    created_at,
                },
                role,
            )
        })
        .collect();

        let visible: HashSet<i64> = rows.iter().map(|(a, _)| a.id).collect();

        Ok(rows
            .into_iter()
            .map(|(album, role)| AlbumView {
                id: album.id,
                name: album.name,
                description: album.description,
                parent_id: tree::effective_parent(&visible, album.parent_id),
                role,
                created_at: album.created_at,
            })
            .collect())
    }

    #[tracing::instrument(skip(self), fields(db.table = "resource_albums", db.operation = "select"))]
    pub async fn list_resources(&self, album_id: i64) -> Result<Vec<Resource>, AppError> {
        let resources = sqlx::query_as::<Postgres, Resource>(
            "SELECT r.id, r.creator_id, r.kind, r.display_name, r.blob_path, r.byte_size, \
                    r.captured_at, r.uploaded_at, r.trashed_at, r.favorite \
             FROM resources r JOIN resource_albums ra ON ra.resource_id = r.id \
             WHERE ra.album_id = $1 AND r.trashed_at IS NULL \
             ORDER BY r.uploaded_at DESC",
        )
        .bind(album_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(resources)
    }

    #[tracing::instrument(skip(self), fields(db.table = "resource_albums", db.operation = "insert"))]
    pub async fn add_resource_link(
        &self,
        resource_id: i64,
        album_id: i64,
    ) -> Result<bool, AppError> {
        let rows = sqlx::query(
            "INSERT INTO resource_albums (resource_id, album_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(resource_id)
        .bind(album_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows > 0)
    }

    #[tracing::instrument(skip(self), fields(db.table = "resource_albums", db.operation = "delete"))]
    pub async fn remove_resource_link(
        &self,
        resource_id: i64,
        album_id: i64,
    ) -> Result<bool, AppError> {
        let rows =
            sqlx::query("DELETE FROM resource_albums WHERE resource_id = $1 AND album_id = $2")
                .bind(resource_id)
                .bind(album_id)
                .execute(&self.pool)
                .await?
                .rows_affected();

        Ok(rows > 0)
    }

    /// Batch re-link: drop every link the given resources have and attach
    /// them to `dest` (or leave them at root when `dest` is None), as one
    /// transaction.
    #[tracing::instrument(skip(self, resource_ids), fields(db.table = "resource_albums", db.operation = "update"))]
    pub async fn relink_resources(
        &self,
        resource_ids: &[i64],
        dest: Option<i64>,
    ) -> Result<(), AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;

        sqlx::query("DELETE FROM resource_albums WHERE resource_id = ANY($1)")
            .bind(resource_ids)
            .execute(&mut **tx)
            .await?;

        if let Some(album_id) = dest {
            sqlx::query(
                "INSERT INTO resource_albums (resource_id, album_id) \
                 SELECT unnest($1::bigint[]), $2",
            )
            .bind(resource_ids)
            .bind(album_id)
            .execute(&mut **tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Delete an album and its whole subtree.
    ///
    /// Within one transaction: lock and collect the subtree level by level
    /// with a frontier of ids (only those rows, never the rest of the
    /// forest), drop the actor's access row on every resource linked
    /// anywhere in the set, collect the rows that became orphans, delete
    /// those rows, then delete the albums (members, invitations, and links
    /// cascade). The returned orphans are for post-commit physical deletion
    /// only.
    #[tracing::instrument(skip(self), fields(db.table = "albums", db.operation = "delete", db.record_id = %album_id))]
    pub async fn recursive_delete(
        &self,
        actor_id: i64,
        album_id: i64,
    ) -> Result<Vec<OrphanedBlob>, AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;

        let root: Option<i64> =
            sqlx::query_scalar("SELECT id FROM albums WHERE id = $1 FOR UPDATE")
                .bind(album_id)
                .fetch_optional(&mut **tx)
                .await?;
        if root.is_none() {
            return Err(AppError::NotFound(format!("Album {}", album_id)));
        }

        let mut doomed_set: HashSet<i64> = HashSet::from([album_id]);
        let mut frontier = vec![album_id];
        while !frontier.is_empty() {
            let children: Vec<i64> = sqlx::query_scalar(
                "SELECT id FROM albums WHERE parent_id = ANY($1) FOR UPDATE",
            )
            .bind(&frontier)
            .fetch_all(&mut **tx)
            .await?;

            // The set guards against a malformed parent cycle looping here.
            frontier = children
                .into_iter()
                .filter(|child| doomed_set.insert(*child))
                .collect();
        }
        let doomed: Vec<i64> = doomed_set.into_iter().collect();

        let touched: Vec<i64> = sqlx::query_scalar(
            "SELECT DISTINCT resource_id FROM resource_albums WHERE album_id = ANY($1)",
        )
        .bind(&doomed)
        .fetch_all(&mut **tx)
        .await?;

        sqlx::query(
            "DELETE FROM resource_access WHERE resource_id = ANY($1) AND person_id = $2",
        )
        .bind(&touched)
        .bind(actor_id)
        .execute(&mut **tx)
        .await?;

        let orphans: Vec<OrphanedBlob> = sqlx::query_as(
            "SELECT r.id AS resource_id, r.blob_path FROM resources r \
             WHERE r.id = ANY($1) \
               AND NOT EXISTS (SELECT 1 FROM resource_access a WHERE a.resource_id = r.id)",
        )
        .bind(&touched)
        .fetch_all(&mut **tx)
        .await?;

        let orphan_ids: Vec<i64> = orphans.iter().map(|o| o.resource_id).collect();
        sqlx::query("DELETE FROM resources WHERE id = ANY($1)")
            .bind(&orphan_ids)
            .execute(&mut **tx)
            .await?;

        sqlx::query("DELETE FROM albums WHERE id = ANY($1)")
            .bind(&doomed)
            .execute(&mut **tx)
            .await?;

        tx.commit().await?;
        tracing::info!(
            album_id,
            subtree = doomed.len(),
            orphans = orphans.len(),
            "Recursively deleted album"
        );
        Ok(orphans)
    }
}
