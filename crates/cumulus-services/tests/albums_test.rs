//! Album hierarchy integration tests: role gates, cyclic moves, recursive
//! delete, and the listings around them.
//!
//! Requires Docker for testcontainers.

mod helpers;

use cumulus_core::models::{AlbumRole, NewAlbum};
use cumulus_core::AppError;
use cumulus_db::{AlbumRepository, MembershipRepository, ResourceRepository};
use cumulus_services::{AlbumService, DeletionQueue, PendingDeletion};
use tokio::sync::mpsc;

fn album_service(pool: &sqlx::PgPool) -> (AlbumService, mpsc::UnboundedReceiver<PendingDeletion>) {
    let (deletions, rx) = DeletionQueue::new();
    let service = AlbumService::new(
        AlbumRepository::new(pool.clone()),
        MembershipRepository::new(pool.clone()),
        ResourceRepository::new(pool.clone()),
        deletions,
    );
    (service, rx)
}

fn new_album(name: &str, parent: Option<i64>) -> NewAlbum {
    NewAlbum {
        name: name.into(),
        description: None,
        parent_id: parent,
    }
}

async fn add_member(
    service: &AlbumService,
    creator: i64,
    album: i64,
    person: i64,
    role: AlbumRole,
) {
    service.invite(creator, person, album, role).await.unwrap();
    service.respond_invitation(person, album, true).await.unwrap();
}

#[tokio::test]
async fn test_collaborator_cannot_change_roles() {
    let db = helpers::setup_db().await;
    let creator = helpers::insert_person(&db.pool, "creator", None).await;
    let collab = helpers::insert_person(&db.pool, "collab", None).await;
    let target = helpers::insert_person(&db.pool, "target", None).await;
    let (service, _rx) = album_service(&db.pool);

    let album = service
        .create(creator, new_album("Family", None))
        .await
        .unwrap();
    add_member(&service, creator, album.id, collab, AlbumRole::Collaborator).await;
    add_member(&service, creator, album.id, target, AlbumRole::Collaborator).await;

    let err = service
        .change_role(collab, target, album.id, AlbumRole::Admin)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientRole(_)));

    // An admin cannot touch the creator either.
    let admin = helpers::insert_person(&db.pool, "admin", None).await;
    add_member(&service, creator, album.id, admin, AlbumRole::Admin).await;
    let err = service
        .change_role(admin, creator, album.id, AlbumRole::Collaborator)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientRole(_)));

    // The creator can.
    service
        .change_role(creator, target, album.id, AlbumRole::Admin)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_move_into_own_subtree_is_rejected() {
    let db = helpers::setup_db().await;
    let creator = helpers::insert_person(&db.pool, "mover", None).await;
    let (service, _rx) = album_service(&db.pool);

    let parent = service
        .create(creator, new_album("Parent", None))
        .await
        .unwrap();
    let child = service
        .create(creator, new_album("Child", Some(parent.id)))
        .await
        .unwrap();
    let grandchild = service
        .create(creator, new_album("Grandchild", Some(child.id)))
        .await
        .unwrap();

    let err = service
        .move_album(creator, parent.id, Some(grandchild.id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::CyclicMove(_)));

    let err = service
        .move_album(creator, parent.id, Some(parent.id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::CyclicMove(_)));

    // Hoisting a child to the root is fine.
    let moved = service.move_album(creator, child.id, None).await.unwrap();
    assert_eq!(moved.parent_id, None);
}

#[tokio::test]
async fn test_recursive_delete_orphans_unshared_resources() {
    let db = helpers::setup_db().await;
    let creator = helpers::insert_person(&db.pool, "owner", None).await;
    let outsider = helpers::insert_person(&db.pool, "outsider", None).await;
    let resources = ResourceRepository::new(db.pool.clone());
    let (service, mut rx) = album_service(&db.pool);

    let top = service
        .create(creator, new_album("Trips", None))
        .await
        .unwrap();
    let nested = service
        .create(creator, new_album("Lisbon", Some(top.id)))
        .await
        .unwrap();

    let orphaned = helpers::ingest_file(&resources, creator, "alley.jpg", 10, Some(nested.id)).await;
    let shared = helpers::ingest_file(&resources, creator, "tram.jpg", 10, Some(nested.id)).await;
    assert!(resources.grant_access(shared.id, outsider).await.unwrap());

    // Only the creator may trigger the recursive destruction.
    let err = service.recursive_delete(outsider, top.id).await.unwrap_err();
    assert!(matches!(err, AppError::InsufficientRole(_)));

    let orphans = service.recursive_delete(creator, top.id).await.unwrap();
    assert_eq!(orphans.len(), 1);
    assert_eq!(orphans[0].resource_id, orphaned.id);

    // The orphan's row is gone and its blob is queued; the shared resource
    // survives with the outsider's access intact.
    assert!(resources.get(orphaned.id).await.unwrap().is_none());
    assert!(resources.get(shared.id).await.unwrap().is_some());
    assert!(resources.has_access(shared.id, outsider).await.unwrap());

    let queued = rx.try_recv().expect("queued deletion");
    assert_eq!(queued.blob_path, orphaned.blob_path);

    let albums = AlbumRepository::new(db.pool.clone());
    assert!(albums.get(top.id).await.unwrap().is_none());
    assert!(albums.get(nested.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_invitation_and_root_listings() {
    let db = helpers::setup_db().await;
    let creator = helpers::insert_person(&db.pool, "host", None).await;
    let guest = helpers::insert_person(&db.pool, "guest", None).await;
    let resources = ResourceRepository::new(db.pool.clone());
    let (service, _rx) = album_service(&db.pool);

    let album = service
        .create(creator, new_album("Shared wall", None))
        .await
        .unwrap();
    service
        .invite(creator, guest, album.id, AlbumRole::Collaborator)
        .await
        .unwrap();

    let open = service.invitations(guest).await.unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].album_id, album.id);

    service.respond_invitation(guest, album.id, true).await.unwrap();
    assert!(service.invitations(guest).await.unwrap().is_empty());

    // Root shows accessible, unlinked resources only.
    let loose = helpers::ingest_file(&resources, creator, "loose.jpg", 5, None).await;
    helpers::ingest_file(&resources, creator, "filed.jpg", 5, Some(album.id)).await;

    let root = service.list_root(creator).await.unwrap();
    assert_eq!(root.len(), 1);
    assert_eq!(root[0].id, loose.id);

    service.add_resource(creator, loose.id, album.id).await.unwrap();
    assert!(service.list_root(creator).await.unwrap().is_empty());
}
