//! Sharing state machine integration tests.
//!
//! Requires Docker for testcontainers.

mod helpers;

use cumulus_core::models::ShareState;
use cumulus_core::AppError;
use cumulus_db::{ResourceRepository, ShareRepository};
use cumulus_services::SharingService;

fn sharing_service(pool: &sqlx::PgPool) -> SharingService {
    SharingService::new(
        ShareRepository::new(pool.clone()),
        ResourceRepository::new(pool.clone()),
    )
}

#[tokio::test]
async fn test_pending_share_resolves_exactly_once() {
    let db = helpers::setup_db().await;
    let owner = helpers::insert_person(&db.pool, "owner", None).await;
    let receiver = helpers::insert_person(&db.pool, "receiver", None).await;
    let resources = ResourceRepository::new(db.pool.clone());
    let service = sharing_service(&db.pool);

    let photo = helpers::ingest_file(&resources, owner, "sunset.jpg", 10, None).await;

    // Strangers go through PENDING.
    let state = service.request_share(owner, receiver, photo.id).await.unwrap();
    assert_eq!(state, ShareState::Pending);
    assert_eq!(service.pending_for(receiver).await.unwrap().len(), 1);

    service
        .respond_share(receiver, photo.id, owner, true)
        .await
        .unwrap();
    assert!(resources.has_access(photo.id, receiver).await.unwrap());
    assert_eq!(service.shared_with(receiver).await.unwrap().len(), 1);

    // Nothing is pending anymore, so a second answer has no target.
    let err = service
        .respond_share(receiver, photo.id, owner, true)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_friends_skip_pending() {
    let db = helpers::setup_db().await;
    let owner = helpers::insert_person(&db.pool, "ann", None).await;
    let friend = helpers::insert_person(&db.pool, "ben", None).await;
    helpers::make_friends(&db.pool, owner, friend).await;
    let resources = ResourceRepository::new(db.pool.clone());
    let service = sharing_service(&db.pool);

    let photo = helpers::ingest_file(&resources, owner, "lake.jpg", 10, None).await;

    let state = service.request_share(owner, friend, photo.id).await.unwrap();
    assert_eq!(state, ShareState::Accepted);
    assert!(resources.has_access(photo.id, friend).await.unwrap());
    assert!(service.pending_for(friend).await.unwrap().is_empty());

    let err = service.request_share(owner, friend, photo.id).await.unwrap_err();
    assert!(matches!(err, AppError::AlreadyShared(_)));

    // The creator can pull the grant back.
    assert_eq!(service.revoke_all(owner, photo.id).await.unwrap(), 1);
    assert!(!resources.has_access(photo.id, friend).await.unwrap());
}

#[tokio::test]
async fn test_rejected_request_can_be_reopened() {
    let db = helpers::setup_db().await;
    let owner = helpers::insert_person(&db.pool, "carla", None).await;
    let receiver = helpers::insert_person(&db.pool, "dave", None).await;
    let resources = ResourceRepository::new(db.pool.clone());
    let service = sharing_service(&db.pool);

    let photo = helpers::ingest_file(&resources, owner, "dunes.jpg", 10, None).await;

    service.request_share(owner, receiver, photo.id).await.unwrap();
    service
        .respond_share(receiver, photo.id, owner, false)
        .await
        .unwrap();
    assert!(!resources.has_access(photo.id, receiver).await.unwrap());

    // A rejected offer may be made again and lands back in PENDING.
    let state = service.request_share(owner, receiver, photo.id).await.unwrap();
    assert_eq!(state, ShareState::Pending);
    assert_eq!(service.pending_for(receiver).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_self_share_is_invalid() {
    let db = helpers::setup_db().await;
    let owner = helpers::insert_person(&db.pool, "erin", None).await;
    let resources = ResourceRepository::new(db.pool.clone());
    let service = sharing_service(&db.pool);

    let photo = helpers::ingest_file(&resources, owner, "mirror.jpg", 10, None).await;
    let err = service.request_share(owner, owner, photo.id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
}
