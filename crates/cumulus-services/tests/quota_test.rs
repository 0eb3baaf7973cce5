//! Quota accounting against a containerized Postgres.
//!
//! Requires Docker for testcontainers.

mod helpers;

use cumulus_core::AppError;
use cumulus_db::{QuotaRepository, ResourceRepository, TrashRepository};
use cumulus_services::QuotaLedger;
use cumulus_storage::BlobVolume;

async fn ledger(pool: &sqlx::PgPool, dir: &tempfile::TempDir) -> QuotaLedger {
    let volume = BlobVolume::new(dir.path().join("uploads"), dir.path().join("thumbnails"))
        .await
        .unwrap();
    QuotaLedger::new(QuotaRepository::new(pool.clone()), volume)
}

#[tokio::test]
async fn test_admission_rejects_past_the_cap() {
    let db = helpers::setup_db().await;
    let user = helpers::insert_person(&db.pool, "ana", Some(100)).await;
    let resources = ResourceRepository::new(db.pool.clone());

    helpers::ingest_file(&resources, user, "holiday.jpg", 60, None).await;

    let err = resources
        .ingest(cumulus_db::IngestRequest {
            creator_id: user,
            display_name: "too-big.jpg".into(),
            kind: cumulus_core::models::ResourceKind::Image,
            blob_path: "too-big.jpg".into(),
            byte_size: 50,
            target_album: None,
            replace: false,
            captured_at: None,
        })
        .await
        .unwrap_err();
    match err {
        AppError::QuotaExceeded {
            used,
            cap,
            requested,
        } => assert_eq!((used, cap, requested), (60, 100, 50)),
        other => panic!("expected QuotaExceeded, got {:?}", other),
    }

    let usage = QuotaRepository::new(db.pool.clone()).usage(user).await.unwrap();
    assert_eq!(usage.used, 60);
}

#[tokio::test]
async fn test_trashing_frees_quota_immediately() {
    let db = helpers::setup_db().await;
    let user = helpers::insert_person(&db.pool, "bea", Some(100)).await;
    let resources = ResourceRepository::new(db.pool.clone());
    let quotas = QuotaRepository::new(db.pool.clone());
    let trash = TrashRepository::new(db.pool.clone());

    let full = helpers::ingest_file(&resources, user, "raw-footage.jpg", 100, None).await;
    assert_eq!(quotas.usage(user).await.unwrap().used, 100);

    assert_eq!(trash.trash_batch(user, &[full.id]).await.unwrap(), 1);
    assert_eq!(quotas.usage(user).await.unwrap().used, 0);

    // The admission seam sees the freed quota too.
    let dir = tempfile::tempdir().unwrap();
    let ledger = ledger(&db.pool, &dir).await;
    ledger.admit(user, 50).await.unwrap();

    // And a fresh upload fits again while the old one sits in the trash.
    helpers::ingest_file(&resources, user, "replacement.jpg", 80, None).await;
    assert_eq!(quotas.usage(user).await.unwrap().used, 80);

    // The admin overview applies the same filter.
    let overview = ledger.overview().await.unwrap();
    let row = overview
        .users
        .iter()
        .find(|u| u.person_id == user)
        .expect("user row in overview");
    assert_eq!(row.used_bytes, 80);
}

#[tokio::test]
async fn test_trash_restore_round_trip() {
    let db = helpers::setup_db().await;
    let user = helpers::insert_person(&db.pool, "chris", None).await;
    let resources = ResourceRepository::new(db.pool.clone());
    let quotas = QuotaRepository::new(db.pool.clone());
    let trash = TrashRepository::new(db.pool.clone());

    let photo = helpers::ingest_file(&resources, user, "pier.jpg", 25, None).await;
    trash.trash_batch(user, &[photo.id]).await.unwrap();
    assert_eq!(trash.list_trash(user).await.unwrap().len(), 1);

    assert!(trash.restore(user, photo.id).await.unwrap());
    assert!(trash.list_trash(user).await.unwrap().is_empty());

    let restored = resources.get(photo.id).await.unwrap().unwrap();
    assert!(restored.trashed_at.is_none());
    assert_eq!(quotas.usage(user).await.unwrap().used, 25);
}

#[tokio::test]
async fn test_set_user_quota_guards() {
    let db = helpers::setup_db().await;
    let user = helpers::insert_person(&db.pool, "dana", None).await;
    let resources = ResourceRepository::new(db.pool.clone());
    helpers::ingest_file(&resources, user, "scan.jpg", 60, None).await;

    let dir = tempfile::tempdir().unwrap();
    let ledger = ledger(&db.pool, &dir).await;

    let err = ledger.set_user_quota(user, Some(40)).await.unwrap_err();
    assert!(matches!(err, AppError::CapacityExceeded(_)));

    let err = ledger.set_user_quota(user, Some(-1)).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));

    ledger.set_user_quota(user, Some(1000)).await.unwrap();

    let (person, usage) = ledger.user_detail(user).await.unwrap();
    assert_eq!(person.id, user);
    assert_eq!(person.storage_cap, Some(1000));
    assert_eq!(usage.used, 60);

    let err = ledger.set_user_quota(999_999, None).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
