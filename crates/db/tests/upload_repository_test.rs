//! Integration tests for the upload repository against in-memory SQLite.

use carhome_core::upload::{
    ActivityAction, FileType, ListingRef, ListingType, NewActivity, NewUploadedFile,
    PrimaryPolicy, UploadError, UploadRepository as _,
};
use carhome_db::entities::{sea_orm_active_enums, upload_activities, uploaded_files};
use carhome_db::{ListingRepository, UploadRepository, create_schema};
use carhome_shared::types::PageRequest;
use carhome_shared::types::id::FileId;
use chrono::{DateTime, Duration, Utc};
use rstest::rstest;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, Set,
};

/// Single-connection pool so every query sees the same in-memory database.
async fn test_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options)
        .await
        .expect("Failed to open SQLite");
    create_schema(&db).await.expect("Failed to create schema");
    db
}

async fn setup() -> (DatabaseConnection, UploadRepository, ListingRef) {
    let db = test_db().await;
    let listing = ListingRef::new(ListingType::House, "101");
    ListingRepository::new(db.clone())
        .upsert(&listing, "seller-1", "Three bedroom house")
        .await
        .expect("Failed to create listing");
    let repo = UploadRepository::new(db.clone());
    (db, repo, listing)
}

fn new_file(
    listing: &ListingRef,
    owner: &str,
    primary: PrimaryPolicy,
    created_at: DateTime<Utc>,
) -> NewUploadedFile {
    let id = FileId::new();
    NewUploadedFile {
        id,
        owner_uid: owner.to_string(),
        listing: listing.clone(),
        file_type: FileType::Image,
        original_filename: "front.jpg".to_string(),
        storage_key: format!("uploads/2024/01/01/{id}.jpg"),
        thumbnail_key: Some(format!("thumbnails/2024/01/01/thumb_{id}.jpg")),
        primary,
        file_size: 1024,
        mime_type: "image/jpeg".to_string(),
        width: Some(800),
        height: Some(600),
        created_at,
    }
}

async fn primary_count(db: &DatabaseConnection, listing: &ListingRef) -> u64 {
    uploaded_files::Entity::find()
        .filter(uploaded_files::Column::ListingId.eq(listing.listing_id.as_str()))
        .filter(uploaded_files::Column::IsPrimary.eq(true))
        .count(db)
        .await
        .expect("count primaries")
}

#[tokio::test]
async fn test_create_and_find() {
    let (_db, repo, listing) = setup().await;
    let input = new_file(&listing, "alice", PrimaryPolicy::Never, Utc::now());
    let id = input.id;

    let created = repo.create(input).await.expect("create");
    assert_eq!(created.id, id);
    assert_eq!(created.listing(), listing);
    assert!(!created.is_primary);
    assert_eq!(created.width, Some(800));

    let found = repo.find_by_id(id).await.expect("find").expect("exists");
    assert_eq!(found.id, created.id);
    assert_eq!(found.storage_key, created.storage_key);
    assert_eq!(found.thumbnail_key, created.thumbnail_key);
    assert!(repo.find_by_id(FileId::new()).await.expect("find").is_none());
}

#[tokio::test]
async fn test_listing_exists() {
    let (_db, repo, listing) = setup().await;
    assert!(repo.listing_exists(&listing).await.expect("query"));
    assert!(
        !repo
            .listing_exists(&ListingRef::new(ListingType::Car, "101"))
            .await
            .expect("query")
    );
}

#[tokio::test]
async fn test_create_for_missing_listing_fails() {
    let (_db, repo, _listing) = setup().await;
    let missing = ListingRef::new(ListingType::Car, "nope");

    let err = repo
        .create(new_file(&missing, "alice", PrimaryPolicy::Never, Utc::now()))
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::ListingNotFound(_)));
}

#[tokio::test]
async fn test_create_replace_clears_previous_primary() {
    let (db, repo, listing) = setup().await;
    let a = repo
        .create(new_file(&listing, "alice", PrimaryPolicy::Replace, Utc::now()))
        .await
        .expect("create a");
    let b = repo
        .create(new_file(&listing, "alice", PrimaryPolicy::Replace, Utc::now()))
        .await
        .expect("create b");

    assert!(b.is_primary);
    let a_now = repo.find_by_id(a.id).await.unwrap().unwrap();
    assert!(!a_now.is_primary);
    assert_eq!(primary_count(&db, &listing).await, 1);
}

#[tokio::test]
async fn test_create_if_vacant_only_fills_empty_slot() {
    let (db, repo, listing) = setup().await;
    let first = repo
        .create(new_file(&listing, "alice", PrimaryPolicy::IfVacant, Utc::now()))
        .await
        .unwrap();
    let second = repo
        .create(new_file(&listing, "alice", PrimaryPolicy::IfVacant, Utc::now()))
        .await
        .unwrap();

    assert!(first.is_primary);
    assert!(!second.is_primary);
    assert_eq!(primary_count(&db, &listing).await, 1);
}

#[tokio::test]
async fn test_set_primary_swaps_within_listing() {
    let (db, repo, listing) = setup().await;
    let a = repo
        .create(new_file(&listing, "alice", PrimaryPolicy::Never, Utc::now()))
        .await
        .unwrap();
    let first = repo.set_primary(a.id).await.unwrap().expect("file exists");
    assert_eq!(first.previous_primary, None);
    assert!(first.file.is_primary);

    let b = repo
        .create(new_file(&listing, "alice", PrimaryPolicy::Never, Utc::now()))
        .await
        .unwrap();
    let second = repo.set_primary(b.id).await.unwrap().expect("file exists");

    assert_eq!(second.previous_primary, Some(a.id));
    assert!(second.file.is_primary);
    assert!(!repo.find_by_id(a.id).await.unwrap().unwrap().is_primary);
    assert_eq!(primary_count(&db, &listing).await, 1);
}

#[tokio::test]
async fn test_set_primary_on_current_primary_reports_no_previous() {
    let (_db, repo, listing) = setup().await;
    let a = repo
        .create(new_file(&listing, "alice", PrimaryPolicy::Replace, Utc::now()))
        .await
        .unwrap();

    let change = repo.set_primary(a.id).await.unwrap().expect("file exists");
    assert_eq!(change.previous_primary, None);
    assert!(change.file.is_primary);
}

#[tokio::test]
async fn test_set_primary_leaves_other_listings_alone() {
    let (db, repo, listing) = setup().await;
    let other = ListingRef::new(ListingType::Car, "7");
    ListingRepository::new(db.clone())
        .upsert(&other, "seller-2", "Hatchback")
        .await
        .unwrap();

    let car_primary = repo
        .create(new_file(&other, "bob", PrimaryPolicy::Replace, Utc::now()))
        .await
        .unwrap();
    let house_file = repo
        .create(new_file(&listing, "alice", PrimaryPolicy::Never, Utc::now()))
        .await
        .unwrap();

    repo.set_primary(house_file.id).await.unwrap();

    assert!(repo.find_by_id(car_primary.id).await.unwrap().unwrap().is_primary);
}

#[tokio::test]
async fn test_set_primary_unknown_file() {
    let (_db, repo, _listing) = setup().await;
    assert!(repo.set_primary(FileId::new()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_set_primary_after_delete_is_none() {
    let (db, repo, listing) = setup().await;
    let keep = repo
        .create(new_file(&listing, "alice", PrimaryPolicy::Replace, Utc::now()))
        .await
        .unwrap();
    let gone = repo
        .create(new_file(&listing, "alice", PrimaryPolicy::Never, Utc::now()))
        .await
        .unwrap();
    assert!(repo.delete(gone.id).await.unwrap());

    assert!(repo.set_primary(gone.id).await.unwrap().is_none());
    assert!(repo.find_by_id(keep.id).await.unwrap().unwrap().is_primary);
    assert_eq!(primary_count(&db, &listing).await, 1);
}

#[tokio::test]
async fn test_set_primary_racing_delete_never_errors() {
    let (db, repo, listing) = setup().await;
    let keep = repo
        .create(new_file(&listing, "alice", PrimaryPolicy::Replace, Utc::now()))
        .await
        .unwrap();
    let target = repo
        .create(new_file(&listing, "alice", PrimaryPolicy::Never, Utc::now()))
        .await
        .unwrap();

    let (swap, deleted) = tokio::join!(repo.set_primary(target.id), repo.delete(target.id));
    let swap = swap.expect("set_primary must not fail on a vanished file");
    assert!(deleted.expect("delete"));

    assert!(repo.find_by_id(target.id).await.unwrap().is_none());
    match swap {
        // Swap won: the deleted file held the flag, so the listing has none.
        Some(change) => {
            assert_eq!(change.previous_primary, Some(keep.id));
            assert_eq!(primary_count(&db, &listing).await, 0);
        }
        None => assert_eq!(primary_count(&db, &listing).await, 1),
    }
}

#[tokio::test]
async fn test_list_by_listing_orders_primary_then_newest() {
    let (_db, repo, listing) = setup().await;
    let base = Utc::now();
    let oldest = repo
        .create(new_file(&listing, "alice", PrimaryPolicy::Never, base))
        .await
        .unwrap();
    let middle = repo
        .create(new_file(
            &listing,
            "alice",
            PrimaryPolicy::Never,
            base + Duration::seconds(1),
        ))
        .await
        .unwrap();
    let newest = repo
        .create(new_file(
            &listing,
            "alice",
            PrimaryPolicy::Never,
            base + Duration::seconds(2),
        ))
        .await
        .unwrap();
    repo.set_primary(oldest.id).await.unwrap();

    let ids: Vec<FileId> = repo
        .list_by_listing(&listing)
        .await
        .unwrap()
        .into_iter()
        .map(|f| f.id)
        .collect();
    assert_eq!(ids, vec![oldest.id, newest.id, middle.id]);
}

#[tokio::test]
async fn test_delete_removes_from_listing() {
    let (_db, repo, listing) = setup().await;
    let file = repo
        .create(new_file(&listing, "alice", PrimaryPolicy::Never, Utc::now()))
        .await
        .unwrap();

    assert!(repo.delete(file.id).await.unwrap());
    assert!(!repo.delete(file.id).await.unwrap());
    assert!(
        repo.list_by_listing(&listing)
            .await
            .unwrap()
            .iter()
            .all(|f| f.id != file.id)
    );
}

#[rstest]
#[case(1, 2, 2)]
#[case(2, 2, 2)]
#[case(3, 2, 1)]
#[case(4, 2, 0)]
#[tokio::test]
async fn test_list_by_owner_pages(
    #[case] page: u32,
    #[case] per_page: u32,
    #[case] expected_len: usize,
) {
    let (_db, repo, listing) = setup().await;
    let base = Utc::now();
    for i in 0..5 {
        repo.create(new_file(
            &listing,
            "alice",
            PrimaryPolicy::Never,
            base + Duration::seconds(i),
        ))
        .await
        .unwrap();
    }
    repo.create(new_file(&listing, "bob", PrimaryPolicy::Never, base))
        .await
        .unwrap();

    let (files, total) = repo
        .list_by_owner("alice", &PageRequest { page, per_page })
        .await
        .unwrap();

    assert_eq!(total, 5);
    assert_eq!(files.len(), expected_len);
    assert!(files.iter().all(|f| f.owner_uid == "alice"));
    assert!(files.windows(2).all(|w| w[0].created_at >= w[1].created_at));
}

#[tokio::test]
async fn test_record_activity() {
    let (db, repo, _listing) = setup().await;
    let file_id = FileId::new();
    repo.record_activity(NewActivity {
        owner_uid: "alice".to_string(),
        action: ActivityAction::SetPrimary,
        file_id: Some(file_id),
        file_name: "front.jpg".to_string(),
        file_size: Some(1024),
        ip_address: Some("203.0.113.9".to_string()),
        user_agent: Some("curl/8.0".to_string()),
    })
    .await
    .expect("record");

    let rows = upload_activities::Entity::find().all(&db).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].action, sea_orm_active_enums::UploadAction::SetPrimary);
    assert_eq!(rows[0].file_id, Some(file_id.into_inner()));
    assert_eq!(rows[0].ip_address.as_deref(), Some("203.0.113.9"));
}

#[tokio::test]
async fn test_unique_index_rejects_second_primary() {
    let (db, repo, listing) = setup().await;
    repo.create(new_file(&listing, "alice", PrimaryPolicy::Replace, Utc::now()))
        .await
        .unwrap();

    let rogue = uploaded_files::ActiveModel {
        id: Set(FileId::new().into_inner()),
        owner_uid: Set("mallory".to_string()),
        listing_type: Set(sea_orm_active_enums::ListingType::House),
        listing_id: Set(listing.listing_id.clone()),
        file_type: Set(sea_orm_active_enums::FileType::Image),
        original_filename: Set("sneaky.jpg".to_string()),
        storage_key: Set("uploads/sneaky.jpg".to_string()),
        thumbnail_key: Set(None),
        is_primary: Set(true),
        file_size: Set(1),
        mime_type: Set("image/jpeg".to_string()),
        width: Set(None),
        height: Set(None),
        created_at: Set(Utc::now().into()),
    };

    assert!(rogue.insert(&db).await.is_err());
    assert_eq!(primary_count(&db, &listing).await, 1);
}

#[tokio::test]
async fn test_interleaved_primary_changes_keep_one_primary() {
    let (db, repo, listing) = setup().await;
    let mut ids = Vec::new();
    for _ in 0..4 {
        ids.push(
            repo.create(new_file(&listing, "alice", PrimaryPolicy::Never, Utc::now()))
                .await
                .unwrap()
                .id,
        );
    }

    let swaps = ids.iter().cycle().take(12).map(|id| repo.set_primary(*id));
    for result in futures::future::join_all(swaps).await {
        result.expect("swap");
    }

    assert_eq!(primary_count(&db, &listing).await, 1);
}
