//! Upload repository for database operations.
//!
//! Implements uploaded file persistence using SeaORM. Every change to a
//! listing's primary flag runs in one transaction that first locks the
//! listing row (PostgreSQL), so concurrent swaps on the same listing
//! serialize and the partial unique index is never violated.

use carhome_core::upload::{
    ActivityAction, FileType, ListingRef, ListingType, NewActivity, NewUploadedFile,
    PrimaryChange, PrimaryPolicy, UploadError, UploadRepository as UploadRepoTrait, UploadedFile,
};
use carhome_shared::types::PageRequest;
use carhome_shared::types::id::{ActivityId, FileId};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tracing::debug;

use crate::entities::{
    listings,
    sea_orm_active_enums::{
        FileType as DbFileType, ListingType as DbListingType, UploadAction as DbUploadAction,
    },
    upload_activities, uploaded_files,
};

/// Upload repository implementation.
#[derive(Debug, Clone)]
pub struct UploadRepository {
    db: DatabaseConnection,
}

impl UploadRepository {
    /// Create a new upload repository.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Fetch the listing row inside `txn`, locking it on PostgreSQL.
    async fn lock_listing<C: ConnectionTrait>(
        txn: &C,
        listing: &ListingRef,
    ) -> Result<Option<listings::Model>, DbErr> {
        let query = listings::Entity::find()
            .filter(listings::Column::ListingType.eq(listing.listing_type.as_str()))
            .filter(listings::Column::ListingId.eq(listing.listing_id.as_str()));

        if txn.get_database_backend() == DbBackend::Postgres {
            query.lock_exclusive().one(txn).await
        } else {
            query.one(txn).await
        }
    }

    /// Current primary of a listing.
    async fn current_primary<C: ConnectionTrait>(
        txn: &C,
        listing: &ListingRef,
    ) -> Result<Option<uploaded_files::Model>, DbErr> {
        uploaded_files::Entity::find()
            .filter(listing_filter(listing))
            .filter(uploaded_files::Column::IsPrimary.eq(true))
            .one(txn)
            .await
    }

    /// Clear the primary flag across a listing.
    async fn clear_primary<C: ConnectionTrait>(
        txn: &C,
        listing: &ListingRef,
    ) -> Result<u64, DbErr> {
        let result = uploaded_files::Entity::update_many()
            .col_expr(uploaded_files::Column::IsPrimary, Expr::value(false))
            .filter(listing_filter(listing))
            .filter(uploaded_files::Column::IsPrimary.eq(true))
            .exec(txn)
            .await?;
        Ok(result.rows_affected)
    }
}

impl UploadRepoTrait for UploadRepository {
    async fn listing_exists(&self, listing: &ListingRef) -> Result<bool, UploadError> {
        let count = listings::Entity::find()
            .filter(listings::Column::ListingType.eq(listing.listing_type.as_str()))
            .filter(listings::Column::ListingId.eq(listing.listing_id.as_str()))
            .count(&self.db)
            .await
            .map_err(db_err)?;

        Ok(count > 0)
    }

    async fn create(&self, input: NewUploadedFile) -> Result<UploadedFile, UploadError> {
        let txn = self.db.begin().await.map_err(db_err)?;

        if Self::lock_listing(&txn, &input.listing)
            .await
            .map_err(db_err)?
            .is_none()
        {
            return Err(UploadError::ListingNotFound(input.listing.to_string()));
        }

        let is_primary = match input.primary {
            PrimaryPolicy::Never => false,
            PrimaryPolicy::IfVacant => Self::current_primary(&txn, &input.listing)
                .await
                .map_err(db_err)?
                .is_none(),
            PrimaryPolicy::Replace => {
                let cleared = Self::clear_primary(&txn, &input.listing)
                    .await
                    .map_err(db_err)?;
                debug!(listing = %input.listing, cleared, "Cleared primary before insert");
                true
            }
        };

        let active_model = uploaded_files::ActiveModel {
            id: Set(input.id.into_inner()),
            owner_uid: Set(input.owner_uid),
            listing_type: Set(to_db_listing_type(input.listing.listing_type)),
            listing_id: Set(input.listing.listing_id),
            file_type: Set(to_db_file_type(input.file_type)),
            original_filename: Set(input.original_filename),
            storage_key: Set(input.storage_key),
            thumbnail_key: Set(input.thumbnail_key),
            is_primary: Set(is_primary),
            file_size: Set(input.file_size),
            mime_type: Set(input.mime_type),
            width: Set(input.width),
            height: Set(input.height),
            created_at: Set(input.created_at.into()),
        };

        let model = active_model.insert(&txn).await.map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;

        Ok(to_domain(model))
    }

    async fn find_by_id(&self, id: FileId) -> Result<Option<UploadedFile>, UploadError> {
        let model = uploaded_files::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(db_err)?;

        Ok(model.map(to_domain))
    }

    async fn list_by_listing(&self, listing: &ListingRef) -> Result<Vec<UploadedFile>, UploadError> {
        let models = uploaded_files::Entity::find()
            .filter(listing_filter(listing))
            .order_by_desc(uploaded_files::Column::IsPrimary)
            .order_by_desc(uploaded_files::Column::CreatedAt)
            .order_by_desc(uploaded_files::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        Ok(models.into_iter().map(to_domain).collect())
    }

    async fn list_by_owner(
        &self,
        owner_uid: &str,
        page: &PageRequest,
    ) -> Result<(Vec<UploadedFile>, u64), UploadError> {
        let query = uploaded_files::Entity::find()
            .filter(uploaded_files::Column::OwnerUid.eq(owner_uid));

        let total = query.clone().count(&self.db).await.map_err(db_err)?;

        let models = query
            .order_by_desc(uploaded_files::Column::CreatedAt)
            .order_by_desc(uploaded_files::Column::Id)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await
            .map_err(db_err)?;

        Ok((models.into_iter().map(to_domain).collect(), total))
    }

    async fn delete(&self, id: FileId) -> Result<bool, UploadError> {
        let result = uploaded_files::Entity::delete_by_id(id.into_inner())
            .exec(&self.db)
            .await
            .map_err(db_err)?;

        Ok(result.rows_affected > 0)
    }

    async fn set_primary(&self, id: FileId) -> Result<Option<PrimaryChange>, UploadError> {
        let txn = self.db.begin().await.map_err(db_err)?;

        let Some(target) = uploaded_files::Entity::find_by_id(id.into_inner())
            .one(&txn)
            .await
            .map_err(db_err)?
        else {
            return Ok(None);
        };
        let listing = ListingRef::new(
            from_db_listing_type(target.listing_type),
            target.listing_id,
        );

        Self::lock_listing(&txn, &listing).await.map_err(db_err)?;

        // Re-read under the listing lock; a concurrent delete may have won.
        let Some(file) = uploaded_files::Entity::find_by_id(id.into_inner())
            .one(&txn)
            .await
            .map_err(db_err)?
        else {
            return Ok(None);
        };

        let previous_primary = Self::current_primary(&txn, &listing)
            .await
            .map_err(db_err)?
            .map(|m| m.id)
            .filter(|previous| *previous != file.id)
            .map(FileId::from_uuid);

        Self::clear_primary(&txn, &listing).await.map_err(db_err)?;
        debug!(file_id = %id, %listing, previous = ?previous_primary, "Swapping primary");

        let mut active: uploaded_files::ActiveModel = file.into();
        active.is_primary = Set(true);
        let updated = match active.update(&txn).await {
            Ok(model) => model,
            Err(DbErr::RecordNotUpdated) => return Ok(None),
            Err(e) => return Err(db_err(e)),
        };

        txn.commit().await.map_err(db_err)?;

        Ok(Some(PrimaryChange {
            file: to_domain(updated),
            previous_primary,
        }))
    }

    async fn record_activity(&self, activity: NewActivity) -> Result<(), UploadError> {
        let active_model = upload_activities::ActiveModel {
            id: Set(ActivityId::new().into_inner()),
            owner_uid: Set(activity.owner_uid),
            action: Set(to_db_action(activity.action)),
            file_id: Set(activity.file_id.map(FileId::into_inner)),
            file_name: Set(activity.file_name),
            file_size: Set(activity.file_size),
            ip_address: Set(activity.ip_address),
            user_agent: Set(activity.user_agent),
            created_at: Set(Utc::now().into()),
        };

        active_model.insert(&self.db).await.map_err(db_err)?;
        Ok(())
    }
}

fn listing_filter(listing: &ListingRef) -> sea_orm::Condition {
    sea_orm::Condition::all()
        .add(uploaded_files::Column::ListingType.eq(to_db_listing_type(listing.listing_type)))
        .add(uploaded_files::Column::ListingId.eq(listing.listing_id.as_str()))
}

fn db_err(e: DbErr) -> UploadError {
    UploadError::repository(e.to_string())
}

/// Convert domain listing type to database enum.
fn to_db_listing_type(t: ListingType) -> DbListingType {
    match t {
        ListingType::House => DbListingType::House,
        ListingType::Car => DbListingType::Car,
    }
}

/// Convert database listing type to domain enum.
fn from_db_listing_type(t: DbListingType) -> ListingType {
    match t {
        DbListingType::House => ListingType::House,
        DbListingType::Car => ListingType::Car,
    }
}

fn to_db_file_type(t: FileType) -> DbFileType {
    match t {
        FileType::Image => DbFileType::Image,
        FileType::Video => DbFileType::Video,
        FileType::Audio => DbFileType::Audio,
        FileType::Document => DbFileType::Document,
    }
}

fn from_db_file_type(t: DbFileType) -> FileType {
    match t {
        DbFileType::Image => FileType::Image,
        DbFileType::Video => FileType::Video,
        DbFileType::Audio => FileType::Audio,
        DbFileType::Document => FileType::Document,
    }
}

fn to_db_action(a: ActivityAction) -> DbUploadAction {
    match a {
        ActivityAction::Upload => DbUploadAction::Upload,
        ActivityAction::Delete => DbUploadAction::Delete,
        ActivityAction::SetPrimary => DbUploadAction::SetPrimary,
    }
}

/// Convert database model to domain model.
fn to_domain(model: uploaded_files::Model) -> UploadedFile {
    UploadedFile {
        id: FileId::from_uuid(model.id),
        owner_uid: model.owner_uid,
        listing_type: from_db_listing_type(model.listing_type),
        listing_id: model.listing_id,
        file_type: from_db_file_type(model.file_type),
        original_filename: model.original_filename,
        storage_key: model.storage_key,
        thumbnail_key: model.thumbnail_key,
        is_primary: model.is_primary,
        file_size: model.file_size,
        mime_type: model.mime_type,
        width: model.width,
        height: model.height,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
