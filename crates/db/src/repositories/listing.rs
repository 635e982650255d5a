//! Listing reference rows.
//!
//! The listings system owns these rows. Writes here exist for seeding
//! development databases and tests.

use carhome_core::upload::ListingRef;
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set};

use crate::entities::listings;

/// Listing repository implementation.
#[derive(Debug, Clone)]
pub struct ListingRepository {
    db: DatabaseConnection,
}

impl ListingRepository {
    /// Create a new listing repository.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Insert a listing or refresh its owner and title.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn upsert(
        &self,
        listing: &ListingRef,
        owner_uid: &str,
        title: &str,
    ) -> Result<(), DbErr> {
        let active_model = listings::ActiveModel {
            listing_type: Set(listing.listing_type.as_str().to_string()),
            listing_id: Set(listing.listing_id.clone()),
            owner_uid: Set(owner_uid.to_string()),
            title: Set(title.to_string()),
            created_at: Set(Utc::now().into()),
        };

        listings::Entity::insert(active_model)
            .on_conflict(
                OnConflict::columns([listings::Column::ListingType, listings::Column::ListingId])
                    .update_columns([listings::Column::OwnerUid, listings::Column::Title])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        Ok(())
    }

    /// Find a listing row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn find(&self, listing: &ListingRef) -> Result<Option<listings::Model>, DbErr> {
        listings::Entity::find()
            .filter(listings::Column::ListingType.eq(listing.listing_type.as_str()))
            .filter(listings::Column::ListingId.eq(listing.listing_id.as_str()))
            .one(&self.db)
            .await
    }
}
