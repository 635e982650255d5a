//! Listing media schema.
//!
//! Creates the listings reference table and uploaded_files, including the
//! partial unique index that allows one primary file per listing.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(LISTINGS_SQL).await?;
        db.execute_unprepared(UPLOADED_FILES_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(
            "DROP TABLE IF EXISTS uploaded_files CASCADE;
             DROP TABLE IF EXISTS listings CASCADE;",
        )
        .await?;
        Ok(())
    }
}

const LISTINGS_SQL: &str = r"
-- Listings are written by the listings system; uploads only reference them
CREATE TABLE IF NOT EXISTS listings (
    listing_type VARCHAR(16) NOT NULL CHECK (listing_type IN ('house', 'car')),
    listing_id VARCHAR(128) NOT NULL,
    owner_uid VARCHAR(128) NOT NULL,
    title VARCHAR(255) NOT NULL DEFAULT '',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (listing_type, listing_id)
);
";

const UPLOADED_FILES_SQL: &str = r"
CREATE TABLE uploaded_files (
    id UUID PRIMARY KEY,
    owner_uid VARCHAR(128) NOT NULL,
    listing_type VARCHAR(16) NOT NULL,
    listing_id VARCHAR(128) NOT NULL,
    file_type VARCHAR(16) NOT NULL CHECK (file_type IN ('image', 'video', 'audio', 'document')),
    original_filename VARCHAR(255) NOT NULL,
    storage_key VARCHAR(512) NOT NULL UNIQUE,
    thumbnail_key VARCHAR(512),
    is_primary BOOLEAN NOT NULL DEFAULT FALSE,
    file_size BIGINT NOT NULL CHECK (file_size > 0),
    mime_type VARCHAR(100) NOT NULL,
    width INTEGER,
    height INTEGER,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    FOREIGN KEY (listing_type, listing_id)
        REFERENCES listings(listing_type, listing_id) ON DELETE CASCADE
);

-- At most one primary file per listing
CREATE UNIQUE INDEX uq_uploaded_files_primary
    ON uploaded_files(listing_type, listing_id) WHERE is_primary;

-- Listing gallery: primary first, newest first
CREATE INDEX idx_uploaded_files_listing
    ON uploaded_files(listing_type, listing_id, is_primary DESC, created_at DESC);

-- Owner's files
CREATE INDEX idx_uploaded_files_owner ON uploaded_files(owner_uid, created_at DESC);
";
