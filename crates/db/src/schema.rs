//! Schema built from the entity definitions.
//!
//! PostgreSQL deployments use [`crate::migration::Migrator`]. SQLite
//! databases (local runs, tests) get their tables from here instead, plus the
//! same one-primary-per-listing index.

use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, Schema};

use crate::entities::{listings, upload_activities, uploaded_files};

const PRIMARY_INDEX_SQL: &str = "CREATE UNIQUE INDEX IF NOT EXISTS uq_uploaded_files_primary \
     ON uploaded_files (listing_type, listing_id) WHERE is_primary";

/// Create all tables if they do not exist yet.
///
/// # Errors
///
/// Returns an error if a statement fails.
pub async fn create_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    create_table(db, listings::Entity).await?;
    create_table(db, uploaded_files::Entity).await?;
    create_table(db, upload_activities::Entity).await?;
    db.execute_unprepared(PRIMARY_INDEX_SQL).await?;
    Ok(())
}

async fn create_table<E: EntityTrait>(db: &DatabaseConnection, entity: E) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let mut stmt = Schema::new(backend).create_table_from_entity(entity);
    stmt.if_not_exists();
    db.execute(backend.build(&stmt)).await?;
    Ok(())
}
