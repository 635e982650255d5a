//! Database migrations.
//!
//! Migrations are managed using sea-orm-migration and target PostgreSQL.

pub use sea_orm_migration::prelude::*;

mod m20261016_000001_listing_media;
mod m20261016_000002_upload_activities;

/// Migrator for running database migrations.
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261016_000001_listing_media::Migration),
            Box::new(m20261016_000002_upload_activities::Migration),
        ]
    }
}
