//! Database layer with `SeaORM` entities and repositories.
//!
//! This crate provides:
//! - `SeaORM` entity definitions
//! - The [`UploadRepository`] implementation of the core persistence trait
//! - PostgreSQL migrations and an entity-derived schema for SQLite

pub mod entities;
pub mod migration;
pub mod repositories;
pub mod schema;

pub use repositories::{ListingRepository, UploadRepository};
pub use schema::create_schema;

use std::time::Duration;

use carhome_shared::config::DatabaseConfig;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

/// Establishes a connection to the database.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);

    Database::connect(options).await
}
