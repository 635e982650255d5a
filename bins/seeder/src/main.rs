//! Database seeder for CarHome development and testing.
//!
//! Seeds a handful of house and car listings owned by a development user so
//! uploads can be exercised locally. When the local token provider is
//! configured, a bearer token for that user is printed as well.
//!
//! Usage: cargo run --bin seeder

use anyhow::Context;
use carhome_core::upload::{ListingRef, ListingType};
use carhome_db::{ListingRepository, connect, create_schema};
use carhome_shared::config::AuthProvider;
use carhome_shared::{AppConfig, Identity, LocalTokenConfig, LocalTokenVerifier};
use sea_orm::{ConnectionTrait, DatabaseBackend};

/// Firebase-style UID of the development user.
const DEV_USER_UID: &str = "dev-user-0001";

/// Listings seeded for the development user.
const LISTINGS: &[(ListingType, &str, &str)] = &[
    (ListingType::House, "1", "Two-bedroom flat near the park"),
    (ListingType::House, "2", "Family house with garden"),
    (ListingType::House, "3", "Studio in the old town"),
    (ListingType::Car, "1", "2018 hatchback, one owner"),
    (ListingType::Car, "2", "Electric compact, low mileage"),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    println!("Connecting to database...");
    let db = connect(&config.database)
        .await
        .context("Failed to connect to database")?;

    if db.get_database_backend() == DatabaseBackend::Sqlite {
        create_schema(&db).await?;
    }

    println!("Seeding listings...");
    let listings = ListingRepository::new(db);
    for (listing_type, listing_id, title) in LISTINGS {
        let listing = ListingRef::new(*listing_type, *listing_id);
        let existed = listings.find(&listing).await?.is_some();
        match listings.upsert(&listing, DEV_USER_UID, title).await {
            Ok(()) if existed => println!("  {listing} already exists, refreshed title"),
            Ok(()) => println!("  Created {listing}: {title}"),
            Err(e) => eprintln!("Failed to seed listing {listing}: {e}"),
        }
    }

    if config.auth.provider == AuthProvider::Local {
        if let Some(secret) = config.auth.local_secret.clone() {
            let verifier = LocalTokenVerifier::new(LocalTokenConfig {
                secret,
                expires_in_secs: i64::try_from(config.auth.local_token_expiry_secs)
                    .unwrap_or(3600),
            });
            let mut identity = Identity::new(DEV_USER_UID);
            identity.email = Some("dev@carhome.local".to_string());
            let token = verifier.issue_token(&identity)?;
            println!("Development token for {DEV_USER_UID}:\n{token}");
        }
    }

    println!("Seeding complete!");
    Ok(())
}
