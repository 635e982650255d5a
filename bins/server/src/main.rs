//! CarHome media API server
//!
//! Main entry point for the listing media upload service.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sea_orm::{ConnectionTrait, DatabaseBackend};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use carhome_api::{AppState, create_router};
use carhome_core::storage::{StorageConfig, StorageService};
use carhome_core::upload::UploadPolicy;
use carhome_db::{connect, create_schema};
use carhome_shared::config::{AuthConfig, AuthProvider, LoggingConfig};
use carhome_shared::{
    AppConfig, FirebaseVerifier, IdentityVerifier, LocalTokenConfig, LocalTokenVerifier,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config.logging);

    // Connect to database
    let db = connect(&config.database).await?;
    if db.get_database_backend() == DatabaseBackend::Sqlite {
        create_schema(&db).await?;
        info!("Connected to SQLite database, schema ensured");
    } else {
        info!("Connected to database");
    }

    let verifier = build_verifier(&config.auth)?;

    let storage = match &config.storage {
        Some(settings) => {
            let storage_config = StorageConfig::try_from(settings)?;
            let service = StorageService::from_config(storage_config)?;
            info!(provider = service.provider_name(), "Storage configured");
            Some(Arc::new(service))
        }
        None => {
            warn!("No storage configured, upload endpoints will answer 503");
            None
        }
    };

    let state = AppState {
        db: Arc::new(db),
        verifier,
        storage,
        policy: Arc::new(UploadPolicy::from_settings(&config.uploads)),
    };

    let app = create_router(state, config.server.max_request_bytes);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "carhome=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn build_verifier(auth: &AuthConfig) -> anyhow::Result<Arc<dyn IdentityVerifier>> {
    match auth.provider {
        AuthProvider::Firebase => {
            let project_id = auth
                .firebase_project_id
                .clone()
                .context("auth.firebase_project_id is required for the firebase provider")?;
            info!(%project_id, "Verifying Firebase ID tokens");
            Ok(Arc::new(FirebaseVerifier::new(
                project_id,
                auth.jwks_url.clone(),
                Duration::from_secs(auth.key_cache_ttl_secs),
            )))
        }
        AuthProvider::Local => {
            let secret = auth
                .local_secret
                .clone()
                .context("auth.local_secret is required for the local provider")?;
            warn!("Verifying locally signed tokens; do not use in production");
            Ok(Arc::new(LocalTokenVerifier::new(LocalTokenConfig {
                secret,
                expires_in_secs: i64::try_from(auth.local_token_expiry_secs)
                    .context("auth.local_token_expiry_secs is too large")?,
            })))
        }
    }
}
