//! HTTP API layer with Axum routes and middleware.
//!
//! This crate provides:
//! - REST API routes for listing media
//! - Bearer token authentication middleware
//! - Error to HTTP response mapping

pub mod error;
pub mod middleware;
pub mod routes;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use carhome_core::storage::StorageService;
use carhome_core::upload::UploadPolicy;
use carhome_shared::IdentityVerifier;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: Arc<DatabaseConnection>,
    /// Verifies bearer tokens.
    pub verifier: Arc<dyn IdentityVerifier>,
    /// Storage service for uploaded files (optional).
    pub storage: Option<Arc<StorageService>>,
    /// Upload validation limits.
    pub policy: Arc<UploadPolicy>,
}

/// Creates the main application router.
///
/// Request bodies above `max_request_bytes` are answered with 413 before any
/// handler runs.
pub fn create_router(state: AppState, max_request_bytes: usize) -> Router {
    Router::new()
        .nest("/api", routes::api_routes_with_state(state.clone()))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_request_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
