//! Listing media routes.
//!
//! Endpoints:
//! - POST `/upload/` - Upload one file (multipart field `file`)
//! - POST `/upload/batch_upload/` - Upload several files (repeated field `files`)
//! - GET `/upload/by_listing/` - Files of a listing, primary first
//! - GET `/upload/` - Caller's own files, paginated
//! - GET `/upload/{id}/` - One of the caller's files
//! - DELETE `/upload/{id}/` - Delete a file and its blobs
//! - POST `/upload/{id}/set_primary/` - Make a file its listing's primary image

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use carhome_core::upload::{
    BatchItemError, FileUpload, ListingRef, UploadRequest, UploadService, UploadedFile,
};
use carhome_db::UploadRepository;
use carhome_shared::AppError;
use carhome_shared::types::id::FileId;
use carhome_shared::types::pagination::{PageRequest, PageResponse};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::AppState;
use crate::error::ApiError;
use crate::middleware::auth::AuthUser;
use crate::middleware::client::ClientInfo;

/// Creates upload routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/upload/", post(upload_file).get(list_own_files))
        .route("/upload/batch_upload/", post(batch_upload))
        .route("/upload/by_listing/", get(list_by_listing))
        .route("/upload/{id}/", get(get_file).delete(delete_file))
        .route("/upload/{id}/set_primary/", post(set_primary))
}

// ============================================================================
// Response types
// ============================================================================

/// Uploaded file as returned to clients.
#[derive(Debug, Serialize)]
pub struct FileResponse {
    /// Stored record.
    #[serde(flatten)]
    pub file: UploadedFile,
    /// Where the blob can be fetched, if the backend exposes URLs.
    pub url: Option<String>,
    /// Where the thumbnail can be fetched.
    pub thumbnail_url: Option<String>,
}

/// Batch upload outcome.
#[derive(Debug, Serialize)]
pub struct BatchUploadResponse {
    /// Number of stored files.
    pub success: usize,
    /// Number of rejected files.
    pub failed: usize,
    /// Stored files in request order.
    pub results: Vec<FileResponse>,
    /// Rejected files in request order.
    pub errors: Vec<BatchItemError>,
}

/// Set primary outcome.
#[derive(Debug, Serialize)]
pub struct SetPrimaryResponse {
    /// Always `updated`.
    pub status: &'static str,
    /// File that lost the primary flag, if any.
    pub previous_primary: Option<FileId>,
}

/// Query parameters of `/upload/by_listing/`.
#[derive(Debug, Deserialize)]
pub struct ListingQuery {
    /// `house` or `car`.
    pub listing_type: Option<String>,
    /// Listing id.
    pub listing_id: Option<String>,
}

// ============================================================================
// Helpers
// ============================================================================

type Service = UploadService<UploadRepository>;

/// Builds the upload service, or 503 when no storage backend is configured.
fn upload_service(state: &AppState) -> Result<Service, ApiError> {
    let storage = state
        .storage
        .clone()
        .ok_or(ApiError(AppError::StorageNotConfigured))?;
    let repo = UploadRepository::new((*state.db).clone());

    Ok(UploadService::new(storage, Arc::new(repo), state.policy.clone()))
}

async fn present(service: &Service, file: UploadedFile) -> FileResponse {
    let url = service.url_for(&file.storage_key).await;
    let thumbnail_url = match &file.thumbnail_key {
        Some(key) => service.url_for(key).await,
        None => None,
    };

    FileResponse {
        file,
        url,
        thumbnail_url,
    }
}

async fn present_all(service: &Service, files: Vec<UploadedFile>) -> Vec<FileResponse> {
    let mut out = Vec::with_capacity(files.len());
    for file in files {
        out.push(present(service, file).await);
    }
    out
}

/// Multipart form shared by the single and batch upload endpoints.
#[derive(Debug, Default)]
struct UploadForm {
    listing_type: Option<String>,
    listing_id: Option<String>,
    is_primary: bool,
    files: Vec<FileUpload>,
}

impl UploadForm {
    /// Reads every field; file parts are only taken from `file_field`.
    async fn read(mut multipart: Multipart, file_field: &str) -> Result<Self, ApiError> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();

            if name == file_field {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await?;
                form.files.push(FileUpload::new(filename, content_type, data));
                continue;
            }

            match name.as_str() {
                "listing_type" => form.listing_type = Some(field.text().await?),
                "listing_id" => form.listing_id = Some(field.text().await?),
                "is_primary" => {
                    form.is_primary = field.text().await?.trim().eq_ignore_ascii_case("true");
                }
                _ => debug!(field = %name, "Ignoring multipart field"),
            }
        }

        Ok(form)
    }

    fn listing(&self) -> Result<ListingRef, ApiError> {
        Ok(ListingRef::parse(
            self.listing_type.as_deref().unwrap_or_default(),
            self.listing_id.as_deref().unwrap_or_default(),
        )?)
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST `/upload/`
async fn upload_file(
    State(state): State<AppState>,
    auth: AuthUser,
    client: ClientInfo,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let service = upload_service(&state)?;
    let mut form = UploadForm::read(multipart, "file").await?;
    let listing = form.listing()?;

    if form.files.len() != 1 {
        return Err(ApiError(AppError::Validation(
            "Exactly one file is required in field 'file'".to_string(),
        )));
    }
    let Some(file) = form.files.pop() else {
        return Err(ApiError(AppError::Validation("No file provided".to_string())));
    };

    let ctx = auth.into_context(client);
    let stored = service
        .upload(
            &ctx,
            UploadRequest {
                listing,
                file,
                is_primary: form.is_primary,
            },
        )
        .await?;

    info!(
        uid = %ctx.uid(),
        file_id = %stored.id,
        listing = %stored.listing(),
        is_primary = stored.is_primary,
        "File uploaded"
    );

    Ok((StatusCode::CREATED, Json(present(&service, stored).await)))
}

/// POST `/upload/batch_upload/`
async fn batch_upload(
    State(state): State<AppState>,
    auth: AuthUser,
    client: ClientInfo,
    multipart: Multipart,
) -> Result<Json<BatchUploadResponse>, ApiError> {
    let service = upload_service(&state)?;
    let form = UploadForm::read(multipart, "files").await?;
    let listing = form.listing()?;

    let ctx = auth.into_context(client);
    let report = service.batch_upload(&ctx, &listing, form.files).await?;

    Ok(Json(BatchUploadResponse {
        success: report.success(),
        failed: report.failed(),
        results: present_all(&service, report.results).await,
        errors: report.errors,
    }))
}

/// GET `/upload/by_listing/?listing_type=&listing_id=`
async fn list_by_listing(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<ListingQuery>,
) -> Result<Json<Vec<FileResponse>>, ApiError> {
    let service = upload_service(&state)?;
    let listing = ListingRef::parse(
        query.listing_type.as_deref().unwrap_or_default(),
        query.listing_id.as_deref().unwrap_or_default(),
    )?;

    let files = service.list_by_listing(&listing).await?;
    Ok(Json(present_all(&service, files).await))
}

/// GET `/upload/`
async fn list_own_files(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(page): Query<PageRequest>,
) -> Result<Json<PageResponse<FileResponse>>, ApiError> {
    let service = upload_service(&state)?;
    let ctx = auth.into_context(ClientInfo::default());

    let page = service.list_own(&ctx, page).await?;
    let data = present_all(&service, page.data).await;

    Ok(Json(PageResponse {
        data,
        meta: page.meta,
    }))
}

/// GET `/upload/{id}/`
async fn get_file(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<FileId>,
) -> Result<Json<FileResponse>, ApiError> {
    let service = upload_service(&state)?;
    let ctx = auth.into_context(ClientInfo::default());

    let file = service.get(&ctx, id).await?;
    Ok(Json(present(&service, file).await))
}

/// DELETE `/upload/{id}/`
async fn delete_file(
    State(state): State<AppState>,
    auth: AuthUser,
    client: ClientInfo,
    Path(id): Path<FileId>,
) -> Result<StatusCode, ApiError> {
    let service = upload_service(&state)?;
    let ctx = auth.into_context(client);

    service.delete(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST `/upload/{id}/set_primary/`
async fn set_primary(
    State(state): State<AppState>,
    auth: AuthUser,
    client: ClientInfo,
    Path(id): Path<FileId>,
) -> Result<Json<SetPrimaryResponse>, ApiError> {
    let service = upload_service(&state)?;
    let ctx = auth.into_context(client);

    let change = service.set_primary(&ctx, id).await?;
    Ok(Json(SetPrimaryResponse {
        status: "updated",
        previous_primary: change.previous_primary,
    }))
}
