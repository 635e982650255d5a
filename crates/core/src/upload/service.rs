//! Upload Manager implementation.

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use carhome_shared::types::id::FileId;
use carhome_shared::types::{PageRequest, PageResponse};
use chrono::Utc;
use tracing::{error, info, warn};

use super::error::UploadError;
use super::media::{ImageInfo, ThumbnailSpec, inspect_image};
use super::policy::UploadPolicy;
use super::types::{
    ActivityAction, BatchItemError, BatchUploadReport, FileType, FileUpload, ListingRef,
    NewActivity, NewUploadedFile, PrimaryChange, PrimaryPolicy, RequestContext, UploadRequest,
    UploadedFile,
};
use crate::storage::StorageService;

/// Message reported for batch items that failed on the server side.
const BATCH_ITEM_SERVER_ERROR: &str = "An error occurred";

/// Repository trait for uploaded file persistence.
///
/// Implemented by the db crate. Implementations keep at most one primary
/// file per listing: `create` with [`PrimaryPolicy::Replace`] and
/// `set_primary` clear the previous primary in the same transaction.
pub trait UploadRepository: Send + Sync {
    /// Check if a listing exists.
    fn listing_exists(
        &self,
        listing: &ListingRef,
    ) -> impl Future<Output = Result<bool, UploadError>> + Send;

    /// Insert a file record, applying its primary policy.
    fn create(
        &self,
        input: NewUploadedFile,
    ) -> impl Future<Output = Result<UploadedFile, UploadError>> + Send;

    /// Find a file by ID.
    fn find_by_id(
        &self,
        id: FileId,
    ) -> impl Future<Output = Result<Option<UploadedFile>, UploadError>> + Send;

    /// Files of a listing, primary first then newest first.
    fn list_by_listing(
        &self,
        listing: &ListingRef,
    ) -> impl Future<Output = Result<Vec<UploadedFile>, UploadError>> + Send;

    /// One page of a user's files, newest first, plus the total count.
    fn list_by_owner(
        &self,
        owner_uid: &str,
        page: &PageRequest,
    ) -> impl Future<Output = Result<(Vec<UploadedFile>, u64), UploadError>> + Send;

    /// Delete a file record. Returns false if it was already gone.
    fn delete(&self, id: FileId) -> impl Future<Output = Result<bool, UploadError>> + Send;

    /// Make a file its listing's primary. Returns `None` if the file is gone.
    fn set_primary(
        &self,
        id: FileId,
    ) -> impl Future<Output = Result<Option<PrimaryChange>, UploadError>> + Send;

    /// Append an audit log entry.
    fn record_activity(
        &self,
        activity: NewActivity,
    ) -> impl Future<Output = Result<(), UploadError>> + Send;
}

/// Upload Manager: the lifecycle of files attached to listings.
pub struct UploadService<R: UploadRepository> {
    storage: Arc<StorageService>,
    repo: Arc<R>,
    policy: Arc<UploadPolicy>,
}

impl<R: UploadRepository> UploadService<R> {
    /// Create a new upload service.
    #[must_use]
    pub fn new(storage: Arc<StorageService>, repo: Arc<R>, policy: Arc<UploadPolicy>) -> Self {
        Self {
            storage,
            repo,
            policy,
        }
    }

    /// Store one file on a listing.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The listing does not exist
    /// - The file is empty, too large or of a disallowed type
    /// - Storage or the database fails
    pub async fn upload(
        &self,
        ctx: &RequestContext,
        req: UploadRequest,
    ) -> Result<UploadedFile, UploadError> {
        self.ensure_listing(&req.listing).await?;

        let primary = if req.is_primary {
            PrimaryPolicy::Replace
        } else {
            PrimaryPolicy::Never
        };

        self.store(ctx, &req.listing, req.file, primary).await
    }

    /// Store several files on a listing; each succeeds or fails on its own.
    ///
    /// The first stored file becomes primary if the listing has none.
    ///
    /// # Errors
    ///
    /// Returns an error only for request-level failures: no files, or the
    /// listing does not exist.
    pub async fn batch_upload(
        &self,
        ctx: &RequestContext,
        listing: &ListingRef,
        files: Vec<FileUpload>,
    ) -> Result<BatchUploadReport, UploadError> {
        if files.is_empty() {
            return Err(UploadError::validation("No files provided"));
        }
        self.ensure_listing(listing).await?;

        let mut report = BatchUploadReport::default();
        for file in files {
            let filename = file.filename.clone();
            match self.store(ctx, listing, file, PrimaryPolicy::IfVacant).await {
                Ok(stored) => report.results.push(stored),
                Err(e) => {
                    let message = if e.is_client_error() {
                        warn!(%listing, file = %filename, error = %e, "Batch item rejected");
                        e.to_string()
                    } else {
                        error!(%listing, file = %filename, error = %e, "Batch item failed");
                        BATCH_ITEM_SERVER_ERROR.to_string()
                    };
                    report.errors.push(BatchItemError {
                        file: filename,
                        error: message,
                    });
                }
            }
        }

        info!(
            %listing,
            success = report.success(),
            failed = report.failed(),
            "Batch upload finished"
        );
        Ok(report)
    }

    /// Files of a listing, primary first then newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn list_by_listing(
        &self,
        listing: &ListingRef,
    ) -> Result<Vec<UploadedFile>, UploadError> {
        self.repo.list_by_listing(listing).await
    }

    /// The caller's files, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn list_own(
        &self,
        ctx: &RequestContext,
        page: PageRequest,
    ) -> Result<PageResponse<UploadedFile>, UploadError> {
        let page = page.normalized();
        let (files, total) = self.repo.list_by_owner(ctx.uid(), &page).await?;
        Ok(PageResponse::new(files, page.page, page.per_page, total))
    }

    /// One of the caller's files.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the file does not exist or belongs to someone else.
    pub async fn get(&self, ctx: &RequestContext, id: FileId) -> Result<UploadedFile, UploadError> {
        self.repo
            .find_by_id(id)
            .await?
            .filter(|f| f.owner_uid == ctx.uid())
            .ok_or_else(|| UploadError::not_found(id))
    }

    /// Remove one of the caller's files and its blobs.
    ///
    /// Blobs go first; if storage fails the record stays so the call can be
    /// retried.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown or foreign files and `Storage` when the
    /// backend refuses the delete.
    pub async fn delete(&self, ctx: &RequestContext, id: FileId) -> Result<(), UploadError> {
        let file = self.get(ctx, id).await?;

        self.storage.delete(&file.storage_key).await?;
        if let Some(thumbnail_key) = &file.thumbnail_key {
            self.storage.delete(thumbnail_key).await?;
        }

        if !self.repo.delete(id).await? {
            return Err(UploadError::not_found(id));
        }

        info!(file_id = %id, listing = %file.listing(), "Deleted file");
        self.audit(NewActivity::new(ctx, ActivityAction::Delete, &file))
            .await;
        Ok(())
    }

    /// Make one of the caller's files the primary image of its listing.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown or foreign files.
    pub async fn set_primary(
        &self,
        ctx: &RequestContext,
        id: FileId,
    ) -> Result<PrimaryChange, UploadError> {
        self.get(ctx, id).await?;

        let change = self
            .repo
            .set_primary(id)
            .await?
            .ok_or_else(|| UploadError::not_found(id))?;

        info!(
            file_id = %id,
            listing = %change.file.listing(),
            previous = ?change.previous_primary,
            "Primary file changed"
        );
        self.audit(NewActivity::new(ctx, ActivityAction::SetPrimary, &change.file))
            .await;
        Ok(change)
    }

    /// URL a client can fetch a stored key from, if the backend exposes one.
    pub async fn url_for(&self, key: &str) -> Option<String> {
        self.storage.url_for(key).await
    }

    async fn ensure_listing(&self, listing: &ListingRef) -> Result<(), UploadError> {
        if self.repo.listing_exists(listing).await? {
            Ok(())
        } else {
            Err(UploadError::ListingNotFound(listing.to_string()))
        }
    }

    /// Validate, write blobs, then insert the record. Blobs are removed again
    /// if the insert fails.
    async fn store(
        &self,
        ctx: &RequestContext,
        listing: &ListingRef,
        file: FileUpload,
        primary: PrimaryPolicy,
    ) -> Result<UploadedFile, UploadError> {
        let accepted = self.policy.check(&file)?;

        let id = FileId::new();
        let created_at = Utc::now();
        let storage_key = StorageService::upload_key(created_at, id.into_inner(), &file.filename);

        let image = if accepted.file_type == FileType::Image {
            examine_image(file.data.clone(), self.policy.thumbnail()).await
        } else {
            None
        };

        self.storage
            .put(&storage_key, file.data.clone(), &accepted.mime_type)
            .await?;

        let mut thumbnail_key = None;
        if let Some(thumb) = image.as_ref().and_then(|i| i.thumbnail.clone()) {
            let key = StorageService::thumbnail_key(created_at, id.into_inner());
            match self.storage.put(&key, thumb, "image/jpeg").await {
                Ok(()) => thumbnail_key = Some(key),
                Err(e) => warn!(file_id = %id, error = %e, "Failed to store thumbnail"),
            }
        }

        let input = NewUploadedFile {
            id,
            owner_uid: ctx.uid().to_string(),
            listing: listing.clone(),
            file_type: accepted.file_type,
            original_filename: file.filename,
            storage_key: storage_key.clone(),
            thumbnail_key: thumbnail_key.clone(),
            primary,
            file_size: i64::try_from(accepted.size).unwrap_or(i64::MAX),
            mime_type: accepted.mime_type,
            width: image.as_ref().and_then(|i| i32::try_from(i.width).ok()),
            height: image.as_ref().and_then(|i| i32::try_from(i.height).ok()),
            created_at,
        };

        let stored = match self.repo.create(input).await {
            Ok(stored) => stored,
            Err(e) => {
                let mut keys = vec![storage_key.as_str()];
                keys.extend(thumbnail_key.as_deref());
                self.storage.delete_quietly(&keys).await;
                return Err(e);
            }
        };

        info!(
            file_id = %stored.id,
            %listing,
            size = stored.file_size,
            mime_type = %stored.mime_type,
            is_primary = stored.is_primary,
            "Stored upload"
        );
        self.audit(NewActivity::new(ctx, ActivityAction::Upload, &stored))
            .await;
        Ok(stored)
    }

    /// Audit entries never fail the operation they describe.
    async fn audit(&self, activity: NewActivity) {
        let action = activity.action.as_str();
        if let Err(e) = self.repo.record_activity(activity).await {
            warn!(action, error = %e, "Failed to record upload activity");
        }
    }
}

/// Decode on the blocking pool. Undecodable images yield `None`.
async fn examine_image(data: Bytes, spec: ThumbnailSpec) -> Option<ImageInfo> {
    match tokio::task::spawn_blocking(move || inspect_image(&data, spec)).await {
        Ok(Ok(info)) => Some(info),
        Ok(Err(e)) => {
            warn!(error = %e, "Image could not be decoded; storing without dimensions");
            None
        }
        Err(e) => {
            warn!(error = %e, "Image inspection task failed");
            None
        }
    }
}
