//! Upload Manager: files attached to house and car listings.
//!
//! This module provides business logic for listing media including:
//! - Validation against the configured upload policy
//! - Blob storage with image dimension extraction and thumbnails
//! - Single and batch uploads
//! - The one-primary-file-per-listing rule
//! - Owner-scoped reads, deletion and primary changes

mod error;
pub mod media;
mod policy;
mod service;
mod types;

pub use error::UploadError;
pub use media::ThumbnailSpec;
pub use policy::{AcceptedFile, UploadPolicy};
pub use service::{UploadRepository, UploadService};
pub use types::{
    ActivityAction, BatchItemError, BatchUploadReport, FileType, FileUpload, ListingRef,
    ListingType, NewActivity, NewUploadedFile, PrimaryChange, PrimaryPolicy, RequestContext,
    UploadRequest, UploadedFile,
};
