//! Upload domain types.

use bytes::Bytes;
use carhome_shared::Identity;
use carhome_shared::types::id::FileId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::error::UploadError;

/// Kind of listing a file is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingType {
    /// Property listing.
    House,
    /// Car listing.
    Car,
}

impl ListingType {
    /// Convert to database string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::House => "house",
            Self::Car => "car",
        }
    }
}

impl std::fmt::Display for ListingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ListingType {
    type Err = UploadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "house" => Ok(Self::House),
            "car" => Ok(Self::Car),
            other => Err(UploadError::validation(format!(
                "listing_type must be 'house' or 'car', got '{other}'"
            ))),
        }
    }
}

/// Broad media classification derived from the MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    /// `image/*`
    Image,
    /// `video/*`
    Video,
    /// `audio/*`
    Audio,
    /// Anything else.
    Document,
}

impl FileType {
    /// Classify by MIME type prefix.
    #[must_use]
    pub fn from_mime(mime_type: &str) -> Self {
        match mime_type.split('/').next().unwrap_or_default() {
            "image" => Self::Image,
            "video" => Self::Video,
            "audio" => Self::Audio,
            _ => Self::Document,
        }
    }

    /// Convert to database string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Document => "document",
        }
    }
}

/// A listing is identified by its type and its id in the listings system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListingRef {
    /// Listing kind.
    pub listing_type: ListingType,
    /// Listing id, opaque to this service.
    pub listing_id: String,
}

impl ListingRef {
    /// Create a listing reference without validation.
    #[must_use]
    pub fn new(listing_type: ListingType, listing_id: impl Into<String>) -> Self {
        Self {
            listing_type,
            listing_id: listing_id.into(),
        }
    }

    /// Parse and validate raw request values.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for an unknown listing type or a listing id
    /// outside 1..=128 characters.
    pub fn parse(listing_type: &str, listing_id: &str) -> Result<Self, UploadError> {
        let input = ListingInput {
            listing_type: listing_type.trim().to_string(),
            listing_id: listing_id.trim().to_string(),
        };
        input.validate()?;

        Ok(Self::new(input.listing_type.parse()?, input.listing_id))
    }
}

impl std::fmt::Display for ListingRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.listing_type, self.listing_id)
    }
}

#[derive(Debug, Validate)]
struct ListingInput {
    #[validate(length(min = 1, message = "listing_type is required"))]
    listing_type: String,
    #[validate(length(min = 1, max = 128, message = "listing_id must be 1-128 characters"))]
    listing_id: String,
}

/// Stored metadata for an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    /// File ID.
    pub id: FileId,
    /// UID of the uploader.
    pub owner_uid: String,
    /// Listing kind.
    pub listing_type: ListingType,
    /// Listing id.
    pub listing_id: String,
    /// Media classification.
    pub file_type: FileType,
    /// Filename as sent by the client.
    pub original_filename: String,
    /// Blob location.
    pub storage_key: String,
    /// Thumbnail location, images only.
    pub thumbnail_key: Option<String>,
    /// Primary image of its listing.
    pub is_primary: bool,
    /// Size in bytes.
    pub file_size: i64,
    /// MIME type.
    pub mime_type: String,
    /// Pixel width, decodable images only.
    pub width: Option<i32>,
    /// Pixel height, decodable images only.
    pub height: Option<i32>,
    /// Upload time.
    pub created_at: DateTime<Utc>,
}

impl UploadedFile {
    /// The listing this file belongs to.
    #[must_use]
    pub fn listing(&self) -> ListingRef {
        ListingRef::new(self.listing_type, self.listing_id.clone())
    }
}

/// How an insert interacts with the listing's primary flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryPolicy {
    /// Insert as a regular file.
    Never,
    /// Become primary only when the listing has none.
    IfVacant,
    /// Become primary, clearing the current one.
    Replace,
}

/// Input for creating a file record.
#[derive(Debug, Clone)]
pub struct NewUploadedFile {
    /// Pre-generated ID, also embedded in the storage key.
    pub id: FileId,
    /// UID of the uploader.
    pub owner_uid: String,
    /// Target listing.
    pub listing: ListingRef,
    /// Media classification.
    pub file_type: FileType,
    /// Filename as sent by the client.
    pub original_filename: String,
    /// Blob location.
    pub storage_key: String,
    /// Thumbnail location.
    pub thumbnail_key: Option<String>,
    /// Primary flag handling.
    pub primary: PrimaryPolicy,
    /// Size in bytes.
    pub file_size: i64,
    /// MIME type.
    pub mime_type: String,
    /// Pixel width.
    pub width: Option<i32>,
    /// Pixel height.
    pub height: Option<i32>,
    /// Upload time.
    pub created_at: DateTime<Utc>,
}

/// Result of promoting a file to primary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryChange {
    /// The promoted file.
    pub file: UploadedFile,
    /// File that lost the flag, if another one held it.
    pub previous_primary: Option<FileId>,
}

/// Audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    /// File uploaded.
    Upload,
    /// File deleted.
    Delete,
    /// File promoted to primary.
    SetPrimary,
}

impl ActivityAction {
    /// Convert to database string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Delete => "delete",
            Self::SetPrimary => "set_primary",
        }
    }
}

/// Audit log entry to record.
#[derive(Debug, Clone)]
pub struct NewActivity {
    /// Acting user.
    pub owner_uid: String,
    /// What happened.
    pub action: ActivityAction,
    /// Affected file.
    pub file_id: Option<FileId>,
    /// Affected file name.
    pub file_name: String,
    /// Affected file size.
    pub file_size: Option<i64>,
    /// Client address.
    pub ip_address: Option<String>,
    /// Client user agent, truncated to [`NewActivity::MAX_USER_AGENT_LEN`].
    pub user_agent: Option<String>,
}

impl NewActivity {
    /// Longest stored user agent, in characters.
    pub const MAX_USER_AGENT_LEN: usize = 500;

    pub(crate) fn new(ctx: &RequestContext, action: ActivityAction, file: &UploadedFile) -> Self {
        Self {
            owner_uid: ctx.identity.uid.clone(),
            action,
            file_id: Some(file.id),
            file_name: file.original_filename.clone(),
            file_size: Some(file.file_size),
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx
                .user_agent
                .as_deref()
                .map(|ua| ua.chars().take(Self::MAX_USER_AGENT_LEN).collect()),
        }
    }
}

/// Who is calling and from where.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Verified caller.
    pub identity: Identity,
    /// Client address.
    pub ip_address: Option<String>,
    /// Client user agent.
    pub user_agent: Option<String>,
}

impl RequestContext {
    /// Context without client metadata.
    #[must_use]
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            ip_address: None,
            user_agent: None,
        }
    }

    /// UID of the caller.
    #[must_use]
    pub fn uid(&self) -> &str {
        &self.identity.uid
    }
}

/// A file received from the client.
#[derive(Debug, Clone)]
pub struct FileUpload {
    /// Filename as sent by the client.
    pub filename: String,
    /// Declared content type.
    pub content_type: Option<String>,
    /// File contents.
    pub data: Bytes,
}

impl FileUpload {
    /// Longest filename kept, in characters. Matches the filename columns.
    pub const MAX_FILENAME_LEN: usize = 255;

    /// Create an incoming file.
    ///
    /// Filenames longer than [`FileUpload::MAX_FILENAME_LEN`] are shortened,
    /// keeping the extension when there is one.
    #[must_use]
    pub fn new(
        filename: impl Into<String>,
        content_type: Option<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            filename: truncate_filename(filename.into()),
            content_type,
            data: data.into(),
        }
    }
}

fn truncate_filename(name: String) -> String {
    let max = FileUpload::MAX_FILENAME_LEN;
    if name.chars().count() <= max {
        return name;
    }
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.chars().count() <= 16);
    match ext {
        Some(ext) => {
            let keep = max - ext.chars().count() - 1;
            let stem: String = name.chars().take(keep).collect();
            format!("{stem}.{ext}")
        }
        None => name.chars().take(max).collect(),
    }
}

/// Single upload request.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Target listing.
    pub listing: ListingRef,
    /// The file.
    pub file: FileUpload,
    /// Make this the listing's primary image.
    pub is_primary: bool,
}

/// Per-item failure of a batch upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchItemError {
    /// Filename of the failed item.
    pub file: String,
    /// Failure reason.
    pub error: String,
}

/// Outcome of a batch upload.
#[derive(Debug, Clone, Default)]
pub struct BatchUploadReport {
    /// Stored files in request order.
    pub results: Vec<UploadedFile>,
    /// Failed items in request order.
    pub errors: Vec<BatchItemError>,
}

impl BatchUploadReport {
    /// Number of stored files.
    #[must_use]
    pub fn success(&self) -> usize {
        self.results.len()
    }

    /// Number of failed items.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.errors.len()
    }
}
