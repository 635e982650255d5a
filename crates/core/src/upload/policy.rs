//! Upload validation rules.

use carhome_shared::config::UploadSettings;

use super::error::UploadError;
use super::media::ThumbnailSpec;
use super::types::{FileType, FileUpload};

const OCTET_STREAM: &str = "application/octet-stream";

/// Limits applied to every incoming file.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    allowed_mime_types: Vec<String>,
    max_image_bytes: u64,
    max_video_bytes: u64,
    max_audio_bytes: u64,
    max_document_bytes: u64,
    thumbnail: ThumbnailSpec,
}

/// A file that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedFile {
    /// Resolved MIME type.
    pub mime_type: String,
    /// Classification of `mime_type`.
    pub file_type: FileType,
    /// Size in bytes.
    pub size: u64,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::from_settings(&UploadSettings::default())
    }
}

impl UploadPolicy {
    /// Build the policy from configuration.
    #[must_use]
    pub fn from_settings(settings: &UploadSettings) -> Self {
        Self {
            allowed_mime_types: settings
                .allowed_mime_types
                .iter()
                .map(|m| m.trim().to_ascii_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
            max_image_bytes: settings.max_image_bytes,
            max_video_bytes: settings.max_video_bytes,
            max_audio_bytes: settings.max_audio_bytes,
            max_document_bytes: settings.max_document_bytes,
            thumbnail: ThumbnailSpec {
                width: settings.thumbnail_width,
                height: settings.thumbnail_height,
                quality: settings.thumbnail_quality.clamp(1, 100),
            },
        }
    }

    /// Replace the MIME allow-list.
    #[must_use]
    pub fn with_allowed_mime_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_mime_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Override the size limit for one file type.
    #[must_use]
    pub fn with_max_size(mut self, file_type: FileType, max: u64) -> Self {
        match file_type {
            FileType::Image => self.max_image_bytes = max,
            FileType::Video => self.max_video_bytes = max,
            FileType::Audio => self.max_audio_bytes = max,
            FileType::Document => self.max_document_bytes = max,
        }
        self
    }

    /// Thumbnail dimensions and quality.
    #[must_use]
    pub fn thumbnail(&self) -> ThumbnailSpec {
        self.thumbnail
    }

    /// Maximum size for a file type.
    #[must_use]
    pub fn max_size_for(&self, file_type: FileType) -> u64 {
        match file_type {
            FileType::Image => self.max_image_bytes,
            FileType::Video => self.max_video_bytes,
            FileType::Audio => self.max_audio_bytes,
            FileType::Document => self.max_document_bytes,
        }
    }

    /// Exact match or `type/*` wildcard.
    #[must_use]
    pub fn is_mime_type_allowed(&self, mime_type: &str) -> bool {
        let major = mime_type.split('/').next().unwrap_or_default();
        self.allowed_mime_types.iter().any(|allowed| {
            allowed == mime_type
                || allowed
                    .strip_suffix("/*")
                    .is_some_and(|prefix| prefix == major)
        })
    }

    /// Validate an incoming file.
    ///
    /// # Errors
    ///
    /// Returns `EmptyFile`, `InvalidMimeType` or `FileTooLarge`.
    pub fn check(&self, file: &FileUpload) -> Result<AcceptedFile, UploadError> {
        let size = u64::try_from(file.data.len()).unwrap_or(u64::MAX);
        if size == 0 {
            return Err(UploadError::EmptyFile(file.filename.clone()));
        }

        let mime_type = resolve_mime_type(&file.filename, file.content_type.as_deref());
        if !self.is_mime_type_allowed(&mime_type) {
            return Err(UploadError::InvalidMimeType(mime_type));
        }

        let file_type = FileType::from_mime(&mime_type);
        let max = self.max_size_for(file_type);
        if size > max {
            return Err(UploadError::file_too_large(size, max));
        }

        Ok(AcceptedFile {
            mime_type,
            file_type,
            size,
        })
    }
}

/// Normalized MIME type: the declared one without parameters, or a guess
/// from the filename when the client sent none or a generic one.
fn resolve_mime_type(filename: &str, declared: Option<&str>) -> String {
    let declared = declared
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .filter(|ct| !ct.is_empty() && ct != OCTET_STREAM);

    declared.unwrap_or_else(|| {
        mime_guess::from_path(filename)
            .first_raw()
            .unwrap_or(OCTET_STREAM)
            .to_string()
    })
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        // Accepted files never exceed the limit of their own type.
        #[test]
        fn prop_accepted_files_within_type_limit(
            len in 1usize..4096,
            max in 1u64..4096,
            mime in prop::sample::select(vec!["image/png", "video/mp4", "audio/ogg", "application/pdf"]),
        ) {
            let policy = UploadPolicy::default()
                .with_max_size(FileType::from_mime(mime), max);
            let upload = FileUpload::new("f", Some(mime.to_string()), vec![0u8; len]);

            match policy.check(&upload) {
                Ok(accepted) => prop_assert!(accepted.size <= policy.max_size_for(accepted.file_type)),
                Err(UploadError::FileTooLarge { size, max: limit }) => prop_assert!(size > limit),
                Err(other) => prop_assert!(false, "unexpected error: {}", other),
            }
        }

        // Wildcards only match their own major type.
        #[test]
        fn prop_wildcard_matches_major_type(sub in "[a-z0-9.+-]{1,20}") {
            let policy = UploadPolicy::default().with_allowed_mime_types(["image/*"]);
            let image_mime = format!("image/{sub}");
            let video_mime = format!("video/{sub}");
            prop_assert!(policy.is_mime_type_allowed(&image_mime));
            prop_assert!(!policy.is_mime_type_allowed(&video_mime));
        }
    }
}
