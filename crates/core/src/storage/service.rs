//! Storage service implementation using Apache OpenDAL.

use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use opendal::{ErrorKind, Operator, services};
use tracing::{debug, warn};
use uuid::Uuid;

use super::config::{StorageConfig, StorageProvider};
use super::error::StorageError;

/// Longest file extension carried into a storage key, dot excluded.
const MAX_EXTENSION_LEN: usize = 10;

/// Storage service for listing media.
pub struct StorageService {
    operator: Operator,
    config: StorageConfig,
}

impl std::fmt::Debug for StorageService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageService")
            .field("provider", &self.config.provider.name())
            .field("public_base_url", &self.config.public_base_url)
            .finish_non_exhaustive()
    }
}

impl StorageService {
    /// Create a new storage service from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage provider cannot be initialized.
    pub fn from_config(config: StorageConfig) -> Result<Self, StorageError> {
        let operator = Self::create_operator(&config.provider)?;
        Ok(Self { operator, config })
    }

    /// In-process storage for tests and local experiments.
    ///
    /// # Errors
    ///
    /// Returns an error if the memory backend cannot be initialized.
    pub fn in_memory() -> Result<Self, StorageError> {
        Self::from_config(StorageConfig::new(StorageProvider::Memory))
    }

    fn create_operator(provider: &StorageProvider) -> Result<Operator, StorageError> {
        match provider {
            StorageProvider::S3 {
                endpoint,
                bucket,
                access_key_id,
                secret_access_key,
                region,
            } => build_operator(
                services::S3::default()
                    .endpoint(endpoint)
                    .bucket(bucket)
                    .access_key_id(access_key_id)
                    .secret_access_key(secret_access_key)
                    .region(region),
            ),
            StorageProvider::AzureBlob {
                account,
                access_key,
                container,
            } => build_operator(
                services::Azblob::default()
                    .account_name(account)
                    .account_key(access_key)
                    .container(container),
            ),
            StorageProvider::LocalFs { root } => {
                let root = root.to_str().ok_or_else(|| {
                    StorageError::configuration(format!(
                        "storage root {} is not valid UTF-8",
                        root.display()
                    ))
                })?;
                build_operator(services::Fs::default().root(root))
            }
            StorageProvider::Memory => build_operator(services::Memory::default()),
        }
    }

    /// Storage key for an uploaded blob.
    ///
    /// Format: `uploads/YYYY/MM/DD/{file_id}{.ext}`
    #[must_use]
    pub fn upload_key(uploaded_at: DateTime<Utc>, file_id: Uuid, filename: &str) -> String {
        format!(
            "uploads/{}/{file_id}{}",
            uploaded_at.format("%Y/%m/%d"),
            sanitize_extension(filename)
        )
    }

    /// Storage key for the JPEG thumbnail of an uploaded image.
    ///
    /// Format: `thumbnails/YYYY/MM/DD/thumb_{file_id}.jpg`
    #[must_use]
    pub fn thumbnail_key(uploaded_at: DateTime<Utc>, file_id: Uuid) -> String {
        format!(
            "thumbnails/{}/thumb_{file_id}.jpg",
            uploaded_at.format("%Y/%m/%d")
        )
    }

    /// Store `data` under `key`.
    ///
    /// The content type is attached when the backend can record it.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the write.
    pub async fn put(
        &self,
        key: &str,
        data: impl Into<Bytes>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let data: Bytes = data.into();
        let size = data.len();

        let result = if self
            .operator
            .info()
            .full_capability()
            .write_with_content_type
        {
            self.operator
                .write_with(key, data)
                .content_type(content_type)
                .await
        } else {
            self.operator.write(key, data).await
        };

        result.map_err(|e| StorageError::from_opendal(key, &e))?;
        debug!(key, size, content_type, "Stored object");
        Ok(())
    }

    /// Read an object back.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if nothing is stored under `key`.
    pub async fn read(&self, key: &str) -> Result<Bytes, StorageError> {
        let buffer = self
            .operator
            .read(key)
            .await
            .map_err(|e| StorageError::from_opendal(key, &e))?;
        Ok(buffer.to_bytes())
    }

    /// Delete an object. A key that is already gone counts as deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if deletion fails.
    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        match self.operator.delete(key).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let err = StorageError::from_opendal(key, &e);
                if err.is_not_found() {
                    debug!(key, "Object already gone");
                    Ok(())
                } else {
                    Err(err)
                }
            }
        }
    }

    /// Delete objects without surfacing failures. Used to undo writes
    /// whose metadata could not be recorded.
    pub async fn delete_quietly(&self, keys: &[&str]) {
        for key in keys {
            if let Err(e) = self.delete(key).await {
                warn!(key, error = %e, "Failed to remove orphaned object");
            }
        }
    }

    /// Check if an object exists in storage.
    pub async fn exists(&self, key: &str) -> bool {
        match self.operator.stat(key).await {
            Ok(_) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => {
                warn!(key, error = %e, "Stat failed");
                false
            }
        }
    }

    /// URL a client can fetch `key` from.
    ///
    /// Joins the configured public base URL when present, otherwise presigns a
    /// GET when the backend supports it. Returns `None` when neither applies.
    pub async fn url_for(&self, key: &str) -> Option<String> {
        if let Some(base) = &self.config.public_base_url {
            return Some(format!("{}/{key}", base.trim_end_matches('/')));
        }

        if !self.operator.info().full_capability().presign_read {
            return None;
        }

        let ttl = Duration::from_secs(self.config.presign_download_ttl_secs);
        match self.operator.presign_read(key, ttl).await {
            Ok(presigned) => Some(presigned.uri().to_string()),
            Err(e) => {
                warn!(key, error = %e, "Failed to presign download URL");
                None
            }
        }
    }

    /// Get the storage provider name.
    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.config.provider.name()
    }
}

/// Lower-cased extension of `filename` with its leading dot, or an empty
/// string. Only ASCII alphanumerics survive.
fn sanitize_extension(filename: &str) -> String {
    let ext: String = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(MAX_EXTENSION_LEN)
        .collect::<String>()
        .to_ascii_lowercase();

    if ext.is_empty() {
        ext
    } else {
        format!(".{ext}")
    }
}

fn build_operator<B: opendal::Builder>(builder: B) -> Result<Operator, StorageError> {
    Ok(Operator::new(builder)
        .map_err(|e| StorageError::configuration(e.to_string()))?
        .finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 7, 12, 30, 0).unwrap()
    }

    fn file_id() -> Uuid {
        Uuid::parse_str("6ba7b811-9dad-11d1-80b4-00c04fd430c8").expect("valid uuid")
    }

    #[rstest]
    #[case("front.JPG", ".jpg")]
    #[case("archive.tar.gz", ".gz")]
    #[case("noext", "")]
    #[case("weird.p$n g", ".png")]
    #[case(".hidden", "")]
    #[case("clip.verylongextension", ".verylongex")]
    fn test_sanitize_extension(#[case] filename: &str, #[case] expected: &str) {
        assert_eq!(sanitize_extension(filename), expected);
    }

    #[test]
    fn test_upload_key_format() {
        let key = StorageService::upload_key(fixed_time(), file_id(), "Garage Door.PNG");
        assert_eq!(
            key,
            "uploads/2024/03/07/6ba7b811-9dad-11d1-80b4-00c04fd430c8.png"
        );
    }

    #[test]
    fn test_thumbnail_key_format() {
        let key = StorageService::thumbnail_key(fixed_time(), file_id());
        assert_eq!(
            key,
            "thumbnails/2024/03/07/thumb_6ba7b811-9dad-11d1-80b4-00c04fd430c8.jpg"
        );
    }

    #[tokio::test]
    async fn test_put_read_delete_roundtrip() {
        let storage = StorageService::in_memory().expect("memory storage");

        storage
            .put("uploads/a.txt", b"hello".to_vec(), "text/plain")
            .await
            .expect("put");
        assert!(storage.exists("uploads/a.txt").await);
        assert_eq!(
            storage.read("uploads/a.txt").await.expect("read").as_ref(),
            b"hello"
        );

        storage.delete("uploads/a.txt").await.expect("delete");
        assert!(!storage.exists("uploads/a.txt").await);
    }

    #[tokio::test]
    async fn test_delete_missing_key_is_ok() {
        let storage = StorageService::in_memory().expect("memory storage");
        assert!(storage.delete("uploads/never-written.bin").await.is_ok());
    }

    #[tokio::test]
    async fn test_read_missing_key_is_not_found() {
        let storage = StorageService::in_memory().expect("memory storage");
        let err = storage.read("uploads/missing.bin").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { ref key } if key == "uploads/missing.bin"));
    }

    #[tokio::test]
    async fn test_url_for_uses_public_base_url() {
        let config = StorageConfig::new(StorageProvider::Memory)
            .with_public_base_url("https://cdn.example.com/media/");
        let storage = StorageService::from_config(config).expect("memory storage");

        assert_eq!(
            storage.url_for("uploads/2024/01/01/x.jpg").await.as_deref(),
            Some("https://cdn.example.com/media/uploads/2024/01/01/x.jpg")
        );
    }

    #[tokio::test]
    async fn test_url_for_without_presign_support_is_none() {
        let storage = StorageService::in_memory().expect("memory storage");
        assert!(storage.url_for("uploads/x.jpg").await.is_none());
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    // Upload keys always live under a dated uploads/ prefix and end with the
    // file id plus a safe extension.
    proptest! {
        #[test]
        fn prop_upload_key_shape(filename in ".*") {
            let id = Uuid::new_v4();
            let key = StorageService::upload_key(Utc::now(), id, &filename);

            let parts: Vec<&str> = key.split('/').collect();
            prop_assert_eq!(parts.len(), 5);
            prop_assert_eq!(parts[0], "uploads");

            let name = parts[4];
            let id_string = id.to_string();
            prop_assert!(name.starts_with(&id_string));
            let ext = &name[id_string.len()..];
            prop_assert!(ext.is_empty() || ext.starts_with('.'));
            for c in ext.chars().skip(1) {
                prop_assert!(c.is_ascii_lowercase() || c.is_ascii_digit(), "unexpected char {}", c);
            }
        }
    }
}
