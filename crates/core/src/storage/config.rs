//! Storage configuration types.

use carhome_shared::config::StorageSettings;
use std::path::PathBuf;

use super::error::StorageError;

/// Which backend holds the blobs, with its connection details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageProvider {
    /// Any S3 API endpoint (AWS, R2, MinIO).
    S3 {
        /// Endpoint URL.
        endpoint: String,
        /// Bucket holding listing media.
        bucket: String,
        /// Access key ID.
        access_key_id: String,
        /// Secret access key.
        secret_access_key: String,
        /// Region, `auto` for R2.
        region: String,
    },
    /// Azure Blob Storage container.
    AzureBlob {
        /// Storage account.
        account: String,
        /// Shared access key.
        access_key: String,
        /// Container name.
        container: String,
    },
    /// Directory on the local disk.
    LocalFs {
        /// Directory blobs are written under.
        root: PathBuf,
    },
    /// In-process storage, lost on restart (tests)
    Memory,
}

impl StorageProvider {
    /// Blobs under `root` on the local disk.
    #[must_use]
    pub fn local_fs(root: impl Into<PathBuf>) -> Self {
        Self::LocalFs { root: root.into() }
    }

    /// Provider name as used in configuration.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::S3 { .. } => "s3",
            Self::AzureBlob { .. } => "azure_blob",
            Self::LocalFs { .. } => "local_fs",
            Self::Memory => "memory",
        }
    }
}

/// Provider plus how stored keys are exposed to clients.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Backend.
    pub provider: StorageProvider,
    /// Public URL prefix for stored keys. Takes precedence over presigning.
    pub public_base_url: Option<String>,
    /// Lifetime of presigned download URLs, in seconds.
    pub presign_download_ttl_secs: u64,
}

impl StorageConfig {
    /// Default download TTL: 1 hour.
    pub const DEFAULT_DOWNLOAD_TTL: u64 = 3600;

    /// Create a new storage config with default settings.
    #[must_use]
    pub fn new(provider: StorageProvider) -> Self {
        Self {
            provider,
            public_base_url: None,
            presign_download_ttl_secs: Self::DEFAULT_DOWNLOAD_TTL,
        }
    }

    /// Serve stored keys under a public URL prefix.
    #[must_use]
    pub fn with_public_base_url(mut self, url: impl Into<String>) -> Self {
        self.public_base_url = Some(url.into());
        self
    }
}

impl TryFrom<&StorageSettings> for StorageConfig {
    type Error = StorageError;

    fn try_from(settings: &StorageSettings) -> Result<Self, Self::Error> {
        let required = |value: &Option<String>, field: &str| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(str::to_owned)
                .ok_or_else(|| {
                    StorageError::configuration(format!(
                        "storage.{field} is required for provider '{}'",
                        settings.provider
                    ))
                })
        };

        let provider = match settings.provider.as_str() {
            "s3" => StorageProvider::S3 {
                endpoint: required(&settings.endpoint, "endpoint")?,
                bucket: required(&settings.bucket, "bucket")?,
                access_key_id: required(&settings.access_key_id, "access_key_id")?,
                secret_access_key: required(&settings.secret_access_key, "secret_access_key")?,
                region: settings
                    .region
                    .clone()
                    .unwrap_or_else(|| "auto".to_string()),
            },
            "azure_blob" => StorageProvider::AzureBlob {
                account: required(&settings.account, "account")?,
                access_key: required(&settings.access_key, "access_key")?,
                container: required(&settings.container, "container")?,
            },
            "local_fs" => StorageProvider::local_fs(required(&settings.root, "root")?),
            "memory" => StorageProvider::Memory,
            other => {
                return Err(StorageError::configuration(format!(
                    "unknown storage provider '{other}'"
                )));
            }
        };

        Ok(Self {
            provider,
            public_base_url: settings.public_base_url.clone().filter(|u| !u.is_empty()),
            presign_download_ttl_secs: settings.download_url_ttl_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn settings(provider: &str) -> StorageSettings {
        StorageSettings {
            provider: provider.to_string(),
            endpoint: None,
            bucket: None,
            access_key_id: None,
            secret_access_key: None,
            region: None,
            account: None,
            access_key: None,
            container: None,
            root: None,
            public_base_url: None,
            download_url_ttl_secs: 600,
        }
    }

    #[rstest]
    #[case("memory", "memory")]
    #[case("local_fs", "local_fs")]
    fn test_provider_name_round_trips(#[case] provider: &str, #[case] expected: &str) {
        let mut s = settings(provider);
        s.root = Some("./media".into());
        let config = StorageConfig::try_from(&s).expect("valid settings");
        assert_eq!(config.provider.name(), expected);
    }

    #[test]
    fn test_from_settings_azure() {
        let mut s = settings("azure_blob");
        s.account = Some("carhome".into());
        s.access_key = Some("key".into());
        s.container = Some("media".into());

        let config = StorageConfig::try_from(&s).expect("valid azure settings");
        assert_eq!(
            config.provider,
            StorageProvider::AzureBlob {
                account: "carhome".into(),
                access_key: "key".into(),
                container: "media".into(),
            }
        );
        assert_eq!(config.provider.name(), "azure_blob");
    }

    #[test]
    fn test_storage_config_defaults() {
        let config = StorageConfig::new(StorageProvider::Memory);
        assert_eq!(
            config.presign_download_ttl_secs,
            StorageConfig::DEFAULT_DOWNLOAD_TTL
        );
        assert!(config.public_base_url.is_none());
    }

    #[test]
    fn test_from_settings_s3() {
        let mut s = settings("s3");
        s.endpoint = Some("http://localhost:9000".into());
        s.bucket = Some("media".into());
        s.access_key_id = Some("minio".into());
        s.secret_access_key = Some("minio123".into());
        s.public_base_url = Some("https://cdn.example.com".into());

        let config = StorageConfig::try_from(&s).expect("valid s3 settings");
        assert!(matches!(
            config.provider,
            StorageProvider::S3 { ref region, .. } if region == "auto"
        ));
        assert_eq!(
            config.public_base_url.as_deref(),
            Some("https://cdn.example.com")
        );
        assert_eq!(config.presign_download_ttl_secs, 600);
    }

    #[test]
    fn test_from_settings_missing_field() {
        let mut s = settings("s3");
        s.endpoint = Some("http://localhost:9000".into());

        let err = StorageConfig::try_from(&s).unwrap_err();
        assert!(err.to_string().contains("storage.bucket"));
    }

    #[test]
    fn test_from_settings_local_fs_and_memory() {
        let mut s = settings("local_fs");
        s.root = Some("./media".into());
        assert!(matches!(
            StorageConfig::try_from(&s).expect("valid").provider,
            StorageProvider::LocalFs { .. }
        ));

        let memory = StorageConfig::try_from(&settings("memory")).expect("valid");
        assert!(matches!(memory.provider, StorageProvider::Memory));
    }

    #[test]
    fn test_from_settings_unknown_provider() {
        let err = StorageConfig::try_from(&settings("ftp")).unwrap_err();
        assert!(matches!(err, StorageError::Configuration(_)));
    }
}
