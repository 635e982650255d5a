//! Application configuration management.
//!
//! Values are layered from `config/default.toml`, `config/{RUN_MODE}.toml` and
//! `CARHOME__*` environment variables (double underscore separates sections,
//! e.g. `CARHOME__STORAGE__BUCKET`).

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Identity provider configuration.
    pub auth: AuthConfig,
    /// Object storage configuration. Uploads answer 503 when absent.
    #[serde(default)]
    pub storage: Option<StorageSettings>,
    /// Upload limits.
    #[serde(default)]
    pub uploads: UploadSettings,
    /// Log output configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum accepted request body, multipart envelope included.
    #[serde(default = "default_max_request_bytes")]
    pub max_request_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_request_bytes: default_max_request_bytes(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_request_bytes() -> usize {
    256 * 1024 * 1024
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Which identity provider verifies bearer tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthProvider {
    /// Firebase Authentication ID tokens (RS256).
    #[default]
    Firebase,
    /// Locally signed HS256 tokens, for development and tests.
    Local,
}

/// Identity provider configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Provider used to verify tokens.
    #[serde(default)]
    pub provider: AuthProvider,
    /// Firebase project ID (audience of the ID tokens).
    #[serde(default)]
    pub firebase_project_id: Option<String>,
    /// JWKS endpoint publishing the Firebase signing keys.
    #[serde(default = "default_jwks_url")]
    pub jwks_url: String,
    /// How long fetched signing keys are trusted, in seconds.
    #[serde(default = "default_key_cache_ttl")]
    pub key_cache_ttl_secs: u64,
    /// Shared secret for the local provider.
    #[serde(default)]
    pub local_secret: Option<String>,
    /// Lifetime of tokens minted by the local provider, in seconds.
    #[serde(default = "default_local_token_expiry")]
    pub local_token_expiry_secs: u64,
}

fn default_jwks_url() -> String {
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com"
        .to_string()
}

fn default_key_cache_ttl() -> u64 {
    3600
}

fn default_local_token_expiry() -> u64 {
    3600
}

/// Object storage settings.
///
/// Kept flat so every field can be set from a single environment variable;
/// which fields are required depends on `provider`.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// `s3`, `azure_blob`, `local_fs` or `memory`.
    pub provider: String,
    /// S3 endpoint URL.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// S3 bucket name.
    #[serde(default)]
    pub bucket: Option<String>,
    /// S3 access key ID.
    #[serde(default)]
    pub access_key_id: Option<String>,
    /// S3 secret access key.
    #[serde(default)]
    pub secret_access_key: Option<String>,
    /// S3 region.
    #[serde(default)]
    pub region: Option<String>,
    /// Azure storage account name.
    #[serde(default)]
    pub account: Option<String>,
    /// Azure storage access key.
    #[serde(default)]
    pub access_key: Option<String>,
    /// Azure container name.
    #[serde(default)]
    pub container: Option<String>,
    /// Root directory for `local_fs`.
    #[serde(default)]
    pub root: Option<String>,
    /// Public URL prefix under which stored keys are reachable (CDN, bucket website).
    #[serde(default)]
    pub public_base_url: Option<String>,
    /// Presigned download URL TTL in seconds.
    #[serde(default = "default_download_ttl")]
    pub download_url_ttl_secs: u64,
}

fn default_download_ttl() -> u64 {
    3600
}

/// Upload validation limits.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadSettings {
    /// Accepted MIME types; `type/*` matches a whole family.
    #[serde(default = "default_allowed_mime_types")]
    pub allowed_mime_types: Vec<String>,
    /// Maximum image size in bytes.
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: u64,
    /// Maximum video size in bytes.
    #[serde(default = "default_max_video_bytes")]
    pub max_video_bytes: u64,
    /// Maximum audio size in bytes.
    #[serde(default = "default_max_audio_bytes")]
    pub max_audio_bytes: u64,
    /// Maximum document size in bytes.
    #[serde(default = "default_max_document_bytes")]
    pub max_document_bytes: u64,
    /// Thumbnail bounding box width.
    #[serde(default = "default_thumbnail_width")]
    pub thumbnail_width: u32,
    /// Thumbnail bounding box height.
    #[serde(default = "default_thumbnail_height")]
    pub thumbnail_height: u32,
    /// Thumbnail JPEG quality (1-100).
    #[serde(default = "default_thumbnail_quality")]
    pub thumbnail_quality: u8,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            allowed_mime_types: default_allowed_mime_types(),
            max_image_bytes: default_max_image_bytes(),
            max_video_bytes: default_max_video_bytes(),
            max_audio_bytes: default_max_audio_bytes(),
            max_document_bytes: default_max_document_bytes(),
            thumbnail_width: default_thumbnail_width(),
            thumbnail_height: default_thumbnail_height(),
            thumbnail_quality: default_thumbnail_quality(),
        }
    }
}

fn default_allowed_mime_types() -> Vec<String> {
    vec![
        "image/*".to_string(),
        "video/*".to_string(),
        "audio/*".to_string(),
        "application/pdf".to_string(),
    ]
}

fn default_max_image_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_max_video_bytes() -> u64 {
    100 * 1024 * 1024
}

fn default_max_audio_bytes() -> u64 {
    25 * 1024 * 1024
}

fn default_max_document_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_thumbnail_width() -> u32 {
    400
}

fn default_thumbnail_height() -> u32 {
    300
}

fn default_thumbnail_quality() -> u8 {
    75
}

/// Log output configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human readable output.
    #[serde(default)]
    pub json: bool,
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix("CARHOME")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("uploads.allowed_mime_types")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
