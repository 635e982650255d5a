//! Object storage for listing media using Apache OpenDAL.
//!
//! Supported backends:
//! - S3-compatible: AWS S3, Cloudflare R2, MinIO
//! - Azure Blob Storage
//! - Local filesystem (development only)
//! - In-process memory (tests)
//!
//! # Layout
//!
//! ```text
//! uploads/YYYY/MM/DD/{file_id}.{ext}            original blob
//! thumbnails/YYYY/MM/DD/thumb_{file_id}.jpg     generated thumbnail (images)
//! ```

mod config;
mod error;
mod service;

pub use config::{StorageConfig, StorageProvider};
pub use error::StorageError;
pub use service::StorageService;
