//! Core business logic for CarHome listing media.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! Persistence is reached through the [`upload::UploadRepository`] trait.
//!
//! # Modules
//!
//! - `upload` - Upload Manager, validation, image inspection
//! - `storage` - Object storage via OpenDAL

pub mod storage;
pub mod upload;
