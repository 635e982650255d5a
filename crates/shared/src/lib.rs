//! Shared types, errors, configuration and identity verification for CarHome.
//!
//! This crate provides common pieces used across all other crates:
//! - Typed IDs and pagination types
//! - Application-wide error type
//! - Configuration management
//! - Caller identity and the token verifiers (Firebase, local HS256)

pub mod config;
pub mod error;
pub mod firebase;
pub mod identity;
pub mod jwt;
pub mod types;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use firebase::FirebaseVerifier;
pub use identity::{AuthError, Identity, IdentityVerifier, TokenClaims};
pub use jwt::{LocalTokenConfig, LocalTokenVerifier};
