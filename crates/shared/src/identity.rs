//! Caller identity and the verifier seam.
//!
//! Handlers never see raw credentials: the auth middleware hands the bearer
//! token to an [`IdentityVerifier`] and stores the resulting [`Identity`] in
//! the request extensions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Verified caller identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Provider user ID (Firebase UID).
    pub uid: String,
    /// Email address, when the provider shares it.
    pub email: Option<String>,
    /// Display name, when the provider shares it.
    pub name: Option<String>,
}

impl Identity {
    /// Creates an identity with only a UID.
    #[must_use]
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
            name: None,
        }
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.email.as_deref().unwrap_or(&self.uid))
    }
}

/// Claims carried by ID tokens.
///
/// Firebase ID tokens and locally minted tokens share this shape; audience
/// and issuer are checked by the `jsonwebtoken` validation, not stored here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (user ID).
    pub sub: String,
    /// Email address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Issued at timestamp.
    pub iat: i64,
    /// Expiration timestamp.
    pub exp: i64,
}

impl TokenClaims {
    /// Converts verified claims into an identity.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Invalid` when the subject is empty.
    pub fn into_identity(self) -> Result<Identity, AuthError> {
        if self.sub.trim().is_empty() {
            return Err(AuthError::Invalid("token has an empty subject".to_string()));
        }
        Ok(Identity {
            uid: self.sub,
            email: self.email.filter(|e| !e.is_empty()),
            name: self.name.filter(|n| !n.is_empty()),
        })
    }
}

/// Errors that can occur while verifying a token.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// No bearer token was supplied.
    #[error("missing bearer token")]
    MissingToken,

    /// Token has expired.
    #[error("token has expired")]
    Expired,

    /// Token is malformed, badly signed or issued for another project.
    #[error("invalid token: {0}")]
    Invalid(String),

    /// Signing keys could not be obtained from the provider.
    #[error("signing keys unavailable: {0}")]
    KeysUnavailable(String),

    /// Token could not be created.
    #[error("failed to encode token: {0}")]
    Encoding(String),
}

impl AuthError {
    /// Maps a `jsonwebtoken` decoding failure.
    pub(crate) fn from_jwt(err: &jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => Self::Expired,
            _ => Self::Invalid(err.to_string()),
        }
    }
}

/// Verifies bearer tokens and yields the caller identity.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Verifies `token` and returns who presented it.
    async fn verify(&self, token: &str) -> Result<Identity, AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(sub: &str) -> TokenClaims {
        TokenClaims {
            sub: sub.to_string(),
            email: Some(String::new()),
            name: Some("Ana".to_string()),
            iat: 0,
            exp: 0,
        }
    }

    #[test]
    fn test_into_identity_drops_empty_fields() {
        let identity = claims("uid-1").into_identity().unwrap();
        assert_eq!(identity.uid, "uid-1");
        assert_eq!(identity.email, None);
        assert_eq!(identity.name.as_deref(), Some("Ana"));
    }

    #[test]
    fn test_into_identity_rejects_empty_subject() {
        let err = claims("  ").into_identity().unwrap_err();
        assert!(matches!(err, AuthError::Invalid(_)));
    }

    #[test]
    fn test_identity_display_prefers_email() {
        let mut identity = Identity::new("uid-1");
        assert_eq!(identity.to_string(), "uid-1");
        identity.email = Some("ana@example.com".to_string());
        assert_eq!(identity.to_string(), "ana@example.com");
    }
}
