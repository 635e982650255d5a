//! Locally signed HS256 tokens.
//!
//! Used in development and tests in place of Firebase: the same claims, signed
//! with a shared secret, so the rest of the stack runs unchanged.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use crate::identity::{AuthError, Identity, IdentityVerifier, TokenClaims};

/// Local token configuration.
#[derive(Debug, Clone)]
pub struct LocalTokenConfig {
    /// Secret key for signing tokens.
    pub secret: String,
    /// Token lifetime in seconds.
    pub expires_in_secs: i64,
}

impl Default for LocalTokenConfig {
    fn default() -> Self {
        Self {
            secret: "change-me-in-production".to_string(),
            expires_in_secs: 3600,
        }
    }
}

/// HS256 token issuer and verifier.
#[derive(Clone)]
pub struct LocalTokenVerifier {
    config: LocalTokenConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for LocalTokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalTokenVerifier")
            .field("expires_in_secs", &self.config.expires_in_secs)
            .field("encoding_key", &"[hidden]")
            .field("decoding_key", &"[hidden]")
            .finish()
    }
}

impl LocalTokenVerifier {
    /// Creates a new verifier with the given configuration.
    #[must_use]
    pub fn new(config: LocalTokenConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// Issues a token for `identity`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Encoding` if token generation fails.
    pub fn issue_token(&self, identity: &Identity) -> Result<String, AuthError> {
        self.issue_token_expiring_in(identity, Duration::seconds(self.config.expires_in_secs))
    }

    /// Issues a token with an explicit lifetime (negative lifetimes yield expired tokens).
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Encoding` if token generation fails.
    pub fn issue_token_expiring_in(
        &self,
        identity: &Identity,
        lifetime: Duration,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = TokenClaims {
            sub: identity.uid.clone(),
            email: identity.email.clone(),
            name: identity.name.clone(),
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Encoding(e.to_string()))
    }

    /// Validates and decodes a token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Expired` if the token has expired.
    /// Returns `AuthError::Invalid` if the token is malformed.
    pub fn validate_token(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<TokenClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::from_jwt(&e))
    }
}

#[async_trait]
impl IdentityVerifier for LocalTokenVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        self.validate_token(token)?.into_identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_verifier() -> LocalTokenVerifier {
        LocalTokenVerifier::new(LocalTokenConfig {
            secret: "test-secret-key-for-testing".to_string(),
            expires_in_secs: 900,
        })
    }

    #[tokio::test]
    async fn test_issue_and_verify_round_trip() {
        let verifier = create_test_verifier();
        let identity = Identity {
            uid: "firebase-uid-1".to_string(),
            email: Some("seller@example.com".to_string()),
            name: None,
        };

        let token = verifier.issue_token(&identity).unwrap();
        let verified = verifier.verify(&token).await.unwrap();

        assert_eq!(verified, identity);
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected() {
        let verifier = create_test_verifier();
        let token = verifier
            .issue_token_expiring_in(&Identity::new("uid"), Duration::minutes(-5))
            .unwrap();

        let err = verifier.verify(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::Expired));
    }

    #[tokio::test]
    async fn test_token_signed_with_other_secret_is_rejected() {
        let other = LocalTokenVerifier::new(LocalTokenConfig {
            secret: "another-secret".to_string(),
            expires_in_secs: 900,
        });
        let token = other.issue_token(&Identity::new("uid")).unwrap();

        let err = create_test_verifier().verify(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_garbage_token_is_rejected() {
        let err = create_test_verifier()
            .verify("invalid.token.here")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Invalid(_)));
    }
}
