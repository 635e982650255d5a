//! Firebase Authentication ID token verification.
//!
//! Firebase ID tokens are RS256 JWTs signed by Google. The public keys are
//! published as a JWKS document and rotate regularly, so they are cached for
//! a bounded time and refetched once when a token names an unknown `kid`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use moka::future::Cache;
use tracing::{debug, warn};

use crate::identity::{AuthError, Identity, IdentityVerifier, TokenClaims};

const ISSUER_PREFIX: &str = "https://securetoken.google.com/";
const KEYS_CACHE_KEY: &str = "firebase-jwks";

/// Where signing keys come from.
enum KeySource {
    /// Fetched over HTTPS from the JWKS endpoint.
    Remote {
        url: String,
        http: reqwest::Client,
        cache: Cache<&'static str, Arc<JwkSet>>,
    },
    /// Fixed key set.
    Static(Arc<JwkSet>),
}

/// Verifies Firebase ID tokens for one project.
pub struct FirebaseVerifier {
    project_id: String,
    keys: KeySource,
}

impl std::fmt::Debug for FirebaseVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let source = match &self.keys {
            KeySource::Remote { url, .. } => url.as_str(),
            KeySource::Static(_) => "static",
        };
        f.debug_struct("FirebaseVerifier")
            .field("project_id", &self.project_id)
            .field("keys", &source)
            .finish()
    }
}

impl FirebaseVerifier {
    /// Creates a verifier that fetches keys from `jwks_url` and trusts them for `key_ttl`.
    #[must_use]
    pub fn new(project_id: impl Into<String>, jwks_url: impl Into<String>, key_ttl: Duration) -> Self {
        Self {
            project_id: project_id.into(),
            keys: KeySource::Remote {
                url: jwks_url.into(),
                http: reqwest::Client::new(),
                cache: Cache::builder().max_capacity(1).time_to_live(key_ttl).build(),
            },
        }
    }

    /// Creates a verifier with a fixed key set.
    #[must_use]
    pub fn with_static_keys(project_id: impl Into<String>, keys: JwkSet) -> Self {
        Self {
            project_id: project_id.into(),
            keys: KeySource::Static(Arc::new(keys)),
        }
    }

    /// Expected `iss` claim for this project.
    #[must_use]
    pub fn issuer(&self) -> String {
        format!("{ISSUER_PREFIX}{}", self.project_id)
    }

    async fn key_set(&self) -> Result<Arc<JwkSet>, AuthError> {
        match &self.keys {
            KeySource::Static(keys) => Ok(keys.clone()),
            KeySource::Remote { url, http, cache } => cache
                .try_get_with(KEYS_CACHE_KEY, fetch_keys(http, url))
                .await
                .map_err(|e| (*e).clone()),
        }
    }

    async fn refresh_keys(&self) {
        if let KeySource::Remote { cache, .. } = &self.keys {
            cache.invalidate(KEYS_CACHE_KEY).await;
        }
    }

    async fn find_key(&self, kid: &str) -> Result<Jwk, AuthError> {
        if let Some(jwk) = self.key_set().await?.find(kid) {
            return Ok(jwk.clone());
        }

        debug!(kid = %kid, "Unknown signing key, refreshing key set");
        self.refresh_keys().await;

        self.key_set()
            .await?
            .find(kid)
            .cloned()
            .ok_or_else(|| AuthError::Invalid(format!("unknown signing key '{kid}'")))
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[self.project_id.as_str()]);
        validation.set_issuer(&[self.issuer()]);
        validation.set_required_spec_claims(&["exp", "sub", "aud", "iss"]);
        validation
    }
}

async fn fetch_keys(http: &reqwest::Client, url: &str) -> Result<Arc<JwkSet>, AuthError> {
    let response = http
        .get(url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| {
            warn!(error = %e, "Failed to fetch Firebase signing keys");
            AuthError::KeysUnavailable(e.to_string())
        })?;

    let keys: JwkSet = response
        .json()
        .await
        .map_err(|e| AuthError::KeysUnavailable(e.to_string()))?;

    debug!(count = keys.keys.len(), "Fetched Firebase signing keys");
    Ok(Arc::new(keys))
}

#[async_trait]
impl IdentityVerifier for FirebaseVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let header = decode_header(token).map_err(|e| AuthError::Invalid(e.to_string()))?;
        if header.alg != Algorithm::RS256 {
            return Err(AuthError::Invalid(format!(
                "unexpected signing algorithm {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| AuthError::Invalid("token header has no key id".to_string()))?;

        let jwk = self.find_key(&kid).await?;
        let key = DecodingKey::from_jwk(&jwk).map_err(|e| AuthError::Invalid(e.to_string()))?;

        decode::<TokenClaims>(token, &key, &self.validation())
            .map_err(|e| AuthError::from_jwt(&e))?
            .claims
            .into_identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::json;

    const PROJECT: &str = "findcarhome-test";
    const KID: &str = "test-key-1";
    const PRIVATE_KEY: &str = include_str!("../testdata/firebase_test_key.pem");
    const MODULUS: &str = "zqTsFKfD0DwodkrskHcJtDyOX0QseX92ICnaM0Z37Ji0dgIQzlDFNbld0yxyY9dQNrFbEtkox3i5R9k2RWJFwx8MLbfyvosJ_M2g57dKEZ7M0OQHLaJ6oGX4Wex4SFcSrrUrXnMTuPK1i6nDMM6SCfBR1GInqa09laOD8wwYHb4W9JGBotNK8lz7iUOUYfoNYPzFEU85MlP7td5V2t9SWNYrEw98290dLB77OOBure9x_Pyl6uLIl1Fev1SXGtLwupunGiE_8dxEBIKssAjZ6wotGp7AHEyKohlsCC_L817x-bULI-4ZXynpaKXDGmuVFDkGsm2lhWoNOEkqsHXICw";

    fn verifier() -> FirebaseVerifier {
        let keys: JwkSet = serde_json::from_value(json!({
            "keys": [{
                "kty": "RSA",
                "alg": "RS256",
                "use": "sig",
                "kid": KID,
                "n": MODULUS,
                "e": "AQAB"
            }]
        }))
        .expect("valid jwks");
        FirebaseVerifier::with_static_keys(PROJECT, keys)
    }

    fn sign(claims: &serde_json::Value, kid: Option<&str>) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = kid.map(String::from);
        let key = EncodingKey::from_rsa_pem(PRIVATE_KEY.as_bytes()).expect("valid test key");
        encode(&header, claims, &key).expect("token should encode")
    }

    fn claims(aud: &str, exp_offset: i64) -> serde_json::Value {
        let now = Utc::now().timestamp();
        json!({
            "iss": format!("{ISSUER_PREFIX}{aud}"),
            "aud": aud,
            "sub": "firebase-uid-42",
            "email": "buyer@example.com",
            "name": "Buyer",
            "iat": now - 10,
            "exp": now + exp_offset,
        })
    }

    #[tokio::test]
    async fn test_valid_token_yields_identity() {
        let token = sign(&claims(PROJECT, 600), Some(KID));

        let identity = verifier().verify(&token).await.unwrap();

        assert_eq!(identity.uid, "firebase-uid-42");
        assert_eq!(identity.email.as_deref(), Some("buyer@example.com"));
        assert_eq!(identity.name.as_deref(), Some("Buyer"));
    }

    #[tokio::test]
    async fn test_token_for_other_project_is_rejected() {
        let token = sign(&claims("someone-elses-project", 600), Some(KID));

        let err = verifier().verify(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected() {
        let token = sign(&claims(PROJECT, -600), Some(KID));

        let err = verifier().verify(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::Expired));
    }

    #[tokio::test]
    async fn test_unknown_kid_is_rejected() {
        let token = sign(&claims(PROJECT, 600), Some("rotated-away"));

        let err = verifier().verify(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::Invalid(msg) if msg.contains("rotated-away")));
    }

    #[tokio::test]
    async fn test_missing_kid_is_rejected() {
        let token = sign(&claims(PROJECT, 600), None);

        let err = verifier().verify(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_hs256_token_is_rejected() {
        let token = crate::jwt::LocalTokenVerifier::new(crate::jwt::LocalTokenConfig::default())
            .issue_token(&Identity::new("uid"))
            .unwrap();

        let err = verifier().verify(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::Invalid(_)));
    }

    #[test]
    fn test_issuer_format() {
        assert_eq!(
            verifier().issuer(),
            "https://securetoken.google.com/findcarhome-test"
        );
    }
}
