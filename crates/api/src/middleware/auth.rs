//! Authentication middleware for protected routes.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use carhome_core::upload::RequestContext;
use carhome_shared::{AppError, AuthError, Identity};
use tracing::{debug, warn};

use crate::AppState;
use crate::error::ApiError;
use crate::middleware::client::ClientInfo;

/// Extracts the bearer token from the Authorization header.
fn extract_bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Authentication middleware that verifies bearer tokens.
///
/// The verified [`Identity`] is stored in the request extensions for
/// handlers to pick up through [`AuthUser`].
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(extract_bearer_token)
        .map(str::to_owned);

    let Some(token) = token else {
        return unauthorized("Authorization header with Bearer token is required");
    };

    match state.verifier.verify(&token).await {
        Ok(identity) => {
            debug!(uid = %identity.uid, "Authenticated request");
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(AuthError::Expired) => unauthorized("Token has expired"),
        Err(AuthError::KeysUnavailable(reason)) => {
            warn!(%reason, "Signing keys unavailable, rejecting token");
            unauthorized("Token could not be verified")
        }
        Err(e) => {
            debug!(error = %e, "Token rejected");
            unauthorized("Invalid or malformed token")
        }
    }
}

fn unauthorized(message: &str) -> Response {
    ApiError(AppError::Unauthorized(message.to_string())).into_response()
}

/// Extractor for the authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Identity);

impl AuthUser {
    /// Returns the caller's UID.
    #[must_use]
    pub fn uid(&self) -> &str {
        &self.0.uid
    }

    /// Combines the caller with client metadata for auditing.
    #[must_use]
    pub fn into_context(self, client: ClientInfo) -> RequestContext {
        RequestContext {
            identity: self.0,
            ip_address: client.ip_address,
            user_agent: client.user_agent,
        }
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| ApiError(AppError::Unauthorized("Authentication required".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Bearer abc", Some("abc"))]
    #[case("bearer abc", Some("abc"))]
    #[case("Bearer   ", None)]
    #[case("Basic abc", None)]
    #[case("abc", None)]
    fn test_extract_bearer_token(#[case] header: &str, #[case] expected: Option<&str>) {
        assert_eq!(extract_bearer_token(header), expected);
    }

    #[test]
    fn test_into_context_carries_client_info() {
        let user = AuthUser(Identity::new("uid-1"));
        let ctx = user.into_context(ClientInfo {
            ip_address: Some("10.0.0.1".to_string()),
            user_agent: Some("curl/8".to_string()),
        });

        assert_eq!(ctx.uid(), "uid-1");
        assert_eq!(ctx.ip_address.as_deref(), Some("10.0.0.1"));
        assert_eq!(ctx.user_agent.as_deref(), Some("curl/8"));
    }
}
