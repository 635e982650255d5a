//! Error to HTTP response mapping.

use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use carhome_core::upload::UploadError;
use carhome_shared::AppError;
use serde_json::json;
use tracing::{debug, error};

/// Handler error rendered as `{"error": <CODE>, "message": <text>}`.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        Self(err.into())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        let message = err.body_text();
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self(AppError::PayloadTooLarge(message))
        } else {
            Self(AppError::Validation(format!("Malformed multipart body: {message}")))
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        if err.is_server_error() {
            error!(error = %err, "Request failed");
        } else {
            debug!(error = %err, "Request rejected");
        }

        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(json!({
            "error": err.error_code(),
            "message": err.public_message(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carhome_shared::types::id::FileId;
    use http_body_util::BodyExt;
    use rstest::rstest;

    async fn render(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[rstest]
    #[case(UploadError::validation("bad"), StatusCode::BAD_REQUEST, "VALIDATION_ERROR")]
    #[case(UploadError::not_found(FileId::new()), StatusCode::NOT_FOUND, "NOT_FOUND")]
    #[case(UploadError::repository("boom"), StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR")]
    #[tokio::test]
    async fn test_upload_errors_render_as_json(
        #[case] err: UploadError,
        #[case] status: StatusCode,
        #[case] code: &str,
    ) {
        let (actual_status, body) = render(err.into()).await;
        assert_eq!(actual_status, status);
        assert_eq!(body["error"], code);
    }

    #[tokio::test]
    async fn test_server_errors_hide_details() {
        let (status, body) = render(AppError::Database("connection reset".into()).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "An error occurred");
    }

    #[tokio::test]
    async fn test_storage_not_configured_is_503() {
        let (status, body) = render(AppError::StorageNotConfigured.into()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "STORAGE_NOT_CONFIGURED");
    }
}
