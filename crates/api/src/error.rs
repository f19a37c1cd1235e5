//! HTTP error responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use loimage_core::{IngestError, StoreError};
use loimage_shared::AppError;

/// Handler error rendered as `{"error": code, "message": text}`.
///
/// Server-side failures are logged and answered with a generic message.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl ApiError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self(AppError::Validation(msg.into()))
    }

    /// Create a not found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self(AppError::NotFound(msg.into()))
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self(err.into())
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let message = if self.0.is_client_error() {
            self.0.to_string()
        } else {
            error!(error = %self.0, "Request failed");
            "An error occurred".to_string()
        };
        (
            status,
            Json(json!({
                "error": self.0.error_code(),
                "message": message
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;
    use rstest::rstest;

    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[rstest]
    #[case(AppError::NotFound("image 3".into()), 404)]
    #[case(AppError::Validation("bad".into()), 400)]
    #[case(AppError::PayloadTooLarge("big".into()), 413)]
    #[case(AppError::UnsupportedMediaType("gif".into()), 415)]
    #[case(AppError::Database("down".into()), 500)]
    fn test_status_mapping(#[case] err: AppError, #[case] expected: u16) {
        let response = ApiError(err).into_response();
        assert_eq!(response.status().as_u16(), expected);
    }

    #[tokio::test]
    async fn test_server_errors_are_masked() {
        let response = ApiError(AppError::Database("password=hunter2".into())).into_response();
        let body = body_json(response).await;
        assert_eq!(body["message"], "An error occurred");
        assert_eq!(body["error"], AppError::Database(String::new()).error_code());
    }

    #[tokio::test]
    async fn test_client_errors_keep_message() {
        let response = ApiError::validation("no file parts").into_response();
        let body = body_json(response).await;
        assert!(body["message"].as_str().unwrap().contains("no file parts"));
    }
}
