//! Error handler for converting AppError to HTTP responses.
//!
//! Client errors carry their message. Server errors are logged and answered
//! with a generic message so store or configuration internals never reach
//! the caller.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::api::dto::ErrorResponse;
use crate::error::AppError;

impl IntoResponse for AppError {
    /// # Status Code Mapping
    /// - NotFound → 404 NOT_FOUND
    /// - BadRequest → 400 BAD_REQUEST
    /// - Unauthorized → 401 UNAUTHORIZED
    /// - Forbidden → 403 FORBIDDEN
    /// - Store → 503 SERVICE_UNAVAILABLE
    /// - Configuration → 500 INTERNAL_SERVER_ERROR
    /// - Internal → 500 INTERNAL_SERVER_ERROR
    fn into_response(self) -> Response {
        let status = error_to_status_code(&self);
        let code = error_to_code(&self);

        let error_response = match &self {
            AppError::NotFound { message }
            | AppError::BadRequest { message }
            | AppError::Unauthorized { message }
            | AppError::Forbidden { message } => ErrorResponse::new(code, message),
            AppError::Store { source } => {
                tracing::error!(error = %source, "Document store request failed");
                ErrorResponse::new(code, "Document store unavailable")
            }
            AppError::Configuration { key, source } => {
                tracing::error!(key = %key, error = %source, "Configuration error");
                ErrorResponse::new(code, "Configuration error").with_details(json!({ "key": key }))
            }
            AppError::Internal { source } => {
                tracing::error!(error = ?source, "Internal error");
                ErrorResponse::new(code, "An internal error occurred")
            }
        };

        (status, Json(error_response)).into_response()
    }
}

/// Maps an AppError variant to its HTTP status code.
pub fn error_to_status_code(error: &AppError) -> StatusCode {
    match error {
        AppError::NotFound { .. } => StatusCode::NOT_FOUND,
        AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
        AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
        AppError::Store { .. } => StatusCode::SERVICE_UNAVAILABLE,
        AppError::Configuration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Maps an AppError variant to its error code string.
pub fn error_to_code(error: &AppError) -> &'static str {
    match error {
        AppError::NotFound { .. } => "NOT_FOUND",
        AppError::BadRequest { .. } => "BAD_REQUEST",
        AppError::Unauthorized { .. } => "UNAUTHORIZED",
        AppError::Forbidden { .. } => "FORBIDDEN",
        AppError::Store { .. } => "SERVICE_UNAVAILABLE",
        AppError::Configuration { .. } => "CONFIGURATION_ERROR",
        AppError::Internal { .. } => "INTERNAL_ERROR",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::RepositoryError;
    use crate::store::StoreError;
    use axum::body::to_bytes;

    async fn body_of(response: Response) -> ErrorResponse {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_not_found_response() {
        let response = AppError::from(RepositoryError::EntityNotFound).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_of(response).await;
        assert_eq!(body.code, "NOT_FOUND");
        assert_eq!(body.message, "Entity not found");
    }

    #[tokio::test]
    async fn test_bad_request_response() {
        let response =
            AppError::from(RepositoryError::invalid_argument("limit too large")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_of(response).await.message.contains("limit too large"));
    }

    #[tokio::test]
    async fn test_unauthorized_and_forbidden() {
        let response = AppError::unauthorized("Invalid token header").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_of(response).await.message, "Invalid token header");

        let response = AppError::forbidden("nope").into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_store_error_is_not_leaked() {
        let response = AppError::from(StoreError::invalid_query("secret detail")).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = body_of(response).await;
        assert_eq!(body.code, "SERVICE_UNAVAILABLE");
        assert!(!body.message.contains("secret detail"));
        assert!(body.details.is_none());
    }

    #[tokio::test]
    async fn test_internal_error_is_not_leaked() {
        let response = AppError::from(anyhow::anyhow!("stack details")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_of(response).await;
        assert_eq!(body.message, "An internal error occurred");
    }

    #[test]
    fn test_status_code_mapping() {
        let cases = [
            (AppError::NotFound { message: String::new() }, StatusCode::NOT_FOUND),
            (AppError::BadRequest { message: String::new() }, StatusCode::BAD_REQUEST),
            (AppError::unauthorized(""), StatusCode::UNAUTHORIZED),
            (AppError::forbidden(""), StatusCode::FORBIDDEN),
            (AppError::from(StoreError::NoDocuments), StatusCode::SERVICE_UNAVAILABLE),
            (AppError::from(anyhow::anyhow!("x")), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, expected) in cases {
            assert_eq!(error_to_status_code(&error), expected, "{error:?}");
        }
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(error_to_code(&AppError::unauthorized("")), "UNAUTHORIZED");
        assert_eq!(
            error_to_code(&AppError::from(anyhow::anyhow!("x"))),
            "INTERNAL_ERROR"
        );
    }
}
