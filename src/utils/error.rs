use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

use crate::database::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or missing input fields, one message per field
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// Token present but not valid (bad signature, expired)
    #[error("{0}")]
    Unauthorized(String),

    /// Missing token, insufficient role or not the owner
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// Cross-entity IDs that did not resolve (or failed the role requirement)
    #[error("{message}")]
    Reference { message: String, missing: Vec<String> },

    /// Record store failure; the detail only goes to `details`
    #[error("Upstream store error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(vec![message.into()])
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        AppError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(message.into())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => AppError::Conflict(msg),
            other => AppError::Upstream(other.to_string()),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Reference { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Upstream(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            AppError::Validation(messages) => serde_json::json!({
                "success": false,
                "error": messages
            }),
            AppError::Reference { message, missing } => serde_json::json!({
                "success": false,
                "error": message,
                "missing_ids": missing
            }),
            AppError::Upstream(detail) => {
                log::error!("❌ Upstream store failure: {}", detail);
                serde_json::json!({
                    "success": false,
                    "error": "Upstream store failure",
                    "details": detail
                })
            }
            AppError::Internal(detail) => {
                log::error!("❌ Internal failure: {}", detail);
                serde_json::json!({
                    "success": false,
                    "error": "Internal server error",
                    "details": detail
                })
            }
            other => serde_json::json!({
                "success": false,
                "error": other.to_string()
            }),
        };

        HttpResponse::build(self.status_code()).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::validation("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Unauthorized("x".into()).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::forbidden("x").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::Reference { message: "x".into(), missing: vec![] }.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::Upstream("x".into()).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_store_conflict_maps_to_409() {
        let err: AppError = StoreError::Conflict("duplicate user_email".into()).into();
        assert!(matches!(err, AppError::Conflict(_)));

        let err: AppError = StoreError::Transient("timeout".into()).into();
        assert!(matches!(err, AppError::Upstream(_)));
    }
}
