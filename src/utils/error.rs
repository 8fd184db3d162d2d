use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, warn};

use crate::db::StoreError;
use crate::payments::GatewayError;
use crate::utils::response::error as error_response;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Upstream error: {message}")]
    UpstreamError {
        message: String,
        details: Option<Value>,
    },

    #[error("Database error")]
    DatabaseError(#[from] StoreError),

    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::UpstreamError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::AuthError(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::ConfigurationError(_) => "CONFIGURATION_ERROR",
            AppError::UpstreamError { .. } => "UPSTREAM_ERROR",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Message returned to the caller. Store failures are not described to clients.
    pub fn public_message(&self) -> String {
        match self {
            AppError::ValidationError(msg)
            | AppError::AuthError(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::ConfigurationError(msg) => msg.clone(),
            AppError::UpstreamError { message, .. } => message.clone(),
            AppError::DatabaseError(_) => "Internal error".to_string(),
            AppError::InternalServerError(_) => "Internal error".to_string(),
        }
    }

    /// Diagnostic payload: the processor's error body for upstream failures and
    /// the exception text for unexpected ones.
    pub fn details(&self) -> Option<Value> {
        match self {
            AppError::UpstreamError { details, .. } => details.clone(),
            AppError::InternalServerError(msg) => Some(Value::String(msg.clone())),
            AppError::DatabaseError(e) => Some(Value::String(e.to_string())),
            _ => None,
        }
    }

    fn log(&self) {
        match self {
            AppError::ValidationError(msg)
            | AppError::AuthError(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg) => {
                warn!(code = self.code(), message = %msg, "Request rejected");
            }
            AppError::ConfigurationError(msg) | AppError::InternalServerError(msg) => {
                error!(error = ?self, message = %msg, "Application error");
            }
            AppError::UpstreamError { message, details } => {
                error!(message = %message, details = ?details, "Payment processor error");
            }
            AppError::DatabaseError(e) => {
                error!(error = ?e, "Database error");
            }
        }
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Rejected { body, .. } => AppError::UpstreamError {
                message: "Stripe error".to_string(),
                details: Some(body),
            },
            other => AppError::UpstreamError {
                message: "Stripe error".to_string(),
                details: Some(Value::String(other.to_string())),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.log();
        error_response(
            self.code(),
            self.public_message(),
            self.details(),
            self.status_code(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn taxonomy_maps_to_http_statuses() {
        assert_eq!(
            AppError::ValidationError("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::AuthError("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Forbidden("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::ConfigurationError("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn processor_rejection_keeps_its_payload() {
        let body = json!({ "error": { "type": "card_error" } });
        let err = AppError::from(GatewayError::Rejected {
            status: 402,
            body: body.clone(),
        });
        assert_eq!(err.public_message(), "Stripe error");
        assert_eq!(err.details(), Some(body));
    }

    #[test]
    fn internal_errors_expose_the_message_as_details() {
        let err = AppError::InternalServerError("boom".into());
        assert_eq!(err.public_message(), "Internal error");
        assert_eq!(err.details(), Some(json!("boom")));
    }
}
