use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use types::errors::CoreError;

/// Central error type for the gateway
///
/// Wraps the core taxonomy and adds the one transport-level failure the
/// core does not know about.
#[derive(Debug)]
pub enum AppError {
    Core(CoreError),
    RateLimited(String),
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        AppError::Core(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::Core(err) => {
                let status = match &err {
                    CoreError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
                    CoreError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
                    CoreError::Forbidden(_) => StatusCode::FORBIDDEN,
                    CoreError::NotFound(_) => StatusCode::NOT_FOUND,
                    CoreError::Conflict(_) => StatusCode::CONFLICT,
                    CoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                let message = match &err {
                    // Internal details stay in the logs.
                    CoreError::Internal(detail) => {
                        tracing::error!(error = %detail, "internal error");
                        "internal error".to_string()
                    }
                    other => other.to_string(),
                };
                (status, err.code(), message)
            }
            AppError::RateLimited(msg) => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMIT_EXCEEDED", msg),
        };

        let body = Json(json!({
            "error": code,
            "message": message
        }));

        (status, body).into_response()
    }
}
