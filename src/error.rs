use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Errors raised while building or solving the order-to-line model.
#[derive(Debug, thiserror::Error)]
pub enum OtlError {
    #[error("order {0} has no admissible alternative")]
    NoAlternatives(usize),
    #[error("solver backend rejected the model: {0}")]
    ModelBuild(String),
}

/// Errors raised while building or solving the worker-to-line model.
#[derive(Debug, thiserror::Error)]
pub enum WlaError {
    #[error("solver backend rejected the model: {0}")]
    ModelBuild(String),
}

/// Errors surfaced across the HTTP boundary.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    BadRequest(String),
    #[error("internal error: {0}")]
    Internal(String),
    #[error(transparent)]
    Otl(#[from] OtlError),
    #[error(transparent)]
    Wla(#[from] WlaError),
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) | ApiError::Otl(_) | ApiError::Wla(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            message: self.to_string(),
        };
        (status, axum::Json(body)).into_response()
    }
}
