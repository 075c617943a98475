use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use wayfare_catalog::CatalogError;
use wayfare_core::CoreError;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    ValidationError(String),
    NotFoundError(String),
    ConflictError(String),
    InternalServerError(String),
    Anyhow(anyhow::Error),
}

impl AppError {
    fn status_and_message(self) -> (StatusCode, String) {
        match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::InternalServerError(msg) => internal(msg),
            AppError::Anyhow(err) => classify(err),
        }
    }
}

fn internal(msg: impl std::fmt::Display) -> (StatusCode, String) {
    tracing::error!("Internal Server Error: {}", msg);
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
}

/// Errors arrive here through `?`; domain errors keep their meaning.
fn classify(err: anyhow::Error) -> (StatusCode, String) {
    if let Some(core) = err.downcast_ref::<CoreError>() {
        return match core {
            CoreError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            CoreError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            CoreError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            CoreError::InternalError(msg) => internal(msg),
        };
    }
    if let Some(catalog) = err.downcast_ref::<CatalogError>() {
        return (StatusCode::BAD_REQUEST, catalog.to_string());
    }
    internal(err)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = self.status_and_message();

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::Anyhow(err.into())
    }
}
