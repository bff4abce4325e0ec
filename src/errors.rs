use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::auth::AuthFailure;

pub type AppResult<T> = Result<T, AppError>;

/// User-facing text for the consultor mutation block. Distinct from the
/// generic forbidden message: it tells consultors they used the wrong portal,
/// not that they lack a role.
pub const CONSULTOR_BLOCK_MESSAGE: &str =
    "Tu cuenta de consultor no puede realizar esta acción desde el portal de empresas.";

/// User-facing text for an entitlement denial.
pub const PLAN_REQUIRED_MESSAGE: &str =
    "Se requiere el plan FULL activo para acceder a este contenido.";

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("unauthenticated: {0}")]
    Unauthenticated(AuthFailure),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("consultor blocked on mutation")]
    ConsultorBlocked,
    #[error("full plan required")]
    PlanRequired,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("database error")]
    Database(#[from] sqlx::Error),
    #[error("internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn unauthenticated(reason: AuthFailure) -> Self {
        Self::Unauthenticated(reason)
    }

    pub fn forbidden(detail: impl Into<String>) -> Self {
        Self::Forbidden(detail.into())
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::BadRequest(detail.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_user: Option<String>,
}

impl ErrorBody {
    fn code(error: &str) -> Self {
        Self {
            error: error.to_string(),
            detail: None,
            message_user: None,
        }
    }

    fn with_detail(error: &str, detail: String) -> Self {
        Self {
            error: error.to_string(),
            detail: Some(detail),
            message_user: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            // The categorized reason stays in server logs; the client gets a
            // generic code either way.
            AppError::Unauthenticated(reason) => {
                tracing::warn!(%reason, "authentication rejected");
                (StatusCode::UNAUTHORIZED, ErrorBody::code("UNAUTHENTICATED"))
            }
            AppError::Forbidden(detail) => (
                StatusCode::FORBIDDEN,
                ErrorBody::with_detail("FORBIDDEN", detail),
            ),
            AppError::ConsultorBlocked => (
                StatusCode::FORBIDDEN,
                ErrorBody {
                    error: "CONSULTOR_NOT_ALLOWED".to_string(),
                    detail: None,
                    message_user: Some(CONSULTOR_BLOCK_MESSAGE.to_string()),
                },
            ),
            AppError::PlanRequired => (
                StatusCode::FORBIDDEN,
                ErrorBody::code(PLAN_REQUIRED_MESSAGE),
            ),
            AppError::BadRequest(detail) => (
                StatusCode::BAD_REQUEST,
                ErrorBody::with_detail("BAD_REQUEST", detail),
            ),
            AppError::NotFound(detail) => (
                StatusCode::NOT_FOUND,
                ErrorBody::with_detail("NOT_FOUND", detail),
            ),
            AppError::Conflict(detail) => (
                StatusCode::CONFLICT,
                ErrorBody::with_detail("CONFLICT", detail),
            ),
            AppError::Configuration(message) => {
                tracing::error!(%message, "configuration error");
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorBody::code("INTERNAL"))
            }
            AppError::Database(err) => {
                tracing::error!(error = %err, "database error");
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorBody::code("INTERNAL"))
            }
            AppError::Internal(message) => {
                tracing::error!(%message, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorBody::code("INTERNAL"))
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value.to_string())
    }
}
