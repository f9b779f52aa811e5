use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ApiError {
    #[error("paste not found")]
    NotFound,
    #[error("{0}")]
    InvalidInput(String),
    #[error("missing secret key")]
    MissingSecretKey,
    #[error("invalid secret key")]
    Forbidden,
    #[error("paste id already issued")]
    DuplicateId,
    #[error("no unique paste id after {attempts} attempts")]
    IdsExhausted { attempts: u32 },
    #[error("database error")]
    Database { source: sqlx::Error },
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::MissingSecretKey => StatusCode::BAD_REQUEST,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::DuplicateId => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::IdsExhausted { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Database { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();

        // internal details stay in the log
        let detail = if status_code.is_server_error() {
            error!("internal error: {self:?}");
            "internal server error".to_owned()
        } else {
            format!("{self}")
        };

        (status_code, Json(json!({ "detail": detail }))).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(source: sqlx::Error) -> Self {
        match source {
            sqlx::Error::RowNotFound => ApiError::NotFound,
            _ => ApiError::Database { source },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidInput(rejection.body_text())
    }
}
