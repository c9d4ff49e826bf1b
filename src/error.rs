use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::validator::Validator;

/// Failures surfaced by the repository layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    /// Zero rows matched a version-guarded write.
    #[error("edit conflict")]
    Conflict,

    #[error("duplicate email")]
    DuplicateEmail,

    #[error("duplicate username")]
    DuplicateUsername,

    #[error("storage call timed out")]
    Timeout,

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => return StoreError::NotFound,
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                match db_err.constraint() {
                    Some("users_email_key") => return StoreError::DuplicateEmail,
                    Some("users_username_key") => return StoreError::DuplicateUsername,
                    _ => {}
                }
            }
            _ => {}
        }
        StoreError::Database(err)
    }
}

/// Error type returned by handlers and use cases.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("failed validation")]
    Validation(Validator),

    #[error("{0}")]
    BadRequest(String),

    #[error("invalid or expired token")]
    InvalidToken,

    /// No account for the supplied email, or malformed credentials.
    #[error("wrong credentials")]
    WrongCredentials,

    #[error("wrong password")]
    WrongPassword,

    #[error("user is not activated")]
    NotActive,

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    Forbidden(&'static str),

    /// Caller tried to mutate a record owned by someone else.
    #[error("{0}")]
    NotOwner(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Object storage or mail failure.
    #[error("upstream failure: {0}")]
    Upstream(anyhow::Error),

    #[error("internal error: {0}")]
    Internal(anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

const SERVER_ERROR_MESSAGE: &str = "the server encountered a problem and could not process your request";

impl AppError {
    pub fn validation(v: Validator) -> Self {
        AppError::Validation(v)
    }

    fn field(key: &str, message: &str) -> Self {
        let mut v = Validator::new();
        v.add_error(key, message);
        AppError::Validation(v)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::BadRequest(_)
            | AppError::InvalidToken
            | AppError::WrongCredentials
            | AppError::WrongPassword => StatusCode::BAD_REQUEST,
            AppError::NotActive | AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotOwner(_) => StatusCode::CONFLICT,
            AppError::Store(store) => match store {
                StoreError::NotFound => StatusCode::NOT_FOUND,
                StoreError::Conflict => StatusCode::CONFLICT,
                StoreError::DuplicateEmail | StoreError::DuplicateUsername => {
                    StatusCode::BAD_REQUEST
                }
                StoreError::Timeout | StoreError::Database(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            AppError::Upstream(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            AppError::Validation(v) => json!({ "errors": v }),
            AppError::Store(StoreError::DuplicateEmail) => {
                return AppError::field("email", "a user with this email address already exists")
                    .into_response();
            }
            AppError::Store(StoreError::DuplicateUsername) => {
                return AppError::field("username", "a user with this username already exists")
                    .into_response();
            }
            AppError::Store(StoreError::NotFound) => {
                json!({ "error": "the requested resource could not be found" })
            }
            AppError::Store(StoreError::Conflict) => json!({
                "error": "unable to update the record due to an edit conflict, please try again"
            }),
            // Unknown email and bad password are reported identically.
            AppError::WrongCredentials | AppError::WrongPassword => {
                json!({ "error": "wrong credentials" })
            }
            err if status.is_server_error() => {
                error!(error = %err, "request failed");
                json!({ "error": SERVER_ERROR_MESSAGE })
            }
            err => json!({ "error": err.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
