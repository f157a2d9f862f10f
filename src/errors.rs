use axum::{http::StatusCode, response::IntoResponse, Json};
use thiserror::Error;

use crate::JsonResponse;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("{0}")]
    Validation(&'static str),
    #[error("All Fields are required")]
    MissingFields,
    #[error("Password and Confirm Password do not match. Please try again.")]
    PasswordMismatch,
    #[error("User already exists. Please Login to continue.")]
    AlreadyRegistered,
    #[error("The OTP is not valid")]
    InvalidOtp,
    #[error("Incorrect credentials")]
    InvalidCredentials,
    #[error("{0}")]
    NotAuthorized(&'static str),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("Invalid or expired token")]
    InvalidOrExpiredToken,
    #[error("Failed to deliver email")]
    DeliveryFailed,
    #[error("database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

#[derive(serde::Serialize, serde::Deserialize, Debug)]
pub struct RequestErrorJson {
    pub success: bool,
    pub message: String,
}

impl RequestErrorJson {
    pub fn new(message: &str) -> RequestErrorJson {
        RequestErrorJson {
            success: false,
            message: message.to_string(),
        }
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> axum::response::Response {
        self.to_json_response().into_response()
    }
}

impl RequestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RequestError::Validation(_)
            | RequestError::PasswordMismatch
            | RequestError::AlreadyRegistered
            | RequestError::InvalidOtp
            | RequestError::InvalidOrExpiredToken => StatusCode::BAD_REQUEST,
            RequestError::MissingFields => StatusCode::FORBIDDEN,
            RequestError::InvalidCredentials | RequestError::NotAuthorized(_) => {
                StatusCode::UNAUTHORIZED
            }
            RequestError::NotFound(_) => StatusCode::NOT_FOUND,
            RequestError::DeliveryFailed
            | RequestError::DatabaseError(_)
            | RequestError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn to_json_response(&self) -> JsonResponse<RequestErrorJson> {
        let message = match self {
            RequestError::DatabaseError(e) => {
                tracing::error!(error = %e, "database error");
                "Internal Server Error".to_string()
            }
            RequestError::Internal(e) => {
                tracing::error!(error = ?e, "internal error");
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };
        (self.status_code(), Json(RequestErrorJson::new(&message)))
    }

    /// True for SQLite errors that a fresh attempt of the same transaction
    /// can get past: uniqueness races and lock contention.
    pub fn is_retryable(&self) -> bool {
        match self {
            RequestError::DatabaseError(sqlx::Error::Database(e)) => {
                let code = e.code();
                let code = code.as_deref();
                matches!(code, Some("5") | Some("6") | Some("517") | Some("2067"))
                    || e.message().contains("UNIQUE constraint failed")
                    || e.message().contains("database is locked")
            }
            _ => false,
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        match self {
            RequestError::DatabaseError(sqlx::Error::Database(e)) => {
                e.message().contains("UNIQUE constraint failed")
            }
            _ => false,
        }
    }
}
