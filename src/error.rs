use axum::{
    extract::{
        multipart::MultipartError,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Error returned by every handler and middleware.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Password does not meet the complexity requirements")]
    PasswordComplexity,

    #[error("Invalid or expired verification token")]
    InvalidOrExpiredToken,

    #[error("Invalid credentials. Try again!")]
    InvalidCredentials,

    #[error("Please verify your email before logging in.")]
    Unverified,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden Access with this users role!")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("Too many requests from your IP, please try again later.")]
    RateLimited,

    #[error(transparent)]
    Internal(anyhow::Error),
}

/// Raised by a store when a write hits a unique index. Rendered as 409.
#[derive(Error, Debug)]
#[error("{0}")]
pub struct Duplicate(pub &'static str);

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        match e.downcast_ref::<Duplicate>() {
            Some(dup) => AppError::Conflict(dup.to_string()),
            None => AppError::Internal(e),
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_)
            | AppError::PasswordComplexity
            | AppError::InvalidOrExpiredToken => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Unverified | AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> Option<&'static str> {
        match self {
            AppError::PasswordComplexity => Some("PASSWORD_COMPLEXITY_ERROR"),
            AppError::InvalidOrExpiredToken => Some("INVALID_OR_EXPIRED_TOKEN"),
            AppError::Unverified => Some("EMAIL_NOT_VERIFIED"),
            _ => None,
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        AppError::BadRequest(msg.into())
    }
}

impl From<MultipartError> for AppError {
    fn from(e: MultipartError) -> Self {
        AppError::BadRequest(format!("invalid multipart body: {}", e.body_text()))
    }
}

impl From<JsonRejection> for AppError {
    fn from(e: JsonRejection) -> Self {
        AppError::BadRequest(e.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(e: PathRejection) -> Self {
        AppError::BadRequest(e.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Internal(e) => {
                tracing::error!(error = ?e, "internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = match self.code() {
            Some(code) => json!({ "error": message, "errorCode": code }),
            None => json!({ "error": message }),
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
