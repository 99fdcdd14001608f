use thiserror::Error;
use actix_web::{ResponseError, HttpResponse, http::StatusCode};
use serde_json::json;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    AuthError(#[from] AuthError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),

    #[error("{0}")]
    DependencyError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("{0}")]
    ValidationError(String),

    #[error("{0}")]
    NotFound(String),
}

impl AppError {
    /// Remaining OTP attempts, reported alongside an incorrect code.
    pub fn attempts_left(&self) -> Option<u32> {
        match self {
            AppError::AuthError(AuthError::IncorrectOtp { attempts_left }) => Some(*attempts_left),
            _ => None,
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::DatabaseError(DatabaseError::NotFound),
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::DatabaseError(DatabaseError::Duplicate)
            }
            _ => AppError::DatabaseError(DatabaseError::QueryError(err.to_string())),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::DatabaseError(DatabaseError::QueryError(err.to_string()))
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::DependencyError(format!("OTP store unavailable: {}", err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::DependencyError(format!("Failed to send OTP: {}", err))
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        AppError::InternalError(format!("Token signing failed: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InternalError(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(err.to_string())
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let mut body = json!({ "error": self.to_string() });
        if let Some(left) = self.attempts_left() {
            body["attemptsLeft"] = json!(left);
        }
        HttpResponse::build(status).json(body)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::AuthError(e) => match e {
                AuthError::OtpAlreadyPending => StatusCode::TOO_MANY_REQUESTS,
                AuthError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                AuthError::OtpExpiredOrNotFound => StatusCode::BAD_REQUEST,
                AuthError::IncorrectOtp { .. } => StatusCode::BAD_REQUEST,
                AuthError::OtpLocked => StatusCode::FORBIDDEN,
                AuthError::MissingToken => StatusCode::UNAUTHORIZED,
                AuthError::AccessDenied => StatusCode::UNAUTHORIZED,
                AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
                AuthError::TokenNotRecognized => StatusCode::FORBIDDEN,
                AuthError::Forbidden => StatusCode::FORBIDDEN,
            },
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DatabaseError(DatabaseError::NotFound) => StatusCode::NOT_FOUND,
            AppError::DatabaseError(DatabaseError::Duplicate) => StatusCode::CONFLICT,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::DependencyError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("OTP already sent. Please wait before requesting another one.")]
    OtpAlreadyPending,

    #[error("Too many OTP requests, please try again later.")]
    RateLimited,

    #[error("OTP expired or not found")]
    OtpExpiredOrNotFound,

    #[error("Incorrect OTP")]
    IncorrectOtp { attempts_left: u32 },

    #[error("Too many failed attempts. OTP has expired.")]
    OtpLocked,

    #[error("Refresh token is required")]
    MissingToken,

    #[error("Access denied")]
    AccessDenied,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Refresh token not recognized")]
    TokenNotRecognized,

    #[error("Unauthorized")]
    Forbidden,
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Record not found")]
    NotFound,

    #[error("Duplicate record")]
    Duplicate,
}
