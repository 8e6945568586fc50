use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("MongoDB error: {0}")]
    MongoDB(#[from] mongodb::error::Error),

    #[error("Too many code requests, retry in {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: i64 },

    #[error("Could not deliver the recovery code: {0}")]
    DeliveryFailed(String),

    #[error("No active recovery code for this account")]
    NotFound,

    #[error("Recovery code has expired")]
    Expired,

    #[error("Too many failed attempts for this code")]
    AttemptsExhausted,

    #[error("Recovery code has already been used")]
    AlreadyUsed,

    #[error("Incorrect recovery code")]
    InvalidCode { attempts_remaining: i32 },

    #[error("Password rejected: {0}")]
    WeakCredential(String),

    #[error("An account with this email already exists")]
    DuplicateAccount,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable error kind string carried in the response body. Clients
    /// branch on this, not on the human-readable message.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::MongoDB(_) | AppError::Internal(_) => "Internal",
            AppError::RateLimited { .. } => "RateLimited",
            AppError::DeliveryFailed(_) => "DeliveryFailed",
            AppError::NotFound => "NotFound",
            AppError::Expired => "Expired",
            AppError::AttemptsExhausted => "AttemptsExhausted",
            AppError::AlreadyUsed => "AlreadyUsed",
            AppError::InvalidCode { .. } => "Invalid",
            AppError::WeakCredential(_) => "WeakCredential",
            AppError::DuplicateAccount => "DuplicateAccount",
            AppError::ValidationError(_) => "ValidationError",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::MongoDB(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::DeliveryFailed(_) => StatusCode::BAD_GATEWAY,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Expired
            | AppError::AttemptsExhausted
            | AppError::InvalidCode { .. }
            | AppError::WeakCredential(_)
            | AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::AlreadyUsed | AppError::DuplicateAccount => StatusCode::CONFLICT,
        };

        // Infrastructure details stay in the logs, not on the wire.
        let message = match &self {
            AppError::MongoDB(e) => {
                tracing::error!("Database error: {}", e);
                "Database error".to_string()
            }
            other => other.to_string(),
        };

        let mut body = json!({
            "success": false,
            "error": self.kind(),
            "message": message,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        match &self {
            AppError::RateLimited { retry_after_seconds } => {
                body["retryAfterSeconds"] = json!(retry_after_seconds);
            }
            AppError::InvalidCode { attempts_remaining } => {
                body["attemptsRemaining"] = json!(attempts_remaining);
            }
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(err: bcrypt::BcryptError) -> Self {
        AppError::Internal(format!("Password hashing failed: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
