//! Error types for NoteForge services
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for different failure modes
//! - HTTP status code mapping
//! - Structured error responses
//! - Error codes for client handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    MissingField,
    InvalidFormat,

    // Authentication errors (2xxx)
    Unauthorized,
    InvalidCredentials,
    ExpiredToken,

    // Authorization errors (3xxx)
    Forbidden,
    TenantMismatch,
    TargetIsAdmin,

    // Resource errors (4xxx)
    NotFound,
    TenantNotFound,
    UserNotFound,
    NoteNotFound,

    // Conflict errors (5xxx)
    Conflict,
    AlreadyPro,
    UpgradeAlreadyPending,
    NoPendingRequest,
    RequesterMissing,
    DuplicateUser,

    // Quota / rate limiting (6xxx)
    NoteLimitReached,
    RateLimited,

    // Database errors (7xxx)
    DatabaseError,
    ConnectionError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,

    // Service unavailable
    ServiceUnavailable,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            // Validation (1xxx)
            ErrorCode::ValidationError => 1001,
            ErrorCode::MissingField => 1002,
            ErrorCode::InvalidFormat => 1003,

            // Auth (2xxx)
            ErrorCode::Unauthorized => 2001,
            ErrorCode::InvalidCredentials => 2002,
            ErrorCode::ExpiredToken => 2003,

            // Authz (3xxx)
            ErrorCode::Forbidden => 3001,
            ErrorCode::TenantMismatch => 3002,
            ErrorCode::TargetIsAdmin => 3003,

            // Resources (4xxx)
            ErrorCode::NotFound => 4001,
            ErrorCode::TenantNotFound => 4002,
            ErrorCode::UserNotFound => 4003,
            ErrorCode::NoteNotFound => 4004,

            // Conflicts (5xxx)
            ErrorCode::Conflict => 5001,
            ErrorCode::AlreadyPro => 5002,
            ErrorCode::UpgradeAlreadyPending => 5003,
            ErrorCode::NoPendingRequest => 5004,
            ErrorCode::RequesterMissing => 5005,
            ErrorCode::DuplicateUser => 5006,

            // Quota (6xxx)
            ErrorCode::NoteLimitReached => 6001,
            ErrorCode::RateLimited => 6002,

            // Database (7xxx)
            ErrorCode::DatabaseError => 7001,
            ErrorCode::ConnectionError => 7002,

            // Internal (9xxx)
            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,

            ErrorCode::ServiceUnavailable => 9999,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Required field missing: {field}")]
    MissingField { field: String },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    // Authentication errors
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token expired")]
    ExpiredToken,

    // Authorization errors
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("Tenant mismatch")]
    TenantMismatch,

    #[error("Pro status cannot be revoked from an admin")]
    TargetIsAdmin,

    // Resource errors
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    #[error("Tenant not found: {id}")]
    TenantNotFound { id: String },

    #[error("User not found: {id}")]
    UserNotFound { id: String },

    #[error("Note not found: {id}")]
    NoteNotFound { id: String },

    // Conflict errors
    #[error("Tenant is already on Pro plan")]
    AlreadyPro,

    #[error("Upgrade request is already pending")]
    UpgradeAlreadyPending,

    #[error("No pending upgrade request for this tenant")]
    NoPendingRequest,

    #[error("Upgrade request has no recorded requester")]
    RequesterMissing,

    #[error("User already exists: {email}")]
    DuplicateUser { email: String },

    // Quota
    #[error("Note limit reached: {current} of {limit} notes used")]
    NoteLimitReached { limit: i64, current: i64 },

    #[error("Rate limit exceeded: {limit} requests per second")]
    RateLimited { limit: u32 },

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Service unavailable: {message}")]
    ServiceUnavailable { message: String },

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::MissingField { .. } => ErrorCode::MissingField,
            AppError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            AppError::Unauthorized { .. } => ErrorCode::Unauthorized,
            AppError::InvalidCredentials => ErrorCode::InvalidCredentials,
            AppError::ExpiredToken => ErrorCode::ExpiredToken,
            AppError::Forbidden { .. } => ErrorCode::Forbidden,
            AppError::TenantMismatch => ErrorCode::TenantMismatch,
            AppError::TargetIsAdmin => ErrorCode::TargetIsAdmin,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::TenantNotFound { .. } => ErrorCode::TenantNotFound,
            AppError::UserNotFound { .. } => ErrorCode::UserNotFound,
            AppError::NoteNotFound { .. } => ErrorCode::NoteNotFound,
            AppError::AlreadyPro => ErrorCode::AlreadyPro,
            AppError::UpgradeAlreadyPending => ErrorCode::UpgradeAlreadyPending,
            AppError::NoPendingRequest => ErrorCode::NoPendingRequest,
            AppError::RequesterMissing => ErrorCode::RequesterMissing,
            AppError::DuplicateUser { .. } => ErrorCode::DuplicateUser,
            AppError::NoteLimitReached { .. } => ErrorCode::NoteLimitReached,
            AppError::RateLimited { .. } => ErrorCode::RateLimited,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::DatabaseConnection { .. } => ErrorCode::ConnectionError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::ServiceUnavailable { .. } => ErrorCode::ServiceUnavailable,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. }
            | AppError::MissingField { .. }
            | AppError::InvalidFormat { .. } => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            AppError::Unauthorized { .. }
            | AppError::InvalidCredentials
            | AppError::ExpiredToken => StatusCode::UNAUTHORIZED,

            // 403 Forbidden
            AppError::Forbidden { .. }
            | AppError::TenantMismatch
            | AppError::TargetIsAdmin
            | AppError::NoteLimitReached { .. } => StatusCode::FORBIDDEN,

            // 404 Not Found
            AppError::NotFound { .. }
            | AppError::TenantNotFound { .. }
            | AppError::UserNotFound { .. }
            | AppError::NoteNotFound { .. } => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::AlreadyPro
            | AppError::UpgradeAlreadyPending
            | AppError::NoPendingRequest
            | AppError::RequesterMissing
            | AppError::DuplicateUser { .. } => StatusCode::CONFLICT,

            // 429 Too Many Requests
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 500 Internal Server Error
            AppError::Database(_)
            | AppError::DatabaseConnection { .. }
            | AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 503 Service Unavailable
            AppError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        // Storage and infrastructure failures get a generic message; the
        // specifics stay in the logs.
        let message = if self.is_server_error() {
            tracing::error!(
                error = %self,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
            "Internal server error".to_string()
        } else {
            tracing::warn!(
                error = %self,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
            self.to_string()
        };

        // Limit rejections carry enough context for the client to offer
        // the upgrade path.
        let details = match &self {
            AppError::NoteLimitReached { limit, current } => Some(serde_json::json!({
                "limit": limit,
                "current": current,
                "can_request_upgrade": true,
            })),
            _ => None,
        };

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::NoteNotFound { id: "test".into() };
        assert_eq!(err.code(), ErrorCode::NoteNotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_validation_error() {
        let err = AppError::Validation {
            message: "Invalid title".into(),
            field: Some("title".into()),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(!err.is_server_error());
        assert!(err.is_client_error());
    }

    #[test]
    fn test_conflict_errors() {
        assert_eq!(AppError::AlreadyPro.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::UpgradeAlreadyPending.status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::NoPendingRequest.code().as_code(),
            5004
        );
    }

    #[test]
    fn test_limit_reached_is_forbidden() {
        let err = AppError::NoteLimitReached { limit: 3, current: 3 };
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(err.code(), ErrorCode::NoteLimitReached);
    }

    #[test]
    fn test_server_error() {
        let err = AppError::Internal {
            message: "Something went wrong".into(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.is_server_error());
    }
}
