//! # API Error
//!
//! The one error type handlers return. Every failure leaves the server as
//! a JSON body:
//!
//! ```json
//! { "code": "INSUFFICIENT_STOCK", "message": "...", "retryable": false }
//! ```
//!
//! ## Status Mapping
//! ```text
//! ┌──────────────────────────────────────────┬────────┬──────────────────────┐
//! │ Source                                   │ Status │ Code                 │
//! ├──────────────────────────────────────────┼────────┼──────────────────────┤
//! │ NotFound, *NotFound, NoActiveOrder       │  404   │ NOT_FOUND            │
//! │ Validation, EmptyCart, CartTooLarge,     │  400   │ VALIDATION           │
//! │ ItemIndexOutOfRange                      │        │                      │
//! │ InsufficientStock                        │  400   │ INSUFFICIENT_STOCK   │
//! │ InsufficientPoints                       │  400   │ INSUFFICIENT_POINTS  │
//! │ InvalidTransition, ItemAlreadyDispatched │  400   │ INVALID_TRANSITION   │
//! │ TableNotAvailable                        │  409   │ TABLE_NOT_AVAILABLE  │
//! │ StaleVersion                             │  409   │ STALE_VERSION        │
//! │ UniqueViolation, ForeignKeyViolation     │  409   │ CONFLICT             │
//! │ busy / pool / connection (retryable)     │  503   │ UNAVAILABLE          │
//! │ missing / bad / expired token            │  401   │ UNAUTHORIZED, ...    │
//! │ tenant not ACTIVE, role too low          │  403   │ TENANT_INACTIVE, ... │
//! │ anything else                            │  500   │ INTERNAL             │
//! └──────────────────────────────────────────┴────────┴──────────────────────┘
//! ```
//!
//! "Nothing to do" outcomes (dispatch with no pending lines and the like)
//! are not errors. Handlers answer them with 200 and `"changed": false`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};
use vyapar_core::CoreError;
use vyapar_db::DbError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    Validation,
    InsufficientStock,
    InsufficientPoints,
    InvalidTransition,
    TableNotAvailable,
    StaleVersion,
    Conflict,
    Unauthorized,
    TokenExpired,
    Forbidden,
    TenantInactive,
    Unavailable,
    Internal,
}

impl ErrorCode {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Validation
            | ErrorCode::InsufficientStock
            | ErrorCode::InsufficientPoints
            | ErrorCode::InvalidTransition => StatusCode::BAD_REQUEST,
            ErrorCode::TableNotAvailable | ErrorCode::StaleVersion | ErrorCode::Conflict => {
                StatusCode::CONFLICT
            }
            ErrorCode::Unauthorized | ErrorCode::TokenExpired => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden | ErrorCode::TenantInactive => StatusCode::FORBIDDEN,
            ErrorCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Validation => "VALIDATION",
            ErrorCode::InsufficientStock => "INSUFFICIENT_STOCK",
            ErrorCode::InsufficientPoints => "INSUFFICIENT_POINTS",
            ErrorCode::InvalidTransition => "INVALID_TRANSITION",
            ErrorCode::TableNotAvailable => "TABLE_NOT_AVAILABLE",
            ErrorCode::StaleVersion => "STALE_VERSION",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::TokenExpired => "TOKEN_EXPIRED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::TenantInactive => "TENANT_INACTIVE",
            ErrorCode::Unavailable => "UNAVAILABLE",
            ErrorCode::Internal => "INTERNAL",
        }
    }

    /// Nothing was committed; the caller may repeat the whole request.
    pub fn is_retryable(self) -> bool {
        self == ErrorCode::Unavailable
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{}: {message}", code.as_str())]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: ErrorCode,
    message: &'a str,
    retryable: bool,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::NotFound, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Forbidden, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }

    pub fn status(&self) -> StatusCode {
        self.code.status()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code,
            message: &self.message,
            retryable: self.code.is_retryable(),
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let code = match &err {
            e if e.is_not_found() => ErrorCode::NotFound,
            CoreError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
            CoreError::InsufficientPoints { .. } => ErrorCode::InsufficientPoints,
            CoreError::InvalidTransition { .. } | CoreError::ItemAlreadyDispatched { .. } => {
                ErrorCode::InvalidTransition
            }
            CoreError::TableNotAvailable { .. } => ErrorCode::TableNotAvailable,
            _ => ErrorCode::Validation,
        };
        ApiError::new(code, err.to_string())
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        if err.is_not_found() {
            return match err {
                DbError::Domain(core) => core.into(),
                other => ApiError::not_found(other.to_string()),
            };
        }
        if err.is_retryable() {
            warn!(error = %err, "Storage temporarily unavailable");
            return ApiError::new(ErrorCode::Unavailable, err.to_string());
        }

        match err {
            DbError::Domain(core) => core.into(),
            DbError::StaleVersion { .. } => ApiError::new(ErrorCode::StaleVersion, err.to_string()),
            DbError::UniqueViolation { .. } | DbError::ForeignKeyViolation { .. } => {
                ApiError::new(ErrorCode::Conflict, err.to_string())
            }
            other => {
                error!(error = %other, "Database error");
                ApiError::internal("Internal server error")
            }
        }
    }
}
