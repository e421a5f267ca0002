//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use pixio_core::PixioError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid credentials.
    #[error("{0}")]
    Unauthorized(String),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request - invalid input or a rejected operation.
    #[error("{message}")]
    BadRequest {
        /// Machine-readable code.
        code: &'static str,
        /// Human-readable message.
        message: String,
    },

    /// Conflict - resource already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Insufficient credits.
    #[error("insufficient credits: balance={balance}, required={required}")]
    InsufficientCredits {
        /// Current balance.
        balance: i64,
        /// Required amount.
        required: i64,
    },

    /// Too many requests for the current window.
    #[error("{0}")]
    RateLimited(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// External service error.
    #[error("external service error: {message}")]
    ExternalService {
        /// Machine-readable code.
        code: &'static str,
        /// Error message.
        message: String,
        /// Upstream status, if any.
        upstream_status: Option<u16>,
    },

    /// External service temporarily unavailable; the caller may retry.
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl ApiError {
    fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg.clone(), None),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            Self::BadRequest { code, message } => {
                (StatusCode::BAD_REQUEST, *code, message.clone(), None)
            }
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone(), None),
            Self::InsufficientCredits { balance, required } => (
                StatusCode::PAYMENT_REQUIRED,
                "insufficient_credits",
                self.to_string(),
                Some(serde_json::json!({
                    "balance": balance,
                    "required": required
                })),
            ),
            Self::RateLimited(msg) => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                msg.clone(),
                None,
            ),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
            Self::ExternalService {
                code,
                message,
                upstream_status,
            } => {
                tracing::warn!(code = %code, upstream_status = ?upstream_status, error = %message, "External service error");
                (
                    StatusCode::BAD_GATEWAY,
                    *code,
                    message.clone(),
                    upstream_status.map(|s| serde_json::json!({ "upstream_status": s })),
                )
            }
            Self::Unavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                msg.clone(),
                None,
            ),
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<PixioError> for ApiError {
    fn from(err: PixioError) -> Self {
        let message = err.to_string();
        match err {
            PixioError::Unauthenticated | PixioError::InvalidCredential => {
                Self::Unauthorized(message)
            }
            PixioError::AccountNotFound { .. } | PixioError::OtpNotFound { .. } => {
                Self::NotFound(message)
            }
            PixioError::UnknownPlan(_) => Self::bad_request("unknown_plan", message),
            PixioError::UnsupportedTool(_) => Self::bad_request("unsupported_tool", message),
            PixioError::OtpExpired => Self::bad_request("otp_expired", message),
            PixioError::OtpMismatch => Self::bad_request("otp_mismatch", message),
            PixioError::SignatureMismatch => Self::bad_request("signature_mismatch", message),
            PixioError::AlreadySettled { .. } => Self::bad_request("already_settled", message),
            PixioError::OrderMismatch { .. } => Self::bad_request("order_mismatch", message),
            PixioError::Validation(_) | PixioError::InvalidId(_) => {
                Self::bad_request("bad_request", message)
            }
            PixioError::InsufficientCredit { balance, required } => {
                Self::InsufficientCredits { balance, required }
            }
            PixioError::RateLimited { .. } => Self::RateLimited(message),
            PixioError::EmailTaken => Self::Conflict(message),
            PixioError::ExternalProvider(inner) => Self::ExternalService {
                code: "image_provider_error",
                message: inner.message,
                upstream_status: inner.status,
            },
            PixioError::DeliveryFailed(_) => Self::ExternalService {
                code: "delivery_failed",
                message,
                upstream_status: None,
            },
            PixioError::Gateway {
                retriable: true, ..
            } => Self::Unavailable(message),
            PixioError::Gateway { .. } => Self::ExternalService {
                code: "payment_gateway_error",
                message,
                upstream_status: None,
            },
            PixioError::Storage(_) | PixioError::Configuration(_) => Self::Internal(message),
        }
    }
}

impl From<pixio_store::StoreError> for ApiError {
    fn from(err: pixio_store::StoreError) -> Self {
        PixioError::from(err).into()
    }
}
