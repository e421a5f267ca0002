//! Error types for Pixio.

use crate::ids::IdError;

/// Result type for Pixio operations.
pub type Result<T> = std::result::Result<T, PixioError>;

/// Errors that can occur in Pixio operations.
#[derive(Debug, thiserror::Error)]
pub enum PixioError {
    /// No credential was presented.
    #[error("no credential provided")]
    Unauthenticated,

    /// The credential failed signature or expiry verification.
    #[error("invalid or expired credential")]
    InvalidCredential,

    /// Account not found.
    #[error("account not found: {account_id}")]
    AccountNotFound {
        /// The account that was not found.
        account_id: String,
    },

    /// No one-time code is stored for the address.
    #[error("no verification code for {address}")]
    OtpNotFound {
        /// The destination address.
        address: String,
    },

    /// The plan identifier does not name a known plan.
    #[error("unknown plan: {0}")]
    UnknownPlan(String),

    /// The tool name does not name a supported tool.
    #[error("unsupported tool: {0}")]
    UnsupportedTool(String),

    /// The balance does not cover the cost of the operation.
    #[error("insufficient credit: balance={balance}, required={required}")]
    InsufficientCredit {
        /// Current balance.
        balance: i64,
        /// Required amount.
        required: i64,
    },

    /// The one-time code has expired.
    #[error("verification code expired")]
    OtpExpired,

    /// The submitted one-time code does not match.
    #[error("verification code mismatch")]
    OtpMismatch,

    /// The gateway signature does not match the recomputed HMAC.
    #[error("payment signature mismatch")]
    SignatureMismatch,

    /// The payment reference has already been applied.
    #[error("payment already settled: {payment_id}")]
    AlreadySettled {
        /// The gateway payment reference.
        payment_id: String,
    },

    /// The daily purchase cap has been reached.
    #[error("purchase limit reached: at most {limit} per day")]
    RateLimited {
        /// The configured cap.
        limit: u32,
    },

    /// The gateway order does not belong to the confirming account.
    #[error("order {order_id} does not belong to this account")]
    OrderMismatch {
        /// The gateway order reference.
        order_id: String,
    },

    /// The external image provider failed.
    #[error("image provider error: {0}")]
    ExternalProvider(#[from] ProviderError),

    /// Mail dispatch failed.
    #[error("mail delivery failed: {0}")]
    DeliveryFailed(String),

    /// The payment gateway failed.
    #[error("payment gateway error: {message}")]
    Gateway {
        /// Error message.
        message: String,
        /// Whether the caller may retry (timeouts, connection failures).
        retriable: bool,
    },

    /// The email address is already registered.
    #[error("email already registered")]
    EmailTaken,

    /// Request input failed validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Failure reported by the external image provider.
///
/// Carries the provider's HTTP status when one was received. A `None` status
/// means the call never produced a response (timeout, connection error).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ProviderError {
    /// HTTP status returned by the provider, if any.
    pub status: Option<u16>,
    /// Provider error message.
    pub message: String,
}

impl ProviderError {
    /// A failure with a provider status code.
    #[must_use]
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    /// A failure without a provider response.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    /// The call did not complete within the configured bound.
    #[must_use]
    pub fn timeout() -> Self {
        Self::transport("image provider timed out")
    }
}
