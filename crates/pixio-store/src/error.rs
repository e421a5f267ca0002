//! Error types for Pixio storage.

use pixio_core::PixioError;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("not found")]
    NotFound,

    /// Insufficient credits for deduction.
    #[error("insufficient credits: balance={balance}, required={required}")]
    InsufficientCredits {
        /// Current balance.
        balance: i64,
        /// Required amount.
        required: i64,
    },

    /// The payment reference is already carried by a settled entry.
    #[error("duplicate payment: {payment_id}")]
    DuplicatePayment {
        /// The payment reference that was duplicated.
        payment_id: String,
    },

    /// The account already settled its daily allowance.
    #[error("daily purchase cap reached: {limit}")]
    DailyCapReached {
        /// The cap that was hit.
        limit: u32,
    },

    /// A balance change carried a negative amount.
    #[error("invalid credit amount: {amount}")]
    InvalidAmount {
        /// The rejected amount.
        amount: i64,
    },

    /// Another account already uses the email address.
    #[error("email already registered")]
    EmailTaken,
}

impl From<StoreError> for PixioError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InsufficientCredits { balance, required } => {
                Self::InsufficientCredit { balance, required }
            }
            StoreError::DuplicatePayment { payment_id } => Self::AlreadySettled { payment_id },
            StoreError::DailyCapReached { limit } => Self::RateLimited { limit },
            StoreError::EmailTaken => Self::EmailTaken,
            StoreError::InvalidAmount { amount } => {
                Self::Validation(format!("credit amount must not be negative: {amount}"))
            }
            other => Self::Storage(other.to_string()),
        }
    }
}
