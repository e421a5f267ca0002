//! One-time verification codes.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::normalize_email;

/// Number of digits in a code.
pub const OTP_DIGITS: usize = 6;

/// Lifetime of an issued code.
pub const OTP_TTL_SECONDS: i64 = 5 * 60;

/// A verification code issued to an address.
///
/// Only one code exists per address; issuing a new code replaces the old one.
/// Expiry is logical: the record stays until replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneTimeCode {
    /// Destination address, normalized.
    pub address: String,

    /// Fixed-width numeric code.
    pub code: String,

    /// Moment from which the code is no longer accepted.
    pub expires_at: DateTime<Utc>,

    /// Whether the code has been verified.
    pub verified: bool,

    /// When the code was issued.
    pub created_at: DateTime<Utc>,
}

impl OneTimeCode {
    /// Issue a code at `now` with the standard lifetime.
    #[must_use]
    pub fn issue(address: &str, code: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            address: normalize_email(address),
            code: code.into(),
            expires_at: now + Duration::seconds(OTP_TTL_SECONDS),
            verified: false,
            created_at: now,
        }
    }

    /// Whether the code is expired at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Render a numeric value as a fixed-width code.
    #[must_use]
    pub fn format_code(value: u32) -> String {
        format!("{value:0width$}", width = OTP_DIGITS)
    }
}
