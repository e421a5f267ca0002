//! One-time code issuance and verification.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use pixio_core::{normalize_email, OneTimeCode, PixioError, Result};
use pixio_store::Store;

use crate::crypto::{constant_time_eq, random_otp_code};
use crate::mail::{MailMessage, Mailer};

/// Issues codes to an address and checks them back.
#[derive(Clone)]
pub struct OtpWorkflow {
    store: Arc<dyn Store>,
    mailer: Arc<dyn Mailer>,
    sender: String,
    codes: fn() -> String,
}

impl OtpWorkflow {
    /// Create the workflow.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, mailer: Arc<dyn Mailer>, sender: impl Into<String>) -> Self {
        Self {
            store,
            mailer,
            sender: sender.into(),
            codes: random_otp_code,
        }
    }

    /// Replace the code generator.
    #[cfg(test)]
    #[must_use]
    pub(crate) fn with_codes(mut self, codes: fn() -> String) -> Self {
        self.codes = codes;
        self
    }

    /// Issue a fresh code and mail it.
    ///
    /// # Errors
    ///
    /// `Validation` for an empty address, `DeliveryFailed` if the mail could
    /// not be sent (the code stays stored).
    pub async fn issue(&self, address: &str) -> Result<()> {
        self.issue_at(address, Utc::now()).await
    }

    /// [`issue`](Self::issue) with an explicit clock.
    ///
    /// # Errors
    ///
    /// See [`issue`](Self::issue).
    pub async fn issue_at(&self, address: &str, now: DateTime<Utc>) -> Result<()> {
        let address = normalize_email(address);
        if address.is_empty() {
            return Err(PixioError::Validation("email is required".into()));
        }

        let otp = OneTimeCode::issue(&address, (self.codes)(), now);
        self.store.replace_otp(&otp)?;
        tracing::info!(address = %address, "Verification code issued");

        let message = MailMessage::one_time_code(&self.sender, &address, &otp.code);
        self.mailer.send(&message).await.map_err(|e| {
            tracing::warn!(address = %address, error = %e, "Verification mail failed");
            match e {
                PixioError::DeliveryFailed(_) => e,
                other => PixioError::DeliveryFailed(other.to_string()),
            }
        })
    }

    /// Check a submitted code.
    ///
    /// # Errors
    ///
    /// `OtpNotFound`, `OtpExpired` or `OtpMismatch`.
    pub fn verify(&self, address: &str, code: &str) -> Result<()> {
        self.verify_at(address, code, Utc::now())
    }

    /// [`verify`](Self::verify) with an explicit clock.
    ///
    /// # Errors
    ///
    /// See [`verify`](Self::verify).
    pub fn verify_at(&self, address: &str, code: &str, now: DateTime<Utc>) -> Result<()> {
        let address = normalize_email(address);
        let otp = self
            .store
            .get_otp(&address)?
            .ok_or_else(|| PixioError::OtpNotFound {
                address: address.clone(),
            })?;

        if otp.is_expired(now) {
            return Err(PixioError::OtpExpired);
        }
        if !constant_time_eq(&otp.code, code.trim()) {
            return Err(PixioError::OtpMismatch);
        }

        // The code may have been reissued since we read it.
        if !self.store.mark_otp_verified(&address, &otp.code)? {
            return Err(PixioError::OtpMismatch);
        }

        tracing::info!(address = %address, "Verification code accepted");
        Ok(())
    }
}
