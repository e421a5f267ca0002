//! Verification mail delivery.
//!
//! [`HttpMailer`] posts messages to a transactional mail relay. When no relay
//! is configured the service falls back to [`LogMailer`], which only logs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use pixio_core::{PixioError, OTP_TTL_SECONDS};

/// Subject line of verification mail.
pub const OTP_SUBJECT: &str = "Pixio Email Verification Code";

/// An outgoing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailMessage {
    /// Sender address.
    pub from: String,
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub text: String,
    /// HTML body.
    pub html: String,
}

impl MailMessage {
    /// Build the verification message for a code.
    #[must_use]
    pub fn one_time_code(from: &str, to: &str, code: &str) -> Self {
        let minutes = OTP_TTL_SECONDS / 60;
        Self {
            from: format!("Pixio Security <{from}>"),
            to: to.to_string(),
            subject: OTP_SUBJECT.to_string(),
            text: format!(
                "Your Pixio verification code is {code}. This code will expire in {minutes} minutes."
            ),
            html: format!(
                "<div style=\"font-family: Arial, sans-serif;\">\
                 <h2>Pixio Verification</h2>\
                 <p>Use the following code to verify your email address.</p>\
                 <p style=\"font-size:28px;letter-spacing:6px;font-weight:600;\">{code}</p>\
                 <p>This code will expire in {minutes} minutes. \
                 If you did not request this, you can safely ignore this email.</p>\
                 </div>"
            ),
        }
    }
}

/// Outbound mail.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver one message.
    async fn send(&self, message: &MailMessage) -> Result<(), PixioError>;
}

/// Mail relay over HTTP (JSON body, bearer key).
#[derive(Debug, Clone)]
pub struct HttpMailer {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpMailer {
    /// Create a relay mailer.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, PixioError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PixioError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), PixioError> {
        let mut request = self.client.post(&self.endpoint).json(message);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PixioError::DeliveryFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PixioError::DeliveryFailed(format!(
                "mail relay returned HTTP {}",
                response.status()
            )));
        }

        tracing::debug!(to = %message.to, "Verification mail sent");
        Ok(())
    }
}

/// Mailer that only logs. Used when no relay is configured.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), PixioError> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            body = %message.text,
            "Mail relay not configured - logging message instead"
        );
        Ok(())
    }
}
