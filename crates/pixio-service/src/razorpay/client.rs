//! Razorpay API client implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use pixio_core::PixioError;

use super::types::{CreateOrderRequest, Order, RazorpayErrorResponse};
use super::PaymentGateway;

/// Error type for Razorpay operations.
#[derive(Debug, thiserror::Error)]
pub enum RazorpayError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Razorpay API returned an error.
    #[error("Razorpay API error: {code} - {description}")]
    Api {
        /// HTTP status.
        status: u16,
        /// Error code.
        code: String,
        /// Error description.
        description: String,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl RazorpayError {
    /// Whether the failure is transient (timeout, connection, 5xx).
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Api { status, .. } => *status >= 500,
            Self::Configuration(_) => false,
        }
    }
}

impl From<RazorpayError> for PixioError {
    fn from(err: RazorpayError) -> Self {
        Self::Gateway {
            retriable: err.is_retriable(),
            message: err.to_string(),
        }
    }
}

/// Razorpay API client.
#[derive(Debug, Clone)]
pub struct RazorpayClient {
    client: Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl RazorpayClient {
    /// Create a new Razorpay client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, RazorpayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RazorpayError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            key_id: key_id.into(),
            key_secret: key_secret.into(),
        })
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, RazorpayError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        // Try to parse error response
        let error_body: Result<RazorpayErrorResponse, _> = response.json().await;

        match error_body {
            Ok(body) => Err(RazorpayError::Api {
                status: status.as_u16(),
                code: body.error.code,
                description: body.error.description,
            }),
            Err(_) => Err(RazorpayError::Api {
                status: status.as_u16(),
                code: "unknown".to_string(),
                description: format!("HTTP {status}"),
            }),
        }
    }
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    async fn create_order(&self, request: &CreateOrderRequest) -> Result<Order, RazorpayError> {
        tracing::debug!(
            amount = %request.amount,
            receipt = %request.receipt,
            "Creating Razorpay order"
        );

        let response = self
            .client
            .post(format!("{}/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(request)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    async fn fetch_order(&self, order_id: &str) -> Result<Order, RazorpayError> {
        let response = self
            .client
            .get(format!("{}/orders/{}", self.base_url, order_id))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .send()
            .await?;

        Self::handle_response(response).await
    }
}
