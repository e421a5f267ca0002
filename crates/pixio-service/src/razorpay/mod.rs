//! Razorpay integration for credit purchases.
//!
//! Razorpay handles:
//! - Order creation for a plan purchase
//! - Order lookup when a payment is confirmed
//!
//! Checkout signatures are verified locally (see [`crate::crypto`]).

pub mod client;
pub mod types;

pub use client::{RazorpayClient, RazorpayError};
pub use types::*;

use async_trait::async_trait;

/// Payment gateway operations used by settlement.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create an order.
    async fn create_order(&self, request: &CreateOrderRequest) -> Result<Order, RazorpayError>;

    /// Fetch an order by ID.
    async fn fetch_order(&self, order_id: &str) -> Result<Order, RazorpayError>;
}
