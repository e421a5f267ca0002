//! Razorpay API types.

use serde::{Deserialize, Serialize};

/// Metadata attached to an order at creation.
///
/// Razorpay stores note values as strings, so credits travel as text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderNotes {
    /// The purchasing account.
    #[serde(rename = "userId", default)]
    pub account_id: String,
    /// The plan identifier.
    #[serde(rename = "planId", default)]
    pub plan_id: String,
    /// Credits the order grants.
    #[serde(default)]
    pub credits: String,
}

/// Order creation request body.
#[derive(Debug, Clone, Serialize)]
pub struct CreateOrderRequest {
    /// Amount in minor units (paise).
    pub amount: i64,
    /// Currency code.
    pub currency: String,
    /// Merchant receipt reference.
    pub receipt: String,
    /// Order notes.
    pub notes: OrderNotes,
}

/// Razorpay order object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Order ID (`order_...`).
    pub id: String,
    /// Amount in minor units.
    #[serde(default)]
    pub amount: i64,
    /// Currency code.
    #[serde(default)]
    pub currency: String,
    /// Merchant receipt reference.
    #[serde(default)]
    pub receipt: Option<String>,
    /// Order status (created, attempted, paid).
    #[serde(default)]
    pub status: String,
    /// Notes supplied at creation. Razorpay returns `[]` when empty.
    #[serde(default, deserialize_with = "notes_or_empty")]
    pub notes: OrderNotes,
    /// Created timestamp (Unix).
    #[serde(default)]
    pub created_at: i64,
}

/// Razorpay error response.
#[derive(Debug, Clone, Deserialize)]
pub struct RazorpayErrorResponse {
    /// Error details.
    pub error: RazorpayErrorBody,
}

/// Razorpay error body.
#[derive(Debug, Clone, Deserialize)]
pub struct RazorpayErrorBody {
    /// Error code (e.g. `BAD_REQUEST_ERROR`).
    #[serde(default)]
    pub code: String,
    /// Error description.
    #[serde(default)]
    pub description: String,
}

fn notes_or_empty<'de, D>(deserializer: D) -> Result<OrderNotes, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    if value.is_object() {
        serde_json::from_value(value).map_err(serde::de::Error::custom)
    } else {
        Ok(OrderNotes::default())
    }
}
