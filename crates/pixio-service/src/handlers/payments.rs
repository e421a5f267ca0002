//! Razorpay credit purchase handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use pixio_core::Plan;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::razorpay::Order;
use crate::state::AppState;
use crate::workflows::SettlementWorkflow;

/// Order creation request.
#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    /// Plan identifier (`Basic`, `Advanced`, `Business`).
    #[serde(rename = "planId", default)]
    pub plan_id: String,
}

/// Order creation response.
#[derive(Debug, Serialize)]
pub struct CreatePaymentResponse {
    /// The gateway order for the checkout widget.
    pub order: Order,
    /// Public key id for the checkout widget.
    pub key: String,
}

/// Checkout result posted back by the client.
#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    /// Gateway order reference.
    #[serde(default)]
    pub razorpay_order_id: String,
    /// Gateway payment reference.
    #[serde(default)]
    pub razorpay_payment_id: String,
    /// Checkout signature.
    #[serde(default)]
    pub razorpay_signature: String,
}

/// Settlement response.
#[derive(Debug, Serialize)]
pub struct VerifyPaymentResponse {
    /// Balance after the credit.
    pub credits: i64,
    /// Credits applied by this payment.
    pub credits_added: i64,
    /// The plan purchased.
    pub plan_id: Plan,
}

fn settlement(state: &AppState) -> Result<&SettlementWorkflow, ApiError> {
    state
        .settlement
        .as_ref()
        .ok_or_else(|| ApiError::ExternalService {
            code: "payment_gateway_error",
            message: "Razorpay not configured".into(),
            upstream_status: None,
        })
}

/// Create a gateway order for a plan.
pub async fn create_payment(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<CreatePaymentRequest>,
) -> Result<Json<CreatePaymentResponse>, ApiError> {
    let plan: Plan = body.plan_id.parse()?;
    let intent = settlement(&state)?
        .create_intent(&auth.account_id, plan)
        .await?;

    Ok(Json(CreatePaymentResponse {
        order: intent.order,
        key: intent.key_id,
    }))
}

/// Verify a completed checkout and credit the caller.
pub async fn verify_payment(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<VerifyPaymentRequest>,
) -> Result<Json<VerifyPaymentResponse>, ApiError> {
    if body.razorpay_order_id.is_empty()
        || body.razorpay_payment_id.is_empty()
        || body.razorpay_signature.is_empty()
    {
        return Err(ApiError::BadRequest {
            code: "missing_details",
            message: "Missing payment verification fields".into(),
        });
    }

    let settled = settlement(&state)?
        .confirm(
            &auth.account_id,
            &body.razorpay_order_id,
            &body.razorpay_payment_id,
            &body.razorpay_signature,
        )
        .await?;

    Ok(Json(VerifyPaymentResponse {
        credits: settled.balance,
        credits_added: settled.credits_added,
        plan_id: settled.plan,
    }))
}
