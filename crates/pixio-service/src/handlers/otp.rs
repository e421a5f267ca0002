//! Email verification handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

/// Code issuance request.
#[derive(Debug, Deserialize)]
pub struct SendOtpRequest {
    /// Destination address.
    #[serde(default)]
    pub email: String,
}

/// Code verification request.
#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    /// Address the code was sent to.
    #[serde(default)]
    pub email: String,
    /// The code as typed.
    #[serde(default)]
    pub otp: String,
}

/// Outcome message.
#[derive(Debug, Serialize)]
pub struct OtpResponse {
    /// Human-readable outcome.
    pub message: &'static str,
}

/// Issue and mail a verification code.
pub async fn send_otp(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SendOtpRequest>,
) -> Result<Json<OtpResponse>, ApiError> {
    state.otp.issue(&body.email).await?;
    Ok(Json(OtpResponse {
        message: "OTP sent",
    }))
}

/// Check a verification code.
pub async fn verify_otp(
    State(state): State<Arc<AppState>>,
    Json(body): Json<VerifyOtpRequest>,
) -> Result<Json<OtpResponse>, ApiError> {
    state.otp.verify(&body.email, body.otp.trim())?;
    Ok(Json(OtpResponse {
        message: "OTP verified",
    }))
}
