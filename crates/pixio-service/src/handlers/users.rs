//! Registration, login and balance handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use pixio_core::{normalize_email, Account, PixioError};

use crate::auth::AuthUser;
use crate::crypto::{hash_password, verify_password};
use crate::error::ApiError;
use crate::handlers::{load_account, UserProfile};
use crate::state::AppState;

/// Registration request.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Email address.
    #[serde(default)]
    pub email: String,
    /// Password.
    #[serde(default)]
    pub password: String,
}

/// Login request.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Email address.
    #[serde(default)]
    pub email: String,
    /// Password.
    #[serde(default)]
    pub password: String,
}

/// Session response returned by registration and login.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    /// Session token.
    pub token: String,
    /// The signed-in user.
    pub user: UserProfile,
}

/// Balance response.
#[derive(Debug, Serialize)]
pub struct CreditsResponse {
    /// Current credit balance.
    pub credits: i64,
    /// The signed-in user.
    pub user: UserProfile,
}

fn missing_details() -> ApiError {
    ApiError::BadRequest {
        code: "missing_details",
        message: "Missing details".into(),
    }
}

/// Run argon2 off the async workers.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("password task failed: {e}")))
}

/// Register a new account.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let name = body.name.trim().to_string();
    let email = normalize_email(&body.email);
    if name.is_empty() || email.is_empty() || body.password.is_empty() {
        return Err(missing_details());
    }
    if !email.contains('@') {
        return Err(ApiError::BadRequest {
            code: "invalid_email",
            message: "Enter a valid email address".into(),
        });
    }

    let password = body.password;
    let hash = blocking(move || hash_password(&password)).await??;

    let account = Account::new(name, &email, Some(hash), state.config.signup_credits);
    state.store.create_account(&account)?;

    tracing::info!(user_id = %account.id, "Account registered");

    let token = state.tokens.issue(&account.id)?;
    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            token,
            user: UserProfile::from(&account),
        }),
    ))
}

/// Sign in with email and password.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    if body.email.trim().is_empty() || body.password.is_empty() {
        return Err(missing_details());
    }

    let account = state
        .store
        .get_account_by_email(&body.email)?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    // Accounts without a password hash sign in through a federated provider.
    let Some(stored) = account.password_hash.clone() else {
        return Err(PixioError::InvalidCredential.into());
    };
    let password = body.password;
    if !blocking(move || verify_password(&password, &stored)).await? {
        tracing::debug!(user_id = %account.id, "Login rejected");
        return Err(PixioError::InvalidCredential.into());
    }

    let token = state.tokens.issue(&account.id)?;
    Ok(Json(SessionResponse {
        token,
        user: UserProfile::from(&account),
    }))
}

/// Get the caller's balance and profile.
pub async fn credits(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<CreditsResponse>, ApiError> {
    let account = load_account(&state, &auth.account_id)?;

    Ok(Json(CreditsResponse {
        credits: account.credit_balance,
        user: UserProfile::from(&account),
    }))
}
