//! API handlers.

pub mod dashboard;
pub mod health;
pub mod otp;
pub mod payments;
pub mod tools;
pub mod users;

use pixio_core::{Account, AccountId};
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

/// Public profile of an account.
#[derive(Debug, Serialize)]
pub struct UserProfile {
    /// Account ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
}

impl From<&Account> for UserProfile {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.to_string(),
            name: account.name.clone(),
            email: account.email.clone(),
        }
    }
}

/// Load the caller's account or fail with 404.
pub(crate) fn load_account(state: &AppState, account_id: &AccountId) -> Result<Account, ApiError> {
    state
        .store
        .get_account(account_id)?
        .ok_or_else(|| ApiError::NotFound("Account not found".into()))
}
