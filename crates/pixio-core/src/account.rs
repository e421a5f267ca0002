//! Account types for Pixio.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::AccountId;

/// A user account.
///
/// The account holds the user's identity, credential hash and credit balance.
/// After creation only the balance changes, and only through the store's
/// conditional credit and debit operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// The account ID.
    pub id: AccountId,

    /// Display name.
    pub name: String,

    /// Email address, normalized with [`normalize_email`].
    pub email: String,

    /// Argon2 PHC-format password hash. `None` for federated accounts.
    pub password_hash: Option<String>,

    /// Current credit balance. Never negative.
    pub credit_balance: i64,

    /// When the account was created.
    pub created_at: DateTime<Utc>,

    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account with the given starting balance.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        email: &str,
        password_hash: Option<String>,
        initial_credits: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: AccountId::generate(),
            name: name.into(),
            email: normalize_email(email),
            password_hash,
            credit_balance: initial_credits.max(0),
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the account has sufficient credits for a deduction.
    #[must_use]
    pub fn has_sufficient_credits(&self, amount: i64) -> bool {
        self.credit_balance >= amount
    }
}

/// Normalize an email address for storage and lookup.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
