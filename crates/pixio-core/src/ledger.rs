//! Ledger entries recording credit purchases.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, LedgerEntryId, Plan};

/// A purchase recorded in the ledger.
///
/// Entries are immutable once written. A settled entry carries the gateway
/// payment reference; the store guarantees that no two settled entries share
/// one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique entry ID (ULID for time-ordering).
    pub id: LedgerEntryId,

    /// The account credited by this purchase.
    pub account_id: AccountId,

    /// The plan purchased.
    pub plan: Plan,

    /// Amount charged, in minor currency units as reported by the gateway.
    pub amount: i64,

    /// Currency of `amount`.
    pub currency: String,

    /// Credits granted.
    pub credits: i64,

    /// Whether the payment has been verified and applied.
    pub settled: bool,

    /// Gateway order reference.
    pub order_id: String,

    /// Gateway payment reference, present once settled.
    pub payment_id: Option<String>,

    /// When the entry was created.
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Create a settled entry for a verified payment.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn settled(
        account_id: AccountId,
        plan: Plan,
        amount: i64,
        currency: impl Into<String>,
        credits: i64,
        order_id: impl Into<String>,
        payment_id: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: LedgerEntryId::generate(),
            account_id,
            plan,
            amount,
            currency: currency.into(),
            credits,
            settled: true,
            order_id: order_id.into(),
            payment_id: Some(payment_id.into()),
            created_at,
        }
    }

    /// The payment reference of a settled entry.
    #[must_use]
    pub fn settled_payment_id(&self) -> Option<&str> {
        if self.settled {
            self.payment_id.as_deref()
        } else {
            None
        }
    }
}
