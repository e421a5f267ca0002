//! Two-phase credit purchase.
//!
//! Phase one creates a gateway order for a plan. Phase two verifies the
//! checkout signature, recovers the plan from the order held by the gateway,
//! and applies the credits through [`Store::settle_purchase`], which re-checks
//! the payment reference and the daily cap inside its own transaction.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use pixio_core::{
    AccountId, LedgerEntry, LedgerEntryId, PixioError, Plan, PurchasePolicy, Result,
    PLAN_CURRENCY,
};
use pixio_store::{DailyCap, Store};

use crate::crypto::verify_payment_signature;
use crate::razorpay::{CreateOrderRequest, Order, OrderNotes, PaymentGateway};
use crate::workflows::start_of_utc_day;

/// Result of phase one, handed to the checkout widget.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentIntent {
    /// The gateway order.
    pub order: Order,
    /// Public key id for the checkout widget.
    pub key_id: String,
}

/// Result of phase two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    /// Balance after the credit.
    pub balance: i64,
    /// Credits applied.
    pub credits_added: i64,
    /// The plan recovered from the order.
    pub plan: Plan,
}

/// Credit purchase workflow.
#[derive(Clone)]
pub struct SettlementWorkflow {
    store: Arc<dyn Store>,
    gateway: Arc<dyn PaymentGateway>,
    key_id: String,
    key_secret: String,
    policy: PurchasePolicy,
}

impl SettlementWorkflow {
    /// Create the workflow.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        gateway: Arc<dyn PaymentGateway>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
        policy: PurchasePolicy,
    ) -> Self {
        Self {
            store,
            gateway,
            key_id: key_id.into(),
            key_secret: key_secret.into(),
            policy,
        }
    }

    /// The active purchase policy.
    #[must_use]
    pub fn policy(&self) -> PurchasePolicy {
        self.policy
    }

    fn daily_cap(&self, now: DateTime<Utc>) -> Option<DailyCap> {
        self.policy.max_settled_per_day.map(|limit| DailyCap {
            limit,
            since: start_of_utc_day(now),
        })
    }

    fn ensure_account(&self, account_id: &AccountId) -> Result<()> {
        if self.store.get_account(account_id)?.is_none() {
            return Err(PixioError::AccountNotFound {
                account_id: account_id.to_string(),
            });
        }
        Ok(())
    }

    fn ensure_under_cap(&self, account_id: &AccountId, now: DateTime<Utc>) -> Result<()> {
        if let Some(cap) = self.daily_cap(now) {
            if self.store.count_settled_since(account_id, cap.since)? >= cap.limit {
                return Err(PixioError::RateLimited { limit: cap.limit });
            }
        }
        Ok(())
    }

    /// Phase one: create a gateway order for `plan`.
    ///
    /// # Errors
    ///
    /// `AccountNotFound`, `RateLimited` or `Gateway`.
    pub async fn create_intent(&self, account_id: &AccountId, plan: Plan) -> Result<PaymentIntent> {
        self.create_intent_at(account_id, plan, Utc::now()).await
    }

    /// [`create_intent`](Self::create_intent) with an explicit clock.
    ///
    /// # Errors
    ///
    /// See [`create_intent`](Self::create_intent).
    pub async fn create_intent_at(
        &self,
        account_id: &AccountId,
        plan: Plan,
        now: DateTime<Utc>,
    ) -> Result<PaymentIntent> {
        self.ensure_account(account_id)?;
        self.ensure_under_cap(account_id, now)?;

        let request = CreateOrderRequest {
            amount: plan.price_minor(),
            currency: PLAN_CURRENCY.to_string(),
            receipt: format!("rcpt_{}", LedgerEntryId::generate()),
            notes: OrderNotes {
                account_id: account_id.to_string(),
                plan_id: plan.as_str().to_string(),
                credits: plan.credits().to_string(),
            },
        };

        let order = self.gateway.create_order(&request).await?;

        tracing::info!(
            user_id = %account_id,
            plan = %plan,
            order_id = %order.id,
            "Payment order created"
        );

        Ok(PaymentIntent {
            order,
            key_id: self.key_id.clone(),
        })
    }

    /// Phase two: verify a completed checkout and credit the account.
    ///
    /// Returns the new balance with the credits applied.
    ///
    /// # Errors
    ///
    /// `SignatureMismatch`, `AccountNotFound`, `RateLimited`,
    /// `AlreadySettled`, `OrderMismatch`, `Validation` or `Gateway`.
    pub async fn confirm(
        &self,
        account_id: &AccountId,
        order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<Settlement> {
        self.confirm_at(account_id, order_id, payment_id, signature, Utc::now())
            .await
    }

    /// [`confirm`](Self::confirm) with an explicit clock.
    ///
    /// # Errors
    ///
    /// See [`confirm`](Self::confirm).
    pub async fn confirm_at(
        &self,
        account_id: &AccountId,
        order_id: &str,
        payment_id: &str,
        signature: &str,
        now: DateTime<Utc>,
    ) -> Result<Settlement> {
        if !verify_payment_signature(&self.key_secret, order_id, payment_id, signature) {
            tracing::warn!(user_id = %account_id, order_id = %order_id, "Payment signature mismatch");
            return Err(PixioError::SignatureMismatch);
        }

        self.ensure_account(account_id)?;
        self.ensure_under_cap(account_id, now)?;
        if self.store.has_settled_payment(payment_id)? {
            return Err(PixioError::AlreadySettled {
                payment_id: payment_id.to_string(),
            });
        }

        let order = self.gateway.fetch_order(order_id).await?;
        let (plan, ordered_credits) = self.recover_purchase(account_id, &order)?;
        let credits = self.policy.credits_for(ordered_credits);

        let entry = LedgerEntry::settled(
            *account_id,
            plan,
            order.amount,
            if order.currency.is_empty() {
                PLAN_CURRENCY.to_string()
            } else {
                order.currency.clone()
            },
            credits,
            order_id,
            payment_id,
            now,
        );

        let balance = self.store.settle_purchase(&entry, self.daily_cap(now))?;

        tracing::info!(
            user_id = %account_id,
            order_id = %order_id,
            payment_id = %payment_id,
            credits = %credits,
            balance = %balance,
            "Payment settled"
        );

        Ok(Settlement {
            balance,
            credits_added: credits,
            plan,
        })
    }

    /// Recover plan and credits from the gateway's copy of the order.
    fn recover_purchase(&self, account_id: &AccountId, order: &Order) -> Result<(Plan, i64)> {
        let notes = &order.notes;
        if notes.account_id != account_id.to_string() {
            tracing::warn!(
                user_id = %account_id,
                order_id = %order.id,
                order_owner = %notes.account_id,
                "Order belongs to another account"
            );
            return Err(PixioError::OrderMismatch {
                order_id: order.id.clone(),
            });
        }

        let plan: Plan = notes.plan_id.parse()?;
        let credits = notes
            .credits
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|credits| *credits > 0)
            .ok_or_else(|| {
                PixioError::Validation(format!("order {} has no valid credit amount", order.id))
            })?;

        Ok((plan, credits))
    }
}
