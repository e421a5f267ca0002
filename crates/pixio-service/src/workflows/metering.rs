//! Metered tool invocation.
//!
//! A tool call is charged only after it succeeds. The balance is checked
//! before the call so an empty account never reaches the provider, and the
//! debit itself is a conditional update in the store, so a concurrent request
//! that drained the balance in between cannot push it below zero.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use pixio_core::{AccountId, PixioError, ProviderError, Result, Tool, UsageRecord};
use pixio_store::{Store, StoreError};

/// Output of a charged invocation.
#[derive(Debug, Clone)]
pub struct Metered<T> {
    /// What the tool produced.
    pub output: T,
    /// Balance after the debit.
    pub balance: i64,
}

/// Runs external tool calls against the credit balance.
#[derive(Clone)]
pub struct MeteringWorkflow {
    store: Arc<dyn Store>,
    timeout: Duration,
}

impl MeteringWorkflow {
    /// Create the workflow with a bound on each external call.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Run `call` for `account_id`, charging `cost` credits on success.
    ///
    /// Every attempt that reaches the provider leaves a usage record. Failed
    /// attempts are recorded with a zero charge.
    ///
    /// # Errors
    ///
    /// - `AccountNotFound` if the account does not exist
    /// - `InsufficientCredit` if the balance does not cover `cost`, either
    ///   before the call or at commit time
    /// - `ExternalProvider` if the call fails or times out
    pub async fn invoke<T, F>(
        &self,
        account_id: &AccountId,
        tool: Tool,
        cost: i64,
        prompt: Option<String>,
        call: F,
    ) -> Result<Metered<T>>
    where
        F: Future<Output = std::result::Result<T, ProviderError>> + Send,
        T: Send,
    {
        let account = self
            .store
            .get_account(account_id)?
            .ok_or_else(|| PixioError::AccountNotFound {
                account_id: account_id.to_string(),
            })?;

        if !account.has_sufficient_credits(cost) {
            tracing::debug!(
                user_id = %account_id,
                tool = %tool,
                balance = account.credit_balance,
                cost,
                "Tool call refused, balance too low"
            );
            return Err(PixioError::InsufficientCredit {
                balance: account.credit_balance,
                required: cost,
            });
        }

        let outcome = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::timeout()),
        };

        let output = match outcome {
            Ok(output) => output,
            Err(err) => {
                tracing::warn!(
                    user_id = %account_id,
                    tool = %tool,
                    status = ?err.status,
                    error = %err.message,
                    "Image provider call failed"
                );
                self.store
                    .record_usage(&UsageRecord::failed(*account_id, tool, prompt))?;
                return Err(err.into());
            }
        };

        let record = UsageRecord::succeeded(*account_id, tool, cost, prompt.clone());
        match self.store.commit_usage(&record) {
            Ok(balance) => {
                tracing::info!(
                    user_id = %account_id,
                    tool = %tool,
                    cost,
                    balance,
                    "Tool call charged"
                );
                Ok(Metered { output, balance })
            }
            Err(StoreError::InsufficientCredits { balance, required }) => {
                // Drained by a concurrent request while the call ran.
                tracing::warn!(
                    user_id = %account_id,
                    tool = %tool,
                    balance,
                    required,
                    "Balance drained during tool call"
                );
                self.store
                    .record_usage(&UsageRecord::failed(*account_id, tool, prompt))?;
                Err(PixioError::InsufficientCredit { balance, required })
            }
            Err(other) => {
                tracing::error!(
                    user_id = %account_id,
                    tool = %tool,
                    error = %other,
                    "Failed to commit tool usage"
                );
                if let Err(e) = self
                    .store
                    .record_usage(&UsageRecord::failed(*account_id, tool, prompt))
                {
                    tracing::error!(user_id = %account_id, error = %e, "Failed to record failed tool usage");
                }
                Err(other.into())
            }
        }
    }
}
