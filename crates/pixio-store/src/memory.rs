//! In-memory storage implementation.
//!
//! A single mutex guards all tables, so each compound operation observes and
//! writes a consistent snapshot.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use pixio_core::{
    normalize_email, Account, AccountId, LedgerEntry, LedgerEntryId, OneTimeCode, UsageRecord,
    UsageRecordId,
};

use crate::error::{Result, StoreError};
use crate::{DailyCap, Store};

#[derive(Default)]
struct Tables {
    accounts: HashMap<AccountId, Account>,
    accounts_by_email: HashMap<String, AccountId>,
    ledger: BTreeMap<LedgerEntryId, LedgerEntry>,
    settled_payments: HashMap<String, LedgerEntryId>,
    usage: BTreeMap<UsageRecordId, UsageRecord>,
    otp: HashMap<String, OneTimeCode>,
}

impl Tables {
    fn count_settled_since(&self, account_id: &AccountId, since: DateTime<Utc>) -> u32 {
        let count = self
            .ledger
            .values()
            .filter(|e| e.account_id == *account_id && e.settled && e.created_at >= since)
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }
}

/// Memory-backed storage implementation.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Database("store mutex poisoned".into()))
    }
}

impl Store for MemoryStore {
    fn create_account(&self, account: &Account) -> Result<()> {
        let mut tables = self.lock()?;
        let email = normalize_email(&account.email);
        if tables.accounts_by_email.contains_key(&email) {
            return Err(StoreError::EmailTaken);
        }
        tables.accounts_by_email.insert(email, account.id);
        tables.accounts.insert(account.id, account.clone());
        Ok(())
    }

    fn get_account(&self, account_id: &AccountId) -> Result<Option<Account>> {
        Ok(self.lock()?.accounts.get(account_id).cloned())
    }

    fn get_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        let tables = self.lock()?;
        Ok(tables
            .accounts_by_email
            .get(&normalize_email(email))
            .and_then(|id| tables.accounts.get(id))
            .cloned())
    }

    fn settle_purchase(&self, entry: &LedgerEntry, cap: Option<DailyCap>) -> Result<i64> {
        if entry.credits < 0 {
            return Err(StoreError::InvalidAmount {
                amount: entry.credits,
            });
        }
        let mut tables = self.lock()?;
        let payment_id = entry.payment_id.clone().unwrap_or_default();

        if !tables.accounts.contains_key(&entry.account_id) {
            return Err(StoreError::NotFound);
        }
        if tables.settled_payments.contains_key(&payment_id) {
            return Err(StoreError::DuplicatePayment { payment_id });
        }
        if let Some(cap) = cap {
            if tables.count_settled_since(&entry.account_id, cap.since) >= cap.limit {
                return Err(StoreError::DailyCapReached { limit: cap.limit });
            }
        }

        let account = tables
            .accounts
            .get_mut(&entry.account_id)
            .ok_or(StoreError::NotFound)?;
        account.credit_balance += entry.credits;
        account.updated_at = Utc::now();
        let balance = account.credit_balance;

        tables.settled_payments.insert(payment_id, entry.id);
        tables.ledger.insert(entry.id, entry.clone());
        Ok(balance)
    }

    fn has_settled_payment(&self, payment_id: &str) -> Result<bool> {
        Ok(self.lock()?.settled_payments.contains_key(payment_id))
    }

    fn count_settled_since(&self, account_id: &AccountId, since: DateTime<Utc>) -> Result<u32> {
        Ok(self.lock()?.count_settled_since(account_id, since))
    }

    fn list_ledger_entries(&self, account_id: &AccountId) -> Result<Vec<LedgerEntry>> {
        Ok(self
            .lock()?
            .ledger
            .values()
            .rev()
            .filter(|e| e.account_id == *account_id)
            .cloned()
            .collect())
    }

    fn record_usage(&self, record: &UsageRecord) -> Result<()> {
        self.lock()?.usage.insert(record.id, record.clone());
        Ok(())
    }

    fn commit_usage(&self, record: &UsageRecord) -> Result<i64> {
        if record.credits_charged < 0 {
            return Err(StoreError::InvalidAmount {
                amount: record.credits_charged,
            });
        }
        let mut tables = self.lock()?;
        let account = tables
            .accounts
            .get_mut(&record.account_id)
            .ok_or(StoreError::NotFound)?;

        if account.credit_balance < record.credits_charged {
            return Err(StoreError::InsufficientCredits {
                balance: account.credit_balance,
                required: record.credits_charged,
            });
        }
        account.credit_balance -= record.credits_charged;
        account.updated_at = Utc::now();
        let balance = account.credit_balance;

        tables.usage.insert(record.id, record.clone());
        Ok(balance)
    }

    fn list_usage(&self, account_id: &AccountId) -> Result<Vec<UsageRecord>> {
        Ok(self
            .lock()?
            .usage
            .values()
            .rev()
            .filter(|r| r.account_id == *account_id)
            .cloned()
            .collect())
    }

    fn replace_otp(&self, otp: &OneTimeCode) -> Result<()> {
        self.lock()?
            .otp
            .insert(normalize_email(&otp.address), otp.clone());
        Ok(())
    }

    fn get_otp(&self, address: &str) -> Result<Option<OneTimeCode>> {
        Ok(self.lock()?.otp.get(&normalize_email(address)).cloned())
    }

    fn mark_otp_verified(&self, address: &str, code: &str) -> Result<bool> {
        let mut tables = self.lock()?;
        match tables.otp.get_mut(&normalize_email(address)) {
            Some(otp) if otp.code == code => {
                otp.verified = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
