//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.
//! Compound operations run inside pessimistic transactions: the account row is
//! read with `get_for_update`, which holds its lock until commit, so two
//! balance changes on one account never interleave.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, MultiThreaded, Options,
    TransactionDB, TransactionDBOptions,
};

use pixio_core::{
    Account, AccountId, LedgerEntry, LedgerEntryId, OneTimeCode, UsageRecord, UsageRecordId,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::{DailyCap, Store};

/// How long a transaction waits for a row lock before failing.
const LOCK_TIMEOUT_MS: i64 = 5_000;

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<TransactionDB<MultiThreaded>>,
}

fn db_err(e: rocksdb::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let mut txn_opts = TransactionDBOptions::default();
        txn_opts.set_txn_lock_timeout(LOCK_TIMEOUT_MS);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = TransactionDB::open_cf_descriptors(&opts, &txn_opts, path, cf_descriptors)
            .map_err(db_err)?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Read one record by key outside any transaction.
    fn get<T: serde::de::DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        self.db
            .get_cf(&cf, key)
            .map_err(db_err)?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    /// Collect the ULIDs in an account index, starting at `from`.
    fn index_ulids(&self, index_cf: &str, prefix: &[u8], from: &[u8]) -> Result<Vec<[u8; 16]>> {
        let cf = self.cf(index_cf)?;
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(from, Direction::Forward));

        let mut ids = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(db_err)?;
            if !key.starts_with(prefix) {
                break;
            }
            if let Some(bytes) = keys::extract_ulid_bytes(&key) {
                ids.push(bytes);
            }
        }
        Ok(ids)
    }

    fn count_settled_from(&self, account_id: &AccountId, since: DateTime<Utc>) -> Result<u32> {
        let prefix = keys::account_prefix(account_id);
        let since_ms = u64::try_from(since.timestamp_millis()).unwrap_or(0);
        let seek = keys::account_ledger_key(account_id, &LedgerEntryId::lower_bound(since_ms));

        let mut count = 0u32;
        for bytes in self.index_ulids(cf::LEDGER_BY_ACCOUNT, &prefix, &seek)? {
            let key = keys::ledger_key(&LedgerEntryId::from_bytes(bytes));
            let entry: Option<LedgerEntry> = self.get(cf::LEDGER, &key)?;
            if entry.is_some_and(|e| e.settled && e.created_at >= since) {
                count += 1;
            }
        }
        Ok(count)
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Account Operations
    // =========================================================================

    fn create_account(&self, account: &Account) -> Result<()> {
        let cf_accounts = self.cf(cf::ACCOUNTS)?;
        let cf_email = self.cf(cf::ACCOUNTS_BY_EMAIL)?;

        let email_key = keys::email_key(&account.email);
        let txn = self.db.transaction();

        if txn
            .get_for_update_cf(&cf_email, &email_key, true)
            .map_err(db_err)?
            .is_some()
        {
            return Err(StoreError::EmailTaken);
        }

        let account_key = keys::account_key(&account.id);
        txn.put_cf(&cf_accounts, &account_key, Self::serialize(account)?)
            .map_err(db_err)?;
        txn.put_cf(&cf_email, &email_key, &account_key)
            .map_err(db_err)?;
        txn.commit().map_err(db_err)?;

        tracing::debug!(account_id = %account.id, "account created");
        Ok(())
    }

    fn get_account(&self, account_id: &AccountId) -> Result<Option<Account>> {
        self.get(cf::ACCOUNTS, &keys::account_key(account_id))
    }

    fn get_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        let cf = self.cf(cf::ACCOUNTS_BY_EMAIL)?;
        let Some(account_key) = self
            .db
            .get_cf(&cf, keys::email_key(email))
            .map_err(db_err)?
        else {
            return Ok(None);
        };
        self.get(cf::ACCOUNTS, &account_key)
    }

    // =========================================================================
    // Ledger Operations
    // =========================================================================

    fn settle_purchase(&self, entry: &LedgerEntry, cap: Option<DailyCap>) -> Result<i64> {
        if entry.credits < 0 {
            return Err(StoreError::InvalidAmount {
                amount: entry.credits,
            });
        }
        let payment_id = entry.payment_id.clone().unwrap_or_default();

        let cf_accounts = self.cf(cf::ACCOUNTS)?;
        let cf_ledger = self.cf(cf::LEDGER)?;
        let cf_by_account = self.cf(cf::LEDGER_BY_ACCOUNT)?;
        let cf_payments = self.cf(cf::SETTLED_PAYMENTS)?;

        let account_key = keys::account_key(&entry.account_id);
        let payment_key = keys::payment_key(&payment_id);
        let txn = self.db.transaction();

        // Lock the account row first; every other settlement for this account
        // waits here until we commit.
        let mut account: Account = txn
            .get_for_update_cf(&cf_accounts, &account_key, true)
            .map_err(db_err)?
            .map(|data| Self::deserialize(&data))
            .transpose()?
            .ok_or(StoreError::NotFound)?;

        if txn
            .get_for_update_cf(&cf_payments, &payment_key, true)
            .map_err(db_err)?
            .is_some()
        {
            return Err(StoreError::DuplicatePayment { payment_id });
        }

        if let Some(cap) = cap {
            if self.count_settled_from(&entry.account_id, cap.since)? >= cap.limit {
                return Err(StoreError::DailyCapReached { limit: cap.limit });
            }
        }

        account.credit_balance += entry.credits;
        account.updated_at = Utc::now();

        let entry_key = keys::ledger_key(&entry.id);
        txn.put_cf(&cf_accounts, &account_key, Self::serialize(&account)?)
            .map_err(db_err)?;
        txn.put_cf(&cf_ledger, &entry_key, Self::serialize(entry)?)
            .map_err(db_err)?;
        txn.put_cf(
            &cf_by_account,
            keys::account_ledger_key(&entry.account_id, &entry.id),
            b"",
        )
        .map_err(db_err)?;
        txn.put_cf(&cf_payments, &payment_key, &entry_key)
            .map_err(db_err)?;
        txn.commit().map_err(db_err)?;

        Ok(account.credit_balance)
    }

    fn has_settled_payment(&self, payment_id: &str) -> Result<bool> {
        let cf = self.cf(cf::SETTLED_PAYMENTS)?;
        let exists = self
            .db
            .get_cf(&cf, keys::payment_key(payment_id))
            .map_err(db_err)?
            .is_some();
        Ok(exists)
    }

    fn count_settled_since(&self, account_id: &AccountId, since: DateTime<Utc>) -> Result<u32> {
        self.count_settled_from(account_id, since)
    }

    fn list_ledger_entries(&self, account_id: &AccountId) -> Result<Vec<LedgerEntry>> {
        let prefix = keys::account_prefix(account_id);
        let mut ids = self.index_ulids(cf::LEDGER_BY_ACCOUNT, &prefix, &prefix)?;
        ids.reverse();

        let mut entries = Vec::with_capacity(ids.len());
        for bytes in ids {
            let key = keys::ledger_key(&LedgerEntryId::from_bytes(bytes));
            if let Some(entry) = self.get(cf::LEDGER, &key)? {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    // =========================================================================
    // Usage Operations
    // =========================================================================

    fn record_usage(&self, record: &UsageRecord) -> Result<()> {
        let cf_usage = self.cf(cf::USAGE)?;
        let cf_by_account = self.cf(cf::USAGE_BY_ACCOUNT)?;

        let txn = self.db.transaction();
        txn.put_cf(
            &cf_usage,
            keys::usage_key(&record.id),
            Self::serialize(record)?,
        )
        .map_err(db_err)?;
        txn.put_cf(
            &cf_by_account,
            keys::account_usage_key(&record.account_id, &record.id),
            b"",
        )
        .map_err(db_err)?;
        txn.commit().map_err(db_err)
    }

    fn commit_usage(&self, record: &UsageRecord) -> Result<i64> {
        if record.credits_charged < 0 {
            return Err(StoreError::InvalidAmount {
                amount: record.credits_charged,
            });
        }
        let cf_accounts = self.cf(cf::ACCOUNTS)?;
        let cf_usage = self.cf(cf::USAGE)?;
        let cf_by_account = self.cf(cf::USAGE_BY_ACCOUNT)?;

        let account_key = keys::account_key(&record.account_id);
        let txn = self.db.transaction();

        let mut account: Account = txn
            .get_for_update_cf(&cf_accounts, &account_key, true)
            .map_err(db_err)?
            .map(|data| Self::deserialize(&data))
            .transpose()?
            .ok_or(StoreError::NotFound)?;

        if account.credit_balance < record.credits_charged {
            return Err(StoreError::InsufficientCredits {
                balance: account.credit_balance,
                required: record.credits_charged,
            });
        }

        account.credit_balance -= record.credits_charged;
        account.updated_at = Utc::now();

        txn.put_cf(&cf_accounts, &account_key, Self::serialize(&account)?)
            .map_err(db_err)?;
        txn.put_cf(
            &cf_usage,
            keys::usage_key(&record.id),
            Self::serialize(record)?,
        )
        .map_err(db_err)?;
        txn.put_cf(
            &cf_by_account,
            keys::account_usage_key(&record.account_id, &record.id),
            b"",
        )
        .map_err(db_err)?;
        txn.commit().map_err(db_err)?;

        Ok(account.credit_balance)
    }

    fn list_usage(&self, account_id: &AccountId) -> Result<Vec<UsageRecord>> {
        let prefix = keys::account_prefix(account_id);
        let mut ids = self.index_ulids(cf::USAGE_BY_ACCOUNT, &prefix, &prefix)?;
        ids.reverse();

        let mut records = Vec::with_capacity(ids.len());
        for bytes in ids {
            let key = keys::usage_key(&UsageRecordId::from_bytes(bytes));
            if let Some(record) = self.get(cf::USAGE, &key)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    // =========================================================================
    // One-Time Code Operations
    // =========================================================================

    fn replace_otp(&self, otp: &OneTimeCode) -> Result<()> {
        let cf = self.cf(cf::OTP)?;
        self.db
            .put_cf(&cf, keys::otp_key(&otp.address), Self::serialize(otp)?)
            .map_err(db_err)
    }

    fn get_otp(&self, address: &str) -> Result<Option<OneTimeCode>> {
        self.get(cf::OTP, &keys::otp_key(address))
    }

    fn mark_otp_verified(&self, address: &str, code: &str) -> Result<bool> {
        let cf = self.cf(cf::OTP)?;
        let key = keys::otp_key(address);
        let txn = self.db.transaction();

        let current: Option<OneTimeCode> = txn
            .get_for_update_cf(&cf, &key, true)
            .map_err(db_err)?
            .map(|data| Self::deserialize(&data))
            .transpose()?;

        let Some(mut otp) = current.filter(|otp| otp.code == code) else {
            return Ok(false);
        };

        otp.verified = true;
        txn.put_cf(&cf, &key, Self::serialize(&otp)?)
            .map_err(db_err)?;
        txn.commit().map_err(db_err)?;
        Ok(true)
    }
}
