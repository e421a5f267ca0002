//! Storage layer for the Pixio backend.
//!
//! This crate persists accounts, ledger entries, usage records and one-time
//! codes. Every operation that changes a credit balance is a single atomic
//! unit: the balance check, the balance write and the records that explain it
//! commit together or not at all.
//!
//! Two implementations are provided:
//!
//! - [`RocksStore`]: `RocksDB` pessimistic transactions (feature `rocksdb-backend`)
//! - [`MemoryStore`]: a mutex-guarded in-memory store for tests and local runs
//!
//! # Column families (`RocksStore`)
//!
//! - `accounts`: Primary account records, keyed by `account_id`
//! - `accounts_by_email`: Unique email index
//! - `ledger` / `ledger_by_account`: Purchases and their per-account index
//! - `settled_payments`: Payment references already applied
//! - `usage` / `usage_by_account`: Tool invocations and their per-account index
//! - `otp`: One-time codes, keyed by address
//!
//! # Example
//!
#![cfg_attr(feature = "rocksdb-backend", doc = "```no_run")]
#![cfg_attr(not(feature = "rocksdb-backend"), doc = "```ignore")]
//! use pixio_store::{RocksStore, Store};
//! use pixio_core::Account;
//!
//! let store = RocksStore::open("/tmp/pixio-db").unwrap();
//!
//! let account = Account::new("Ada", "ada@example.com", None, 5);
//! store.create_account(&account).unwrap();
//!
//! let retrieved = store.get_account(&account.id).unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
#[cfg(feature = "rocksdb-backend")]
pub mod keys;
pub mod memory;
#[cfg(feature = "rocksdb-backend")]
pub mod rocks;
#[cfg(feature = "rocksdb-backend")]
pub mod schema;

#[cfg(test)]
mod conformance;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
#[cfg(feature = "rocksdb-backend")]
pub use rocks::RocksStore;

use chrono::{DateTime, Utc};
use pixio_core::{Account, AccountId, LedgerEntry, OneTimeCode, UsageRecord};

/// A cap on settled purchases within a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyCap {
    /// Maximum settled entries allowed since `since`.
    pub limit: u32,
    /// Start of the window (start of the current UTC day).
    pub since: DateTime<Utc>,
}

/// The storage trait defining all database operations.
///
/// This trait abstracts the storage layer, allowing for different implementations
/// (e.g., `RocksDB`, in-memory for testing).
pub trait Store: Send + Sync {
    // =========================================================================
    // Account Operations
    // =========================================================================

    /// Insert a new account.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::EmailTaken` if another account uses the email.
    fn create_account(&self, account: &Account) -> Result<()>;

    /// Get an account by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_account(&self, account_id: &AccountId) -> Result<Option<Account>>;

    /// Get an account by email. The lookup is case-insensitive.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_account_by_email(&self, email: &str) -> Result<Option<Account>>;

    // =========================================================================
    // Ledger Operations
    // =========================================================================

    /// Record a settled purchase and credit the account atomically.
    ///
    /// Returns the new balance.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the account doesn't exist.
    /// - `StoreError::DuplicatePayment` if the payment reference was already applied.
    /// - `StoreError::DailyCapReached` if `cap` is already used up.
    fn settle_purchase(&self, entry: &LedgerEntry, cap: Option<DailyCap>) -> Result<i64>;

    /// Check whether a payment reference has been applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn has_settled_payment(&self, payment_id: &str) -> Result<bool>;

    /// Count an account's settled entries created at or after `since`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn count_settled_since(&self, account_id: &AccountId, since: DateTime<Utc>) -> Result<u32>;

    /// List an account's ledger entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_ledger_entries(&self, account_id: &AccountId) -> Result<Vec<LedgerEntry>>;

    // =========================================================================
    // Usage Operations
    // =========================================================================

    /// Record a usage attempt without touching the balance.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn record_usage(&self, record: &UsageRecord) -> Result<()>;

    /// Debit `record.credits_charged` and insert the record atomically.
    ///
    /// Returns the new balance.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the account doesn't exist.
    /// - `StoreError::InsufficientCredits` if the balance is too low.
    fn commit_usage(&self, record: &UsageRecord) -> Result<i64>;

    /// List an account's usage records, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_usage(&self, account_id: &AccountId) -> Result<Vec<UsageRecord>>;

    // =========================================================================
    // One-Time Code Operations
    // =========================================================================

    /// Store a code, replacing any code held for the same address.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn replace_otp(&self, otp: &OneTimeCode) -> Result<()>;

    /// Get the code held for an address.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_otp(&self, address: &str) -> Result<Option<OneTimeCode>>;

    /// Mark the stored code verified if it still equals `code`.
    ///
    /// Returns `false` if the code was replaced or removed in the meantime.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn mark_otp_verified(&self, address: &str, code: &str) -> Result<bool>;
}
