//! Key encoding utilities for `RocksDB`.
//!
//! Per-account indexes are `account_id (16 bytes) || ulid (16 bytes)`, so a
//! prefix scan yields one account's rows in creation order.

use pixio_core::{normalize_email, AccountId, LedgerEntryId, UsageRecordId};

/// Create an account key from an account ID.
#[must_use]
pub fn account_key(account_id: &AccountId) -> Vec<u8> {
    account_id.as_bytes().to_vec()
}

/// Create an email index key.
#[must_use]
pub fn email_key(email: &str) -> Vec<u8> {
    normalize_email(email).into_bytes()
}

/// Create a ledger entry key.
#[must_use]
pub fn ledger_key(entry_id: &LedgerEntryId) -> Vec<u8> {
    entry_id.to_bytes().to_vec()
}

/// Create an account-ledger index key.
#[must_use]
pub fn account_ledger_key(account_id: &AccountId, entry_id: &LedgerEntryId) -> Vec<u8> {
    indexed(account_id, &entry_id.to_bytes())
}

/// Create a usage record key.
#[must_use]
pub fn usage_key(record_id: &UsageRecordId) -> Vec<u8> {
    record_id.to_bytes().to_vec()
}

/// Create an account-usage index key.
#[must_use]
pub fn account_usage_key(account_id: &AccountId, record_id: &UsageRecordId) -> Vec<u8> {
    indexed(account_id, &record_id.to_bytes())
}

/// Create a prefix for iterating one account's index entries.
#[must_use]
pub fn account_prefix(account_id: &AccountId) -> Vec<u8> {
    account_id.as_bytes().to_vec()
}

/// Create a settled-payment marker key.
#[must_use]
pub fn payment_key(payment_id: &str) -> Vec<u8> {
    payment_id.as_bytes().to_vec()
}

/// Create a one-time code key.
#[must_use]
pub fn otp_key(address: &str) -> Vec<u8> {
    email_key(address)
}

/// Extract the trailing 16-byte ULID from an account index key.
///
/// Returns `None` if the key is shorter than 32 bytes.
#[must_use]
pub fn extract_ulid_bytes(key: &[u8]) -> Option<[u8; 16]> {
    key.get(16..32)?.try_into().ok()
}

fn indexed(account_id: &AccountId, suffix: &[u8; 16]) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(account_id.as_bytes());
    key.extend_from_slice(suffix);
    key
}
