//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Primary account records, keyed by `account_id`.
    pub const ACCOUNTS: &str = "accounts";

    /// Index: normalized email to `account_id`.
    pub const ACCOUNTS_BY_EMAIL: &str = "accounts_by_email";

    /// Ledger entries, keyed by `entry_id` (ULID).
    pub const LEDGER: &str = "ledger";

    /// Index: ledger entries by account, keyed by `account_id || entry_id`.
    /// Value is empty (index only).
    pub const LEDGER_BY_ACCOUNT: &str = "ledger_by_account";

    /// Payment references already applied, keyed by `payment_id`.
    /// Value is the settling `entry_id`.
    pub const SETTLED_PAYMENTS: &str = "settled_payments";

    /// Usage records, keyed by `record_id` (ULID).
    pub const USAGE: &str = "usage";

    /// Index: usage records by account, keyed by `account_id || record_id`.
    pub const USAGE_BY_ACCOUNT: &str = "usage_by_account";

    /// One-time codes, keyed by normalized address.
    pub const OTP: &str = "otp";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::ACCOUNTS,
        cf::ACCOUNTS_BY_EMAIL,
        cf::LEDGER,
        cf::LEDGER_BY_ACCOUNT,
        cf::SETTLED_PAYMENTS,
        cf::USAGE,
        cf::USAGE_BY_ACCOUNT,
        cf::OTP,
    ]
}
