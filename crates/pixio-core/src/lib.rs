//! Core types for the Pixio backend.
//!
//! This crate provides the domain types shared by the store and the HTTP service:
//!
//! - **Identifiers**: `AccountId`, `LedgerEntryId`, `UsageRecordId`
//! - **Accounts**: `Account`
//! - **Ledger**: `LedgerEntry`, `Plan`, `PurchasePolicy`
//! - **Usage**: `UsageRecord`, `Tool`, `UsageStatus`
//! - **Verification**: `OneTimeCode`
//!
//! # Credits
//!
//! Credits are whole units stored as `i64`. Every tool invocation costs
//! [`DEFAULT_TOOL_COST`] credits; credits are bought in fixed plan bundles.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod account;
pub mod error;
pub mod ids;
pub mod ledger;
pub mod otp;
pub mod plans;
pub mod usage;

pub use account::{normalize_email, Account};
pub use error::{PixioError, ProviderError, Result};
pub use ids::{AccountId, IdError, LedgerEntryId, UsageRecordId};
pub use ledger::LedgerEntry;
pub use otp::{OneTimeCode, OTP_DIGITS, OTP_TTL_SECONDS};
pub use plans::{Plan, PurchasePolicy, DEFAULT_MAX_SETTLED_PER_DAY, PLAN_CURRENCY};
pub use usage::{Tool, UsageRecord, UsageStatus, DEFAULT_TOOL_COST};
