//! Credit, payment and verification workflows.
//!
//! Each workflow owns its collaborators behind traits so the HTTP layer and
//! the tests can supply their own.

pub mod metering;
pub mod otp;
pub mod settlement;

#[cfg(test)]
pub(crate) mod fakes;

pub use metering::{Metered, MeteringWorkflow};
pub use otp::OtpWorkflow;
pub use settlement::{PaymentIntent, Settlement, SettlementWorkflow};

use chrono::{DateTime, NaiveTime, Utc};

/// Start of the UTC day containing `now`.
#[must_use]
pub fn start_of_utc_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}
