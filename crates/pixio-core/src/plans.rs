//! Credit plans and purchase policy.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::PixioError;

// ============================================================================
// Constants
// ============================================================================

/// Currency charged for all plans.
pub const PLAN_CURRENCY: &str = "INR";

/// Default cap on settled purchases per account per UTC day.
pub const DEFAULT_MAX_SETTLED_PER_DAY: u32 = 1;

/// Purchasable credit bundles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Plan {
    /// 100 credits for 10.
    Basic,

    /// 500 credits for 50.
    Advanced,

    /// 5000 credits for 250.
    Business,
}

impl Plan {
    /// All plans, cheapest first.
    pub const ALL: [Self; 3] = [Self::Basic, Self::Advanced, Self::Business];

    /// Price in major currency units.
    #[must_use]
    pub const fn price(self) -> i64 {
        match self {
            Self::Basic => 10,
            Self::Advanced => 50,
            Self::Business => 250,
        }
    }

    /// Price in minor currency units, as sent to the payment gateway.
    #[must_use]
    pub const fn price_minor(self) -> i64 {
        self.price() * 100
    }

    /// Credits granted by the plan.
    #[must_use]
    pub const fn credits(self) -> i64 {
        match self {
            Self::Basic => 100,
            Self::Advanced => 500,
            Self::Business => 5000,
        }
    }

    /// The plan identifier used on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "Basic",
            Self::Advanced => "Advanced",
            Self::Business => "Business",
        }
    }
}

impl FromStr for Plan {
    type Err = PixioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|plan| plan.as_str() == s)
            .ok_or_else(|| PixioError::UnknownPlan(s.to_string()))
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caps applied on top of the plan table.
///
/// `max_settled_per_day` limits how many purchases an account may settle per
/// UTC day (`None` disables the cap). `credit_override` replaces the plan's
/// credit amount for every settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchasePolicy {
    /// Maximum settled purchases per account per UTC day.
    pub max_settled_per_day: Option<u32>,

    /// Fixed credit amount granted per purchase, replacing the plan's.
    pub credit_override: Option<i64>,
}

impl PurchasePolicy {
    /// A policy without caps or overrides.
    #[must_use]
    pub const fn unrestricted() -> Self {
        Self {
            max_settled_per_day: None,
            credit_override: None,
        }
    }

    /// Credits to grant given the amount recorded on the gateway order.
    ///
    /// Only a positive override replaces the ordered amount.
    #[must_use]
    pub fn credits_for(&self, ordered_credits: i64) -> i64 {
        self.credit_override
            .filter(|credits| *credits > 0)
            .unwrap_or(ordered_credits)
    }
}

impl Default for PurchasePolicy {
    fn default() -> Self {
        Self {
            max_settled_per_day: Some(DEFAULT_MAX_SETTLED_PER_DAY),
            credit_override: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_table() {
        assert_eq!(Plan::Basic.price(), 10);
        assert_eq!(Plan::Basic.credits(), 100);
        assert_eq!(Plan::Advanced.credits(), 500);
        assert_eq!(Plan::Business.price_minor(), 25_000);
    }

    #[test]
    fn plan_parses_by_name() {
        assert_eq!("Advanced".parse::<Plan>().unwrap(), Plan::Advanced);
        assert!(matches!(
            "Platinum".parse::<Plan>(),
            Err(PixioError::UnknownPlan(name)) if name == "Platinum"
        ));
    }

    #[test]
    fn plan_names_are_case_sensitive() {
        assert!("basic".parse::<Plan>().is_err());
    }

    #[test]
    fn policy_override_replaces_credits() {
        let policy = PurchasePolicy {
            max_settled_per_day: None,
            credit_override: Some(1),
        };
        assert_eq!(policy.credits_for(500), 1);
        assert_eq!(PurchasePolicy::default().credits_for(500), 500);
    }

    #[test]
    fn non_positive_override_is_ignored() {
        for credit_override in [0, -10] {
            let policy = PurchasePolicy {
                max_settled_per_day: None,
                credit_override: Some(credit_override),
            };
            assert_eq!(policy.credits_for(100), 100);
        }
    }

    #[test]
    fn default_policy_caps_one_per_day() {
        assert_eq!(PurchasePolicy::default().max_settled_per_day, Some(1));
        assert_eq!(PurchasePolicy::unrestricted().max_settled_per_day, None);
    }
}
