//! Subscription plans.

use serde::{Deserialize, Serialize};

/// Subscription tier governing a tenant's token limit.
///
/// # Examples
///
/// ```
/// use tollgate_core::Plan;
/// use std::str::FromStr;
///
/// assert_eq!(Plan::from_str("premium").unwrap(), Plan::Premium);
/// assert_eq!(Plan::Old.to_string(), "old");
/// assert!(Plan::Basic.is_paid());
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Plan {
    /// No plan picked yet
    #[default]
    None,
    /// Free trial
    Trial,
    /// Paid basic tier
    Basic,
    /// Paid premium tier
    Premium,
    /// Paid subscription that lapsed
    Old,
}

impl Plan {
    /// Paid tiers are the ones driven by the billing provider.
    pub fn is_paid(self) -> bool {
        matches!(self, Plan::Basic | Plan::Premium)
    }

    /// Map an active subscription name reported by billing to a paid tier.
    ///
    /// Returns `None` for names that are not a paid tier.
    pub fn from_subscription_name(name: &str) -> Option<Plan> {
        name.trim()
            .parse::<Plan>()
            .ok()
            .filter(|plan| plan.is_paid())
    }
}
