//! Plan to token-limit mapping.

use crate::{BuiltinTier, Tier};
use tollgate_core::Plan;

/// Static ceiling per plan, recomputed on every reconciliation.
///
/// # Examples
///
/// ```
/// use tollgate_config::PlanTable;
/// use tollgate_core::Plan;
///
/// let table = PlanTable::default();
/// assert_eq!(table.limit_for(Plan::Basic, 0), 50_000);
/// assert_eq!(table.limit_for(Plan::Trial, 3), 1_000);
/// assert_eq!(table.limit_for(Plan::Trial, 0), 0);
/// assert_eq!(table.limit_for(Plan::Old, 5), 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanTable {
    trial: u64,
    basic: u64,
    premium: u64,
    basic_name: String,
    premium_name: String,
}

impl PlanTable {
    /// Build a table from explicit ceilings. Paid tiers are sold under
    /// their plan names until [`with_subscription_names`](Self::with_subscription_names).
    pub fn new(trial: u64, basic: u64, premium: u64) -> Self {
        Self {
            trial,
            basic,
            premium,
            basic_name: Plan::Basic.to_string(),
            premium_name: Plan::Premium.to_string(),
        }
    }

    /// Names the billing provider reports for the paid tiers.
    pub fn with_subscription_names(
        mut self,
        basic: impl Into<String>,
        premium: impl Into<String>,
    ) -> Self {
        self.basic_name = basic.into();
        self.premium_name = premium.into();
        self
    }

    /// Paid plan behind an active subscription name.
    ///
    /// Configured names match case-insensitively; the plan names
    /// themselves are always accepted.
    ///
    /// ```
    /// use tollgate_config::PlanTable;
    /// use tollgate_core::Plan;
    ///
    /// let table = PlanTable::default().with_subscription_names("Starter", "Pro Monthly");
    /// assert_eq!(table.plan_for_subscription("pro monthly"), Some(Plan::Premium));
    /// assert_eq!(table.plan_for_subscription("basic"), Some(Plan::Basic));
    /// assert_eq!(table.plan_for_subscription("trial"), None);
    /// ```
    pub fn plan_for_subscription(&self, name: &str) -> Option<Plan> {
        let name = name.trim();
        if name.eq_ignore_ascii_case(&self.basic_name) {
            Some(Plan::Basic)
        } else if name.eq_ignore_ascii_case(&self.premium_name) {
            Some(Plan::Premium)
        } else {
            Plan::from_subscription_name(name)
        }
    }

    /// Ceiling for `plan`. A trial with no days left gets nothing.
    pub fn limit_for(&self, plan: Plan, trial_days_left: u32) -> u64 {
        match plan {
            Plan::None | Plan::Old => 0,
            Plan::Trial if trial_days_left == 0 => 0,
            Plan::Trial => self.trial,
            Plan::Basic => self.basic,
            Plan::Premium => self.premium,
        }
    }

    /// Trial ceiling while days remain.
    pub fn trial_limit(&self) -> u64 {
        self.trial
    }
}

impl Default for PlanTable {
    fn default() -> Self {
        Self::new(
            BuiltinTier::Trial.token_limit(),
            BuiltinTier::Basic.token_limit(),
            BuiltinTier::Premium.token_limit(),
        )
    }
}
