//! Per-tenant account record and its audit trails.

use crate::Plan;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Trial days granted to a freshly provisioned tenant.
pub const DEFAULT_TRIAL_DAYS: u32 = 5;

/// Opaque, already-verified tenant identity.
///
/// # Examples
///
/// ```
/// use tollgate_core::TenantId;
///
/// let tenant = TenantId::from("gid://shopify/Shop/42");
/// assert_eq!(tenant.as_str(), "gid://shopify/Shop/42");
/// ```
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Wrap a tenant identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TenantId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// One plan transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLogEntry {
    /// Transition label, e.g. `"to trial"`
    pub action: String,
    /// When the transition happened
    pub timestamp: DateTime<Utc>,
}

/// Usage snapshot taken when the daily quota was replenished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetLogEntry {
    /// Day the snapshot closes (the previous `last_reset` day)
    pub date: NaiveDate,
    /// Tokens consumed during that day
    pub token_usage_at_reset: u64,
}

/// Quota and subscription state of one tenant.
///
/// # Examples
///
/// ```
/// use tollgate_core::{Account, Plan, TenantId, DEFAULT_TRIAL_DAYS};
/// use chrono::Utc;
///
/// let account = Account::provision(TenantId::from("shop-1"), Utc::now(), DEFAULT_TRIAL_DAYS);
/// assert_eq!(account.plan, Plan::None);
/// assert_eq!(account.trial_days_left, 5);
/// assert_eq!(account.token_limit, 0);
/// assert_eq!(account.token_usage, 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Tenant owning this record
    pub tenant_id: TenantId,
    /// Current subscription tier
    pub plan: Plan,
    /// Quota ceiling for the current period
    pub token_limit: u64,
    /// Consumption accrued in the current period
    pub token_usage: u64,
    /// Remaining trial days, frozen at zero
    pub trial_days_left: u32,
    /// Instant of the last replenishment
    pub last_reset: DateTime<Utc>,
    /// External billing reference of the paid subscription, if any
    #[serde(default)]
    pub subscription_ref: Option<String>,
    /// Append-only plan transitions
    #[serde(default)]
    pub plan_log: Vec<PlanLogEntry>,
    /// Append-only reset snapshots
    #[serde(default)]
    pub reset_log: Vec<ResetLogEntry>,
    /// When the account was provisioned
    pub created: DateTime<Utc>,
    /// Record version for conditional updates, 0 before first insert
    #[serde(default)]
    pub version: u64,
}

impl Account {
    /// Default record for a tenant seen for the first time.
    pub fn provision(tenant_id: TenantId, now: DateTime<Utc>, trial_days: u32) -> Self {
        Self {
            tenant_id,
            plan: Plan::None,
            token_limit: 0,
            token_usage: 0,
            trial_days_left: trial_days,
            last_reset: now,
            subscription_ref: None,
            plan_log: Vec::new(),
            reset_log: Vec::new(),
            created: now,
            version: 0,
        }
    }

    /// Trial plan with no days left.
    pub fn is_trial_exhausted(&self) -> bool {
        self.plan == Plan::Trial && self.trial_days_left == 0
    }

    /// Tokens left before the ceiling, zero once over it.
    pub fn remaining_tokens(&self) -> u64 {
        self.token_limit.saturating_sub(self.token_usage)
    }

    /// Move to `plan`, logging `"to {plan}"` only when the value changes.
    ///
    /// Returns whether a transition happened.
    pub fn transition_to(&mut self, plan: Plan, at: DateTime<Utc>) -> bool {
        if self.plan == plan {
            return false;
        }
        self.plan = plan;
        self.plan_log.push(PlanLogEntry {
            action: format!("to {}", plan),
            timestamp: at,
        });
        true
    }
}
