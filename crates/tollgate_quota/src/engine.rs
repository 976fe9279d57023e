//! Account-level operations without persistence or locking.

use crate::{DailyResetPolicy, QuotaEnforcer, SubscriptionStateMachine};
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use tollgate_config::{PlanTable, TollgateConfig};
use tollgate_core::{Account, Admission};
use tollgate_error::PlanError;

/// The three engine components behind one value.
///
/// Every method works on an account the caller already holds; the
/// [`QuotaGateway`](crate::QuotaGateway) adds loading, locking and
/// conditional writes around them.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use tollgate_core::{Account, Admission, TenantId};
/// use tollgate_error::DenyReason;
/// use tollgate_quota::QuotaEngine;
///
/// let engine = QuotaEngine::default();
/// let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
/// let mut account = Account::provision(TenantId::from("shop-1"), now, 5);
///
/// assert_eq!(engine.check_and_reserve(&account), Admission::Deny(DenyReason::PlanNone));
///
/// engine.start_trial(&mut account, now).unwrap();
/// assert!(engine.check_and_reserve(&account).is_allowed());
/// engine.charge_usage(&mut account, 250);
/// assert_eq!(account.remaining_tokens(), 750);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Getters)]
pub struct QuotaEngine {
    subscriptions: SubscriptionStateMachine,
    reset: DailyResetPolicy,
    enforcer: QuotaEnforcer,
}

impl QuotaEngine {
    /// Engine using the given ceilings.
    pub fn new(limits: PlanTable) -> Self {
        Self {
            subscriptions: SubscriptionStateMachine::new(limits),
            reset: DailyResetPolicy,
            enforcer: QuotaEnforcer,
        }
    }

    /// Engine using the ceilings from configuration.
    pub fn from_config(config: &TollgateConfig) -> Self {
        Self::new(config.plan_table())
    }

    /// See [`SubscriptionStateMachine::reconcile`].
    pub fn reconcile_plan(&self, account: &mut Account, active: Option<&str>, now: DateTime<Utc>) -> bool {
        self.subscriptions.reconcile(account, active, now)
    }

    /// See [`DailyResetPolicy::apply`].
    pub fn apply_daily_reset(&self, account: &mut Account, now: DateTime<Utc>) -> bool {
        self.reset.apply(account, now)
    }

    /// See [`QuotaEnforcer::check_and_reserve`].
    pub fn check_and_reserve(&self, account: &Account) -> Admission {
        self.enforcer.check_and_reserve(account)
    }

    /// See [`QuotaEnforcer::charge_usage`].
    pub fn charge_usage(&self, account: &mut Account, cost: u64) {
        self.enforcer.charge_usage(account, cost)
    }

    /// See [`SubscriptionStateMachine::start_trial`].
    #[track_caller]
    pub fn start_trial(&self, account: &mut Account, now: DateTime<Utc>) -> Result<bool, PlanError> {
        self.subscriptions.start_trial(account, now)
    }

    /// See [`SubscriptionStateMachine::cancel`].
    pub fn cancel_subscription(&self, account: &mut Account) -> Option<String> {
        self.subscriptions.cancel(account)
    }

    /// Admission phase: reconcile (when a billing signal is given), reset,
    /// then decide.
    ///
    /// `active` is `None` to skip reconciliation, `Some(None)` when billing
    /// reports nothing active.
    ///
    /// The exhaustion check runs after the reset. On the day the last trial
    /// day is consumed (`trial_days_left` drops from 1 to 0) the request is
    /// denied. Checking before the reset would admit that one request
    /// instead.
    pub fn admit(
        &self,
        account: &mut Account,
        active: Option<Option<&str>>,
        now: DateTime<Utc>,
    ) -> Admission {
        if let Some(active) = active {
            self.reconcile_plan(account, active, now);
        }
        self.apply_daily_reset(account, now);
        self.check_and_reserve(account)
    }
}
