//! Subscription state machine.
//!
//! ```text
//! none ──start trial──▶ trial
//! old  ──start trial──▶ trial      (while trial days remain)
//! any  ──billing: tier active──▶ basic | premium
//! basic | premium ──billing: nothing active──▶ old
//! ```
//!
//! `none`, `trial` and `old` never change on their own when billing reports
//! nothing active. The token ceiling is recomputed on every reconciliation.

use chrono::{DateTime, Utc};
use tollgate_config::PlanTable;
use tollgate_core::{Account, Plan};
use tollgate_error::{PlanError, PlanErrorKind};
use tracing::{debug, info, warn};

/// Resolves a tenant's effective plan and ceiling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionStateMachine {
    limits: PlanTable,
}

impl SubscriptionStateMachine {
    /// State machine using the given ceilings.
    pub fn new(limits: PlanTable) -> Self {
        Self { limits }
    }

    /// Ceilings in use.
    pub fn limits(&self) -> &PlanTable {
        &self.limits
    }

    /// Fold the billing signal into the account.
    ///
    /// `active` is the name of the active subscription, `None` when billing
    /// reports nothing active. Names resolve through the configured tier
    /// names. Returns whether the plan changed.
    pub fn reconcile(&self, account: &mut Account, active: Option<&str>, now: DateTime<Utc>) -> bool {
        let target = match active {
            Some(name) => match self.limits.plan_for_subscription(name) {
                Some(tier) => Some(tier),
                None => {
                    warn!(tenant = %account.tenant_id, name, "Active subscription matches no tier");
                    None
                }
            },
            None if account.plan.is_paid() => {
                account.subscription_ref = None;
                Some(Plan::Old)
            }
            None => None,
        };

        let changed = target.is_some_and(|plan| account.transition_to(plan, now));
        if changed {
            info!(tenant = %account.tenant_id, plan = %account.plan, "Plan changed");
        }

        let limit = self.limits.limit_for(account.plan, account.trial_days_left);
        if limit != account.token_limit {
            debug!(from = account.token_limit, to = limit, "Recomputed token limit");
            account.token_limit = limit;
        }
        changed
    }

    /// Explicit "start trial" action.
    ///
    /// Returns `Ok(false)` when the trial is already running.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` from a paid plan, `TrialUnavailable` once the
    /// trial days are used up.
    #[track_caller]
    pub fn start_trial(&self, account: &mut Account, now: DateTime<Utc>) -> Result<bool, PlanError> {
        match account.plan {
            Plan::Trial => Ok(false),
            Plan::Basic | Plan::Premium => Err(PlanError::new(PlanErrorKind::InvalidTransition {
                from: account.plan.to_string(),
                to: Plan::Trial.to_string(),
            })),
            Plan::None | Plan::Old if account.trial_days_left == 0 => Err(PlanError::new(
                PlanErrorKind::TrialUnavailable(account.tenant_id.to_string()),
            )),
            Plan::None | Plan::Old => {
                account.transition_to(Plan::Trial, now);
                account.token_limit = self.limits.trial_limit();
                account.token_usage = 0;
                info!(
                    tenant = %account.tenant_id,
                    days = account.trial_days_left,
                    limit = account.token_limit,
                    "Trial started"
                );
                Ok(true)
            }
        }
    }

    /// Detach the paid subscription, returning its reference for the
    /// provider-side cancel. The plan turns `old` at the next reconciliation.
    pub fn cancel(&self, account: &mut Account) -> Option<String> {
        let external_ref = account.subscription_ref.take();
        if external_ref.is_none() {
            debug!(tenant = %account.tenant_id, "No subscription to cancel");
        }
        external_ref
    }
}
