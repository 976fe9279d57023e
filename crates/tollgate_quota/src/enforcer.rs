//! Admission gate and usage commit.

use tollgate_core::{Account, Admission, Plan};
use tollgate_error::DenyReason;

/// Decides whether a metered operation may run and commits its cost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuotaEnforcer;

impl QuotaEnforcer {
    /// Admission decision for the account as it stands.
    ///
    /// Nothing is reserved up front: the actual cost is only known once the
    /// operation has run, so usage may overshoot the ceiling by one
    /// operation.
    pub fn check_and_reserve(&self, account: &Account) -> Admission {
        let reason = match account.plan {
            Plan::None => Some(DenyReason::PlanNone),
            Plan::Old => Some(DenyReason::PlanLapsed),
            _ if account.is_trial_exhausted() => Some(DenyReason::TrialExhausted),
            _ if account.token_usage >= account.token_limit => Some(DenyReason::LimitReached {
                usage: account.token_usage,
                limit: account.token_limit,
            }),
            _ => None,
        };

        match reason {
            Some(reason) => {
                tracing::debug!(tenant = %account.tenant_id, %reason, "Admission denied");
                Admission::Deny(reason)
            }
            None => Admission::Allow,
        }
    }

    /// Add the measured cost, whatever the ceiling.
    pub fn charge_usage(&self, account: &mut Account, cost: u64) {
        account.token_usage = account.token_usage.saturating_add(cost);
        tracing::debug!(
            tenant = %account.tenant_id,
            cost,
            usage = account.token_usage,
            limit = account.token_limit,
            "Charged usage"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tollgate_core::TenantId;

    fn account(plan: Plan, usage: u64, limit: u64) -> Account {
        let mut account = Account::provision(TenantId::from("shop-1"), Utc::now(), 5);
        account.plan = plan;
        account.token_usage = usage;
        account.token_limit = limit;
        account
    }

    #[test]
    fn test_deny_reasons() {
        let enforcer = QuotaEnforcer;
        assert_eq!(
            enforcer.check_and_reserve(&account(Plan::None, 0, 0)),
            Admission::Deny(DenyReason::PlanNone)
        );
        assert_eq!(
            enforcer.check_and_reserve(&account(Plan::Old, 0, 50_000)),
            Admission::Deny(DenyReason::PlanLapsed)
        );
        assert_eq!(
            enforcer.check_and_reserve(&account(Plan::Basic, 50_000, 50_000)),
            Admission::Deny(DenyReason::LimitReached {
                usage: 50_000,
                limit: 50_000
            })
        );
    }

    #[test]
    fn test_exhausted_trial_is_denied_whatever_the_limit() {
        let enforcer = QuotaEnforcer;
        let mut trial = account(Plan::Trial, 0, 1_000);
        trial.trial_days_left = 0;
        assert_eq!(
            enforcer.check_and_reserve(&trial),
            Admission::Deny(DenyReason::TrialExhausted)
        );
    }

    #[test]
    fn test_allow_below_limit() {
        let enforcer = QuotaEnforcer;
        assert!(enforcer.check_and_reserve(&account(Plan::Trial, 999, 1_000)).is_allowed());
        assert!(enforcer.check_and_reserve(&account(Plan::Premium, 0, 100_000)).is_allowed());
    }

    #[test]
    fn test_charge_overshoots_and_saturates() {
        let enforcer = QuotaEnforcer;
        let mut account = account(Plan::Trial, 990, 1_000);
        enforcer.charge_usage(&mut account, 200);
        assert_eq!(account.token_usage, 1_190);

        account.token_usage = u64::MAX - 1;
        enforcer.charge_usage(&mut account, 10);
        assert_eq!(account.token_usage, u64::MAX);
    }
}
