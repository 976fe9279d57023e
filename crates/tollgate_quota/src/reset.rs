//! Daily quota replenishment.

use chrono::{DateTime, Utc};
use tollgate_core::{Account, Plan, ResetLogEntry};
use tracing::{debug, info};

/// Replenishes quota once per UTC calendar day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DailyResetPolicy;

impl DailyResetPolicy {
    /// Reset the account when `now` falls on a later UTC day than
    /// `last_reset`. Returns whether a reset happened.
    ///
    /// A clock running backwards never triggers a reset.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::{TimeZone, Utc};
    /// use tollgate_core::{Account, TenantId};
    /// use tollgate_quota::DailyResetPolicy;
    ///
    /// let monday = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
    /// let mut account = Account::provision(TenantId::from("shop-1"), monday, 5);
    /// account.token_usage = 300;
    ///
    /// let policy = DailyResetPolicy;
    /// assert!(!policy.apply(&mut account, monday));
    /// assert!(policy.apply(&mut account, Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 1).unwrap()));
    /// assert_eq!(account.token_usage, 0);
    /// ```
    pub fn apply(&self, account: &mut Account, now: DateTime<Utc>) -> bool {
        let last = account.last_reset.date_naive();
        if last >= now.date_naive() {
            return false;
        }

        account.reset_log.push(ResetLogEntry {
            date: last,
            token_usage_at_reset: account.token_usage,
        });
        account.token_usage = 0;
        account.last_reset = now;

        if account.plan == Plan::Trial {
            if account.trial_days_left > 0 {
                account.trial_days_left -= 1;
                debug!(days = account.trial_days_left, "Trial day consumed");
            } else {
                account.token_limit = 0;
                debug!("Trial over, limit forced to zero");
            }
        }

        info!(
            tenant = %account.tenant_id,
            closed = %last,
            plan = %account.plan,
            "Daily quota reset"
        );
        true
    }
}
