//! Persisted, tenant-locked gateway operations.
//!
//! Every mutation follows the same shape: take the tenant's critical
//! section, read the record (provisioning it on first contact), apply an
//! engine step, and write it back conditionally on the version that was
//! read. A version conflict means another writer got there first; the step
//! is replayed against a fresh read with exponential backoff.
//!
//! Billing is always queried before the critical section is entered, and the
//! metered operation itself runs with no lock held.

use crate::{QuotaEngine, TenantLocks};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_retry2::strategy::{ExponentialBackoff, jitter};
use tokio_retry2::{Retry, RetryError};
use tollgate_config::TollgateConfig;
use tollgate_core::{
    Account, Admission, Clock, Metered, OperationRecord, Plan, SystemClock, TenantId, UsageReport,
};
use tollgate_error::{
    ConfigError, MeteredError, PlanError, PlanErrorKind, StoreError, StoreErrorKind,
    TollgateErrorKind, TollgateResult,
};
use tollgate_interface::{AccountStore, BillingProvider, OperationJournal, SubscriptionHandle};
use tracing::{debug, info, instrument, warn};

/// Result of a successful metered operation.
#[derive(Debug, Clone, PartialEq)]
pub struct MeterOutcome<T> {
    /// What the operation produced
    pub value: T,
    /// What it consumed
    pub usage: UsageReport,
    /// Account after the charge was committed
    pub account: Account,
}

fn default_clock() -> Arc<dyn Clock> {
    Arc::new(SystemClock)
}

/// Quota gateway over an account store and a billing provider.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use tollgate_billing::LocalBillingProvider;
/// use tollgate_config::TollgateConfig;
/// use tollgate_core::{Metered, TenantId, UsageReport};
/// use tollgate_error::MeteredError;
/// use tollgate_quota::QuotaGateway;
/// use tollgate_storage::InMemoryAccountStore;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let gateway = QuotaGateway::builder()
///     .store(Arc::new(InMemoryAccountStore::new()))
///     .billing(Arc::new(LocalBillingProvider::in_memory(&TollgateConfig::default())))
///     .build()?;
///
/// let tenant = TenantId::from("shop-1");
/// gateway.start_trial(&tenant).await?;
///
/// let outcome = gateway
///     .meter(&tenant, || async {
///         Ok::<_, MeteredError>(Metered::new("hello", UsageReport::new(12, 30)))
///     })
///     .await?;
/// assert_eq!(outcome.account.token_usage, 42);
/// # Ok(())
/// # }
/// ```
#[derive(derive_builder::Builder)]
#[builder(pattern = "owned", build_fn(private, name = "build_internal"))]
pub struct QuotaGateway {
    /// Account persistence
    store: Arc<dyn AccountStore>,
    /// Subscription source of truth
    billing: Arc<dyn BillingProvider>,
    /// Time source for resets and audit entries
    #[builder(default = "default_clock()")]
    clock: Arc<dyn Clock>,
    /// Optional sink for metered operation outcomes
    #[builder(default, setter(strip_option))]
    journal: Option<Arc<dyn OperationJournal>>,
    /// Limits, trial length and retry policy
    #[builder(default)]
    config: TollgateConfig,
    #[builder(setter(skip))]
    engine: QuotaEngine,
    #[builder(setter(skip))]
    locks: TenantLocks,
    #[builder(setter(skip))]
    background: StdMutex<JoinSet<()>>,
}

impl QuotaGatewayBuilder {
    /// Build the gateway.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the store or billing provider is
    /// missing or the configuration does not validate.
    pub fn build(self) -> TollgateResult<QuotaGateway> {
        let mut gateway = self
            .build_internal()
            .map_err(|e| ConfigError::new(format!("Incomplete gateway: {}", e)))?;
        gateway.config.validate()?;
        gateway.engine = QuotaEngine::from_config(&gateway.config);
        debug!(store = gateway.store.backend_name(), "Built quota gateway");
        Ok(gateway)
    }
}

impl QuotaGateway {
    /// Start building a gateway.
    pub fn builder() -> QuotaGatewayBuilder {
        QuotaGatewayBuilder::default()
    }

    /// Engine applied under the tenant lock.
    pub fn engine(&self) -> &QuotaEngine {
        &self.engine
    }

    /// Configuration in effect.
    pub fn config(&self) -> &TollgateConfig {
        &self.config
    }

    /// Load the tenant's account, creating the default record on first
    /// contact. Never denies.
    #[instrument(skip(self), fields(tenant = %tenant))]
    pub async fn resolve_account(&self, tenant: &TenantId) -> TollgateResult<Account> {
        let _guard = self.locks.lock(tenant).await;
        self.load_or_provision(tenant).await
    }

    /// Fold an already-fetched billing signal into the stored account.
    #[instrument(skip(self), fields(tenant = %tenant))]
    pub async fn reconcile_plan(
        &self,
        tenant: &TenantId,
        active: Option<&str>,
    ) -> TollgateResult<Account> {
        let (account, _) = self
            .mutate(tenant, |account, now| {
                Ok(self.engine.reconcile_plan(account, active, now))
            })
            .await?;
        Ok(account)
    }

    /// Replenish the stored account if the day rolled over.
    #[instrument(skip(self), fields(tenant = %tenant))]
    pub async fn apply_daily_reset(&self, tenant: &TenantId) -> TollgateResult<Account> {
        let (account, _) = self
            .mutate(tenant, |account, now| {
                Ok(self.engine.apply_daily_reset(account, now))
            })
            .await?;
        Ok(account)
    }

    /// Up-to-date account: billing is queried, then the plan is reconciled
    /// and the daily reset applied.
    ///
    /// # Errors
    ///
    /// A billing failure leaves the account untouched.
    #[instrument(skip(self), fields(tenant = %tenant))]
    pub async fn refresh_account(&self, tenant: &TenantId) -> TollgateResult<Account> {
        let active = self.billing.active_subscription(tenant).await?;
        let (account, _) = self
            .mutate(tenant, |account, now| {
                self.engine.reconcile_plan(account, active.as_deref(), now);
                self.engine.apply_daily_reset(account, now);
                Ok(())
            })
            .await?;
        Ok(account)
    }

    /// Admission phase of the two-phase protocol.
    ///
    /// Reconciles with billing (when `gateway.reconcile_on_meter` is set),
    /// applies the daily reset, persists the result and decides. A denial is
    /// a regular `Ok` value here.
    #[instrument(skip(self), fields(tenant = %tenant))]
    pub async fn check_and_reserve(&self, tenant: &TenantId) -> TollgateResult<(Account, Admission)> {
        let active = self.billing_signal(tenant).await?;
        self.mutate(tenant, |account, now| {
            Ok(self
                .engine
                .admit(account, active.as_ref().map(|a| a.as_deref()), now))
        })
        .await
    }

    /// Commit a measured cost, retrying on version conflicts.
    ///
    /// Applied as-is even if the day rolled over since admission.
    #[instrument(skip(self), fields(tenant = %tenant))]
    pub async fn charge_usage(&self, tenant: &TenantId, cost: u64) -> TollgateResult<Account> {
        let (account, _) = self
            .mutate(tenant, |account, _| {
                self.engine.charge_usage(account, cost);
                Ok(())
            })
            .await?;
        Ok(account)
    }

    /// Explicit "start trial".
    ///
    /// # Errors
    ///
    /// `PlanTransitionRejected` from a paid plan or once the trial is used up.
    #[instrument(skip(self), fields(tenant = %tenant))]
    pub async fn start_trial(&self, tenant: &TenantId) -> TollgateResult<Account> {
        let (account, _) = self
            .mutate(tenant, |account, now| {
                self.engine.apply_daily_reset(account, now);
                Ok(self.engine.start_trial(account, now)?)
            })
            .await?;
        Ok(account)
    }

    /// Ask billing for a paid tier and remember the returned reference.
    ///
    /// The plan changes once a later reconciliation sees the subscription
    /// active.
    ///
    /// # Errors
    ///
    /// `PlanTransitionRejected` for unpaid plans. A billing failure leaves
    /// the account untouched.
    #[instrument(skip(self), fields(tenant = %tenant, tier = %tier))]
    pub async fn select_tier(
        &self,
        tenant: &TenantId,
        tier: Plan,
    ) -> TollgateResult<(Account, SubscriptionHandle)> {
        let current = self.resolve_account(tenant).await?;
        if !tier.is_paid() {
            return Err(PlanError::new(PlanErrorKind::InvalidTransition {
                from: current.plan.to_string(),
                to: tier.to_string(),
            })
            .into());
        }

        let handle = self.billing.create_subscription(tenant, tier).await?;
        let (account, _) = self
            .mutate(tenant, |account, _| {
                if let Some(previous) = &account.subscription_ref {
                    debug!(previous, "Replacing subscription reference");
                }
                account.subscription_ref = Some(handle.external_ref.clone());
                Ok(())
            })
            .await?;

        info!(external_ref = %handle.external_ref, "Subscription requested");
        Ok((account, handle))
    }

    /// Detach the paid subscription and cancel it with billing in the
    /// background. The caller never waits on billing.
    #[instrument(skip(self), fields(tenant = %tenant))]
    pub async fn cancel_subscription(&self, tenant: &TenantId) -> TollgateResult<Account> {
        let (account, external_ref) = self
            .mutate(tenant, |account, _| {
                Ok(self.engine.cancel_subscription(account))
            })
            .await?;

        if let Some(external_ref) = external_ref {
            let billing = Arc::clone(&self.billing);
            let tenant = tenant.clone();
            let mut background = self.background.lock().unwrap_or_else(|e| e.into_inner());
            while background.try_join_next().is_some() {}
            background.spawn(async move {
                match billing.cancel_subscription(&external_ref).await {
                    Ok(()) => debug!(tenant = %tenant, external_ref, "Billing cancel confirmed"),
                    Err(e) => {
                        warn!(tenant = %tenant, external_ref, error = %e, "Billing cancel failed")
                    }
                }
            });
        }
        Ok(account)
    }

    /// Run a metered operation under the two-phase protocol.
    ///
    /// Admission happens under the tenant lock, the operation runs with no
    /// lock held, and the reported `total_tokens` is committed under the lock
    /// again. A failed operation is journaled and never charged.
    ///
    /// # Errors
    ///
    /// `TokenLimitExceeded` on denial, `MeteredOperationFailed` when the
    /// operation fails, store and billing errors as they occur.
    #[instrument(skip(self, operation), fields(tenant = %tenant))]
    pub async fn meter<T, F, Fut>(
        &self,
        tenant: &TenantId,
        operation: F,
    ) -> TollgateResult<MeterOutcome<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Metered<T>, MeteredError>>,
    {
        let (_, admission) = self.check_and_reserve(tenant).await?;
        admission.into_result()?;

        let Metered { value, usage } = match operation().await {
            Ok(metered) => metered,
            Err(e) => {
                warn!(error = %e, "Metered operation failed, nothing charged");
                self.journal(OperationRecord::failed(
                    tenant.clone(),
                    self.clock.now(),
                    e.message.clone(),
                ))
                .await;
                return Err(e.into());
            }
        };

        let account = self.charge_usage(tenant, usage.total_tokens).await?;
        self.journal(OperationRecord::succeeded(tenant.clone(), self.clock.now(), usage))
            .await;
        Ok(MeterOutcome {
            value,
            usage,
            account,
        })
    }

    /// Wait for background billing calls still in flight.
    ///
    /// Call before the runtime shuts down; pending cancels are dropped
    /// otherwise.
    pub async fn shutdown(&self) {
        let mut pending = std::mem::take(
            &mut *self.background.lock().unwrap_or_else(|e| e.into_inner()),
        );
        if !pending.is_empty() {
            debug!(count = pending.len(), "Waiting for background billing calls");
        }
        while pending.join_next().await.is_some() {}
    }

    async fn billing_signal(&self, tenant: &TenantId) -> TollgateResult<Option<Option<String>>> {
        if !self.config.gateway.reconcile_on_meter {
            return Ok(None);
        }
        Ok(Some(self.billing.active_subscription(tenant).await?))
    }

    async fn journal(&self, record: OperationRecord) {
        let Some(journal) = &self.journal else {
            return;
        };
        if let Err(e) = journal.record(record).await {
            warn!(error = %e, "Failed to journal metered operation");
        }
    }

    /// Read-modify-write under the tenant lock, replayed on version conflict.
    async fn mutate<R, F>(&self, tenant: &TenantId, apply: F) -> TollgateResult<(Account, R)>
    where
        F: Fn(&mut Account, DateTime<Utc>) -> TollgateResult<R>,
    {
        let _guard = self.locks.lock(tenant).await;
        let apply = &apply;

        Retry::spawn(self.retry_strategy(), move || async move {
            self.try_mutate(tenant, apply).await.map_err(|e| {
                if e.is_conflict() {
                    debug!(error = %e, "Lost update race, retrying on fresh read");
                    RetryError::Transient {
                        err: e,
                        retry_after: None,
                    }
                } else {
                    RetryError::Permanent(e)
                }
            })
        })
        .await
    }

    async fn try_mutate<R, F>(&self, tenant: &TenantId, apply: &F) -> TollgateResult<(Account, R)>
    where
        F: Fn(&mut Account, DateTime<Utc>) -> TollgateResult<R>,
    {
        let current = self.load_or_provision(tenant).await?;
        let mut next = current.clone();
        let outcome = apply(&mut next, self.clock.now())?;

        if next == current {
            return Ok((current, outcome));
        }
        let stored = self.store.update(&next).await?;
        Ok((stored, outcome))
    }

    async fn load_or_provision(&self, tenant: &TenantId) -> TollgateResult<Account> {
        if let Some(account) = self.store.get(tenant).await? {
            return Ok(account);
        }

        let fresh = Account::provision(tenant.clone(), self.clock.now(), self.config.trial.days);
        match self.store.insert(&fresh).await {
            Ok(stored) => {
                info!(tenant = %tenant, trial_days = stored.trial_days_left, "Provisioned account");
                Ok(stored)
            }
            Err(e) if is_already_exists(e.kind()) => {
                debug!(tenant = %tenant, "Account created concurrently, re-reading");
                self.store.get(tenant).await?.ok_or_else(|| {
                    StoreError::new(StoreErrorKind::NotFound(tenant.to_string())).into()
                })
            }
            Err(e) => Err(e),
        }
    }

    fn retry_strategy(&self) -> impl Iterator<Item = Duration> {
        let retry = &self.config.retry;
        ExponentialBackoff::from_millis(retry.base_delay_ms)
            .factor(2)
            .max_delay(retry.max_delay())
            .map(jitter)
            .take(retry.max_attempts.saturating_sub(1))
    }
}

fn is_already_exists(kind: &TollgateErrorKind) -> bool {
    matches!(
        kind,
        TollgateErrorKind::AccountLookupFailed(e) if matches!(e.kind, StoreErrorKind::AlreadyExists(_))
    )
}
