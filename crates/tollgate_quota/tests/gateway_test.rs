//! End-to-end gateway behaviour over the in-memory store and local billing.

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use futures::future::join_all;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tollgate_billing::LocalBillingProvider;
use tollgate_config::TollgateConfig;
use tollgate_core::{
    Account, Admission, ManualClock, Metered, OperationStatus, Plan, TenantId, UsageReport,
};
use tollgate_error::{DenyReason, MeteredError, TollgateErrorKind, TollgateResult};
use tollgate_interface::{AccountStore, BillingProvider};
use tollgate_quota::QuotaGateway;
use tollgate_storage::{InMemoryAccountStore, InMemoryJournal};

struct Harness {
    gateway: QuotaGateway,
    store: Arc<InMemoryAccountStore>,
    billing: Arc<LocalBillingProvider>,
    journal: Arc<InMemoryJournal>,
    clock: ManualClock,
}

fn harness_with(config: TollgateConfig) -> Harness {
    let store = Arc::new(InMemoryAccountStore::new());
    let billing = Arc::new(LocalBillingProvider::in_memory(&config).with_auto_activate(true));
    let journal = Arc::new(InMemoryJournal::new());
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());

    let gateway = QuotaGateway::builder()
        .store(store.clone())
        .billing(billing.clone())
        .journal(journal.clone())
        .clock(Arc::new(clock.clone()))
        .config(config)
        .build()
        .unwrap();

    Harness {
        gateway,
        store,
        billing,
        journal,
        clock,
    }
}

fn harness() -> Harness {
    harness_with(TollgateConfig::default())
}

fn tokens(total: u64) -> Result<Metered<&'static str>, MeteredError> {
    Ok(Metered::new("ok", UsageReport::total(total)))
}

#[tokio::test]
async fn test_new_tenant_is_provisioned_and_denied() {
    let h = harness();
    let tenant = TenantId::from("gid://shopify/Shop/1");

    let account = h.gateway.resolve_account(&tenant).await.unwrap();
    assert_eq!(account.plan, Plan::None);
    assert_eq!(account.trial_days_left, 5);
    assert_eq!(account.token_limit, 0);
    assert_eq!(account.token_usage, 0);
    assert_eq!(account.version, 1);

    let (_, admission) = h.gateway.check_and_reserve(&tenant).await.unwrap();
    assert_eq!(admission, Admission::Deny(DenyReason::PlanNone));

    let ran = AtomicBool::new(false);
    let err = h
        .gateway
        .meter(&tenant, || async {
            ran.store(true, Ordering::SeqCst);
            tokens(10)
        })
        .await
        .unwrap_err();
    assert_eq!(err.deny_reason(), Some(DenyReason::PlanNone));
    assert!(err.to_string().contains("plan none"));
    assert!(!err.is_retryable());
    assert!(!ran.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_concurrent_first_contact_creates_one_record() {
    let h = harness();
    let other = QuotaGateway::builder()
        .store(h.store.clone())
        .billing(h.billing.clone())
        .build()
        .unwrap();
    let tenant = TenantId::from("shop-1");

    let resolved = join_all((0..10).map(|i| {
        let gateway = if i % 2 == 0 { &h.gateway } else { &other };
        let tenant = tenant.clone();
        async move { gateway.resolve_account(&tenant).await }
    }))
    .await;

    assert!(resolved.iter().all(|r| r.as_ref().unwrap().version == 1));
    assert_eq!(h.store.len().await, 1);
}

#[tokio::test]
async fn test_concurrent_charges_add_up() {
    let h = harness();
    let tenant = TenantId::from("shop-1");
    h.gateway.start_trial(&tenant).await.unwrap();
    h.gateway.charge_usage(&tenant, 3).await.unwrap();

    let results = join_all((0..25).map(|_| h.gateway.charge_usage(&tenant, 7))).await;
    assert!(results.iter().all(|r| r.is_ok()));

    let account = h.store.get(&tenant).await.unwrap().unwrap();
    assert_eq!(account.token_usage, 3 + 25 * 7);
}

#[tokio::test]
async fn test_concurrent_meters_add_up() {
    let h = harness();
    let tenant = TenantId::from("shop-1");
    h.gateway.select_tier(&tenant, Plan::Premium).await.unwrap();

    let outcomes = join_all((0..20).map(|_| {
        h.gateway.meter(&tenant, || async {
            tokio::task::yield_now().await;
            tokens(11)
        })
    }))
    .await;
    assert!(outcomes.iter().all(|r| r.is_ok()));

    let account = h.store.get(&tenant).await.unwrap().unwrap();
    assert_eq!(account.plan, Plan::Premium);
    assert_eq!(account.token_usage, 20 * 11);
    assert_eq!(h.journal.records_for(&tenant).await.len(), 20);
}

#[tokio::test]
async fn test_two_gateways_sharing_a_store_do_not_lose_charges() {
    let mut config = TollgateConfig::default();
    config.retry.max_attempts = 20;
    let h = harness_with(config.clone());
    let other = QuotaGateway::builder()
        .store(h.store.clone())
        .billing(h.billing.clone())
        .clock(Arc::new(h.clock.clone()))
        .config(config)
        .build()
        .unwrap();
    let tenant = TenantId::from("shop-1");
    h.gateway.start_trial(&tenant).await.unwrap();

    let results = join_all((0..30).map(|i| {
        let gateway = if i % 2 == 0 { &h.gateway } else { &other };
        gateway.charge_usage(&tenant, 2)
    }))
    .await;
    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(
        h.store.get(&tenant).await.unwrap().unwrap().token_usage,
        60
    );
}

#[tokio::test]
async fn test_cancel_then_lapse_turns_old() {
    let h = harness();
    let tenant = TenantId::from("shop-1");

    let (account, handle) = h.gateway.select_tier(&tenant, Plan::Basic).await.unwrap();
    assert_eq!(account.plan, Plan::None);
    assert_eq!(account.subscription_ref.as_deref(), Some(handle.external_ref.as_str()));
    assert!(handle.confirmation_url.is_some());

    let account = h.gateway.refresh_account(&tenant).await.unwrap();
    assert_eq!(account.plan, Plan::Basic);
    assert_eq!(account.token_limit, 50_000);

    let account = h.gateway.cancel_subscription(&tenant).await.unwrap();
    assert_eq!(account.subscription_ref, None);
    assert_eq!(account.plan, Plan::Basic);

    h.gateway.shutdown().await;
    assert_eq!(h.billing.active_subscription(&tenant).await.unwrap(), None);

    let account = h.gateway.refresh_account(&tenant).await.unwrap();
    assert_eq!(account.plan, Plan::Old);
    assert_eq!(account.token_limit, 0);
    let actions: Vec<_> = account.plan_log.iter().map(|e| e.action.as_str()).collect();
    assert_eq!(actions, ["to basic", "to old"]);

    let (_, admission) = h.gateway.check_and_reserve(&tenant).await.unwrap();
    assert_eq!(admission, Admission::Deny(DenyReason::PlanLapsed));
}

#[tokio::test]
async fn test_cancel_succeeds_while_billing_is_down() {
    let h = harness();
    let tenant = TenantId::from("shop-1");
    h.gateway.select_tier(&tenant, Plan::Premium).await.unwrap();

    h.billing.set_unavailable(true);
    let account = h.gateway.cancel_subscription(&tenant).await.unwrap();
    assert_eq!(account.subscription_ref, None);
    h.gateway.shutdown().await;

    h.billing.set_unavailable(false);
    assert_eq!(
        h.billing.active_subscription(&tenant).await.unwrap().as_deref(),
        Some("premium")
    );
}

#[tokio::test]
async fn test_cancel_without_subscription_is_noop() {
    let h = harness();
    let tenant = TenantId::from("shop-1");
    let before = h.gateway.resolve_account(&tenant).await.unwrap();
    let after = h.gateway.cancel_subscription(&tenant).await.unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_store_failure_is_not_a_denial() {
    let h = harness();
    h.store.set_unavailable(true);

    let err = h
        .gateway
        .check_and_reserve(&TenantId::from("shop-1"))
        .await
        .unwrap_err();
    assert!(matches!(err.kind(), TollgateErrorKind::AccountLookupFailed(_)));
    assert_eq!(err.deny_reason(), None);
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_billing_failure_leaves_account_untouched() {
    let h = harness();
    let tenant = TenantId::from("shop-1");
    h.gateway.start_trial(&tenant).await.unwrap();
    let before = h.store.get(&tenant).await.unwrap().unwrap();

    h.billing.set_unavailable(true);
    let err = h.gateway.select_tier(&tenant, Plan::Premium).await.unwrap_err();
    assert!(matches!(err.kind(), TollgateErrorKind::BillingProvider(_)));
    let err = h.gateway.refresh_account(&tenant).await.unwrap_err();
    assert!(err.is_retryable());

    assert_eq!(h.store.get(&tenant).await.unwrap().unwrap(), before);
}

#[tokio::test]
async fn test_failed_operation_is_not_charged() {
    let h = harness();
    let tenant = TenantId::from("shop-1");
    h.gateway.start_trial(&tenant).await.unwrap();

    let err = h
        .gateway
        .meter(&tenant, || async {
            Err::<Metered<()>, _>(MeteredError::new("upstream timed out"))
        })
        .await
        .unwrap_err();
    assert!(matches!(err.kind(), TollgateErrorKind::MeteredOperationFailed(_)));
    assert_eq!(err.deny_reason(), None);

    let account = h.store.get(&tenant).await.unwrap().unwrap();
    assert_eq!(account.token_usage, 0);

    let records = h.journal.records_for(&tenant).await;
    assert_eq!(records.len(), 1);
    assert_eq!(*records[0].status(), OperationStatus::Failed);
    assert_eq!(records[0].error().as_deref(), Some("upstream timed out"));
}

#[tokio::test]
async fn test_trial_runs_out_day_by_day() {
    let h = harness();
    let tenant = TenantId::from("shop-1");
    h.gateway.start_trial(&tenant).await.unwrap();

    for expected_days in (0..5).rev() {
        h.clock.advance(Duration::days(1));
        let (account, _) = h.gateway.check_and_reserve(&tenant).await.unwrap();
        assert_eq!(account.trial_days_left, expected_days);
    }

    let (account, admission) = h.gateway.check_and_reserve(&tenant).await.unwrap();
    assert_eq!(account.token_limit, 0);
    assert_eq!(admission, Admission::Deny(DenyReason::TrialExhausted));
    assert_eq!(account.reset_log.len(), 5);

    let account = h.gateway.start_trial(&tenant).await.unwrap();
    assert_eq!(account.plan_log.len(), 1);
    assert_eq!(account.trial_days_left, 0);
}

#[tokio::test]
async fn test_used_up_trial_cannot_restart_after_lapse() {
    let h = harness();
    let tenant = TenantId::from("shop-1");
    h.gateway.reconcile_plan(&tenant, Some("basic")).await.unwrap();
    let mut account = h.store.get(&tenant).await.unwrap().unwrap();
    account.trial_days_left = 0;
    h.store.update(&account).await.unwrap();
    h.gateway.reconcile_plan(&tenant, None).await.unwrap();

    let err = h.gateway.start_trial(&tenant).await.unwrap_err();
    assert!(matches!(err.kind(), TollgateErrorKind::PlanTransitionRejected(_)));
    let account = h.store.get(&tenant).await.unwrap().unwrap();
    assert_eq!(account.plan, Plan::Old);
}

#[tokio::test]
async fn test_charge_after_midnight_is_not_reset() {
    let h = harness();
    let tenant = TenantId::from("shop-1");
    h.clock.set(Utc.with_ymd_and_hms(2024, 1, 1, 23, 59, 0).unwrap());
    h.gateway.start_trial(&tenant).await.unwrap();

    let clock = h.clock.clone();
    let outcome = h
        .gateway
        .meter(&tenant, || async move {
            clock.advance(Duration::minutes(2));
            tokens(120)
        })
        .await
        .unwrap();
    assert_eq!(outcome.account.token_usage, 120);
    assert!(outcome.account.reset_log.is_empty());

    let account = h.gateway.apply_daily_reset(&tenant).await.unwrap();
    assert_eq!(account.token_usage, 0);
    assert_eq!(account.reset_log[0].date.to_string(), "2024-01-01");
    assert_eq!(account.reset_log[0].token_usage_at_reset, 120);
}

#[tokio::test]
async fn test_unpaid_tier_cannot_be_selected() {
    let h = harness();
    let err = h
        .gateway
        .select_tier(&TenantId::from("shop-1"), Plan::Trial)
        .await
        .unwrap_err();
    assert!(matches!(err.kind(), TollgateErrorKind::PlanTransitionRejected(_)));
}

#[tokio::test]
async fn test_meter_skips_billing_when_reconcile_disabled() {
    let mut config = TollgateConfig::default();
    config.gateway.reconcile_on_meter = false;
    let h = harness_with(config);
    let tenant = TenantId::from("shop-1");

    h.gateway.start_trial(&tenant).await.unwrap();
    h.billing.create_subscription(&tenant, Plan::Premium).await.unwrap();

    let outcome = h.gateway.meter(&tenant, || async { tokens(5) }).await.unwrap();
    assert_eq!(outcome.account.plan, Plan::Trial);

    let account = h.gateway.reconcile_plan(&tenant, Some("premium")).await.unwrap();
    assert_eq!(account.plan, Plan::Premium);
    assert_eq!(account.token_limit, 100_000);
}

/// Store that lets another writer sneak in before the next update.
struct InterferingStore {
    inner: InMemoryAccountStore,
    interfere: AtomicBool,
    updates: AtomicUsize,
}

#[async_trait]
impl AccountStore for InterferingStore {
    async fn get(&self, tenant: &TenantId) -> TollgateResult<Option<Account>> {
        self.inner.get(tenant).await
    }

    async fn insert(&self, account: &Account) -> TollgateResult<Account> {
        self.inner.insert(account).await
    }

    async fn update(&self, account: &Account) -> TollgateResult<Account> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        if self.interfere.swap(false, Ordering::SeqCst) {
            if let Some(mut current) = self.inner.get(&account.tenant_id).await? {
                current.token_usage += 1_000;
                self.inner.update(&current).await?;
            }
        }
        self.inner.update(account).await
    }

    fn backend_name(&self) -> &'static str {
        "interfering"
    }
}

#[tokio::test]
async fn test_version_conflict_is_retried_on_fresh_read() {
    let store = Arc::new(InterferingStore {
        inner: InMemoryAccountStore::new(),
        interfere: AtomicBool::new(false),
        updates: AtomicUsize::new(0),
    });
    let config = TollgateConfig::default();
    let gateway = QuotaGateway::builder()
        .store(store.clone())
        .billing(Arc::new(LocalBillingProvider::in_memory(&config)))
        .config(config)
        .build()
        .unwrap();
    let tenant = TenantId::from("shop-1");
    gateway.start_trial(&tenant).await.unwrap();

    store.updates.store(0, Ordering::SeqCst);
    store.interfere.store(true, Ordering::SeqCst);
    let account = gateway.charge_usage(&tenant, 5).await.unwrap();

    assert_eq!(account.token_usage, 1_005);
    assert_eq!(store.updates.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_builder_requires_collaborators() {
    let result = QuotaGateway::builder()
        .store(Arc::new(InMemoryAccountStore::new()))
        .build();
    let err = result.err().unwrap();
    assert!(matches!(err.kind(), TollgateErrorKind::Config(_)));
}

#[tokio::test]
async fn test_paid_tier_sold_under_its_own_name_activates() {
    let mut config = TollgateConfig::default();
    config.tiers.get_mut("basic").unwrap().name = "Basic Plan".to_string();
    config.tiers.get_mut("premium").unwrap().name = "Premium Monthly".to_string();
    config.validate().unwrap();

    let h = harness_with(config);
    let tenant = TenantId::from("shop-1");

    h.gateway.select_tier(&tenant, Plan::Basic).await.unwrap();
    assert_eq!(
        h.billing.active_subscription(&tenant).await.unwrap().as_deref(),
        Some("Basic Plan")
    );

    let account = h.gateway.refresh_account(&tenant).await.unwrap();
    assert_eq!(account.plan, Plan::Basic);
    assert_eq!(account.token_limit, 50_000);

    h.gateway.select_tier(&tenant, Plan::Premium).await.unwrap();
    let account = h.gateway.refresh_account(&tenant).await.unwrap();
    assert_eq!(account.plan, Plan::Premium);
    assert_eq!(account.token_limit, 100_000);
    assert_eq!(account.plan_log.len(), 2);
}
