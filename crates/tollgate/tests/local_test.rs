//! Filesystem-backed deployment, reopened between steps the way the CLI
//! runs one command per process.

use tollgate::{
    Admission, DenyReason, LocalDeployment, Metered, MeteredError, OperationStatus, Plan,
    SubscriptionStatus, TenantId, TollgateConfig, TollgateErrorKind, UsageReport,
};

async fn open(dir: &tempfile::TempDir) -> LocalDeployment {
    LocalDeployment::open(dir.path(), TollgateConfig::default())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_trial_usage_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let tenant = TenantId::from("gid://shopify/Shop/42");

    let local = open(&dir).await;
    local.gateway().start_trial(&tenant).await.unwrap();
    local
        .gateway()
        .meter(&tenant, || async {
            Ok::<_, MeteredError>(Metered::new((), UsageReport::new(100, 150)))
        })
        .await
        .unwrap();
    local.close().await;

    let local = open(&dir).await;
    let account = local.gateway().resolve_account(&tenant).await.unwrap();
    assert_eq!(account.plan, Plan::Trial);
    assert_eq!(account.token_usage, 250);

    let records = local.journal().records().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(*records[0].status(), OperationStatus::Succeeded);
    assert!(dir.path().join("accounts").is_dir());
}

#[tokio::test]
async fn test_activate_and_deactivate_drive_the_plan() {
    let dir = tempfile::tempdir().unwrap();
    let tenant = TenantId::from("shop-1");

    let local = open(&dir).await;
    let (account, _) = local
        .gateway()
        .select_tier(&tenant, Plan::Basic)
        .await
        .unwrap();
    assert_eq!(account.plan, Plan::None);
    let account = local.gateway().refresh_account(&tenant).await.unwrap();
    assert_eq!(account.plan, Plan::None);
    local.close().await;

    let local = open(&dir).await;
    let account = local.activate(&tenant, Plan::Premium).await.unwrap();
    assert_eq!(account.plan, Plan::Premium);
    assert_eq!(account.token_limit, 100_000);
    local.close().await;

    let local = open(&dir).await;
    let account = local.deactivate(&tenant).await.unwrap();
    assert_eq!(account.plan, Plan::Old);
    let (_, admission) = local.gateway().check_and_reserve(&tenant).await.unwrap();
    assert_eq!(admission, Admission::Deny(DenyReason::PlanLapsed));
}

#[tokio::test]
async fn test_cancel_reaches_billing_before_close() {
    let dir = tempfile::tempdir().unwrap();
    let tenant = TenantId::from("shop-1");

    let local = open(&dir).await;
    local.activate(&tenant, Plan::Basic).await.unwrap();
    let account = local.gateway().cancel_subscription(&tenant).await.unwrap();
    assert_eq!(account.subscription_ref, None);
    local.close().await;

    let local = open(&dir).await;
    let recorded = local.billing().subscriptions_for(&tenant).await;
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].status, SubscriptionStatus::Cancelled);

    let account = local.gateway().refresh_account(&tenant).await.unwrap();
    assert_eq!(account.plan, Plan::Old);
    assert_eq!(account.token_limit, 0);
}

#[tokio::test]
async fn test_denied_meter_is_not_journaled() {
    let dir = tempfile::tempdir().unwrap();
    let local = open(&dir).await;

    let err = local
        .gateway()
        .meter(&TenantId::from("shop-1"), || async {
            Ok::<_, MeteredError>(Metered::new((), UsageReport::total(1)))
        })
        .await
        .unwrap_err();
    assert!(matches!(err.kind(), TollgateErrorKind::TokenLimitExceeded(_)));
    assert!(local.journal().records().await.unwrap().is_empty());
}
