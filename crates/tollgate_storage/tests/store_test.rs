//! Conditional-update contract tests for both account store backends.

use chrono::{TimeZone, Utc};
use tollgate_core::{Account, OperationRecord, Plan, TenantId, UsageReport};
use tollgate_error::{StoreErrorKind, TollgateErrorKind};
use tollgate_interface::{AccountStore, OperationJournal};
use tollgate_storage::{FileSystemAccountStore, FileSystemJournal, InMemoryAccountStore, InMemoryJournal};

fn account(tenant: &str) -> Account {
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
    Account::provision(TenantId::from(tenant), now, 5)
}

fn store_kind(err: &tollgate_error::TollgateError) -> StoreErrorKind {
    match err.kind() {
        TollgateErrorKind::AccountLookupFailed(e) => e.kind.clone(),
        other => panic!("expected store error, got {other}"),
    }
}

async fn exercise_contract(store: &dyn AccountStore) {
    let tenant = TenantId::from("gid://shopify/Shop/7");
    assert!(store.get(&tenant).await.unwrap().is_none());

    let inserted = store.insert(&account(tenant.as_str())).await.unwrap();
    assert_eq!(inserted.version, 1);

    let err = store.insert(&account(tenant.as_str())).await.unwrap_err();
    assert!(matches!(store_kind(&err), StoreErrorKind::AlreadyExists(_)));

    let mut first = store.get(&tenant).await.unwrap().unwrap();
    let mut second = first.clone();

    first.token_usage = 10;
    let updated = store.update(&first).await.unwrap();
    assert_eq!(updated.version, 2);

    second.token_usage = 99;
    let err = store.update(&second).await.unwrap_err();
    assert!(err.is_conflict());
    assert!(err.is_retryable());
    match store_kind(&err) {
        StoreErrorKind::VersionConflict { expected, found, .. } => {
            assert_eq!(expected, 1);
            assert_eq!(found, 2);
        }
        other => panic!("unexpected kind {other}"),
    }

    let stored = store.get(&tenant).await.unwrap().unwrap();
    assert_eq!(stored.token_usage, 10);
    assert_eq!(stored.version, 2);

    let err = store.update(&account("missing")).await.unwrap_err();
    assert!(matches!(store_kind(&err), StoreErrorKind::NotFound(_)));
}

#[tokio::test]
async fn test_memory_store_contract() {
    let store = InMemoryAccountStore::new();
    exercise_contract(&store).await;
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_filesystem_store_contract() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileSystemAccountStore::new(dir.path()).unwrap();
    exercise_contract(&store).await;
}

#[tokio::test]
async fn test_filesystem_store_persists_across_instances() {
    let dir = tempfile::tempdir().unwrap();
    let tenant = TenantId::from("shop-9");

    {
        let store = FileSystemAccountStore::new(dir.path()).unwrap();
        let mut stored = store.insert(&account("shop-9")).await.unwrap();
        stored.transition_to(Plan::Trial, stored.created);
        store.update(&stored).await.unwrap();
    }

    let reopened = FileSystemAccountStore::new(dir.path()).unwrap();
    let loaded = reopened.get(&tenant).await.unwrap().unwrap();
    assert_eq!(loaded.plan, Plan::Trial);
    assert_eq!(loaded.plan_log.len(), 1);
    assert_eq!(loaded.version, 2);
}

#[tokio::test]
async fn test_unavailable_memory_store_fails_lookup() {
    let store = InMemoryAccountStore::new();
    store.set_unavailable(true);

    let err = store.get(&TenantId::from("shop-1")).await.unwrap_err();
    assert!(matches!(store_kind(&err), StoreErrorKind::Unavailable(_)));
    assert!(err.deny_reason().is_none());
}

#[tokio::test]
async fn test_journals_keep_records() {
    let tenant = TenantId::from("shop-1");
    let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();

    let memory = InMemoryJournal::new();
    memory
        .record(OperationRecord::succeeded(tenant.clone(), at, UsageReport::total(42)))
        .await
        .unwrap();
    memory
        .record(OperationRecord::failed(TenantId::from("other"), at, "boom"))
        .await
        .unwrap();
    assert_eq!(memory.records().await.len(), 2);
    assert_eq!(memory.records_for(&tenant).await.len(), 1);

    let dir = tempfile::tempdir().unwrap();
    let journal = FileSystemJournal::new(dir.path()).unwrap();
    journal
        .record(OperationRecord::failed(tenant.clone(), at, "timeout"))
        .await
        .unwrap();
    journal
        .record(OperationRecord::succeeded(tenant, at, UsageReport::new(10, 5)))
        .await
        .unwrap();

    let records = journal.records().await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].error().as_deref(), Some("timeout"));
    assert_eq!(records[1].usage().map(|u| u.total_tokens), Some(15));
}
