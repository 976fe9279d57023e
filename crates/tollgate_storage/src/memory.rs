//! In-memory backends.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, RwLock};
use tollgate_core::{Account, OperationRecord, TenantId};
use tollgate_error::{StoreError, StoreErrorKind, TollgateResult};
use tollgate_interface::{AccountStore, OperationJournal};

/// Account store backed by a process-local map.
///
/// The map lock is only held for the duration of a single lookup or write;
/// per-tenant serialization is the gateway's job.
///
/// # Example
///
/// ```
/// use tollgate_core::{Account, TenantId};
/// use tollgate_interface::AccountStore;
/// use tollgate_storage::InMemoryAccountStore;
/// use chrono::Utc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryAccountStore::new();
/// let account = Account::provision(TenantId::from("shop-1"), Utc::now(), 5);
/// let stored = store.insert(&account).await?;
/// assert_eq!(stored.version, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    accounts: RwLock<HashMap<TenantId, Account>>,
    unavailable: AtomicBool,
}

impl InMemoryAccountStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `Unavailable` until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of stored accounts.
    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }

    /// Whether no account is stored.
    pub async fn is_empty(&self) -> bool {
        self.accounts.read().await.is_empty()
    }

    fn check_available(&self) -> TollgateResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::new(StoreErrorKind::Unavailable(
                "in-memory store switched off".to_string(),
            ))
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    #[tracing::instrument(skip(self), fields(tenant = %tenant))]
    async fn get(&self, tenant: &TenantId) -> TollgateResult<Option<Account>> {
        self.check_available()?;
        Ok(self.accounts.read().await.get(tenant).cloned())
    }

    #[tracing::instrument(skip(self, account), fields(tenant = %account.tenant_id))]
    async fn insert(&self, account: &Account) -> TollgateResult<Account> {
        self.check_available()?;
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&account.tenant_id) {
            return Err(StoreError::new(StoreErrorKind::AlreadyExists(
                account.tenant_id.to_string(),
            ))
            .into());
        }

        let mut stored = account.clone();
        stored.version = 1;
        accounts.insert(stored.tenant_id.clone(), stored.clone());
        tracing::debug!("Inserted account");
        Ok(stored)
    }

    #[tracing::instrument(skip(self, account), fields(tenant = %account.tenant_id, version = account.version))]
    async fn update(&self, account: &Account) -> TollgateResult<Account> {
        self.check_available()?;
        let mut accounts = self.accounts.write().await;
        let Some(current) = accounts.get_mut(&account.tenant_id) else {
            return Err(
                StoreError::new(StoreErrorKind::NotFound(account.tenant_id.to_string())).into(),
            );
        };

        if current.version != account.version {
            tracing::debug!(found = current.version, "Rejected stale write");
            return Err(StoreError::new(StoreErrorKind::VersionConflict {
                tenant: account.tenant_id.to_string(),
                expected: account.version,
                found: current.version,
            })
            .into());
        }

        let mut stored = account.clone();
        stored.version = current.version + 1;
        *current = stored.clone();
        Ok(stored)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Journal that keeps records in memory.
#[derive(Debug, Default)]
pub struct InMemoryJournal {
    records: Mutex<Vec<OperationRecord>>,
}

impl InMemoryJournal {
    /// Create an empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// All records in append order.
    pub async fn records(&self) -> Vec<OperationRecord> {
        self.records.lock().await.clone()
    }

    /// Records belonging to one tenant.
    pub async fn records_for(&self, tenant: &TenantId) -> Vec<OperationRecord> {
        self.records
            .lock()
            .await
            .iter()
            .filter(|r| r.tenant_id() == tenant)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl OperationJournal for InMemoryJournal {
    async fn record(&self, record: OperationRecord) -> TollgateResult<()> {
        self.records.lock().await.push(record);
        Ok(())
    }
}
