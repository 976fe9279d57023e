//! Per-tenant critical sections.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, Weak};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tollgate_core::TenantId;

/// Lazily created async mutex per tenant.
///
/// Entries are held weakly: a tenant's mutex lives as long as someone holds
/// or waits for it, and dead entries are pruned when new tenants arrive.
#[derive(Debug, Default)]
pub struct TenantLocks {
    locks: StdMutex<HashMap<TenantId, Weak<Mutex<()>>>>,
}

/// Exclusive access to one tenant, released on drop.
#[derive(Debug)]
pub struct TenantGuard {
    tenant: TenantId,
    _guard: OwnedMutexGuard<()>,
}

impl TenantGuard {
    /// Tenant this guard protects.
    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }
}

impl TenantLocks {
    /// Empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `tenant`.
    pub async fn lock(&self, tenant: &TenantId) -> TenantGuard {
        let mutex = self.mutex_for(tenant);
        TenantGuard {
            tenant: tenant.clone(),
            _guard: mutex.lock_owned().await,
        }
    }

    /// Tenants whose mutex is currently alive.
    pub fn active(&self) -> usize {
        let locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.values().filter(|lock| lock.strong_count() > 0).count()
    }

    fn mutex_for(&self, tenant: &TenantId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(mutex) = locks.get(tenant).and_then(Weak::upgrade) {
            return mutex;
        }

        locks.retain(|_, lock| lock.strong_count() > 0);
        let mutex = Arc::new(Mutex::new(()));
        locks.insert(tenant.clone(), Arc::downgrade(&mutex));
        mutex
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_tenant_is_exclusive() {
        let locks = Arc::new(TenantLocks::new());
        let tenant = TenantId::from("shop-1");

        let guard = locks.lock(&tenant).await;
        let waiter = {
            let locks = locks.clone();
            let tenant = tenant.clone();
            tokio::spawn(async move { locks.lock(&tenant).await.tenant().clone() })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        assert_eq!(waiter.await.unwrap(), tenant);
    }

    #[tokio::test]
    async fn test_different_tenants_do_not_contend() {
        let locks = TenantLocks::new();
        let _a = locks.lock(&TenantId::from("shop-a")).await;
        let b = tokio::time::timeout(Duration::from_millis(50), locks.lock(&TenantId::from("shop-b")))
            .await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_released_entries_are_pruned() {
        let locks = TenantLocks::new();
        drop(locks.lock(&TenantId::from("shop-a")).await);
        assert_eq!(locks.active(), 0);

        let _b = locks.lock(&TenantId::from("shop-b")).await;
        assert_eq!(locks.active(), 1);
        assert_eq!(locks.locks.lock().unwrap().len(), 1);
    }
}
