//! Trait definitions for the gateway's external collaborators.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tollgate_core::{Account, OperationRecord, Plan, TenantId};
use tollgate_error::TollgateResult;

/// Persistent keyed storage of one [`Account`] per tenant.
///
/// Implementations own the `version` field: `insert` stores version 1,
/// every successful `update` increments it, and the returned account always
/// carries the stored version.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Look up a tenant's account. `Ok(None)` means the tenant is unknown.
    async fn get(&self, tenant: &TenantId) -> TollgateResult<Option<Account>>;

    /// Insert a new account, failing with `AlreadyExists` if one is stored.
    async fn insert(&self, account: &Account) -> TollgateResult<Account>;

    /// Replace the stored account if its version still equals
    /// `account.version`, failing with `VersionConflict` otherwise.
    async fn update(&self, account: &Account) -> TollgateResult<Account>;

    /// Backend name for logging (e.g., "memory", "filesystem").
    fn backend_name(&self) -> &'static str;
}

/// Subscription created by the billing provider, awaiting confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionHandle {
    /// Opaque billing reference stored as the account's `subscription_ref`
    pub external_ref: String,
    /// Where the merchant approves the charge
    pub confirmation_url: Option<String>,
}

/// External billing platform.
#[async_trait]
pub trait BillingProvider: Send + Sync {
    /// Name of the tenant's active subscription, `None` when nothing is active.
    async fn active_subscription(&self, tenant: &TenantId) -> TollgateResult<Option<String>>;

    /// Start a paid subscription for `tier`.
    async fn create_subscription(
        &self,
        tenant: &TenantId,
        tier: Plan,
    ) -> TollgateResult<SubscriptionHandle>;

    /// Cancel the subscription identified by `external_ref`.
    async fn cancel_subscription(&self, external_ref: &str) -> TollgateResult<()>;
}

/// Audit sink for metered operation outcomes.
#[async_trait]
pub trait OperationJournal: Send + Sync {
    /// Append one record.
    async fn record(&self, record: OperationRecord) -> TollgateResult<()>;
}
