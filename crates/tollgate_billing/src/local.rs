//! Process-local billing provider.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tollgate_config::{TierConfig, TollgateConfig};
use tollgate_core::{Clock, Plan, SystemClock, TenantId};
use tollgate_error::{BillingError, BillingErrorKind, TollgateResult};
use tollgate_interface::{BillingProvider, SubscriptionHandle};
use uuid::Uuid;

/// Lifecycle of a local subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Created, waiting for merchant confirmation
    Pending,
    /// Confirmed and billing
    Active,
    /// Cancelled
    Cancelled,
}

/// Subscription as recorded by the local provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalSubscription {
    /// Reference handed back to the gateway
    pub external_ref: String,
    /// Subscribing tenant
    pub tenant_id: TenantId,
    /// Subscription name, matches a paid plan
    pub name: String,
    /// Current status
    pub status: SubscriptionStatus,
    /// Recurring price in USD
    pub price_usd: Option<f64>,
    /// Billing interval in days
    pub interval_days: Option<u32>,
    /// When the subscription was created
    pub created: DateTime<Utc>,
}

/// Billing provider that keeps subscriptions locally.
///
/// Subscriptions start `Pending` and only count as active once confirmed,
/// the way a merchant has to approve a charge on a real commerce platform.
/// Use [`with_auto_activate`](Self::with_auto_activate) to skip that step.
///
/// # Example
///
/// ```
/// use tollgate_billing::LocalBillingProvider;
/// use tollgate_config::TollgateConfig;
/// use tollgate_core::{Plan, TenantId};
/// use tollgate_interface::BillingProvider;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let billing = LocalBillingProvider::in_memory(&TollgateConfig::default());
/// let tenant = TenantId::from("shop-1");
///
/// let handle = billing.create_subscription(&tenant, Plan::Basic).await?;
/// assert_eq!(billing.active_subscription(&tenant).await?, None);
///
/// billing.confirm(&handle.external_ref).await?;
/// assert_eq!(billing.active_subscription(&tenant).await?.as_deref(), Some("basic"));
/// # Ok(())
/// # }
/// ```
pub struct LocalBillingProvider {
    subscriptions: Mutex<Vec<LocalSubscription>>,
    tiers: HashMap<Plan, TierConfig>,
    path: Option<PathBuf>,
    auto_activate: bool,
    unavailable: AtomicBool,
    clock: Arc<dyn Clock>,
}

impl LocalBillingProvider {
    /// Provider selling the paid tiers in `config`, nothing persisted.
    pub fn in_memory(config: &TollgateConfig) -> Self {
        Self {
            subscriptions: Mutex::new(Vec::new()),
            tiers: paid_tiers(config),
            path: None,
            auto_activate: false,
            unavailable: AtomicBool::new(false),
            clock: Arc::new(SystemClock),
        }
    }

    /// Provider mirrored to the JSON file at `path`, loading what is there.
    ///
    /// # Errors
    ///
    /// Returns error if an existing file cannot be read or parsed.
    #[tracing::instrument(skip(path, config), fields(path = %path.as_ref().display()))]
    pub async fn open(
        path: impl AsRef<std::path::Path>,
        config: &TollgateConfig,
    ) -> TollgateResult<Self> {
        let path = path.as_ref().to_path_buf();
        let subscriptions = match tokio::fs::read(&path).await {
            Ok(data) => serde_json::from_slice(&data).map_err(|e| {
                BillingError::new(BillingErrorKind::Unavailable(format!(
                    "{}: {}",
                    path.display(),
                    e
                )))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(BillingError::new(BillingErrorKind::Unavailable(format!(
                    "{}: {}",
                    path.display(),
                    e
                )))
                .into());
            }
        };

        tracing::debug!(count = subscriptions.len(), "Loaded local subscriptions");
        Ok(Self {
            subscriptions: Mutex::new(subscriptions),
            tiers: paid_tiers(config),
            path: Some(path),
            auto_activate: false,
            unavailable: AtomicBool::new(false),
            clock: Arc::new(SystemClock),
        })
    }

    /// Activate subscriptions on creation instead of waiting for `confirm`.
    pub fn with_auto_activate(mut self, auto_activate: bool) -> Self {
        self.auto_activate = auto_activate;
        self
    }

    /// Stamp new subscriptions with `clock` instead of the wall clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Make every subsequent call fail with `Unavailable` until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Merchant approved the charge: `Pending` becomes `Active`.
    pub async fn confirm(&self, external_ref: &str) -> TollgateResult<()> {
        self.check_available()?;
        let mut subscriptions = self.subscriptions.lock().await;
        let subscription = subscriptions
            .iter_mut()
            .find(|s| s.external_ref == external_ref && s.status == SubscriptionStatus::Pending)
            .ok_or_else(|| {
                BillingError::new(BillingErrorKind::Query(format!(
                    "no pending subscription {}",
                    external_ref
                )))
            })?;
        subscription.status = SubscriptionStatus::Active;
        tracing::info!(external_ref, tenant = %subscription.tenant_id, "Subscription confirmed");
        self.persist(&subscriptions).await
    }

    /// Subscription lapsed on the billing side: every active one for the
    /// tenant is cancelled. Returns how many were ended.
    pub async fn expire(&self, tenant: &TenantId) -> TollgateResult<usize> {
        self.check_available()?;
        let mut subscriptions = self.subscriptions.lock().await;
        let mut ended = 0;
        for subscription in subscriptions
            .iter_mut()
            .filter(|s| &s.tenant_id == tenant && s.status == SubscriptionStatus::Active)
        {
            subscription.status = SubscriptionStatus::Cancelled;
            ended += 1;
        }
        tracing::info!(tenant = %tenant, ended, "Expired subscriptions");
        self.persist(&subscriptions).await?;
        Ok(ended)
    }

    /// Every subscription recorded for a tenant, oldest first.
    pub async fn subscriptions_for(&self, tenant: &TenantId) -> Vec<LocalSubscription> {
        self.subscriptions
            .lock()
            .await
            .iter()
            .filter(|s| &s.tenant_id == tenant)
            .cloned()
            .collect()
    }

    fn check_available(&self) -> TollgateResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BillingError::new(BillingErrorKind::Unavailable(
                "local billing switched off".to_string(),
            ))
            .into());
        }
        Ok(())
    }

    async fn persist(&self, subscriptions: &[LocalSubscription]) -> TollgateResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let data = serde_json::to_vec_pretty(subscriptions)
            .map_err(|e| BillingError::new(BillingErrorKind::Unavailable(e.to_string())))?;
        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, &data).await.map_err(|e| {
            BillingError::new(BillingErrorKind::Unavailable(format!(
                "{}: {}",
                temp_path.display(),
                e
            )))
        })?;
        tokio::fs::rename(&temp_path, path).await.map_err(|e| {
            BillingError::new(BillingErrorKind::Unavailable(format!(
                "{}: {}",
                path.display(),
                e
            )))
        })?;
        Ok(())
    }
}

fn paid_tiers(config: &TollgateConfig) -> HashMap<Plan, TierConfig> {
    [Plan::Basic, Plan::Premium]
        .into_iter()
        .filter_map(|plan| config.tier_for(plan).map(|tier| (plan, tier.clone())))
        .collect()
}

#[async_trait]
impl BillingProvider for LocalBillingProvider {
    #[tracing::instrument(skip(self), fields(tenant = %tenant))]
    async fn active_subscription(&self, tenant: &TenantId) -> TollgateResult<Option<String>> {
        self.check_available()?;
        let subscriptions = self.subscriptions.lock().await;
        Ok(subscriptions
            .iter()
            .rev()
            .find(|s| &s.tenant_id == tenant && s.status == SubscriptionStatus::Active)
            .map(|s| s.name.clone()))
    }

    #[tracing::instrument(skip(self), fields(tenant = %tenant, tier = %tier))]
    async fn create_subscription(
        &self,
        tenant: &TenantId,
        tier: Plan,
    ) -> TollgateResult<SubscriptionHandle> {
        self.check_available()?;
        let config = self
            .tiers
            .get(&tier)
            .ok_or_else(|| BillingError::new(BillingErrorKind::UnknownTier(tier.to_string())))?;

        let external_ref = format!("local-sub-{}", Uuid::new_v4());
        let subscription = LocalSubscription {
            external_ref: external_ref.clone(),
            tenant_id: tenant.clone(),
            name: config.name.clone(),
            status: if self.auto_activate {
                SubscriptionStatus::Active
            } else {
                SubscriptionStatus::Pending
            },
            price_usd: config.price_usd,
            interval_days: config.interval_days,
            created: self.clock.now(),
        };

        let mut subscriptions = self.subscriptions.lock().await;
        subscriptions.push(subscription);
        self.persist(&subscriptions).await?;

        tracing::info!(external_ref = %external_ref, "Created subscription");
        Ok(SubscriptionHandle {
            confirmation_url: Some(format!("tollgate://billing/confirm/{}", external_ref)),
            external_ref,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn cancel_subscription(&self, external_ref: &str) -> TollgateResult<()> {
        self.check_available()?;
        let mut subscriptions = self.subscriptions.lock().await;
        let subscription = subscriptions
            .iter_mut()
            .find(|s| s.external_ref == external_ref)
            .ok_or_else(|| {
                BillingError::new(BillingErrorKind::Cancel(format!(
                    "unknown subscription {}",
                    external_ref
                )))
            })?;
        subscription.status = SubscriptionStatus::Cancelled;
        tracing::info!(tenant = %subscription.tenant_id, "Cancelled subscription");
        self.persist(&subscriptions).await
    }
}
