//! Single-host deployment over the filesystem.
//!
//! ```text
//! {data_dir}/
//! ├── accounts/        one JSON document per tenant
//! ├── journal.jsonl    metered operation outcomes
//! └── billing.json     local subscriptions
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tollgate_billing::LocalBillingProvider;
use tollgate_config::TollgateConfig;
use tollgate_core::{Account, Plan, TenantId};
use tollgate_error::TollgateResult;
use tollgate_quota::QuotaGateway;
use tollgate_storage::{FileSystemAccountStore, FileSystemJournal};
use tracing::instrument;

/// Gateway wired to a filesystem store, journal and local billing.
pub struct LocalDeployment {
    gateway: QuotaGateway,
    billing: Arc<LocalBillingProvider>,
    journal: Arc<FileSystemJournal>,
    data_dir: PathBuf,
}

impl LocalDeployment {
    /// Open (creating if needed) a deployment rooted at `data_dir`.
    ///
    /// # Errors
    ///
    /// Returns error if the directories cannot be created, existing state
    /// cannot be read, or the configuration does not validate.
    #[instrument(skip(data_dir, config), fields(data_dir = %data_dir.as_ref().display()))]
    pub async fn open(data_dir: impl AsRef<Path>, config: TollgateConfig) -> TollgateResult<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        let store = Arc::new(FileSystemAccountStore::new(&data_dir)?);
        let journal = Arc::new(FileSystemJournal::new(&data_dir)?);
        let billing =
            Arc::new(LocalBillingProvider::open(data_dir.join("billing.json"), &config).await?);

        let gateway = QuotaGateway::builder()
            .store(store)
            .billing(billing.clone())
            .journal(journal.clone())
            .config(config)
            .build()?;

        Ok(Self {
            gateway,
            billing,
            journal,
            data_dir,
        })
    }

    /// `$XDG_DATA_HOME/tollgate`, or `./.tollgate` without a data directory.
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .map(|dir| dir.join("tollgate"))
            .unwrap_or_else(|| PathBuf::from(".tollgate"))
    }

    /// The gateway.
    pub fn gateway(&self) -> &QuotaGateway {
        &self.gateway
    }

    /// The local billing provider.
    pub fn billing(&self) -> &LocalBillingProvider {
        &self.billing
    }

    /// The operation journal.
    pub fn journal(&self) -> &FileSystemJournal {
        &self.journal
    }

    /// Root directory of this deployment.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Play the merchant approving `tier`: request it, confirm it with
    /// billing and reconcile.
    #[instrument(skip(self), fields(tenant = %tenant, tier = %tier))]
    pub async fn activate(&self, tenant: &TenantId, tier: Plan) -> TollgateResult<Account> {
        let (_, handle) = self.gateway.select_tier(tenant, tier).await?;
        self.billing.confirm(&handle.external_ref).await?;
        self.gateway.refresh_account(tenant).await
    }

    /// Play the billing side ending every active subscription, then
    /// reconcile.
    #[instrument(skip(self), fields(tenant = %tenant))]
    pub async fn deactivate(&self, tenant: &TenantId) -> TollgateResult<Account> {
        self.billing.expire(tenant).await?;
        self.gateway.refresh_account(tenant).await
    }

    /// Wait for background billing calls, then drop everything.
    pub async fn close(self) {
        self.gateway.shutdown().await;
    }
}
