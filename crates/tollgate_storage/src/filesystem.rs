//! Filesystem-based account storage.
//!
//! Layout:
//!
//! ```text
//! {base_path}/
//! ├── accounts/
//! │   ├── shop-1.json
//! │   └── gid%3A%2F%2Fshopify%2FShop%2F42.json
//! └── journal.jsonl
//! ```
//!
//! Tenant ids are percent-encoded into file names. Writes go to a temp file
//! first and are renamed into place. Conditional updates are serialized per
//! tenant within one process; the store is not meant to be shared by
//! several processes.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, Weak};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tollgate_core::{Account, OperationRecord, TenantId};
use tollgate_error::{StoreError, StoreErrorKind, TollgateResult};
use tollgate_interface::{AccountStore, OperationJournal};

/// Account store keeping one JSON document per tenant.
pub struct FileSystemAccountStore {
    accounts_dir: PathBuf,
    key_locks: StdMutex<HashMap<TenantId, Weak<Mutex<()>>>>,
}

impl FileSystemAccountStore {
    /// Open (and create if needed) a store rooted at `base_path`.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created.
    #[tracing::instrument(skip(base_path))]
    pub fn new(base_path: impl Into<PathBuf>) -> TollgateResult<Self> {
        let accounts_dir = base_path.into().join("accounts");

        std::fs::create_dir_all(&accounts_dir).map_err(|e| {
            StoreError::new(StoreErrorKind::Io(format!(
                "{}: {}",
                accounts_dir.display(),
                e
            )))
        })?;

        tracing::info!(path = %accounts_dir.display(), "Opened filesystem account store");
        Ok(Self {
            accounts_dir,
            key_locks: StdMutex::new(HashMap::new()),
        })
    }

    fn path_for(&self, tenant: &TenantId) -> PathBuf {
        self.accounts_dir
            .join(format!("{}.json", encode_file_name(tenant.as_str())))
    }

    /// Write lock for one tenant file. Idle entries are dropped whenever a
    /// new tenant shows up.
    fn key_lock(&self, tenant: &TenantId) -> Arc<Mutex<()>> {
        let mut locks = self.key_locks.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(lock) = locks.get(tenant).and_then(Weak::upgrade) {
            return lock;
        }

        locks.retain(|_, lock| lock.strong_count() > 0);
        let lock = Arc::new(Mutex::new(()));
        locks.insert(tenant.clone(), Arc::downgrade(&lock));
        lock
    }

    async fn read(&self, path: &Path) -> TollgateResult<Option<Account>> {
        let data = match tokio::fs::read(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StoreError::new(StoreErrorKind::Io(format!(
                    "{}: {}",
                    path.display(),
                    e
                )))
                .into());
            }
        };

        let account = serde_json::from_slice(&data).map_err(|e| {
            StoreError::new(StoreErrorKind::Serialization(format!(
                "{}: {}",
                path.display(),
                e
            )))
        })?;
        Ok(Some(account))
    }

    async fn write(&self, path: &Path, account: &Account) -> TollgateResult<()> {
        let data = serde_json::to_vec_pretty(account)
            .map_err(|e| StoreError::new(StoreErrorKind::Serialization(e.to_string())))?;

        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, &data).await.map_err(|e| {
            StoreError::new(StoreErrorKind::Io(format!(
                "{}: {}",
                temp_path.display(),
                e
            )))
        })?;

        tokio::fs::rename(&temp_path, path).await.map_err(|e| {
            StoreError::new(StoreErrorKind::Io(format!(
                "rename {} to {}: {}",
                temp_path.display(),
                path.display(),
                e
            )))
        })?;
        Ok(())
    }
}

#[async_trait]
impl AccountStore for FileSystemAccountStore {
    #[tracing::instrument(skip(self), fields(tenant = %tenant))]
    async fn get(&self, tenant: &TenantId) -> TollgateResult<Option<Account>> {
        self.read(&self.path_for(tenant)).await
    }

    #[tracing::instrument(skip(self, account), fields(tenant = %account.tenant_id))]
    async fn insert(&self, account: &Account) -> TollgateResult<Account> {
        let lock = self.key_lock(&account.tenant_id);
        let _guard = lock.lock().await;

        let path = self.path_for(&account.tenant_id);
        if self.read(&path).await?.is_some() {
            return Err(StoreError::new(StoreErrorKind::AlreadyExists(
                account.tenant_id.to_string(),
            ))
            .into());
        }

        let mut stored = account.clone();
        stored.version = 1;
        self.write(&path, &stored).await?;
        tracing::debug!(path = %path.display(), "Inserted account");
        Ok(stored)
    }

    #[tracing::instrument(skip(self, account), fields(tenant = %account.tenant_id, version = account.version))]
    async fn update(&self, account: &Account) -> TollgateResult<Account> {
        let lock = self.key_lock(&account.tenant_id);
        let _guard = lock.lock().await;

        let path = self.path_for(&account.tenant_id);
        let Some(current) = self.read(&path).await? else {
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
        self.write(&path, &stored).await?;
        Ok(stored)
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }
}

/// Journal appending one JSON line per record.
pub struct FileSystemJournal {
    path: PathBuf,
    append: Mutex<()>,
}

impl FileSystemJournal {
    /// Journal at `{base_path}/journal.jsonl`.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created.
    pub fn new(base_path: impl Into<PathBuf>) -> TollgateResult<Self> {
        let base_path = base_path.into();
        std::fs::create_dir_all(&base_path).map_err(|e| {
            StoreError::new(StoreErrorKind::Io(format!("{}: {}", base_path.display(), e)))
        })?;
        Ok(Self {
            path: base_path.join("journal.jsonl"),
            append: Mutex::new(()),
        })
    }

    /// Read every record back, oldest first.
    pub async fn records(&self) -> TollgateResult<Vec<OperationRecord>> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StoreError::new(StoreErrorKind::Io(format!(
                    "{}: {}",
                    self.path.display(),
                    e
                )))
                .into());
            }
        };

        data.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line).map_err(|e| {
                    StoreError::new(StoreErrorKind::Serialization(e.to_string())).into()
                })
            })
            .collect()
    }
}

#[async_trait]
impl OperationJournal for FileSystemJournal {
    #[tracing::instrument(skip(self, record), fields(tenant = %record.tenant_id(), status = %record.status()))]
    async fn record(&self, record: OperationRecord) -> TollgateResult<()> {
        let mut line = serde_json::to_string(&record)
            .map_err(|e| StoreError::new(StoreErrorKind::Serialization(e.to_string())))?;
        line.push('\n');

        let _guard = self.append.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| {
                StoreError::new(StoreErrorKind::Io(format!("{}: {}", self.path.display(), e)))
            })?;
        file.write_all(line.as_bytes()).await.map_err(|e| {
            StoreError::new(StoreErrorKind::Io(format!("{}: {}", self.path.display(), e)))
        })?;
        file.flush()
            .await
            .map_err(|e| StoreError::new(StoreErrorKind::Io(e.to_string())))?;
        Ok(())
    }
}

/// Keep `[A-Za-z0-9_-]`, percent-encode every other byte.
fn encode_file_name(id: &str) -> String {
    let mut encoded = String::with_capacity(id.len());
    for byte in id.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' => encoded.push(byte as char),
            other => encoded.push_str(&format!("%{:02X}", other)),
        }
    }
    encoded
}
