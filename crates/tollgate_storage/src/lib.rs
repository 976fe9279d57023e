//! Account stores and operation journals for Tollgate.
//!
//! Two backends implement [`AccountStore`](tollgate_interface::AccountStore):
//!
//! - [`InMemoryAccountStore`] - process-local map, used by tests and embedders
//! - [`FileSystemAccountStore`] - one JSON document per tenant, written atomically
//!
//! Both honour the conditional-update contract: a write carrying a stale
//! `version` is rejected with `StoreErrorKind::VersionConflict`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod filesystem;
mod memory;

pub use filesystem::{FileSystemAccountStore, FileSystemJournal};
pub use memory::{InMemoryAccountStore, InMemoryJournal};
