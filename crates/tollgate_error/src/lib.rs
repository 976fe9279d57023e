//! Error types for the Tollgate quota gateway.
//!
//! Every concern follows the same `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum names the specific condition
//! - `*Error` struct wraps the kind with source location tracking
//! - constructors use `#[track_caller]` for automatic location capture
//!
//! All of them fold into [`TollgateError`], so callers can keep a quota
//! denial ([`TollgateErrorKind::TokenLimitExceeded`]) apart from
//! infrastructure faults such as a failed account lookup.
//!
//! # Examples
//!
//! ```
//! use tollgate_error::{StoreError, StoreErrorKind, TollgateResult};
//!
//! fn load() -> TollgateResult<u64> {
//!     Err(StoreError::new(StoreErrorKind::Unavailable("connection reset".into())))?
//! }
//!
//! let err = load().unwrap_err();
//! assert!(err.is_retryable());
//! assert!(err.deny_reason().is_none());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod billing;
mod config;
mod error;
mod json;
mod metered;
mod plan;
mod quota;
mod store;

pub use billing::{BillingError, BillingErrorKind};
pub use config::ConfigError;
pub use error::{TollgateError, TollgateErrorKind, TollgateResult};
pub use json::JsonError;
pub use metered::MeteredError;
pub use plan::{PlanError, PlanErrorKind};
pub use quota::{DenyReason, QuotaError};
pub use store::{StoreError, StoreErrorKind};
