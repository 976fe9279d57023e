//! Core data types for the Tollgate quota gateway.
//!
//! This crate provides the records shared by every other Tollgate crate:
//! the per-tenant [`Account`], its [`Plan`], the audit trail entries, the
//! admission decision and the clock abstraction used for daily resets.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod account;
mod admission;
mod clock;
mod plan;
mod usage;

pub use account::{Account, DEFAULT_TRIAL_DAYS, PlanLogEntry, ResetLogEntry, TenantId};
pub use admission::Admission;
pub use clock::{Clock, ManualClock, SystemClock};
pub use plan::Plan;
pub use usage::{Metered, OperationRecord, OperationStatus, UsageReport};
