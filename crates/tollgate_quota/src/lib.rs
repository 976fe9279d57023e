//! Quota enforcement and subscription state for Tollgate.
//!
//! The engine components work on an [`Account`](tollgate_core::Account) the
//! caller holds:
//!
//! - [`SubscriptionStateMachine`] - plan transitions and token ceilings
//! - [`DailyResetPolicy`] - once-per-UTC-day replenishment
//! - [`QuotaEnforcer`] - admission decision and usage commit
//!
//! [`QuotaEngine`] bundles the three. [`QuotaGateway`] runs them against an
//! [`AccountStore`](tollgate_interface::AccountStore) under per-tenant
//! [`TenantLocks`] with conditional writes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod enforcer;
mod engine;
mod gateway;
mod locks;
mod reset;
mod subscription;

pub use enforcer::QuotaEnforcer;
pub use engine::QuotaEngine;
pub use gateway::{MeterOutcome, QuotaGateway, QuotaGatewayBuilder};
pub use locks::{TenantGuard, TenantLocks};
pub use reset::DailyResetPolicy;
pub use subscription::SubscriptionStateMachine;
