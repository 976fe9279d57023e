//! Tollgate - metered-access quota gateway
//!
//! Tollgate tracks, per tenant, a quota of consumption units ("tokens"),
//! replenishes it once per UTC day and moves tenants between a free trial,
//! paid tiers and a lapsed plan based on what the billing provider reports.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use tollgate::{LocalDeployment, Metered, MeteredError, TenantId, TollgateConfig, UsageReport};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let local = LocalDeployment::open("./data", TollgateConfig::load()?).await?;
//!     let tenant = TenantId::from("shop-1");
//!
//!     local.gateway().start_trial(&tenant).await?;
//!     let outcome = local
//!         .gateway()
//!         .meter(&tenant, || async {
//!             Ok::<_, MeteredError>(Metered::new((), UsageReport::new(120, 380)))
//!         })
//!         .await?;
//!     println!("{} tokens left", outcome.account.remaining_tokens());
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! Tollgate is organized as a workspace with focused crates:
//!
//! - `tollgate_error` - Error types
//! - `tollgate_core` - Account, plans, audit entries, clock
//! - `tollgate_interface` - Store, billing and journal traits
//! - `tollgate_config` - Tiers and layered configuration
//! - `tollgate_storage` - In-memory and filesystem backends
//! - `tollgate_billing` - Local billing provider
//! - `tollgate_quota` - State machine, reset policy, enforcer, gateway
//!
//! This crate (`tollgate`) re-exports everything for convenience.

pub use tollgate_billing::*;
pub use tollgate_config::*;
pub use tollgate_core::*;
pub use tollgate_error::*;
pub use tollgate_interface::*;
pub use tollgate_quota::*;
pub use tollgate_storage::*;

mod local;
mod telemetry;

pub use local::LocalDeployment;
pub use telemetry::{LogFormat, init_tracing};
