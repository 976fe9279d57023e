//! Plan tiers and configuration for the Tollgate quota gateway.
//!
//! This module turns plans into token ceilings. Ceilings come either from the
//! built-in [`BuiltinTier`] values or from layered TOML configuration loaded
//! through [`TollgateConfig::load`].
//!
//! ```ignore
//! use tollgate_config::{TollgateConfig, Tier};
//!
//! let config = TollgateConfig::load()?;
//! let table = config.plan_table();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod limits;
mod tier;
mod tiers;

pub use config::{GatewayConfig, RetryConfig, TierConfig, TollgateConfig, TrialConfig};
pub use limits::PlanTable;
pub use tier::Tier;
pub use tiers::BuiltinTier;
