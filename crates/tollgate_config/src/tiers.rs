//! Built-in tier values.
//!
//! These mirror the bundled `tollgate.toml` and back [`PlanTable::default`](crate::PlanTable).

use crate::Tier;

/// Tiers sold out of the box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinTier {
    /// Free trial: 1000 tokens per day
    Trial,
    /// Basic: 50K tokens per day, $9.99 every 30 days
    Basic,
    /// Premium: 100K tokens per day, $18.99 every 30 days
    Premium,
}

impl Tier for BuiltinTier {
    fn token_limit(&self) -> u64 {
        match self {
            BuiltinTier::Trial => 1_000,
            BuiltinTier::Basic => 50_000,
            BuiltinTier::Premium => 100_000,
        }
    }

    fn price_usd(&self) -> Option<f64> {
        match self {
            BuiltinTier::Trial => None,
            BuiltinTier::Basic => Some(9.99),
            BuiltinTier::Premium => Some(18.99),
        }
    }

    fn interval_days(&self) -> Option<u32> {
        match self {
            BuiltinTier::Trial => None,
            BuiltinTier::Basic | BuiltinTier::Premium => Some(30),
        }
    }

    fn name(&self) -> &str {
        match self {
            BuiltinTier::Trial => "trial",
            BuiltinTier::Basic => "basic",
            BuiltinTier::Premium => "premium",
        }
    }
}
