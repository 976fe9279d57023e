//! Configuration structures for plans, retries and gateway behavior.
//!
//! The configuration system supports:
//! - Bundled defaults (include_str! from tollgate.toml)
//! - User overrides (./tollgate.toml or ~/.config/tollgate/tollgate.toml)
//! - Environment overrides (`TOLLGATE__RETRY__MAX_ATTEMPTS=8`)
//!
//! Later sources take precedence over earlier ones.

use crate::{BuiltinTier, PlanTable, Tier};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tollgate_core::{DEFAULT_TRIAL_DAYS, Plan};
use tollgate_error::{ConfigError, TollgateError, TollgateResult};
use tracing::{debug, instrument};

/// Configuration for a paid tier.
///
/// ```toml
/// [tiers.basic]
/// name = "basic"
/// token_limit = 50_000
/// price_usd = 9.99
/// interval_days = 30
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TierConfig {
    /// Subscription name used with the billing provider
    pub name: String,

    /// Daily token ceiling
    pub token_limit: u64,

    /// Recurring price in USD
    #[serde(default)]
    pub price_usd: Option<f64>,

    /// Billing interval in days
    #[serde(default)]
    pub interval_days: Option<u32>,
}

impl Tier for TierConfig {
    fn token_limit(&self) -> u64 {
        self.token_limit
    }

    fn price_usd(&self) -> Option<f64> {
        self.price_usd
    }

    fn interval_days(&self) -> Option<u32> {
        self.interval_days
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl TierConfig {
    /// Snapshot any tier into a config entry.
    pub fn from_tier(tier: &impl Tier) -> Self {
        Self {
            name: tier.name().to_string(),
            token_limit: tier.token_limit(),
            price_usd: tier.price_usd(),
            interval_days: tier.interval_days(),
        }
    }
}

/// Free trial settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct TrialConfig {
    /// Trial days granted to a new tenant
    #[serde(default = "default_trial_days")]
    pub days: u32,

    /// Daily token ceiling while on trial
    #[serde(default = "default_trial_limit")]
    pub token_limit: u64,
}

fn default_trial_days() -> u32 {
    DEFAULT_TRIAL_DAYS
}

fn default_trial_limit() -> u64 {
    BuiltinTier::Trial.token_limit()
}

impl Default for TrialConfig {
    fn default() -> Self {
        Self {
            days: default_trial_days(),
            token_limit: default_trial_limit(),
        }
    }
}

/// Backoff for conditional writes that lost a version race.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Total attempts including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// First backoff delay in milliseconds
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Cap for a single backoff delay in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> usize {
    5
}

fn default_base_delay_ms() -> u64 {
    10
}

fn default_max_delay_ms() -> u64 {
    250
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryConfig {
    /// Cap for a single backoff delay.
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// Gateway behavior switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct GatewayConfig {
    /// Query billing and reconcile the plan before every metered operation
    #[serde(default = "default_reconcile_on_meter")]
    pub reconcile_on_meter: bool,
}

fn default_reconcile_on_meter() -> bool {
    true
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            reconcile_on_meter: default_reconcile_on_meter(),
        }
    }
}

/// Top-level Tollgate configuration.
///
/// # Example
///
/// ```no_run
/// use tollgate_config::TollgateConfig;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = TollgateConfig::load()?;
/// let basic = config.tier("basic").unwrap();
/// println!("basic allows {} tokens per day", basic.token_limit);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TollgateConfig {
    /// Free trial settings
    #[serde(default)]
    pub trial: TrialConfig,

    /// Paid tiers by name
    #[serde(default = "default_tiers")]
    pub tiers: HashMap<String, TierConfig>,

    /// Version-conflict retry policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Gateway switches
    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn default_tiers() -> HashMap<String, TierConfig> {
    [BuiltinTier::Basic, BuiltinTier::Premium]
        .iter()
        .map(|tier| (tier.name().to_string(), TierConfig::from_tier(tier)))
        .collect()
}

impl Default for TollgateConfig {
    fn default() -> Self {
        Self {
            trial: TrialConfig::default(),
            tiers: default_tiers(),
            retry: RetryConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

impl TollgateConfig {
    /// Load configuration from a specific file.
    ///
    /// Sections missing from the file fall back to the built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<std::path::Path>) -> TollgateResult<Self> {
        debug!("Loading configuration from file");

        let config: Self = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .map_err(|e| {
                TollgateError::from(ConfigError::new(format!(
                    "Failed to read configuration from {}: {}",
                    path.as_ref().display(),
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                TollgateError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration with precedence: environment > current dir > home dir > bundled default.
    ///
    /// User config files are optional and silently skipped if not found.
    #[instrument]
    pub fn load() -> TollgateResult<Self> {
        debug!("Loading configuration with precedence: env > current dir > home dir > bundled defaults");

        const DEFAULT_CONFIG: &str = include_str!("../../../tollgate.toml");

        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(config_dir) = dirs::config_dir() {
            let home_config = config_dir.join("tollgate/tollgate.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder
            .add_source(File::with_name("tollgate").required(false))
            .add_source(
                Environment::with_prefix("TOLLGATE")
                    .separator("__")
                    .try_parsing(true),
            );

        let config: Self = builder
            .build()
            .map_err(|e| {
                TollgateError::from(ConfigError::new(format!(
                    "Failed to build configuration: {}",
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                TollgateError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns an error if the trial grants days without tokens, a paid tier
    /// is missing, has no tokens or a billing name that does not resolve
    /// back to it, or retries are disabled entirely.
    pub fn validate(&self) -> TollgateResult<()> {
        if self.trial.days > 0 && self.trial.token_limit == 0 {
            return Err(ConfigError::new(
                "trial.token_limit must be positive when trial.days > 0",
            )
            .into());
        }

        let table = self.plan_table();
        for plan in [Plan::Basic, Plan::Premium] {
            let tier = self.tier_for(plan).ok_or_else(|| {
                ConfigError::new(format!("tiers.{} is not configured", plan))
            })?;
            if tier.token_limit == 0 {
                return Err(ConfigError::new(format!(
                    "tiers.{}.token_limit must be positive",
                    plan
                ))
                .into());
            }
            if tier.name.trim().is_empty() {
                return Err(ConfigError::new(format!("tiers.{}.name must not be empty", plan)).into());
            }
            // Billing reports this name; it has to lead back to the same plan.
            if table.plan_for_subscription(&tier.name) != Some(plan) {
                return Err(ConfigError::new(format!(
                    "tiers.{}.name {:?} collides with another paid tier",
                    plan, tier.name
                ))
                .into());
            }
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::new("retry.max_attempts must be at least 1").into());
        }

        Ok(())
    }

    /// Look up a tier by its configuration key.
    pub fn tier(&self, name: &str) -> Option<&TierConfig> {
        self.tiers.get(name)
    }

    /// Tier configuration backing a paid plan.
    pub fn tier_for(&self, plan: Plan) -> Option<&TierConfig> {
        let key: &str = plan.as_ref();
        self.tiers.get(key)
    }

    /// Plan ceilings derived from this configuration.
    pub fn plan_table(&self) -> PlanTable {
        let defaults = PlanTable::default();
        let limit = |plan: Plan| {
            self.tier_for(plan)
                .map(|t| t.token_limit)
                .unwrap_or_else(|| defaults.limit_for(plan, 0))
        };
        let name = |plan: Plan| {
            self.tier_for(plan)
                .map(|t| t.name.clone())
                .unwrap_or_else(|| plan.to_string())
        };
        PlanTable::new(self.trial.token_limit, limit(Plan::Basic), limit(Plan::Premium))
            .with_subscription_names(name(Plan::Basic), name(Plan::Premium))
    }
}
