//! CLI command definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tollgate::Plan;

/// Tollgate - metered-access quota gateway
#[derive(Parser, Debug)]
#[command(name = "tollgate")]
#[command(about = "Per-tenant token quotas, trials and paid tiers", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding accounts, journal and local billing state
    #[arg(long, global = true, env = "TOLLGATE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Configuration file (replaces the layered lookup)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the tenant's up-to-date account
    Status {
        /// Tenant identifier
        tenant: String,
    },

    /// Start the free trial
    Trial {
        /// Tenant identifier
        tenant: String,
    },

    /// Request a paid tier from billing
    Subscribe {
        /// Tenant identifier
        tenant: String,

        /// Tier to buy (basic or premium)
        tier: Plan,
    },

    /// Cancel the paid subscription
    Cancel {
        /// Tenant identifier
        tenant: String,
    },

    /// Run the admission check without consuming anything
    Check {
        /// Tenant identifier
        tenant: String,
    },

    /// Run a simulated metered operation
    Meter {
        /// Tenant identifier
        tenant: String,

        /// Tokens the operation reports
        tokens: u64,

        /// Make the operation fail after admission
        #[arg(long)]
        fail: bool,
    },

    /// Billing side: confirm a paid tier for the tenant
    Activate {
        /// Tenant identifier
        tenant: String,

        /// Tier to activate (basic or premium)
        tier: Plan,
    },

    /// Billing side: end every active subscription of the tenant
    Deactivate {
        /// Tenant identifier
        tenant: String,
    },

    /// Print the metered operation journal
    Journal {
        /// Only show this tenant
        #[arg(long)]
        tenant: Option<String>,
    },
}
