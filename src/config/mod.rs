pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "permit-desk")]
#[command(version)]
#[command(about = "Township permit fee lookup and permit form filling for HVAC jobs")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the TOML configuration file
    #[arg(short, long, global = true, default_value = "permit-desk.toml")]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Resolve the job's township and work out the permit fee
    Fee {
        /// Job address; defaults to the address found in the customer file
        #[arg(long)]
        address: Option<String>,
    },

    /// Check several addresses for whether a permit is required
    Check,

    /// Fill a permit form for the current customer
    Form {
        /// Form id, see the `forms` command
        id: String,

        /// Use this layout file instead of the built-in or configured one
        #[arg(long)]
        layout: Option<PathBuf>,
    },

    /// List available permit forms
    Forms,

    /// List loaded municipality boundaries
    Boundaries,
}
