pub mod cli;
pub mod toml_config;

pub use toml_config::{MatcherConfig, ProcessorSourceKind};

#[cfg(feature = "cli")]
use crate::domain::model::Confidence;
#[cfg(feature = "cli")]
use clap::Parser;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "ynab-paypal-matcher")]
#[command(about = "Match YNAB PayPal transactions with PayPal merchant details")]
pub struct CliConfig {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "matcher.toml")]
    pub config: String,

    /// Number of days to look back for transactions
    #[arg(long, default_value = "90")]
    pub days: u32,

    /// Use the PayPal API instead of a CSV export (requires a Business account)
    #[arg(long)]
    pub use_api: bool,

    /// Path to the PayPal CSV export (overrides the config file)
    #[arg(long)]
    pub csv: Option<String>,

    /// Save the report to this file instead of printing it
    #[arg(long)]
    pub output: Option<String>,

    /// Update YNAB memos with the matched merchant names
    #[arg(long)]
    pub update: bool,

    /// Minimum confidence level for updates
    #[arg(long, value_enum, default_value = "high")]
    pub confidence: Confidence,

    /// Apply updates without asking for confirmation
    #[arg(long)]
    pub yes: bool,

    /// Test API connections and exit
    #[arg(long)]
    pub test: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// Command-line flags win over the file.
    pub fn apply_overrides(&self, config: &mut MatcherConfig) {
        if self.use_api {
            config.paypal.source = ProcessorSourceKind::Api;
        }
        if let Some(csv) = &self.csv {
            config.paypal.csv_path = csv.clone();
            config.paypal.source = ProcessorSourceKind::Csv;
        }
    }
}
