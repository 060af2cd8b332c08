//! Command-line argument definitions (clap).

use std::path::PathBuf;

use clap::Parser;

use crate::config::types::DEFAULT_CONFIG_PATH;

#[derive(Parser, Debug)]
#[command(name = "pankha-zoned")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Pankha zoned fan control daemon for Supermicro IPMI boards", long_about = None)]
pub struct Args {
    // === Daemon ===
    /// Configuration file
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH, help_heading = "Daemon")]
    pub config: PathBuf,

    /// Log fan commands instead of sending them to the BMC
    #[arg(long = "dry-run", help_heading = "Daemon")]
    pub dry_run: bool,

    // === Logging ===
    /// Set log level (TRACE, DEBUG, INFO, WARN, ERROR, CRITICAL)
    #[arg(short = 'l', long = "log-level", help_heading = "Logging")]
    pub log_level: Option<String>,

    /// Plain log output without ANSI colours (journald)
    #[arg(long = "no-color", help_heading = "Logging")]
    pub no_color: bool,

    // === Checks ===
    /// Check runtime dependencies (ipmitool, kernel modules, smartctl) and exit
    #[arg(long, help_heading = "Checks")]
    pub check: bool,
}
