//! pankha-zoned entry point: CLI, logging, config, then the control service.

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use pankha_zoned::app::cli::Args;
use pankha_zoned::app::logging::{init_tracing, resolve_level};
use pankha_zoned::config::load_config;
use pankha_zoned::daemon::dependencies::{check_dependencies, run_health_check};
use pankha_zoned::daemon::signals::shutdown_channel;
use pankha_zoned::error::exit_code;
use pankha_zoned::hardware::{IpmiTool, SystemSensors};
use pankha_zoned::{ControlError, Service};

#[tokio::main]
async fn main() {
    // clap exits with 0 for --help/--version and 2 for invalid arguments
    let args = Args::parse();

    let env_level = std::env::var("LOG_LEVEL").ok();
    let filter = match resolve_level(args.log_level.as_deref(), env_level.as_deref()) {
        Ok(filter) => filter,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(exit_code::LOGGING);
        }
    };
    if let Err(e) = init_tracing(filter, !args.no_color) {
        eprintln!("{}", e);
        std::process::exit(exit_code::LOGGING);
    }

    std::process::exit(match run(args).await {
        Ok(()) => 0,
        Err(e) => {
            error!("{}", e);
            e.exit_code()
        }
    });
}

async fn run(args: Args) -> Result<(), ControlError> {
    let config = load_config(&args.config).await?;

    if args.check {
        let ok = run_health_check(&args.config, &config);
        return if ok {
            Ok(())
        } else {
            Err(ControlError::Dependency("see the report above".to_string()))
        };
    }

    info!(
        "pankha-zoned v{} starting ({}){}",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::ARCH,
        if args.dry_run { " [DRY RUN]" } else { "" }
    );

    check_dependencies(&config)?;

    let shutdown_rx = shutdown_channel()
        .map_err(|e| ControlError::Dependency(format!("cannot install signal handlers: {}", e)))?;

    let sensors = Arc::new(SystemSensors::new(&config.service)?.with_dry_run(args.dry_run));
    let channel = Arc::new(IpmiTool::new(&config.ipmi, args.dry_run)?);
    let mut service = Service::from_config(&config, sensors, channel, shutdown_rx)?;

    service.run().await?;
    info!("pankha-zoned shutdown complete");
    Ok(())
}
