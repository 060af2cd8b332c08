//! Config file load and validation.

use std::path::Path;

use tracing::{debug, info};

use crate::config::types::{seconds, DaemonConfig};
use crate::error::{ControlError, Result};
use crate::zone::Zone;

/// Load and validate the configuration file. Any problem is a `ConfigurationError`.
pub async fn load_config(path: &Path) -> Result<DaemonConfig> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ControlError::config(format!("cannot read {}: {}", path.display(), e)))?;

    let config: DaemonConfig = serde_json::from_str(&content)
        .map_err(|e| ControlError::config(format!("{}: {}", path.display(), e)))?;

    validate(&config)?;

    info!("Loaded configuration from: {:?}", path);
    debug!(
        "IPMI: command = {}, fan_mode = {}, timeout = {:.1}s, retries = {}, failure_ceiling = {}",
        config.ipmi.command,
        config.ipmi.fan_mode,
        config.ipmi.command_timeout,
        config.ipmi.retries,
        config.ipmi.failure_ceiling
    );
    Ok(config)
}

pub fn validate(config: &DaemonConfig) -> Result<()> {
    let ipmi = &config.ipmi;
    for (name, value) in [
        ("fan_mode_delay", ipmi.fan_mode_delay),
        ("fan_level_delay", ipmi.fan_level_delay),
        ("retry_backoff", ipmi.retry_backoff),
        ("command_timeout", ipmi.command_timeout),
        ("sensor_timeout", config.service.sensor_timeout),
    ] {
        seconds(name, value)?;
    }
    if ipmi.command_timeout <= 0.0 {
        return Err(ControlError::config(format!("command_timeout must be > 0 ({})", ipmi.command_timeout)));
    }
    if ipmi.retries == 0 {
        return Err(ControlError::config("retries must be at least 1"));
    }
    if ipmi.failure_ceiling == 0 {
        return Err(ControlError::config("failure_ceiling must be at least 1"));
    }

    let service = &config.service;
    if let Some(level) = service.safe_level.filter(|l| *l > 100) {
        return Err(ControlError::config(format!("safe_level {}% is above 100%", level)));
    }
    if service.sensor_timeout <= 0.0 {
        return Err(ControlError::config(format!("sensor_timeout must be > 0 ({})", service.sensor_timeout)));
    }

    // Building a zone runs every per-zone check (curve, polling, sensors, guard)
    for zone in config.zones.iter().filter(|z| z.enabled()) {
        Zone::from_config(zone)?;
    }
    Ok(())
}
