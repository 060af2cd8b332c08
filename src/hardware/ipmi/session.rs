//! IPMI session: the single owner of the management channel.
//!
//! Wraps every command in a timeout and a bounded retry loop, keeps the
//! consecutive-failure counter and escalates to a fatal error once the
//! counter reaches the configured ceiling.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::config::types::{seconds, IpmiSettings};
use crate::error::{ControlError, Result};
use crate::hardware::types::FanMode;
use crate::hardware::ManagementChannel;

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub command_timeout: Duration,
    /// Attempts per command, including the first
    pub attempts: u32,
    pub retry_backoff: Duration,
    pub failure_ceiling: u32,
    pub fan_mode_delay: Duration,
    pub fan_level_delay: Duration,
}

impl TryFrom<&IpmiSettings> for SessionSettings {
    type Error = ControlError;

    fn try_from(s: &IpmiSettings) -> Result<Self> {
        Ok(Self {
            command_timeout: seconds("command_timeout", s.command_timeout)?,
            attempts: s.retries.max(1),
            retry_backoff: seconds("retry_backoff", s.retry_backoff)?,
            failure_ceiling: s.failure_ceiling.max(1),
            fan_mode_delay: seconds("fan_mode_delay", s.fan_mode_delay)?,
            fan_level_delay: seconds("fan_level_delay", s.fan_level_delay)?,
        })
    }
}

pub struct Ipmi {
    channel: Arc<dyn ManagementChannel>,
    settings: SessionSettings,
    consecutive_failures: u32,
    last_success: Option<Instant>,
    open: bool,
}

impl Ipmi {
    pub fn new(channel: Arc<dyn ManagementChannel>, settings: SessionSettings) -> Self {
        Self {
            channel,
            settings,
            consecutive_failures: 0,
            last_success: None,
            open: false,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn last_success(&self) -> Option<Instant> {
        self.last_success
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Open the session: read the board fan mode and switch to `mode` if needed.
    ///
    /// Any failure here means the daemon has no fan control authority.
    pub async fn open(&mut self, mode: FanMode) -> Result<()> {
        let channel = Arc::clone(&self.channel);

        let current = retry(&self.settings, "get fan mode", || channel.get_fan_mode())
            .await
            .map_err(|e| ControlError::ManagementInit(e.to_string()))?;
        debug!("Old IPMI fan mode = {}", current);

        if current != mode {
            retry(&self.settings, "set fan mode", || channel.set_fan_mode(mode))
                .await
                .map_err(|e| ControlError::ManagementInit(e.to_string()))?;
            info!("IPMI fan mode changed: {} -> {}", current, mode);
            // BMC needs time to settle in the new mode
            tokio::time::sleep(self.settings.fan_mode_delay).await;
        }

        self.open = true;
        self.record_success();
        Ok(())
    }

    /// Set the fan level of one IPMI zone.
    ///
    /// On failure the physical level is unchanged. Returns
    /// [`ControlError::ManagementChannelFatal`] once the failure counter reaches the ceiling.
    pub async fn set_level(&mut self, zone: u8, level: u8) -> Result<()> {
        if level > 100 {
            return Err(ControlError::InvalidInput(format!("fan level {}% is above 100%", level)));
        }
        let channel = Arc::clone(&self.channel);
        let outcome = retry(&self.settings, "set fan level", || channel.set_fan_level(zone, level)).await;
        self.settle(outcome)?;
        tokio::time::sleep(self.settings.fan_level_delay).await;
        Ok(())
    }

    pub async fn get_level(&mut self, zone: u8) -> Result<u8> {
        let channel = Arc::clone(&self.channel);
        let outcome = retry(&self.settings, "get fan level", || channel.get_fan_level(zone)).await;
        self.settle(outcome)
    }

    /// Single attempt with no retry and no failure accounting, for the shutdown path.
    pub async fn set_level_best_effort(&self, zone: u8, level: u8) -> bool {
        match tokio::time::timeout(self.settings.command_timeout, self.channel.set_fan_level(zone, level)).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!("Final fan level {}% for IPMI zone {} not applied: {}", level, zone, e);
                false
            }
            Err(_) => {
                warn!("Final fan level {}% for IPMI zone {} timed out", level, zone);
                false
            }
        }
    }

    pub fn close(&mut self) {
        if self.open {
            self.open = false;
            debug!("IPMI session closed");
        }
    }

    fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.last_success = Some(Instant::now());
    }

    fn settle<T>(&mut self, outcome: Result<T>) -> Result<T> {
        match outcome {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                if self.consecutive_failures >= self.settings.failure_ceiling {
                    error!(
                        "IPMI failure ceiling reached ({}/{}): {}",
                        self.consecutive_failures, self.settings.failure_ceiling, e
                    );
                    return Err(ControlError::ManagementChannelFatal {
                        failures: self.consecutive_failures,
                        ceiling: self.settings.failure_ceiling,
                    });
                }
                warn!(
                    "{} (consecutive failures: {}/{})",
                    e, self.consecutive_failures, self.settings.failure_ceiling
                );
                Err(e)
            }
        }
    }
}

/// Run `op` up to `settings.attempts` times, each bounded by the command timeout.
async fn retry<T, F, Fut>(settings: &SessionSettings, what: &str, op: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut reason = String::new();

    for attempt in 1..=settings.attempts {
        match tokio::time::timeout(settings.command_timeout, op()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => reason = format!("{}: {}", what, e),
            Err(_) => {
                reason = format!("{}: timed out after {:.1}s", what, settings.command_timeout.as_secs_f64())
            }
        }

        if attempt < settings.attempts {
            debug!("IPMI {} attempt {}/{} failed, retrying", what, attempt, settings.attempts);
            tokio::time::sleep(settings.retry_backoff * attempt).await;
        }
    }

    Err(ControlError::ManagementCommand {
        attempts: settings.attempts,
        reason,
    })
}
