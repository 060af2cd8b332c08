//! HD zone: one fan decision for a whole drive cage, with a standby guard per device.
//!
//! Each cycle a device is read only if its guard allows it, based on the
//! state confirmed by earlier cycles; the power-state query itself never
//! wakes the drive. A suppressed device contributes its last known
//! temperature. A device that was never read is left out, and a cage with
//! nothing to read runs at the bottom of its curve.
//!
//! With a standby limit the array sleeps together: once that many drives
//! are confirmed in standby the remaining ones are spun down.

use std::collections::HashMap;

use tokio::time::Instant;
use tracing::{info, warn};

use super::ZoneCore;
use crate::control::{GuardState, Observation, StandbyGuard, MIN_CONFIRMATIONS};
use crate::error::{ControlError, Result};
use crate::hardware::SensorSource;

#[derive(Debug)]
pub struct HdZone {
    core: ZoneCore,
    devices: Vec<String>,
    /// Present only when the standby guard is enabled
    guards: Option<HashMap<String, StandbyGuard>>,
    last_temps: HashMap<String, f64>,
    standby_limit: Option<usize>,
    array_standby: bool,
    /// Time of the last array ACTIVE/STANDBY transition
    array_since: Instant,
}

impl HdZone {
    /// `confirmations` enables the standby guard with that threshold.
    pub fn new(core: ZoneCore, devices: Vec<String>, confirmations: Option<u32>) -> Result<Self> {
        if devices.is_empty() {
            return Err(ControlError::config(format!("{}: no devices configured", core.name())));
        }
        if let Some(n) = confirmations.filter(|n| *n < MIN_CONFIRMATIONS) {
            return Err(ControlError::config(format!(
                "{}: standby guard confirmations must be at least {}, got {}",
                core.name(),
                MIN_CONFIRMATIONS,
                n
            )));
        }
        let guards = confirmations.map(|n| {
            devices
                .iter()
                .map(|d| (d.clone(), StandbyGuard::new(d.clone(), n)))
                .collect()
        });
        Ok(Self {
            core,
            devices,
            guards,
            last_temps: HashMap::new(),
            standby_limit: None,
            array_standby: false,
            array_since: Instant::now(),
        })
    }

    /// Spin down the whole array once `limit` drives are confirmed in standby.
    pub fn with_standby_limit(mut self, limit: usize) -> Result<Self> {
        if self.guards.is_none() {
            return Err(ControlError::config(format!(
                "{}: standby_hd_limit needs the standby guard enabled",
                self.core.name()
            )));
        }
        if limit == 0 || limit > self.devices.len() {
            return Err(ControlError::config(format!(
                "{}: standby_hd_limit must be between 1 and {}, got {}",
                self.core.name(),
                self.devices.len(),
                limit
            )));
        }
        self.standby_limit = Some(limit);
        Ok(self)
    }

    pub fn core(&self) -> &ZoneCore {
        &self.core
    }

    pub fn devices(&self) -> &[String] {
        &self.devices
    }

    pub fn guard(&self, device: &str) -> Option<&StandbyGuard> {
        self.guards.as_ref()?.get(device)
    }

    pub fn last_temp(&self, device: &str) -> Option<f64> {
        self.last_temps.get(device).copied()
    }

    pub fn array_in_standby(&self) -> bool {
        self.array_standby
    }

    /// One character per device in configured order: A active, S standby, ? unknown.
    pub fn array_state(&self) -> String {
        self.devices
            .iter()
            .map(|d| self.guard(d).map_or('A', |g| g.state().code()))
            .collect()
    }

    fn may_poll(&self, device: &str) -> bool {
        self.guard(device).map_or(true, |g| g.may_poll())
    }

    pub async fn poll(&mut self, source: &dyn SensorSource) -> Result<u8> {
        let mut fresh = Vec::new();
        let mut suppressed = Vec::new();
        let mut stale = Vec::new();
        let mut attempted = 0usize;
        let mut spinning = 0usize;
        let mut changed = false;

        for device in &self.devices {
            if self.may_poll(device) {
                attempted += 1;
                match source.read_temperature(device).await {
                    Ok(temp) => {
                        self.last_temps.insert(device.clone(), temp);
                        fresh.push(temp);
                    }
                    Err(e) => {
                        warn!("{}: {}", self.core.name(), e);
                        stale.extend(self.last_temps.get(device).copied());
                    }
                }
            } else {
                suppressed.extend(self.last_temps.get(device).copied());
            }

            if let Some(guard) = self.guards.as_mut().and_then(|g| g.get_mut(device)) {
                let observation = match source.read_power_state(device).await {
                    Ok(state) => Observation::from(state),
                    Err(e) => {
                        warn!("{}: power state of {} unknown: {}", self.core.name(), device, e);
                        Observation::QueryFailed
                    }
                };
                if observation == Observation::Spinning {
                    spinning += 1;
                }
                if let Some(before) = guard.observe(observation) {
                    info!("{}: {} {} -> {}", self.core.name(), device, before, guard.state());
                    changed = true;
                }
            }
        }

        if changed {
            info!("{}: standby guard array state [{}]", self.core.name(), self.array_state());
        }
        self.coordinate_standby(source, spinning).await;

        if fresh.is_empty() && attempted > 0 && suppressed.is_empty() {
            return Err(ControlError::ZoneRead {
                zone: self.core.name().to_string(),
            });
        }

        let mut samples = fresh;
        samples.extend(suppressed);
        if samples.is_empty() {
            // Every drive asleep and never read: an idle cage needs no extra cooling
            return Ok(self.core.idle());
        }
        samples.extend(stale);
        self.core.update(&samples)
    }

    /// Track the array ACTIVE/STANDBY state and put the rest of the array to sleep at the limit.
    async fn coordinate_standby(&mut self, source: &dyn SensorSource, spinning: usize) {
        let (Some(limit), Some(guards)) = (self.standby_limit, self.guards.as_ref()) else {
            return;
        };
        let sleeping = guards.values().filter(|g| g.state() == GuardState::Standby).count();
        let hours = self.array_since.elapsed().as_secs_f64() / 3600.0;

        if !self.array_standby && sleeping >= limit {
            info!(
                "{}: standby guard: ACTIVE -> STANDBY after {:.1} hour(s) [{}]",
                self.core.name(),
                hours,
                self.array_state()
            );
            let awake = self
                .devices
                .iter()
                .filter(|d| guards.get(*d).map_or(false, |g| g.state() != GuardState::Standby));
            for device in awake {
                match source.spin_down(device).await {
                    Ok(()) => info!("{}: {} sent to standby", self.core.name(), device),
                    Err(e) => warn!("{}: cannot spin down {}: {}", self.core.name(), device, e),
                }
            }
            self.array_standby = true;
            self.array_since = Instant::now();
        } else if self.array_standby && spinning > 0 {
            info!(
                "{}: standby guard: STANDBY -> ACTIVE after {:.1} hour(s) [{}]",
                self.core.name(),
                hours,
                self.array_state()
            );
            self.array_standby = false;
            self.array_since = Instant::now();
        }
    }
}
