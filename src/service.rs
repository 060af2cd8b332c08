//! Service: owns the zones and the IPMI session and runs the scheduling loop.
//!
//! INIT -> RUNNING -> STOPPING -> STOPPED. RUNNING is a single cooperative
//! loop: sleep until the nearest zone deadline, poll every due zone in
//! configured order, and push each zone's level to the BMC right after it
//! is computed. The shutdown watch is checked before every zone and
//! interrupts the sleep.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::types::DaemonConfig;
use crate::error::{ControlError, Result};
use crate::hardware::types::FanMode;
use crate::hardware::{Ipmi, ManagementChannel, SensorSource, SessionSettings};
use crate::zone::Zone;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Init,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceState::Init => "INIT",
            ServiceState::Running => "RUNNING",
            ServiceState::Stopping => "STOPPING",
            ServiceState::Stopped => "STOPPED",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub fan_mode: FanMode,
    /// Level written to every IPMI zone on the way out; `None` leaves fans as they are
    pub safe_level: Option<u8>,
}

impl From<&DaemonConfig> for ServiceOptions {
    fn from(config: &DaemonConfig) -> Self {
        Self {
            fan_mode: config.ipmi.fan_mode,
            safe_level: config.service.safe_level,
        }
    }
}

struct ZoneSlot {
    zone: Zone,
    next_due: Instant,
    read_failures: u64,
}

pub struct Service {
    state: ServiceState,
    zones: Vec<ZoneSlot>,
    sensors: Arc<dyn SensorSource>,
    ipmi: Ipmi,
    options: ServiceOptions,
    /// Last level the BMC accepted, per IPMI zone
    applied: BTreeMap<u8, u8>,
    shutdown: watch::Receiver<bool>,
}

impl Service {
    pub fn new(
        zones: Vec<Zone>,
        sensors: Arc<dyn SensorSource>,
        ipmi: Ipmi,
        options: ServiceOptions,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self> {
        if zones.is_empty() {
            return Err(ControlError::NoZones);
        }
        let now = Instant::now();
        Ok(Self {
            state: ServiceState::Init,
            zones: zones
                .into_iter()
                .map(|zone| ZoneSlot {
                    zone,
                    next_due: now,
                    read_failures: 0,
                })
                .collect(),
            sensors,
            ipmi,
            options,
            applied: BTreeMap::new(),
            shutdown,
        })
    }

    /// Build every enabled zone and the IPMI session from the configuration.
    pub fn from_config(
        config: &DaemonConfig,
        sensors: Arc<dyn SensorSource>,
        channel: Arc<dyn ManagementChannel>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self> {
        let zones = config
            .zones
            .iter()
            .filter(|z| z.enabled())
            .map(Zone::from_config)
            .collect::<Result<Vec<_>>>()?;
        let ipmi = Ipmi::new(channel, SessionSettings::try_from(&config.ipmi)?);
        Self::new(zones, sensors, ipmi, ServiceOptions::from(config), shutdown)
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    pub fn zones(&self) -> impl Iterator<Item = &Zone> {
        self.zones.iter().map(|s| &s.zone)
    }

    /// Number of cycles in which every sensor of the zone failed.
    pub fn zone_read_failures(&self, index: usize) -> u64 {
        self.zones.get(index).map_or(0, |s| s.read_failures)
    }

    pub fn applied_level(&self, ipmi_zone: u8) -> Option<u8> {
        self.applied.get(&ipmi_zone).copied()
    }

    pub fn ipmi(&self) -> &Ipmi {
        &self.ipmi
    }

    fn set_state(&mut self, state: ServiceState) {
        debug!("Service state: {} -> {}", self.state, state);
        self.state = state;
    }

    fn shutdown_requested(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// INIT: verify every sensor resolves, then open the IPMI session.
    pub async fn init(&mut self) -> Result<()> {
        for slot in &self.zones {
            for sensor in slot.zone.sensors() {
                self.sensors.probe(sensor).await.map_err(|e| {
                    ControlError::config(format!("{}: unresolvable sensor {} ({})", slot.zone.name(), sensor, e))
                })?;
            }
            slot.zone.describe();
        }

        self.ipmi.open(self.options.fan_mode).await?;

        info!(
            "{} zone(s) ready: {}",
            self.zones.len(),
            self.zones
                .iter()
                .map(|s| format!("{} ({}s)", s.zone.name(), s.zone.polling().as_secs_f64()))
                .collect::<Vec<_>>()
                .join(", ")
        );
        self.set_state(ServiceState::Running);
        Ok(())
    }

    /// Run until a termination request or a fatal IPMI error, then stop.
    pub async fn run(&mut self) -> Result<()> {
        if self.state == ServiceState::Init {
            self.init().await?;
        }

        let now = Instant::now();
        for slot in &mut self.zones {
            slot.next_due = now;
        }

        let result = self.run_loop().await;
        if let Err(e) = &result {
            error!("{}", e);
        }
        self.stop().await;
        result
    }

    async fn run_loop(&mut self) -> Result<()> {
        loop {
            if self.shutdown_requested() {
                info!("Termination requested");
                return Ok(());
            }
            self.cycle().await?;

            let Some(next) = self.zones.iter().map(|s| s.next_due).min() else {
                return Ok(());
            };
            self.sleep_until(next).await;
        }
    }

    /// Sleep until `deadline` or until shutdown is requested, whichever comes first.
    async fn sleep_until(&mut self, deadline: Instant) {
        if self.shutdown_requested() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => {}
            changed = self.shutdown.changed() => {
                // Sender gone: nobody can request shutdown any more, keep the schedule
                if changed.is_err() {
                    tokio::time::sleep_until(deadline).await;
                }
            }
        }
    }

    /// Poll every zone whose deadline has passed, in configured order.
    pub async fn cycle(&mut self) -> Result<()> {
        let now = Instant::now();
        for index in 0..self.zones.len() {
            if self.shutdown_requested() {
                return Ok(());
            }
            if self.zones[index].next_due <= now {
                self.poll_zone(index).await?;
            }
        }
        Ok(())
    }

    async fn poll_zone(&mut self, index: usize) -> Result<()> {
        let slot = &mut self.zones[index];
        slot.next_due = Instant::now() + slot.zone.polling();

        match slot.zone.poll(self.sensors.as_ref()).await {
            Ok(_) => {}
            Err(e @ ControlError::ZoneRead { .. }) => {
                slot.read_failures += 1;
                warn!("{}; keeping fan level {}%", e, slot.zone.level());
            }
            Err(e) => warn!("{}: {}", slot.zone.name(), e),
        }

        self.apply(index).await
    }

    /// Level an IPMI zone should run at: the highest level among the zones driving it.
    fn desired_level(&self, ipmi_zone: u8) -> Option<u8> {
        self.zones
            .iter()
            .filter(|s| s.zone.ipmi_zones().contains(&ipmi_zone))
            .map(|s| s.zone.level())
            .max()
    }

    async fn apply(&mut self, index: usize) -> Result<()> {
        let targets = self.zones[index].zone.ipmi_zones().to_vec();
        for ipmi_zone in targets {
            let Some(level) = self.desired_level(ipmi_zone) else { continue };
            if self.applied.get(&ipmi_zone) == Some(&level) {
                continue;
            }

            match self.ipmi.set_level(ipmi_zone, level).await {
                Ok(()) => {
                    info!("IPMI zone {}: fan level {}%", ipmi_zone, level);
                    self.applied.insert(ipmi_zone, level);
                }
                Err(e) if e.is_fatal() => return Err(e),
                // Logged by the session; retried when the zone is next polled
                Err(_) => {}
            }
        }
        Ok(())
    }

    /// STOPPING: best-effort safe level on every IPMI zone, close the session.
    async fn stop(&mut self) {
        self.set_state(ServiceState::Stopping);

        if let (Some(level), true) = (self.options.safe_level, self.ipmi.is_open()) {
            let targets: BTreeSet<u8> = self
                .zones
                .iter()
                .flat_map(|s| s.zone.ipmi_zones().iter().copied())
                .collect();
            let mut all = true;
            for ipmi_zone in targets {
                all &= self.ipmi.set_level_best_effort(ipmi_zone, level).await;
            }
            if all {
                info!("All fans are switched to the {}% safe level", level);
            }
        }

        self.ipmi.close();
        self.set_state(ServiceState::Stopped);
        info!("Service stopped");
    }
}
