//! In-memory sensors and BMC for service tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::sync::watch;

use pankha_zoned::config::types::ZoneConfig;
use pankha_zoned::hardware::types::{FanMode, PowerState};
use pankha_zoned::hardware::{Ipmi, ManagementChannel, SensorSource, SessionSettings};
use pankha_zoned::zone::Zone;
use pankha_zoned::{ControlError, Service, ServiceOptions};

#[derive(Default)]
pub struct FakeSensors {
    temps: Mutex<HashMap<String, f64>>,
    standby: Mutex<HashMap<String, bool>>,
    reads: Mutex<Vec<String>>,
}

impl FakeSensors {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// `None` makes the sensor fail.
    pub fn set_temp(&self, sensor: &str, temp: Option<f64>) {
        let mut temps = self.temps.lock().unwrap();
        match temp {
            Some(t) => temps.insert(sensor.to_string(), t),
            None => temps.remove(sensor),
        };
    }

    pub fn set_standby(&self, device: &str, standby: bool) {
        self.standby.lock().unwrap().insert(device.to_string(), standby);
    }

    pub fn reads_of(&self, sensor: &str) -> usize {
        self.reads.lock().unwrap().iter().filter(|s| *s == sensor).count()
    }
}

#[async_trait]
impl SensorSource for FakeSensors {
    async fn read_temperature(&self, sensor: &str) -> pankha_zoned::Result<f64> {
        self.reads.lock().unwrap().push(sensor.to_string());
        self.temps
            .lock()
            .unwrap()
            .get(sensor)
            .copied()
            .ok_or_else(|| ControlError::sensor(sensor, "read failed"))
    }

    async fn read_power_state(&self, device: &str) -> pankha_zoned::Result<PowerState> {
        match self.standby.lock().unwrap().get(device) {
            Some(true) => Ok(PowerState::Standby),
            _ => Ok(PowerState::Spinning),
        }
    }

    async fn probe(&self, sensor: &str) -> pankha_zoned::Result<()> {
        if sensor.starts_with("/missing") {
            Err(ControlError::sensor(sensor, "no such file"))
        } else {
            Ok(())
        }
    }
}

pub struct FakeBoard {
    mode: Mutex<FanMode>,
    levels: Mutex<BTreeMap<u8, u8>>,
    /// Every set command received, successful or not
    sets: Mutex<Vec<(u8, u8)>>,
    pub fail_sets: AtomicBool,
    pub fail_mode: AtomicBool,
}

impl FakeBoard {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            mode: Mutex::new(FanMode::Optimal),
            levels: Mutex::new(BTreeMap::new()),
            sets: Mutex::new(Vec::new()),
            fail_sets: AtomicBool::new(false),
            fail_mode: AtomicBool::new(false),
        })
    }

    pub fn mode(&self) -> FanMode {
        *self.mode.lock().unwrap()
    }

    pub fn level(&self, zone: u8) -> Option<u8> {
        self.levels.lock().unwrap().get(&zone).copied()
    }

    pub fn sets(&self) -> Vec<(u8, u8)> {
        self.sets.lock().unwrap().clone()
    }
}

#[async_trait]
impl ManagementChannel for FakeBoard {
    async fn set_fan_level(&self, zone: u8, level: u8) -> anyhow::Result<()> {
        self.sets.lock().unwrap().push((zone, level));
        if self.fail_sets.load(Ordering::SeqCst) {
            return Err(anyhow!("ipmitool raw failed: Unable to send RAW command"));
        }
        self.levels.lock().unwrap().insert(zone, level);
        Ok(())
    }

    async fn get_fan_level(&self, zone: u8) -> anyhow::Result<u8> {
        self.level(zone).ok_or_else(|| anyhow!("no level for zone {}", zone))
    }

    async fn get_fan_mode(&self) -> anyhow::Result<FanMode> {
        if self.fail_mode.load(Ordering::SeqCst) {
            return Err(anyhow!("Could not open device at /dev/ipmi0"));
        }
        Ok(self.mode())
    }

    async fn set_fan_mode(&self, mode: FanMode) -> anyhow::Result<()> {
        *self.mode.lock().unwrap() = mode;
        Ok(())
    }
}

pub fn session_settings(attempts: u32, ceiling: u32) -> SessionSettings {
    SessionSettings {
        command_timeout: Duration::from_secs(1),
        attempts,
        retry_backoff: Duration::ZERO,
        failure_ceiling: ceiling,
        fan_mode_delay: Duration::ZERO,
        fan_level_delay: Duration::ZERO,
    }
}

pub fn zone(json: &str) -> Zone {
    let config: ZoneConfig = serde_json::from_str(json).unwrap();
    Zone::from_config(&config).unwrap()
}

pub fn service(
    zones: Vec<Zone>,
    sensors: Arc<FakeSensors>,
    board: Arc<FakeBoard>,
    settings: SessionSettings,
    shutdown: watch::Receiver<bool>,
) -> Service {
    let ipmi = Ipmi::new(board, settings);
    let options = ServiceOptions {
        fan_mode: FanMode::Full,
        safe_level: Some(100),
    };
    Service::new(zones, sensors, ipmi, options, shutdown).unwrap()
}
