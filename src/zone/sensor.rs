//! CPU and GPU zones: every sensor is read on every cycle, no guard.

use std::collections::HashMap;

use tracing::warn;

use super::ZoneCore;
use crate::error::{ControlError, Result};
use crate::hardware::SensorSource;

#[derive(Debug)]
pub struct SensorZone {
    core: ZoneCore,
    sensors: Vec<String>,
    /// Last successful reading per sensor
    last_temps: HashMap<String, f64>,
}

impl SensorZone {
    pub fn new(core: ZoneCore, sensors: Vec<String>) -> Result<Self> {
        if sensors.is_empty() {
            return Err(ControlError::config(format!("{}: no sensors configured", core.name())));
        }
        Ok(Self {
            core,
            sensors,
            last_temps: HashMap::new(),
        })
    }

    pub fn core(&self) -> &ZoneCore {
        &self.core
    }

    pub fn sensors(&self) -> &[String] {
        &self.sensors
    }

    /// Read all sensors and compute the zone level.
    ///
    /// A failed sensor contributes its last good reading as long as another
    /// sensor succeeded this cycle; if none succeeded the zone read fails.
    pub async fn poll(&mut self, source: &dyn SensorSource) -> Result<u8> {
        let mut samples = Vec::with_capacity(self.sensors.len());
        let mut stale = Vec::new();

        for sensor in &self.sensors {
            match source.read_temperature(sensor).await {
                Ok(temp) => {
                    self.last_temps.insert(sensor.clone(), temp);
                    samples.push(temp);
                }
                Err(e) => {
                    warn!("{}: {}", self.core.name(), e);
                    if let Some(temp) = self.last_temps.get(sensor) {
                        stale.push(*temp);
                    }
                }
            }
        }

        if samples.is_empty() {
            return Err(ControlError::ZoneRead {
                zone: self.core.name().to_string(),
            });
        }

        samples.extend(stale);
        self.core.update(&samples)
    }
}
