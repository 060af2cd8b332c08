//! Constant zone: pins a fan bank to a fixed level regardless of temperature.

use std::time::Duration;

use crate::error::{ControlError, Result};

#[derive(Debug, Clone)]
pub struct ConstZone {
    name: String,
    ipmi_zones: Vec<u8>,
    polling: Duration,
    level: u8,
}

impl ConstZone {
    pub fn new(name: impl Into<String>, ipmi_zones: Vec<u8>, polling: Duration, level: u8) -> Result<Self> {
        let name = name.into();
        if level > 100 {
            return Err(ControlError::config(format!("{}: level {}% is above 100%", name, level)));
        }
        if ipmi_zones.is_empty() {
            return Err(ControlError::config(format!("{}: ipmi_zones is empty", name)));
        }
        if polling.is_zero() {
            return Err(ControlError::config(format!("{}: polling interval must be > 0", name)));
        }
        Ok(Self {
            name,
            ipmi_zones,
            polling,
            level,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ipmi_zones(&self) -> &[u8] {
        &self.ipmi_zones
    }

    pub fn polling(&self) -> Duration {
        self.polling
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn poll(&self) -> u8 {
        self.level
    }
}
