//! Hardware boundary: sensor backends and the board management channel.

use anyhow::Result;
use async_trait::async_trait;

pub mod ipmi;
pub mod sensors;
pub mod types;

pub use ipmi::{Ipmi, IpmiTool, SessionSettings};
pub use sensors::SystemSensors;

use types::{FanMode, PowerState};

/// Temperature and power-state queries for CPU, GPU and storage sensors.
#[async_trait]
pub trait SensorSource: Send + Sync {
    /// Read one temperature in °C
    async fn read_temperature(&self, sensor: &str) -> crate::error::Result<f64>;

    /// Query a storage device's power state without waking it
    async fn read_power_state(&self, device: &str) -> crate::error::Result<PowerState>;

    /// Verify a sensor identifier resolves to something readable (INIT only)
    async fn probe(&self, sensor: &str) -> crate::error::Result<()>;

    /// Put a storage device into standby immediately.
    async fn spin_down(&self, device: &str) -> crate::error::Result<()> {
        Err(crate::error::ControlError::sensor(device, "spin down is not supported by this backend"))
    }
}

/// Raw fan commands on the board management controller.
///
/// Implementations issue exactly one command per call; retry, timeout and
/// failure accounting belong to the [`Ipmi`] session wrapping them.
#[async_trait]
pub trait ManagementChannel: Send + Sync {
    async fn set_fan_level(&self, zone: u8, level: u8) -> Result<()>;

    async fn get_fan_level(&self, zone: u8) -> Result<u8>;

    async fn get_fan_mode(&self) -> Result<FanMode>;

    async fn set_fan_mode(&self, mode: FanMode) -> Result<()>;
}
