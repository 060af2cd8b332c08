//! Daemon configuration structs and defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::control::{Aggregation, CurvePoint};
use crate::error::{ControlError, Result};
use crate::hardware::types::FanMode;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/pankha-zoned/config.json";

/// IPMI zone numbers on Supermicro boards
pub const IPMI_CPU_ZONE: u8 = 0;
pub const IPMI_HD_ZONE: u8 = 1;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub ipmi: IpmiSettings,
    #[serde(default)]
    pub service: ServiceSettings,
    #[serde(default)]
    pub zones: Vec<ZoneConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpmiSettings {
    #[serde(default = "default_ipmi_command")]
    pub command: String,
    #[serde(default = "default_fan_mode")]
    pub fan_mode: FanMode,
    #[serde(default = "default_fan_mode_delay")]
    pub fan_mode_delay: f64,     // seconds to wait after a mode change
    #[serde(default = "default_fan_level_delay")]
    pub fan_level_delay: f64,    // seconds to wait after a level change
    #[serde(default)]
    pub swapped_zones: bool,
    #[serde(default)]
    pub remote_parameters: String, // e.g. "-I lanplus -H 10.0.0.2 -U ADMIN -P secret"
    #[serde(default = "default_command_timeout")]
    pub command_timeout: f64,
    #[serde(default = "default_retries")]
    pub retries: u32,            // attempts per command, including the first
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff: f64,
    #[serde(default = "default_failure_ceiling")]
    pub failure_ceiling: u32,
}

pub fn default_ipmi_command() -> String { "/usr/bin/ipmitool".to_string() }
pub fn default_fan_mode() -> FanMode { FanMode::Full }
pub fn default_fan_mode_delay() -> f64 { 10.0 }
pub fn default_fan_level_delay() -> f64 { 2.0 }
pub fn default_command_timeout() -> f64 { 5.0 }
pub fn default_retries() -> u32 { 3 }
pub fn default_retry_backoff() -> f64 { 0.5 }
pub fn default_failure_ceiling() -> u32 { 5 }

impl Default for IpmiSettings {
    fn default() -> Self {
        Self {
            command: default_ipmi_command(),
            fan_mode: default_fan_mode(),
            fan_mode_delay: default_fan_mode_delay(),
            fan_level_delay: default_fan_level_delay(),
            swapped_zones: false,
            remote_parameters: String::new(),
            command_timeout: default_command_timeout(),
            retries: default_retries(),
            retry_backoff: default_retry_backoff(),
            failure_ceiling: default_failure_ceiling(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    #[serde(default = "default_safe_level")]
    pub safe_level: Option<u8>,  // applied to every IPMI zone on shutdown; null leaves fans as they are
    #[serde(default = "default_smartctl_path")]
    pub smartctl_path: String,
    #[serde(default = "default_sensor_timeout")]
    pub sensor_timeout: f64,
}

pub fn default_safe_level() -> Option<u8> { Some(100) }
pub fn default_smartctl_path() -> String { "/usr/sbin/smartctl".to_string() }
pub fn default_sensor_timeout() -> f64 { 5.0 }

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            safe_level: default_safe_level(),
            smartctl_path: default_smartctl_path(),
            sensor_timeout: default_sensor_timeout(),
        }
    }
}

/// One configured fan zone, tagged by `"type"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ZoneConfig {
    Cpu(ThermalZoneConfig),
    Hd(ThermalZoneConfig),
    Gpu(ThermalZoneConfig),
    Const(ConstZoneConfig),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneKind {
    Cpu,
    Hd,
    Gpu,
}

/// Per-kind fallbacks for everything a thermal zone leaves out.
#[derive(Debug, Clone, Copy)]
pub struct KindDefaults {
    pub name: &'static str,
    pub ipmi_zone: u8,
    pub polling: f64,
    pub min_temp: f64,
    pub max_temp: f64,
    pub min_level: u8,
    pub max_level: u8,
    pub steps: u32,
    pub hysteresis: f64,
}

impl ZoneKind {
    pub fn defaults(self) -> KindDefaults {
        match self {
            ZoneKind::Cpu => KindDefaults {
                name: "CPU zone",
                ipmi_zone: IPMI_CPU_ZONE,
                polling: 2.0,
                min_temp: 30.0,
                max_temp: 60.0,
                min_level: 35,
                max_level: 100,
                steps: 6,
                hysteresis: 3.0,
            },
            ZoneKind::Hd => KindDefaults {
                name: "HD zone",
                ipmi_zone: IPMI_HD_ZONE,
                polling: 10.0,
                min_temp: 32.0,
                max_temp: 46.0,
                min_level: 35,
                max_level: 100,
                steps: 4,
                hysteresis: 2.0,
            },
            ZoneKind::Gpu => KindDefaults {
                name: "GPU zone",
                ipmi_zone: IPMI_HD_ZONE,
                polling: 2.0,
                min_temp: 40.0,
                max_temp: 70.0,
                min_level: 35,
                max_level: 100,
                steps: 5,
                hysteresis: 2.0,
            },
        }
    }
}

/// Settings shared by CPU, HD and GPU zones. Absent values fall back to [`ZoneKind::defaults`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThermalZoneConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub ipmi_zones: Option<Vec<u8>>,
    #[serde(default)]
    pub sensors: Vec<String>,
    #[serde(default)]
    pub polling: Option<f64>,
    /// Explicit breakpoints; overrides the min/max settings below
    #[serde(default)]
    pub curve: Option<Vec<CurvePoint>>,
    #[serde(default)]
    pub min_temp: Option<f64>,
    #[serde(default)]
    pub max_temp: Option<f64>,
    #[serde(default)]
    pub min_level: Option<u8>,
    #[serde(default)]
    pub max_level: Option<u8>,
    /// 0 disables quantization
    #[serde(default)]
    pub steps: Option<u32>,
    #[serde(default)]
    pub hysteresis: Option<f64>,
    #[serde(default)]
    pub temp_calc: Aggregation,
    #[serde(default)]
    pub standby_guard: StandbyGuardConfig,
}

pub fn default_enabled() -> bool { true }

/// Seconds setting as a `Duration`. Negative, non-finite and out-of-range values are configuration errors.
pub fn seconds(name: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|e| ControlError::config(format!("{} = {} is not a valid duration: {}", name, value, e)))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandbyGuardConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_confirmations")]
    pub confirmations: u32,
    /// Once this many drives sleep, spin down the rest of the array
    #[serde(default)]
    pub standby_hd_limit: Option<usize>,
}

pub fn default_confirmations() -> u32 { crate::control::standby::DEFAULT_CONFIRMATIONS }

impl Default for StandbyGuardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            confirmations: default_confirmations(),
            standby_hd_limit: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstZoneConfig {
    #[serde(default = "default_const_name")]
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_const_ipmi_zones")]
    pub ipmi_zones: Vec<u8>,
    #[serde(default = "default_const_polling")]
    pub polling: f64,
    #[serde(default = "default_const_level")]
    pub level: u8,
}

pub fn default_const_name() -> String { "CONST zone".to_string() }
pub fn default_const_ipmi_zones() -> Vec<u8> { vec![IPMI_HD_ZONE] }
pub fn default_const_polling() -> f64 { 30.0 }
pub fn default_const_level() -> u8 { 50 }

impl ZoneConfig {
    pub fn enabled(&self) -> bool {
        match self {
            ZoneConfig::Cpu(z) | ZoneConfig::Hd(z) | ZoneConfig::Gpu(z) => z.enabled,
            ZoneConfig::Const(z) => z.enabled,
        }
    }

    /// Thermal kind and settings, or `None` for a constant zone.
    pub fn thermal(&self) -> Option<(ZoneKind, &ThermalZoneConfig)> {
        match self {
            ZoneConfig::Cpu(z) => Some((ZoneKind::Cpu, z)),
            ZoneConfig::Hd(z) => Some((ZoneKind::Hd, z)),
            ZoneConfig::Gpu(z) => Some((ZoneKind::Gpu, z)),
            ZoneConfig::Const(_) => None,
        }
    }
}
