//! Sensor backends on a Linux host.
//!
//! Sensor identifiers are interpreted by shape:
//! - `/dev/...` is a storage device, read through drivetemp hwmon when the
//!   kernel exposes it and through smartctl otherwise
//! - a path containing glob characters is expanded and the hottest match wins
//! - any other path is a hwmon `temp*_input` file in millidegrees

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, trace};

use crate::config::types::{seconds, ServiceSettings};
use crate::error::{ControlError, Result};
use crate::hardware::types::PowerState;
use crate::hardware::SensorSource;
use crate::system::{executor, parser};

pub struct SystemSensors {
    smartctl_path: String,
    timeout: Duration,
    sys_block: PathBuf,
    dry_run: bool,
}

impl SystemSensors {
    pub fn new(settings: &ServiceSettings) -> Result<Self> {
        Ok(Self {
            smartctl_path: settings.smartctl_path.clone(),
            timeout: seconds("sensor_timeout", settings.sensor_timeout)?,
            sys_block: PathBuf::from("/sys/block"),
            dry_run: false,
        })
    }

    /// Log spin-down commands instead of running them.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Use another sysfs block directory (tests).
    pub fn with_sys_block(mut self, dir: impl Into<PathBuf>) -> Self {
        self.sys_block = dir.into();
        self
    }

    fn is_device(sensor: &str) -> bool {
        sensor.starts_with("/dev/")
    }

    fn is_glob(sensor: &str) -> bool {
        sensor.contains(['*', '?', '['])
    }

    async fn read_millidegrees(&self, path: &Path) -> Result<f64> {
        let name = path.display().to_string();
        let content = tokio::time::timeout(self.timeout, tokio::fs::read_to_string(path))
            .await
            .map_err(|_| ControlError::sensor(&name, "read timed out"))?
            .map_err(|e| ControlError::sensor(&name, e))?;
        parser::parse_millidegrees(&content)
            .ok_or_else(|| ControlError::sensor(&name, format!("unexpected content {:?}", content.trim())))
    }

    fn expand(pattern: &str) -> Result<Vec<PathBuf>> {
        let paths: Vec<PathBuf> = glob::glob(pattern)
            .map_err(|e| ControlError::sensor(pattern, e))?
            .filter_map(|entry| entry.ok())
            .collect();
        if paths.is_empty() {
            return Err(ControlError::sensor(pattern, "no matching temperature inputs"));
        }
        Ok(paths)
    }

    /// Maximum over every readable match of a glob.
    async fn read_glob(&self, pattern: &str) -> Result<f64> {
        let mut hottest: Option<f64> = None;
        let mut last_error = None;

        for path in Self::expand(pattern)? {
            match self.read_millidegrees(&path).await {
                Ok(t) => hottest = Some(hottest.map_or(t, |h| h.max(t))),
                Err(e) => last_error = Some(e),
            }
        }

        match (hottest, last_error) {
            (Some(t), _) => Ok(t),
            (None, Some(e)) => Err(e),
            (None, None) => Err(ControlError::sensor(pattern, "no readable temperature inputs")),
        }
    }

    /// Kernel block device name behind a /dev path (follows by-id symlinks).
    async fn block_name(device: &str) -> Option<String> {
        let resolved = tokio::fs::canonicalize(device).await.ok()?;
        resolved.file_name().map(|n| n.to_string_lossy().to_string())
    }

    /// drivetemp (SATA) or NVMe hwmon input for a block device, if the kernel exposes one.
    async fn hwmon_input(&self, device: &str) -> Option<PathBuf> {
        let name = Self::block_name(device).await?;
        let base = self.sys_block.join(name).join("device");
        let patterns = [
            base.join("hwmon/hwmon*/temp1_input"),
            base.join("hwmon*/temp1_input"),
        ];
        patterns
            .iter()
            .filter_map(|p| glob::glob(&p.to_string_lossy()).ok())
            .flat_map(|paths| paths.filter_map(|entry| entry.ok()))
            .next()
    }

    async fn read_disk(&self, device: &str) -> Result<f64> {
        if let Some(input) = self.hwmon_input(device).await {
            trace!("Reading {} through {}", device, input.display());
            return self.read_millidegrees(&input).await;
        }

        let cmd = executor::build_command(&self.smartctl_path, "", &["-n", "standby", "-A", device]);
        let output = executor::run_with_timeout(cmd, self.timeout)
            .await
            .map_err(|e| ControlError::sensor(device, e))?;
        if parser::smartctl_reports_standby(&output.stdout) {
            return Err(ControlError::sensor(device, "device is in standby"));
        }
        parser::parse_smartctl_temperature(&output.stdout)
            .ok_or_else(|| ControlError::sensor(device, "no temperature in smartctl output"))
    }
}

#[async_trait]
impl SensorSource for SystemSensors {
    async fn read_temperature(&self, sensor: &str) -> Result<f64> {
        let temp = if Self::is_device(sensor) {
            self.read_disk(sensor).await?
        } else if Self::is_glob(sensor) {
            self.read_glob(sensor).await?
        } else {
            self.read_millidegrees(Path::new(sensor)).await?
        };
        trace!("{} = {:.1}°C", sensor, temp);
        Ok(temp)
    }

    async fn read_power_state(&self, device: &str) -> Result<PowerState> {
        let cmd = executor::build_command(&self.smartctl_path, "", &["-i", "-n", "standby", device]);
        let output = executor::run_with_timeout(cmd, self.timeout)
            .await
            .map_err(|e| ControlError::sensor(device, e))?;

        // smartctl exits with 2 when it stops early on a sleeping device
        match output.status {
            Some(0) | Some(2) => {}
            other => {
                return Err(ControlError::sensor(
                    device,
                    format!("unexpected smartctl exit status {:?}", other),
                ))
            }
        }

        Ok(if parser::smartctl_reports_standby(&output.stdout) {
            PowerState::Standby
        } else {
            PowerState::Spinning
        })
    }

    async fn spin_down(&self, device: &str) -> Result<()> {
        if self.dry_run {
            info!("[DRY RUN] Would execute: {} -s standby,now {}", self.smartctl_path, device);
            return Ok(());
        }
        let cmd = executor::build_command(&self.smartctl_path, "", &["-s", "standby,now", device]);
        executor::run_checked(cmd, self.timeout)
            .await
            .map(|_| ())
            .map_err(|e| ControlError::sensor(device, e))
    }

    async fn probe(&self, sensor: &str) -> Result<()> {
        if Self::is_device(sensor) {
            tokio::fs::metadata(sensor)
                .await
                .map_err(|e| ControlError::sensor(sensor, e))?;
        } else if Self::is_glob(sensor) {
            let matches = Self::expand(sensor)?;
            debug!("{} matches {} temperature input(s)", sensor, matches.len());
        } else {
            self.read_millidegrees(Path::new(sensor)).await?;
        }
        Ok(())
    }
}
