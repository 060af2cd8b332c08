//! ipmitool-backed management channel speaking Supermicro OEM raw commands.

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::types::{seconds, IpmiSettings};
use crate::hardware::types::FanMode;
use crate::hardware::ManagementChannel;
use crate::system::executor;
use crate::system::parser;

const FAN_MODE_GET: [u8; 3] = [0x30, 0x45, 0x00];
const FAN_MODE_SET: [u8; 3] = [0x30, 0x45, 0x01];
const FAN_LEVEL_GET: [u8; 4] = [0x30, 0x70, 0x66, 0x00];
const FAN_LEVEL_SET: [u8; 4] = [0x30, 0x70, 0x66, 0x01];

pub struct IpmiTool {
    command: String,
    remote_parameters: String,
    swapped_zones: bool,
    timeout: Duration,
    dry_run: bool,
}

impl IpmiTool {
    pub fn new(settings: &IpmiSettings, dry_run: bool) -> crate::error::Result<Self> {
        Ok(Self {
            command: settings.command.clone(),
            remote_parameters: settings.remote_parameters.clone(),
            swapped_zones: settings.swapped_zones,
            timeout: seconds("command_timeout", settings.command_timeout)?,
            dry_run,
        })
    }

    /// Swap the CPU and HD zones on boards that wire them the other way round.
    fn board_zone(&self, zone: u8) -> u8 {
        match (self.swapped_zones, zone) {
            (true, 0) => 1,
            (true, 1) => 0,
            _ => zone,
        }
    }

    fn format_bytes(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("0x{:02x}", b)).collect::<Vec<_>>().join(" ")
    }

    /// Execute `ipmitool [remote parameters] raw <bytes>` and return stdout.
    async fn raw(&self, bytes: &[u8]) -> Result<String> {
        let hex = Self::format_bytes(bytes);
        let mut args = vec!["raw"];
        args.extend(hex.split(' '));

        debug!("Executing: {} raw {}", self.command, hex);
        let cmd = executor::build_command(&self.command, &self.remote_parameters, &args);
        executor::run_checked(cmd, self.timeout).await
    }

    /// Raw command that changes board state; logged instead of executed in dry-run mode.
    async fn raw_write(&self, bytes: &[u8]) -> Result<()> {
        if self.dry_run {
            info!("[DRY RUN] Would execute: {} raw {}", self.command, Self::format_bytes(bytes));
            return Ok(());
        }
        self.raw(bytes).await.map(|_| ())
    }
}

#[async_trait]
impl ManagementChannel for IpmiTool {
    async fn set_fan_level(&self, zone: u8, level: u8) -> Result<()> {
        let mut bytes = FAN_LEVEL_SET.to_vec();
        bytes.extend([self.board_zone(zone), level]);
        self.raw_write(&bytes).await
    }

    async fn get_fan_level(&self, zone: u8) -> Result<u8> {
        let mut bytes = FAN_LEVEL_GET.to_vec();
        bytes.push(self.board_zone(zone));
        let reply = self.raw(&bytes).await?;
        parser::parse_raw_byte(&reply).ok_or_else(|| anyhow!("Unexpected fan level reply: {:?}", reply.trim()))
    }

    async fn get_fan_mode(&self) -> Result<FanMode> {
        let reply = self.raw(&FAN_MODE_GET).await?;
        parser::parse_raw_byte(&reply)
            .and_then(FanMode::from_code)
            .ok_or_else(|| anyhow!("Unexpected fan mode reply: {:?}", reply.trim()))
    }

    async fn set_fan_mode(&self, mode: FanMode) -> Result<()> {
        let mut bytes = FAN_MODE_SET.to_vec();
        bytes.push(mode.code());
        self.raw_write(&bytes).await
    }
}
