//! Error taxonomy for the thermal control engine and process exit codes.

use thiserror::Error;

/// Result type alias using ControlError
pub type Result<T> = std::result::Result<T, ControlError>;

#[derive(Error, Debug)]
pub enum ControlError {
    // ============================================================================
    // Recoverable (absorbed by the zone or the service loop)
    // ============================================================================
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to read sensor {sensor}: {reason}")]
    SensorRead { sensor: String, reason: String },

    #[error("All sensors of zone '{zone}' failed to read")]
    ZoneRead { zone: String },

    #[error("IPMI command failed after {attempts} attempt(s): {reason}")]
    ManagementCommand { attempts: u32, reason: String },

    // ============================================================================
    // Fatal
    // ============================================================================
    #[error("IPMI channel lost: {failures} consecutive command failures (ceiling {ceiling})")]
    ManagementChannelFatal { failures: u32, ceiling: u32 },

    #[error("Cannot open IPMI session: {0}")]
    ManagementInit(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Missing runtime dependency: {0}")]
    Dependency(String),

    #[error("No fan zone is enabled")]
    NoZones,
}

impl ControlError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn sensor(sensor: impl Into<String>, reason: impl ToString) -> Self {
        Self::SensorRead {
            sensor: sensor.into(),
            reason: reason.to_string(),
        }
    }

    /// Fatal errors terminate the daemon; everything else is absorbed by the loop.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ManagementChannelFatal { .. }
                | Self::ManagementInit(_)
                | Self::Configuration(_)
                | Self::Dependency(_)
                | Self::NoZones
        )
    }

    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => exit_code::CONFIG,
            Self::Dependency(_) => exit_code::DEPENDENCY,
            Self::ManagementInit(_) => exit_code::IPMI_INIT,
            Self::NoZones => exit_code::NO_ZONES,
            Self::ManagementChannelFatal { .. } => exit_code::IPMI_FATAL,
            _ => exit_code::RUNTIME,
        }
    }
}

pub mod exit_code {
    pub const LOGGING: i32 = 5;
    pub const CONFIG: i32 = 6;
    pub const DEPENDENCY: i32 = 7;
    pub const IPMI_INIT: i32 = 8;
    pub const NO_ZONES: i32 = 10;
    pub const IPMI_FATAL: i32 = 11;
    pub const RUNTIME: i32 = 1;
}
