//! Hardware data types shared by sensor backends and the IPMI client.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Spindle power state as reported by the drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    Spinning,
    Standby,
}

/// Supermicro BMC fan modes (`raw 0x30 0x45`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanMode {
    Standard,
    Full,
    Optimal,
    HeavyIo,
}

impl FanMode {
    pub fn code(self) -> u8 {
        match self {
            FanMode::Standard => 0,
            FanMode::Full => 1,
            FanMode::Optimal => 2,
            FanMode::HeavyIo => 4,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(FanMode::Standard),
            1 => Some(FanMode::Full),
            2 => Some(FanMode::Optimal),
            4 => Some(FanMode::HeavyIo),
            _ => None,
        }
    }
}

impl fmt::Display for FanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FanMode::Standard => "STANDARD MODE",
            FanMode::Full => "FULL MODE",
            FanMode::Optimal => "OPTIMAL MODE",
            FanMode::HeavyIo => "HEAVY IO MODE",
        };
        write!(f, "{}", name)
    }
}
