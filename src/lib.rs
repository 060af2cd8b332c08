//! Zoned fan control for Supermicro IPMI boards.
//!
//! Reads CPU, GPU and disk temperatures, maps them through per-zone fan
//! curves and drives the board's fan zones over IPMI.

pub mod app;
pub mod config;
pub mod control;
pub mod daemon;
pub mod error;
pub mod hardware;
pub mod service;
pub mod system;
pub mod zone;

pub use error::{ControlError, Result};
pub use service::{Service, ServiceOptions, ServiceState};
