//! Per-device standby guard.
//!
//! Decides whether a temperature read may be issued to a storage device
//! without spinning it up. A device is only treated as sleeping after a run
//! of consecutive standby observations reaches the confirmation threshold.

use std::fmt;

use crate::hardware::types::PowerState;

pub const DEFAULT_CONFIRMATIONS: u32 = 2;
/// A single standby sample is never enough to treat a drive as sleeping
pub const MIN_CONFIRMATIONS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Active,
    Standby,
    Unknown,
}

impl GuardState {
    /// One-letter code used in the array summary string.
    pub fn code(self) -> char {
        match self {
            GuardState::Active => 'A',
            GuardState::Standby => 'S',
            GuardState::Unknown => '?',
        }
    }
}

impl fmt::Display for GuardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardState::Active => write!(f, "ACTIVE"),
            GuardState::Standby => write!(f, "STANDBY"),
            GuardState::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Raw result of one power-state query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    Spinning,
    Standby,
    QueryFailed,
}

impl From<PowerState> for Observation {
    fn from(state: PowerState) -> Self {
        match state {
            PowerState::Spinning => Observation::Spinning,
            PowerState::Standby => Observation::Standby,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StandbyGuard {
    device: String,
    state: GuardState,
    standby_count: u32,
    confirmations: u32,
}

impl StandbyGuard {
    pub fn new(device: impl Into<String>, confirmations: u32) -> Self {
        Self {
            device: device.into(),
            state: GuardState::Unknown,
            standby_count: 0,
            confirmations: confirmations.max(MIN_CONFIRMATIONS),
        }
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn state(&self) -> GuardState {
        self.state
    }

    pub fn standby_count(&self) -> u32 {
        self.standby_count
    }

    /// Feed one observation; returns the previous state if it changed.
    pub fn observe(&mut self, observation: Observation) -> Option<GuardState> {
        let before = self.state;
        match observation {
            Observation::Spinning => {
                self.state = GuardState::Active;
                self.standby_count = 0;
            }
            Observation::Standby => {
                self.standby_count = self.standby_count.saturating_add(1);
                if self.standby_count >= self.confirmations {
                    self.state = GuardState::Standby;
                }
            }
            // Counter is kept: a failed query is neither evidence of activity nor of sleep.
            Observation::QueryFailed => {
                self.state = GuardState::Unknown;
            }
        }
        (before != self.state).then_some(before)
    }

    pub fn may_poll(&self) -> bool {
        self.state != GuardState::Standby
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unknown_and_pollable() {
        let g = StandbyGuard::new("/dev/sda", 2);
        assert_eq!(g.state(), GuardState::Unknown);
        assert!(g.may_poll());
    }

    #[test]
    fn standby_needs_confirmation() {
        let mut g = StandbyGuard::new("/dev/sda", 3);
        g.observe(Observation::Spinning);
        g.observe(Observation::Standby);
        g.observe(Observation::Standby);
        assert_eq!(g.standby_count(), 2);
        assert_eq!(g.state(), GuardState::Active);
        assert!(g.may_poll());

        assert_eq!(g.observe(Observation::Standby), Some(GuardState::Active));
        assert_eq!(g.state(), GuardState::Standby);
        assert!(!g.may_poll());
    }

    #[test]
    fn spinning_resets_counter() {
        let mut g = StandbyGuard::new("/dev/sda", 2);
        g.observe(Observation::Standby);
        g.observe(Observation::Spinning);
        assert_eq!(g.standby_count(), 0);
        g.observe(Observation::Standby);
        assert_eq!(g.state(), GuardState::Active);

        g.observe(Observation::Standby);
        assert_eq!(g.state(), GuardState::Standby);
        g.observe(Observation::Spinning);
        assert_eq!(g.state(), GuardState::Active);
        assert!(g.may_poll());
    }

    #[test]
    fn query_failure_is_unknown_and_keeps_counter() {
        let mut g = StandbyGuard::new("/dev/sdb", 3);
        g.observe(Observation::Standby);
        g.observe(Observation::Standby);
        g.observe(Observation::QueryFailed);
        assert_eq!(g.state(), GuardState::Unknown);
        assert_eq!(g.standby_count(), 2);
        assert!(g.may_poll());

        g.observe(Observation::Standby);
        assert_eq!(g.state(), GuardState::Standby);
    }

    #[test]
    fn single_sample_never_confirms_standby() {
        let mut g = StandbyGuard::new("/dev/sdd", 1);
        g.observe(Observation::Spinning);
        g.observe(Observation::Standby);
        assert_eq!(g.state(), GuardState::Active);
        g.observe(Observation::Standby);
        assert_eq!(g.state(), GuardState::Standby);
    }

    #[test]
    fn unchanged_state_reports_none() {
        let mut g = StandbyGuard::new("/dev/sdc", 2);
        assert_eq!(g.observe(Observation::Spinning), Some(GuardState::Unknown));
        assert_eq!(g.observe(Observation::Spinning), None);
        assert_eq!(g.observe(Observation::Standby), None);
    }
}
