//! Thermal control primitives: fan curve, controller and standby guard.

pub mod controller;
pub mod curve;
pub mod standby;

pub use controller::{Aggregation, FanController};
pub use curve::{CurvePoint, FanCurve};
pub use standby::{GuardState, Observation, StandbyGuard, MIN_CONFIRMATIONS};
