//! Fan controller: reduces a zone's samples to one temperature, maps it through
//! the curve and applies hysteresis against the last returned level.

use serde::{Deserialize, Serialize};

use super::curve::FanCurve;
use crate::error::{ControlError, Result};

/// How a zone with several sensors reduces them to one representative temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    #[serde(alias = "minimum")]
    Min,
    #[default]
    #[serde(alias = "average")]
    Avg,
    #[serde(alias = "maximum")]
    Max,
}

impl Aggregation {
    pub fn apply(self, samples: &[f64]) -> Option<f64> {
        if samples.is_empty() {
            return None;
        }
        Some(match self {
            Aggregation::Min => samples.iter().copied().fold(f64::INFINITY, f64::min),
            Aggregation::Max => samples.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Aggregation::Avg => samples.iter().sum::<f64>() / samples.len() as f64,
        })
    }
}

#[derive(Debug, Clone)]
pub struct FanController {
    curve: FanCurve,
    /// Hysteresis margin in °C
    hysteresis: f64,
    aggregation: Aggregation,
    last_level: Option<u8>,
    last_temp: Option<f64>,
}

impl FanController {
    pub fn new(curve: FanCurve, hysteresis: f64, aggregation: Aggregation) -> Result<Self> {
        if !hysteresis.is_finite() || hysteresis < 0.0 {
            return Err(ControlError::config(format!("hysteresis must be >= 0, got {}", hysteresis)));
        }
        Ok(Self {
            curve,
            hysteresis,
            aggregation,
            last_level: None,
            last_temp: None,
        })
    }

    pub fn curve(&self) -> &FanCurve {
        &self.curve
    }

    pub fn hysteresis(&self) -> f64 {
        self.hysteresis
    }

    pub fn aggregation(&self) -> Aggregation {
        self.aggregation
    }

    pub fn last_level(&self) -> Option<u8> {
        self.last_level
    }

    /// Representative temperature of the most recent `compute` call.
    pub fn last_temp(&self) -> Option<f64> {
        self.last_temp
    }

    /// Adopt `level` as the last returned level without a sample.
    pub fn hold(&mut self, level: u8) {
        self.last_level = Some(level);
    }

    /// The hysteresis margin expressed as a level delta, using the curve's average slope.
    pub fn margin_levels(&self) -> f64 {
        self.hysteresis * self.curve.slope()
    }

    /// Compute the fan level for this cycle's samples.
    ///
    /// A new level replaces the previous one only if it differs by at least
    /// the margin; otherwise the previous level is returned unchanged.
    pub fn compute(&mut self, samples: &[f64]) -> Result<u8> {
        if let Some(bad) = samples.iter().find(|t| !t.is_finite()) {
            return Err(ControlError::InvalidInput(format!("temperature sample {} is not a number", bad)));
        }
        let temp = self
            .aggregation
            .apply(samples)
            .ok_or_else(|| ControlError::InvalidInput("no temperature samples".to_string()))?;

        self.last_temp = Some(temp);
        let candidate = self.curve.level_at(temp);

        let level = match self.last_level {
            Some(last) if (f64::from(candidate) - f64::from(last)).abs() < self.margin_levels() => last,
            _ => candidate,
        };

        self.last_level = Some(level);
        Ok(level)
    }
}
