//! Piecewise-linear temperature to fan level curve.
//!
//! Below the first breakpoint the curve returns the first level, above the
//! last breakpoint the last level, and in between it interpolates linearly.
//! An optional step count quantizes the output into equal level increments.

use serde::{Deserialize, Serialize};

use crate::error::{ControlError, Result};

/// One breakpoint: temperature in °C mapped to a fan level in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, u8)", into = "(f64, u8)")]
pub struct CurvePoint {
    pub temperature: f64,
    pub level: u8,
}

impl From<(f64, u8)> for CurvePoint {
    fn from((temperature, level): (f64, u8)) -> Self {
        Self { temperature, level }
    }
}

impl From<CurvePoint> for (f64, u8) {
    fn from(p: CurvePoint) -> Self {
        (p.temperature, p.level)
    }
}

#[derive(Debug, Clone)]
pub struct FanCurve {
    points: Vec<CurvePoint>,
    steps: Option<u32>,
}

impl FanCurve {
    /// Build a curve, rejecting anything that is not a valid monotonic mapping.
    pub fn new(points: Vec<CurvePoint>) -> Result<Self> {
        if points.len() < 2 {
            return Err(ControlError::config(format!(
                "fan curve needs at least two breakpoints, got {}",
                points.len()
            )));
        }

        for p in &points {
            if !p.temperature.is_finite() {
                return Err(ControlError::config(format!(
                    "breakpoint temperature {} is not a number",
                    p.temperature
                )));
            }
            if p.level > 100 {
                return Err(ControlError::config(format!(
                    "breakpoint level {}% is above 100%",
                    p.level
                )));
            }
        }

        for w in points.windows(2) {
            if w[1].temperature <= w[0].temperature {
                return Err(ControlError::config(format!(
                    "breakpoint temperatures must be strictly increasing ({:.1}°C after {:.1}°C)",
                    w[1].temperature, w[0].temperature
                )));
            }
            if w[1].level < w[0].level {
                return Err(ControlError::config(format!(
                    "breakpoint levels must not decrease ({}% after {}%)",
                    w[1].level, w[0].level
                )));
            }
        }

        Ok(Self { points, steps: None })
    }

    /// Two-point curve from the classic min/max temperature and level settings.
    pub fn linear(min_temp: f64, max_temp: f64, min_level: u8, max_level: u8) -> Result<Self> {
        Self::new(vec![
            CurvePoint { temperature: min_temp, level: min_level },
            CurvePoint { temperature: max_temp, level: max_level },
        ])
    }

    /// Quantize the output into `steps` equal increments between the first and last level.
    pub fn with_steps(mut self, steps: u32) -> Result<Self> {
        if steps == 0 {
            return Err(ControlError::config("steps must be greater than zero"));
        }
        self.steps = Some(steps);
        Ok(self)
    }

    pub fn points(&self) -> &[CurvePoint] {
        &self.points
    }

    pub fn min_level(&self) -> u8 {
        self.points[0].level
    }

    pub fn max_level(&self) -> u8 {
        self.points[self.points.len() - 1].level
    }

    /// Average slope of the curve in percent per °C.
    pub fn slope(&self) -> f64 {
        let first = &self.points[0];
        let last = &self.points[self.points.len() - 1];
        f64::from(last.level - first.level) / (last.temperature - first.temperature)
    }

    /// Map a temperature to a fan level, clamped to the curve bounds.
    pub fn level_at(&self, temp: f64) -> u8 {
        let first = &self.points[0];
        let last = &self.points[self.points.len() - 1];

        let raw = if temp <= first.temperature {
            f64::from(first.level)
        } else if temp >= last.temperature {
            f64::from(last.level)
        } else {
            self.points
                .windows(2)
                .find(|w| temp >= w[0].temperature && temp <= w[1].temperature)
                .map(|w| {
                    let ratio = (temp - w[0].temperature) / (w[1].temperature - w[0].temperature);
                    f64::from(w[0].level) + ratio * f64::from(w[1].level - w[0].level)
                })
                .unwrap_or(f64::from(last.level))
        };

        let quantized = match self.steps {
            Some(steps) if last.level > first.level => {
                let step = f64::from(last.level - first.level) / f64::from(steps);
                f64::from(first.level) + ((raw - f64::from(first.level)) / step).round() * step
            }
            _ => raw,
        };

        (quantized.round() as u8).clamp(first.level, last.level)
    }

    /// Temperature/level table at every step boundary, for the INIT log.
    pub fn mapping_table(&self) -> Vec<(f64, u8)> {
        match self.steps {
            Some(steps) => {
                let first = self.points[0].temperature;
                let span = self.points[self.points.len() - 1].temperature - first;
                (0..=steps)
                    .map(|i| {
                        let t = first + span * f64::from(i) / f64::from(steps);
                        (t, self.level_at(t))
                    })
                    .collect()
            }
            None => self.points.iter().map(|p| (p.temperature, p.level)).collect(),
        }
    }
}
