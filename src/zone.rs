//! Fan zones: a group of sensors and the IPMI fan bank(s) they drive.

use std::time::Duration;

use tracing::{debug, info};

use crate::config::types::{seconds, KindDefaults, ThermalZoneConfig, ZoneConfig, ZoneKind};
use crate::control::{FanController, FanCurve};
use crate::error::{ControlError, Result};
use crate::hardware::SensorSource;

pub mod constant;
pub mod hd;
pub mod sensor;

pub use constant::ConstZone;
pub use hd::HdZone;
pub use sensor::SensorZone;

pub enum Zone {
    Cpu(SensorZone),
    Gpu(SensorZone),
    Hd(HdZone),
    Const(ConstZone),
}

impl Zone {
    /// Build a zone from its configuration, applying the per-kind defaults.
    pub fn from_config(config: &ZoneConfig) -> Result<Self> {
        match config {
            ZoneConfig::Cpu(c) => Self::thermal(ZoneKind::Cpu, c),
            ZoneConfig::Gpu(c) => Self::thermal(ZoneKind::Gpu, c),
            ZoneConfig::Hd(c) => Self::thermal(ZoneKind::Hd, c),
            ZoneConfig::Const(c) => Ok(Zone::Const(ConstZone::new(
                &c.name,
                c.ipmi_zones.clone(),
                polling(c.polling)?,
                c.level,
            )?)),
        }
    }

    fn thermal(kind: ZoneKind, c: &ThermalZoneConfig) -> Result<Self> {
        let d = kind.defaults();
        let name = c.name.clone().unwrap_or_else(|| d.name.to_string());

        let curve = build_curve(&d, c).map_err(|e| match e {
            ControlError::Configuration(msg) => ControlError::config(format!("{}: {}", name, msg)),
            other => other,
        })?;

        let core = ZoneCore::new(
            name,
            c.ipmi_zones.clone().unwrap_or_else(|| vec![d.ipmi_zone]),
            polling(c.polling.unwrap_or(d.polling))?,
            FanController::new(curve, c.hysteresis.unwrap_or(d.hysteresis), c.temp_calc)?,
        )?;

        Ok(match kind {
            ZoneKind::Cpu => Zone::Cpu(SensorZone::new(core, c.sensors.clone())?),
            ZoneKind::Gpu => Zone::Gpu(SensorZone::new(core, c.sensors.clone())?),
            ZoneKind::Hd => {
                let guard = &c.standby_guard;
                let mut hd = HdZone::new(core, c.sensors.clone(), guard.enabled.then_some(guard.confirmations))?;
                if let Some(limit) = guard.standby_hd_limit {
                    hd = hd.with_standby_limit(limit)?;
                }
                Zone::Hd(hd)
            }
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Zone::Cpu(_) => "CPU",
            Zone::Gpu(_) => "GPU",
            Zone::Hd(_) => "HD",
            Zone::Const(_) => "CONST",
        }
    }

    fn core(&self) -> Option<&ZoneCore> {
        match self {
            Zone::Cpu(z) | Zone::Gpu(z) => Some(z.core()),
            Zone::Hd(z) => Some(z.core()),
            Zone::Const(_) => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Zone::Cpu(z) | Zone::Gpu(z) => z.core().name(),
            Zone::Hd(z) => z.core().name(),
            Zone::Const(z) => z.name(),
        }
    }

    pub fn polling(&self) -> Duration {
        match self {
            Zone::Cpu(z) | Zone::Gpu(z) => z.core().polling,
            Zone::Hd(z) => z.core().polling,
            Zone::Const(z) => z.polling(),
        }
    }

    pub fn ipmi_zones(&self) -> &[u8] {
        match self {
            Zone::Cpu(z) | Zone::Gpu(z) => &z.core().ipmi_zones,
            Zone::Hd(z) => &z.core().ipmi_zones,
            Zone::Const(z) => z.ipmi_zones(),
        }
    }

    /// Current fan level of the zone in percent.
    pub fn level(&self) -> u8 {
        match self {
            Zone::Cpu(z) | Zone::Gpu(z) => z.core().level(),
            Zone::Hd(z) => z.core().level(),
            Zone::Const(z) => z.level(),
        }
    }

    pub fn sensors(&self) -> &[String] {
        match self {
            Zone::Cpu(z) | Zone::Gpu(z) => z.sensors(),
            Zone::Hd(z) => z.devices(),
            Zone::Const(_) => &[],
        }
    }

    /// Compute this cycle's fan level. On `ZoneRead` the zone level is left unchanged.
    pub async fn poll(&mut self, source: &dyn SensorSource) -> Result<u8> {
        match self {
            Zone::Cpu(z) | Zone::Gpu(z) => z.poll(source).await,
            Zone::Hd(z) => z.poll(source).await,
            Zone::Const(z) => Ok(z.poll()),
        }
    }

    /// Log the resolved zone settings (INIT).
    pub fn describe(&self) {
        debug!("{} zone '{}' initialized with:", self.kind(), self.name());
        debug!("   ipmi_zones = {:?}", self.ipmi_zones());
        debug!("   polling = {:.1}s", self.polling().as_secs_f64());
        if let Some(core) = self.core() {
            let c = &core.controller;
            debug!("   sensors = {:?}", self.sensors());
            debug!("   temp_calc = {:?}, hysteresis = {:.1}°C", c.aggregation(), c.hysteresis());
            for (t, l) in c.curve().mapping_table() {
                debug!("   {:.1}°C -> {}%", t, l);
            }
        } else {
            debug!("   level = {}%", self.level());
        }
    }
}

/// Explicit breakpoints win over the min/max settings. Default steps only apply to the min/max form.
fn build_curve(d: &KindDefaults, c: &ThermalZoneConfig) -> Result<FanCurve> {
    let (curve, steps) = match &c.curve {
        Some(points) => (FanCurve::new(points.clone())?, c.steps.unwrap_or(0)),
        None => (
            FanCurve::linear(
                c.min_temp.unwrap_or(d.min_temp),
                c.max_temp.unwrap_or(d.max_temp),
                c.min_level.unwrap_or(d.min_level),
                c.max_level.unwrap_or(d.max_level),
            )?,
            c.steps.unwrap_or(d.steps),
        ),
    };
    match steps {
        0 => Ok(curve),
        s => curve.with_steps(s),
    }
}

fn polling(value: f64) -> Result<Duration> {
    if value <= 0.0 {
        return Err(ControlError::config(format!("polling interval must be > 0, got {}", value)));
    }
    seconds("polling", value)
}

/// State shared by every thermal zone: identity, schedule and controller.
#[derive(Debug)]
pub struct ZoneCore {
    name: String,
    ipmi_zones: Vec<u8>,
    polling: Duration,
    controller: FanController,
    level: u8,
}

impl ZoneCore {
    pub fn new(name: impl Into<String>, ipmi_zones: Vec<u8>, polling: Duration, controller: FanController) -> Result<Self> {
        let name = name.into();
        if ipmi_zones.is_empty() {
            return Err(ControlError::config(format!("{}: ipmi_zones is empty", name)));
        }
        if polling.is_zero() {
            return Err(ControlError::config(format!("{}: polling interval must be > 0", name)));
        }
        // Until the first reading the zone runs at full curve output
        let level = controller.curve().max_level();
        Ok(Self {
            name,
            ipmi_zones,
            polling,
            controller,
            level,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn controller(&self) -> &FanController {
        &self.controller
    }

    /// Idle zone with nothing to read: run at the bottom of the curve.
    fn idle(&mut self) -> u8 {
        let level = self.controller.curve().min_level();
        self.controller.hold(level);
        if level != self.level {
            info!("{}: idle, no readings > {}%", self.name, level);
        }
        self.level = level;
        level
    }

    /// Feed one cycle's samples through the controller and adopt the result.
    fn update(&mut self, samples: &[f64]) -> Result<u8> {
        let level = self.controller.compute(samples)?;
        let temp = self.controller.last_temp().unwrap_or_default();
        if level != self.level {
            info!("{}: new level > {:.1}°C > {}%", self.name, temp, level);
        } else {
            debug!("{}: {:.1}°C > {}%", self.name, temp, level);
        }
        self.level = level;
        Ok(level)
    }
}
