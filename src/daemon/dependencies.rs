//! Runtime dependency check: ipmitool, temperature kernel modules, smartctl.

use std::path::Path;

use tracing::debug;

use crate::config::types::{DaemonConfig, ZoneConfig};
use crate::error::{ControlError, Result};

const PROC_MODULES: &str = "/proc/modules";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    pub name: &'static str,
    pub ok: bool,
    pub detail: String,
}

fn module_loaded(modules: &str, name: &str) -> bool {
    modules.lines().any(|line| line.split_whitespace().next() == Some(name))
}

/// Evaluate every dependency the enabled zones need, given the `/proc/modules` text.
pub fn evaluate(config: &DaemonConfig, modules: &str) -> Vec<Check> {
    let mut checks = Vec::new();
    let enabled = || config.zones.iter().filter(|z| z.enabled());

    let ipmitool = Path::new(&config.ipmi.command).exists();
    checks.push(Check {
        name: "ipmitool",
        ok: ipmitool,
        detail: if ipmitool {
            config.ipmi.command.clone()
        } else {
            format!("ipmitool command cannot be found ({})", config.ipmi.command)
        },
    });

    if enabled().any(|z| matches!(z, ZoneConfig::Cpu(_))) {
        let found = ["coretemp", "k10temp"].into_iter().find(|m| module_loaded(modules, m));
        checks.push(Check {
            name: "CPU sensors",
            ok: found.is_some(),
            detail: match found {
                Some(m) => format!("{} kernel module loaded", m),
                None => "coretemp or k10temp kernel module must be loaded".to_string(),
            },
        });
    }

    if enabled().any(|z| matches!(z, ZoneConfig::Hd(_))) {
        let drivetemp = module_loaded(modules, "drivetemp");
        let smartctl = Path::new(&config.service.smartctl_path).exists();
        checks.push(Check {
            name: "Disk sensors",
            ok: drivetemp || smartctl,
            detail: match (drivetemp, smartctl) {
                (true, true) => format!("drivetemp loaded, smartctl at {}", config.service.smartctl_path),
                (true, false) => "drivetemp loaded".to_string(),
                (false, true) => format!("smartctl at {}", config.service.smartctl_path),
                (false, false) => format!(
                    "drivetemp kernel module must be loaded or smartctl must be installed ({})",
                    config.service.smartctl_path
                ),
            },
        });
    }

    checks
}

fn read_modules() -> String {
    std::fs::read_to_string(PROC_MODULES).unwrap_or_else(|e| {
        debug!("Cannot read {}: {}", PROC_MODULES, e);
        String::new()
    })
}

/// INIT-time check: the first missing dependency is fatal.
pub fn check_dependencies(config: &DaemonConfig) -> Result<()> {
    match evaluate(config, &read_modules()).into_iter().find(|c| !c.ok) {
        Some(failed) => Err(ControlError::Dependency(failed.detail)),
        None => Ok(()),
    }
}

/// `--check`: print every dependency with its status. Returns true if all are present.
pub fn run_health_check(config_path: &Path, config: &DaemonConfig) -> bool {
    println!("\x1b[32mpankha-zoned v{} ({})\x1b[0m", env!("CARGO_PKG_VERSION"), std::env::consts::ARCH);
    println!("Dependency Check");
    println!("================\n");

    println!("✓ Config file: {}", config_path.display());
    for zone in &config.zones {
        if let Some((kind, z)) = zone.thermal() {
            let state = if z.enabled { "enabled" } else { "disabled" };
            println!("  {:?} zone ({}): {} sensor(s)", kind, state, z.sensors.len());
        }
    }

    #[cfg(unix)]
    {
        if unsafe { libc::geteuid() } == 0 {
            println!("✓ Running as root");
        } else {
            println!("⚠ Not running as root: ipmitool and smartctl usually need it");
        }
    }

    let checks = evaluate(config, &read_modules());
    for check in &checks {
        let mark = if check.ok { "✓" } else { "✗" };
        println!("{} {}: {}", mark, check.name, check.detail);
    }

    let all_ok = checks.iter().all(|c| c.ok);
    println!();
    if all_ok {
        println!("All dependencies are available.");
    } else {
        println!("Some dependencies are missing.");
    }
    all_ok
}
