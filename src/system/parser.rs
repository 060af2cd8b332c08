//! Output parsers for ipmitool raw replies, smartctl reports and hwmon files.

/// Parse a single-byte ipmitool raw reply (" 32\n" -> 0x32).
pub fn parse_raw_byte(reply: &str) -> Option<u8> {
    let token = reply.split_whitespace().next()?;
    u8::from_str_radix(token.trim_start_matches("0x"), 16).ok()
}

/// Parse a hwmon `temp*_input` value in millidegrees Celsius.
pub fn parse_millidegrees(content: &str) -> Option<f64> {
    let value: i64 = content.trim().parse().ok()?;
    Some(value as f64 / 1000.0)
}

/// `smartctl -i -n standby` prints "Device is in STANDBY mode" and exits early for sleeping drives.
pub fn smartctl_reports_standby(stdout: &str) -> bool {
    stdout.contains("STANDBY")
}

/// Extract the drive temperature from `smartctl -A` output.
///
/// Handles ATA attributes 194/190 (raw value column), SAS "Current Drive
/// Temperature" and NVMe "Temperature:" lines.
pub fn parse_smartctl_temperature(stdout: &str) -> Option<f64> {
    let mut airflow = None;

    for line in stdout.lines() {
        let trimmed = line.trim();

        if let Some(rest) = trimmed.strip_prefix("Current Drive Temperature:") {
            return first_number(rest);
        }
        if let Some(rest) = trimmed.strip_prefix("Temperature:") {
            return first_number(rest);
        }

        let cols: Vec<&str> = trimmed.split_whitespace().collect();
        if cols.len() >= 10 {
            match cols[0] {
                "194" => return first_number(cols[9]),
                "190" => airflow = airflow.or_else(|| first_number(cols[9])),
                _ => {}
            }
        }
    }

    airflow
}

fn first_number(s: &str) -> Option<f64> {
    let token: String = s
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    token.parse().ok()
}
