//! Subprocess executor for ipmitool and smartctl.
//! Every invocation is bounded by a timeout; the child is killed if it overruns.

use std::process::Stdio;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tracing::trace;

/// Captured result of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Build a Command from a program path, optional extra parameters (split on whitespace) and arguments.
pub fn build_command(program: &str, extra: &str, args: &[&str]) -> std::process::Command {
    let mut cmd = std::process::Command::new(program);
    cmd.args(extra.split_whitespace());
    cmd.args(args);
    cmd
}

/// Run a command to completion, failing if it exceeds `timeout`.
/// A non-zero exit status is not an error here; callers decide what it means.
pub async fn run_with_timeout(cmd: std::process::Command, timeout: Duration) -> Result<CommandOutput> {
    let program = cmd.get_program().to_string_lossy().to_string();
    trace!("Executing: {} {:?}", program, cmd.get_args().collect::<Vec<_>>());

    let mut cmd = tokio::process::Command::from(cmd);
    cmd.stdin(Stdio::null()).kill_on_drop(true);

    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| anyhow!("{} timed out after {:.1}s", program, timeout.as_secs_f64()))?
        .with_context(|| format!("Failed to execute {}", program))?;

    Ok(CommandOutput {
        status: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

/// Run a command and require exit status 0, returning stdout.
pub async fn run_checked(cmd: std::process::Command, timeout: Duration) -> Result<String> {
    let program = cmd.get_program().to_string_lossy().to_string();
    let output = run_with_timeout(cmd, timeout).await?;
    if !output.success() {
        return Err(anyhow!(
            "{} failed ({}): {}",
            program,
            output.status.map_or("killed".to_string(), |c| format!("exit {}", c)),
            output.stderr.trim()
        ));
    }
    Ok(output.stdout)
}
