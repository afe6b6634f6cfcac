//! `SHELL_COMMAND`: run a command through `sh -c` in the workspace.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::tools::spec::{ParamType, ParamValue, ParameterSpec, SpecError, ToolArgs, ToolSpec};
use crate::tools::traits::{Tool, ToolError};

/// Commands that must never execute, whatever the model asks for.
const FORBIDDEN_PATTERNS: &[&str] = &[
    "rm -rf /",
    "rm -rf ~",
    "rm -rf *",
    ":(){",
    "kill -9 -1",
    "shutdown",
    "reboot",
    "dd if=",
    "mkfs",
    "> /dev/sd",
    "chmod -r 777 /",
];

/// Check if a command string matches a forbidden pattern.
fn is_forbidden(command: &str) -> bool {
    let lower = command.to_lowercase();
    FORBIDDEN_PATTERNS
        .iter()
        .any(|pat| lower.contains(&pat.to_lowercase()))
}

pub struct ShellCommandTool {
    spec: ToolSpec,
    working_dir: PathBuf,
    /// Configured ceiling. Requests may shorten the timeout, never extend it.
    max_timeout_secs: u64,
}

impl ShellCommandTool {
    pub fn new(working_dir: PathBuf, default_timeout_secs: u64) -> Result<Self, SpecError> {
        let default_timeout = i64::try_from(default_timeout_secs).unwrap_or(i64::MAX);
        let spec = ToolSpec::new(
            "SHELL_COMMAND",
            "Execute a shell command and return its output.",
            vec![
                ParameterSpec::required("command", ParamType::String, "The shell command to execute."),
                ParameterSpec::optional(
                    "timeout_secs",
                    ParamType::Integer,
                    "Seconds to wait before the command is killed (capped at the default).",
                )
                .with_default(ParamValue::Integer(default_timeout)),
            ],
        )?;

        Ok(Self {
            spec,
            working_dir,
            max_timeout_secs: default_timeout_secs,
        })
    }
}

#[async_trait]
impl Tool for ShellCommandTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let command = args.str("command")?;
        if command.trim().is_empty() {
            return Err(ToolError::InvalidInput("command cannot be empty".into()));
        }
        if is_forbidden(command) {
            warn!("Blocked forbidden command: {}", command);
            return Err(ToolError::Failed(format!(
                "Forbidden command blocked: {}",
                command
            )));
        }

        let timeout_secs = args.int("timeout_secs")?;
        if timeout_secs <= 0 {
            return Err(ToolError::InvalidInput(
                "timeout_secs must be a positive integer".into(),
            ));
        }
        let requested = u64::try_from(timeout_secs).unwrap_or(u64::MAX);
        let timeout_secs = requested.min(self.max_timeout_secs);
        if timeout_secs < requested {
            debug!(
                "Clamped requested timeout {}s to {}s",
                requested, timeout_secs
            );
        }

        debug!("Shell exec: {}", command);
        let child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.working_dir)
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(Duration::from_secs(timeout_secs), child)
            .await
            .map_err(|_| ToolError::Timeout(timeout_secs))??;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            let code = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".into());
            return Err(ToolError::Failed(format!(
                "Command failed with exit code {}. Error: {}",
                code,
                stderr.trim()
            )));
        }

        let mut result = String::new();
        if !stdout.is_empty() {
            result.push_str(&stdout);
        }
        if !stderr.is_empty() {
            if !result.is_empty() {
                result.push('\n');
            }
            result.push_str("[stderr] ");
            result.push_str(&stderr);
        }
        if result.is_empty() {
            result = "(exit code: 0)".into();
        }

        Ok(result)
    }
}
