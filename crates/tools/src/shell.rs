//! Shell tool: run allowlisted commands inside the sandbox.

use async_trait::async_trait;
use chimera_core::error::ToolError;
use chimera_core::tool::{ParamSpec, Tool, ToolArgs, ToolResult, ToolSpec};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::args::required_str;
use crate::process;
use crate::sandbox::Sandbox;

/// Execute shell commands with safety constraints.
pub struct ShellTool {
    sandbox: Sandbox,
    /// If non-empty, only these commands are allowed.
    allowed_commands: Vec<String>,
    timeout: Duration,
    spec: ToolSpec,
}

impl ShellTool {
    pub fn new(sandbox: Sandbox, allowed_commands: Vec<String>, timeout: Duration) -> Self {
        let spec = ToolSpec::single(
            "shell",
            "Run a shell command in the sandbox directory and return stdout/stderr.",
            vec![ParamSpec::required("command", "The command line to execute")],
        )
        .terminal();
        Self {
            sandbox,
            allowed_commands,
            timeout,
            spec,
        }
    }

    /// Every segment of a pipeline or command list must start with an allowed command.
    fn is_command_allowed(&self, command: &str) -> bool {
        if self.allowed_commands.is_empty() {
            return true; // No allowlist = all commands allowed
        }

        command
            .split(['|', ';', '&', '\n'])
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .all(|segment| {
                let base = segment.split_whitespace().next().unwrap_or("");
                self.allowed_commands.iter().any(|a| a == base)
            })
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    fn timeout(&self) -> Option<Duration> {
        Some(self.timeout + Duration::from_secs(5))
    }

    async fn execute(&self, _operation: &str, args: ToolArgs) -> Result<ToolResult, ToolError> {
        let command = required_str(&args, "command")?;

        if command.contains('`') || command.contains("$(") {
            return Err(ToolError::PermissionDenied {
                tool_name: "shell".into(),
                reason: "command substitution is not allowed".into(),
            });
        }

        if !self.is_command_allowed(command) {
            return Err(ToolError::PermissionDenied {
                tool_name: "shell".into(),
                reason: format!(
                    "'{}' is not in the allowlist ({})",
                    command.split_whitespace().next().unwrap_or(""),
                    self.allowed_commands.join(", ")
                ),
            });
        }

        debug!(command = %command, "Executing shell command");

        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", command]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command]);
            c
        };
        cmd.current_dir(self.sandbox.root());

        process::run(cmd, self.timeout, "shell").await
    }
}
