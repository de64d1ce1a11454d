//! Python execution tool: run inline code or a script file from the sandbox.
//!
//! The interpreter runs with the sandbox root as its working directory and is
//! killed when the configured timeout elapses.

use async_trait::async_trait;
use chimera_core::error::ToolError;
use chimera_core::tool::{OperationSpec, ParamSpec, Tool, ToolArgs, ToolResult, ToolSpec};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::args::{required_str, string_list};
use crate::process;
use crate::sandbox::Sandbox;

pub struct CodeExecTool {
    sandbox: Sandbox,
    interpreter: String,
    timeout: Duration,
    spec: ToolSpec,
}

impl CodeExecTool {
    pub fn new(sandbox: Sandbox, interpreter: impl Into<String>, timeout: Duration) -> Self {
        let spec = ToolSpec::multi(
            "execute_python",
            "Run Python in the sandbox directory. Print anything you need to see; only stdout and stderr come back.",
            vec![
                OperationSpec::new(
                    "run_code",
                    "Execute a snippet of Python code.",
                    vec![ParamSpec::required("code", "Python source to run")],
                ),
                OperationSpec::new(
                    "execute_script",
                    "Execute a .py file that already exists in the sandbox.",
                    vec![
                        ParamSpec::required("filename", "Script path relative to the sandbox"),
                        ParamSpec::optional("args", "Command-line arguments (list of strings)"),
                    ],
                ),
            ],
        )
        .terminal();

        Self {
            sandbox,
            interpreter: interpreter.into(),
            timeout,
            spec,
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.interpreter);
        cmd.current_dir(self.sandbox.root());
        cmd
    }
}

#[async_trait]
impl Tool for CodeExecTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    // Leave room for the process timeout to fire first and report cleanly.
    fn timeout(&self) -> Option<Duration> {
        Some(self.timeout + Duration::from_secs(5))
    }

    async fn execute(&self, operation: &str, args: ToolArgs) -> Result<ToolResult, ToolError> {
        let mut cmd = self.command();
        match operation {
            "run_code" => {
                let code = required_str(&args, "code")?;
                debug!(bytes = code.len(), "Running inline code");
                cmd.arg("-c").arg(code);
            }
            "execute_script" => {
                let filename = required_str(&args, "filename")?;
                let path = self.sandbox.resolve(filename)?;
                if !path.is_file() {
                    return Ok(ToolResult::failed(format!(
                        "Script '{filename}' not found in the sandbox. Write it with the filesystem tool first."
                    )));
                }
                let script_args = string_list(&args, "args");
                debug!(script = %filename, args = ?script_args, "Running script");
                cmd.arg(&path).args(script_args);
            }
            other => return Err(ToolError::InvalidArguments(format!("Unsupported operation '{other}'"))),
        }

        process::run(cmd, self.timeout, &self.spec.name).await
    }
}
