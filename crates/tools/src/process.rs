//! Child-process execution shared by the script and shell tools.

use chimera_core::error::ToolError;
use chimera_core::tool::ToolResult;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Run `command` to completion, killing it if `timeout` elapses first.
///
/// Exit status decides success; stdout is always reported and stderr is
/// attached whenever it is non-empty.
pub(crate) async fn run(mut command: Command, timeout: Duration, tool_name: &str) -> Result<ToolResult, ToolError> {
    command.kill_on_drop(true);

    let output = match tokio::time::timeout(timeout, command.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            return Err(ToolError::ExecutionFailed {
                tool_name: tool_name.into(),
                reason: format!("failed to start process: {e}"),
            });
        }
        Err(_) => {
            warn!(tool = tool_name, timeout_secs = timeout.as_secs(), "Process killed after timeout");
            return Err(ToolError::Timeout {
                tool_name: tool_name.into(),
                timeout_secs: timeout.as_secs(),
            });
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();

    if output.status.success() {
        debug!(tool = tool_name, "Process exited cleanly");
        let text = match (stdout.is_empty(), stderr.is_empty()) {
            (true, true) => "Process finished with no output.".to_string(),
            (false, true) => stdout,
            (true, false) => format!("[stderr]:\n{stderr}"),
            (false, false) => format!("{stdout}\n[stderr]:\n{stderr}"),
        };
        Ok(ToolResult::ok(text))
    } else {
        let code = output.status.code().unwrap_or(-1);
        warn!(tool = tool_name, exit_code = code, "Process failed");
        Ok(ToolResult::failed(format!(
            "Process exited with code {code}.\nSTDOUT:\n{stdout}\nSTDERR:\n{stderr}"
        )))
    }
}
