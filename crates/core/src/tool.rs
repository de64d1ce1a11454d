//! Tool trait and registry: the agent's capabilities and how actions reach them.
//!
//! Every tool publishes a static [`ToolSpec`]: its operations and the
//! parameters each operation declares. The registry uses that table to
//! resolve the operation, drop arguments the model invented, and bound the
//! call with a timeout. Whatever happens inside the tool, [`ToolRegistry::dispatch`]
//! comes back with a [`DispatchOutcome`] the loop can feed to the model.

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tracing::{debug, warn};
use crate::error::ToolError;

/// Reserved tool identifier that ends the objective.
pub const FINISH_TOOL: &str = "respond_to_user";

/// Final answer used when `respond_to_user` arrives without a `text` argument.
pub const FINISH_FALLBACK: &str = "Objective complete.";

/// Key that selects the operation of a multi-operation tool.
pub const OPERATION_KEY: &str = "operation";

/// Applied to tools that do not declare their own timeout.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(120);

/// Named arguments as decoded from the model's action.
pub type ToolArgs = serde_json::Map<String, Value>;

/// One declared parameter of an operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub required: bool,
    pub description: String,
}

impl ParamSpec {
    pub fn required(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
            description: description.into(),
        }
    }

    pub fn optional(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
            description: description.into(),
        }
    }
}

/// One invocable operation of a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationSpec {
    pub name: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
}

impl OperationSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>, params: Vec<ParamSpec>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params,
        }
    }

    pub fn declares(&self, key: &str) -> bool {
        self.params.iter().any(|p| p.name == key)
    }
}

/// Static description of a tool, built once when the tool is constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub operations: Vec<OperationSpec>,

    /// Output belongs on the terminal channel (script and shell runs).
    #[serde(default)]
    pub terminal_output: bool,
}

impl ToolSpec {
    /// A single-method tool. Its one operation shares the tool's name.
    pub fn single(name: impl Into<String>, description: impl Into<String>, params: Vec<ParamSpec>) -> Self {
        let name = name.into();
        let description = description.into();
        Self {
            operations: vec![OperationSpec::new(name.clone(), description.clone(), params)],
            name,
            description,
            terminal_output: false,
        }
    }

    /// A tool whose calls must name one of several operations.
    pub fn multi(name: impl Into<String>, description: impl Into<String>, operations: Vec<OperationSpec>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            operations,
            terminal_output: false,
        }
    }

    pub fn terminal(mut self) -> Self {
        self.terminal_output = true;
        self
    }

    pub fn is_multi_operation(&self) -> bool {
        self.operations.len() > 1
    }

    pub fn operation(&self, name: &str) -> Option<&OperationSpec> {
        self.operations.iter().find(|op| op.name == name)
    }

    pub fn operation_names(&self) -> Vec<&str> {
        self.operations.iter().map(|op| op.name.as_str()).collect()
    }
}

/// What a tool reports back after running.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the tool did what was asked
    pub success: bool,

    /// Text shown to the model as the observation
    pub output: String,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    /// The tool ran but the work failed (non-zero exit, HTTP error, ...).
    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
        }
    }
}

/// The core Tool trait.
///
/// Implementations receive arguments that have already been filtered down
/// to the selected operation's declared parameters. Required parameters are
/// not synthesized: a tool reports a missing one as an error.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Static operation and parameter table.
    fn spec(&self) -> &ToolSpec;

    /// The unique name of this tool (e.g., "filesystem", "shell").
    fn name(&self) -> &str {
        &self.spec().name
    }

    /// Per-call time limit. `None` defers to the registry default.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    /// Run one operation.
    async fn execute(&self, operation: &str, args: ToolArgs) -> std::result::Result<ToolResult, ToolError>;
}

/// Result of routing one action through the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Explicit success flag; failure is never inferred from the text.
    pub succeeded: bool,

    /// Text appended to the history as the observation.
    pub observation: String,

    /// Set when the action was `respond_to_user`: the final answer.
    pub finished: Option<String>,

    /// Copied from the tool's spec so presenters can route the output.
    pub terminal_output: bool,
}

impl DispatchOutcome {
    fn success(observation: String, terminal_output: bool) -> Self {
        Self {
            succeeded: true,
            observation,
            finished: None,
            terminal_output,
        }
    }

    fn failure(observation: impl Into<String>, terminal_output: bool) -> Self {
        let observation = observation.into();
        let observation = if observation.starts_with("Error:") {
            observation
        } else {
            format!("Error: {observation}")
        };
        Self {
            succeeded: false,
            observation,
            finished: None,
            terminal_output,
        }
    }

    fn finish(text: String) -> Self {
        Self {
            succeeded: true,
            observation: text.clone(),
            finished: Some(text),
            terminal_output: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished.is_some()
    }
}

/// Drop every argument the operation does not declare.
///
/// Applying this twice yields the same map as applying it once.
pub fn filter_arguments(operation: &OperationSpec, args: ToolArgs) -> ToolArgs {
    args.into_iter()
        .filter(|(key, _)| {
            let keep = operation.declares(key);
            if !keep {
                debug!(operation = %operation.name, argument = %key, "Dropping undeclared argument");
            }
            keep
        })
        .collect()
}

/// A registry of available tools.
///
/// The agent loop uses this to:
/// 1. Describe the tool catalog in the system prompt
/// 2. Route each proposed action to the right tool and operation
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
    default_timeout: Duration,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            default_timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        if name == FINISH_TOOL {
            warn!("Refusing to register a tool under the reserved name '{FINISH_TOOL}'");
            return;
        }
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// All tool specs, sorted by name.
    pub fn specs(&self) -> Vec<&ToolSpec> {
        let mut specs: Vec<&ToolSpec> = self.tools.values().map(|t| t.spec()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// List all registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Route one action to its tool and run it.
    ///
    /// Never fails: unknown tools, bad operations, tool errors, panics and
    /// timeouts all come back as an outcome with `succeeded == false`.
    pub async fn dispatch(&self, tool_id: &str, mut args: ToolArgs) -> DispatchOutcome {
        if tool_id == FINISH_TOOL {
            let text = args
                .remove("text")
                .and_then(|v| match v {
                    Value::String(s) => Some(s),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| FINISH_FALLBACK.to_string());
            return DispatchOutcome::finish(text);
        }

        let Some(tool) = self.tools.get(tool_id) else {
            debug!(tool = %tool_id, "Action names an unregistered tool");
            return DispatchOutcome::failure(ToolError::NotFound(tool_id.to_string()).to_string(), false);
        };

        let spec = tool.spec();
        let operation = match resolve_operation(spec, &mut args) {
            Ok(op) => op,
            Err(e) => return DispatchOutcome::failure(e.to_string(), spec.terminal_output),
        };
        let args = filter_arguments(operation, args);

        let timeout = tool.timeout().unwrap_or(self.default_timeout);
        debug!(tool = %spec.name, operation = %operation.name, timeout_secs = timeout.as_secs(), "Dispatching action");

        let call = AssertUnwindSafe(tool.execute(&operation.name, args)).catch_unwind();
        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(Ok(result))) if result.success => {
                DispatchOutcome::success(result.output, spec.terminal_output)
            }
            Ok(Ok(Ok(result))) => DispatchOutcome::failure(result.output, spec.terminal_output),
            Ok(Ok(Err(e))) => {
                debug!(tool = %spec.name, error = %e, "Tool returned an error");
                DispatchOutcome::failure(e.to_string(), spec.terminal_output)
            }
            Ok(Err(panic)) => {
                let reason = panic_message(panic.as_ref());
                warn!(tool = %spec.name, %reason, "Tool panicked");
                let err = ToolError::ExecutionFailed {
                    tool_name: spec.name.clone(),
                    reason: format!("tool panicked: {reason}"),
                };
                DispatchOutcome::failure(err.to_string(), spec.terminal_output)
            }
            Err(_) => {
                warn!(tool = %spec.name, timeout_secs = timeout.as_secs(), "Tool timed out");
                let err = ToolError::Timeout {
                    tool_name: spec.name.clone(),
                    timeout_secs: timeout.as_secs(),
                };
                DispatchOutcome::failure(err.to_string(), spec.terminal_output)
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Pick the operation for this call and strip the selector from `args`.
fn resolve_operation<'a>(spec: &'a ToolSpec, args: &mut ToolArgs) -> Result<&'a OperationSpec, ToolError> {
    let valid = || spec.operation_names().join(", ");

    if !spec.is_multi_operation() {
        let Some(only) = spec.operations.first() else {
            return Err(ToolError::UnknownOperation {
                tool_name: spec.name.clone(),
                operation: String::new(),
                valid: String::new(),
            });
        };
        // A redundant selector naming the sole operation is harmless.
        if args.get(OPERATION_KEY).and_then(Value::as_str) == Some(only.name.as_str()) {
            args.remove(OPERATION_KEY);
        }
        return Ok(only);
    }

    match args.remove(OPERATION_KEY) {
        None | Some(Value::Null) => Err(ToolError::MissingOperation {
            tool_name: spec.name.clone(),
            valid: valid(),
        }),
        Some(Value::String(name)) => spec.operation(&name).ok_or_else(|| ToolError::UnknownOperation {
            tool_name: spec.name.clone(),
            operation: name,
            valid: valid(),
        }),
        Some(other) => Err(ToolError::UnknownOperation {
            tool_name: spec.name.clone(),
            operation: other.to_string(),
            valid: valid(),
        }),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
