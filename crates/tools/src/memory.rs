//! Memory tool: lets the agent store facts and recall them in later objectives.

use async_trait::async_trait;
use chimera_core::error::ToolError;
use chimera_core::memory::{MemoryBackend, MemoryEntry, MemoryQuery};
use chimera_core::tool::{OperationSpec, ParamSpec, Tool, ToolArgs, ToolResult, ToolSpec};
use std::sync::Arc;
use tracing::debug;

use crate::args::{optional_usize, required_str};

pub struct MemoryTool {
    backend: Arc<dyn MemoryBackend>,
    default_limit: usize,
    spec: ToolSpec,
}

impl MemoryTool {
    pub fn new(backend: Arc<dyn MemoryBackend>, default_limit: usize) -> Self {
        let spec = ToolSpec::multi(
            "memory",
            "Long-term memory that persists between objectives.",
            vec![
                OperationSpec::new(
                    "remember",
                    "Store a fact for later.",
                    vec![ParamSpec::required("fact", "A self-contained statement worth keeping")],
                ),
                OperationSpec::new(
                    "recall",
                    "Look up stored facts related to a query.",
                    vec![
                        ParamSpec::required("query", "What you want to know"),
                        ParamSpec::optional("num_results", "Maximum facts to return (default 3)"),
                    ],
                ),
            ],
        );
        Self {
            backend,
            default_limit: default_limit.max(1),
            spec,
        }
    }

    fn storage_error(e: impl std::fmt::Display) -> ToolError {
        ToolError::ExecutionFailed {
            tool_name: "memory".into(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl Tool for MemoryTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, operation: &str, args: ToolArgs) -> Result<ToolResult, ToolError> {
        match operation {
            "remember" => {
                let fact = required_str(&args, "fact")?.trim();
                if fact.is_empty() {
                    return Err(ToolError::InvalidArguments("'fact' must not be empty".into()));
                }
                let entry = MemoryEntry::new(fact).with_source("agent");
                self.backend.store(entry).await.map_err(Self::storage_error)?;
                debug!(backend = self.backend.name(), "Fact stored");
                Ok(ToolResult::ok(format!("Remembered: {fact}")))
            }
            "recall" => {
                let query = required_str(&args, "query")?;
                let limit = optional_usize(&args, "num_results").unwrap_or(self.default_limit).max(1);
                let hits = self
                    .backend
                    .search(MemoryQuery::new(query, limit))
                    .await
                    .map_err(Self::storage_error)?;

                if hits.is_empty() {
                    return Ok(ToolResult::ok(format!("No memories found related to '{query}'.")));
                }
                let lines: Vec<String> = hits.iter().map(|h| format!("- {}", h.content)).collect();
                Ok(ToolResult::ok(format!("Recalled memories:\n{}", lines.join("\n"))))
            }
            other => Err(ToolError::InvalidArguments(format!("Unsupported operation '{other}'"))),
        }
    }
}
