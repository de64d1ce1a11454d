//! Filesystem tool: write, read, peek, list and delete inside the sandbox.

use async_trait::async_trait;
use chimera_core::error::ToolError;
use chimera_core::tool::{OperationSpec, ParamSpec, Tool, ToolArgs, ToolResult, ToolSpec};
use serde_json::Value;
use tracing::debug;
use walkdir::WalkDir;

use crate::args::{optional_bool, optional_str, optional_usize, required_str};
use crate::sandbox::Sandbox;

const DEFAULT_PEEK_LINES: usize = 10;
const MAX_LIST_ENTRIES: usize = 500;

pub struct FilesystemTool {
    sandbox: Sandbox,
    spec: ToolSpec,
}

impl FilesystemTool {
    pub fn new(sandbox: Sandbox) -> Self {
        let spec = ToolSpec::multi(
            "filesystem",
            "Create, inspect and remove files in the sandbox. All paths are relative to the sandbox root.",
            vec![
                OperationSpec::new(
                    "write",
                    "Create or overwrite a file.",
                    vec![
                        ParamSpec::required("filename", "Path of the file to write"),
                        ParamSpec::required("content", "Text to write (a list of lines is joined with newlines)"),
                    ],
                ),
                OperationSpec::new(
                    "read",
                    "Return the full text of a file.",
                    vec![ParamSpec::required("filename", "Path of the file to read")],
                ),
                OperationSpec::new(
                    "peek",
                    "Return the first lines of a file. Use this for large files.",
                    vec![
                        ParamSpec::required("filename", "Path of the file"),
                        ParamSpec::optional("lines", "Number of lines (default 10)"),
                    ],
                ),
                OperationSpec::new(
                    "list",
                    "List files and directories.",
                    vec![
                        ParamSpec::optional("path", "Directory to list (default: sandbox root)"),
                        ParamSpec::optional("recursive", "Descend into subdirectories (default false)"),
                    ],
                ),
                OperationSpec::new(
                    "delete",
                    "Delete a file or an empty directory.",
                    vec![ParamSpec::required("filename", "Path to delete")],
                ),
            ],
        );
        Self { sandbox, spec }
    }

    async fn write(&self, args: &ToolArgs) -> Result<ToolResult, ToolError> {
        let filename = required_str(args, "filename")?;
        let content = args
            .get("content")
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'content' argument".into()))
            .map(content_to_text)?;
        let path = self.sandbox.resolve(filename)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| self.failed(e))?;
        }
        tokio::fs::write(&path, &content).await.map_err(|e| self.failed(e))?;

        Ok(ToolResult::ok(format!(
            "Successfully wrote {} bytes to '{}'.",
            content.len(),
            self.sandbox.display(&path)
        )))
    }

    async fn read(&self, args: &ToolArgs) -> Result<ToolResult, ToolError> {
        let filename = required_str(args, "filename")?;
        let path = self.sandbox.resolve(filename)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(ToolResult::ok(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(ToolResult::failed(format!("File '{filename}' not found.")))
            }
            Err(e) => Err(self.failed(e)),
        }
    }

    async fn peek(&self, args: &ToolArgs) -> Result<ToolResult, ToolError> {
        let filename = required_str(args, "filename")?;
        let lines = optional_usize(args, "lines").unwrap_or(DEFAULT_PEEK_LINES).max(1);
        let path = self.sandbox.resolve(filename)?;

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ToolResult::failed(format!("File '{filename}' not found.")));
            }
            Err(e) => return Err(self.failed(e)),
        };

        let head: Vec<&str> = content.lines().take(lines).collect();
        Ok(ToolResult::ok(format!(
            "First {} line(s) of '{filename}':\n{}",
            head.len(),
            head.join("\n")
        )))
    }

    async fn list(&self, args: &ToolArgs) -> Result<ToolResult, ToolError> {
        let dir = self.sandbox.resolve(optional_str(args, "path").unwrap_or("."))?;
        let recursive = optional_bool(args, "recursive").unwrap_or(false);

        if !dir.is_dir() {
            return Ok(ToolResult::failed(format!(
                "'{}' is not a directory.",
                self.sandbox.display(&dir)
            )));
        }

        let sandbox = self.sandbox.clone();
        let listing = tokio::task::spawn_blocking(move || {
            let walker = WalkDir::new(&dir)
                .min_depth(1)
                .max_depth(if recursive { usize::MAX } else { 1 })
                .sort_by_file_name();
            let mut entries = Vec::new();
            for entry in walker.into_iter().filter_map(Result::ok).take(MAX_LIST_ENTRIES) {
                let mut name = sandbox.display(entry.path());
                if entry.file_type().is_dir() {
                    name.push('/');
                }
                entries.push(name);
            }
            entries
        })
        .await
        .map_err(|e| ToolError::ExecutionFailed {
            tool_name: "filesystem".into(),
            reason: e.to_string(),
        })?;

        if listing.is_empty() {
            return Ok(ToolResult::ok("The directory is empty."));
        }
        Ok(ToolResult::ok(listing.join("\n")))
    }

    async fn delete(&self, args: &ToolArgs) -> Result<ToolResult, ToolError> {
        let filename = required_str(args, "filename")?;
        let path = self.sandbox.resolve(filename)?;
        if path == self.sandbox.root() {
            return Err(ToolError::PermissionDenied {
                tool_name: "filesystem".into(),
                reason: "the sandbox root cannot be deleted".into(),
            });
        }

        let result = if path.is_dir() {
            tokio::fs::remove_dir(&path).await
        } else {
            tokio::fs::remove_file(&path).await
        };
        match result {
            Ok(()) => Ok(ToolResult::ok(format!("Deleted '{filename}'."))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(ToolResult::failed(format!("File '{filename}' not found.")))
            }
            Err(e) => Err(self.failed(e)),
        }
    }

    fn failed(&self, e: std::io::Error) -> ToolError {
        ToolError::ExecutionFailed {
            tool_name: "filesystem".into(),
            reason: e.to_string(),
        }
    }
}

/// Normalize the `content` argument of `write` to text.
///
/// A string is written as-is. A list of strings is joined with `\n`; models
/// often send file bodies line by line. Anything else is written as
/// pretty-printed JSON.
pub fn content_to_text(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Array(items) if items.iter().all(Value::is_string) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Null => String::new(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

#[async_trait]
impl Tool for FilesystemTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, operation: &str, args: ToolArgs) -> Result<ToolResult, ToolError> {
        debug!(operation, "Filesystem operation");
        match operation {
            "write" => self.write(&args).await,
            "read" => self.read(&args).await,
            "peek" => self.peek(&args).await,
            "list" => self.list(&args).await,
            "delete" => self.delete(&args).await,
            other => Err(ToolError::InvalidArguments(format!("Unsupported operation '{other}'"))),
        }
    }
}
