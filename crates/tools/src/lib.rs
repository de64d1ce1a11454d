//! Built-in capabilities for Chimera.
//!
//! Tools give the agent the ability to act: manage files in its sandbox,
//! run Python and shell commands, search and read the web, download files,
//! and keep long-term memories.

mod args;
pub mod code_exec;
pub mod downloader;
pub mod filesystem;
pub mod memory;
mod process;
pub mod sandbox;
pub mod shell;
pub mod web_reader;
pub mod web_search;

use chimera_config::{MemoryConfig, ToolsConfig};
use chimera_core::memory::MemoryBackend;
use chimera_core::tool::ToolRegistry;
use std::sync::Arc;
use std::time::Duration;

pub use sandbox::Sandbox;

/// Build the HTTP client shared by the network tools.
pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent("Mozilla/5.0 (compatible; chimera-agent)")
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Falling back to a default HTTP client");
            reqwest::Client::new()
        })
}

/// Create a registry with every built-in tool, rooted at `tools.workspace_dir`.
///
/// Fails only if the sandbox directory cannot be created.
pub fn default_registry(
    tools: &ToolsConfig,
    memory_config: &MemoryConfig,
    memory: Arc<dyn MemoryBackend>,
) -> std::io::Result<ToolRegistry> {
    let sandbox = Sandbox::new(&tools.workspace_dir)?;
    tracing::debug!(root = %sandbox.root().display(), "Sandbox ready");

    let mut registry = ToolRegistry::new().with_default_timeout(tools.default_timeout());
    registry.register(Box::new(filesystem::FilesystemTool::new(sandbox.clone())));
    registry.register(Box::new(code_exec::CodeExecTool::new(
        sandbox.clone(),
        &tools.python_executable,
        tools.code_timeout(),
    )));
    registry.register(Box::new(shell::ShellTool::new(
        sandbox.clone(),
        tools.allowed_commands.clone(),
        tools.shell_timeout(),
    )));
    registry.register(Box::new(web_search::WebSearchTool::new(
        tools.search_api_key.clone(),
        tools.http_timeout(),
    )));
    registry.register(Box::new(web_reader::WebReaderTool::new(tools.http_timeout())));
    // Downloads can be large; give them the general tool budget rather than the page-fetch one.
    registry.register(Box::new(downloader::DownloaderTool::new(sandbox, tools.default_timeout())));
    registry.register(Box::new(memory::MemoryTool::new(memory, memory_config.recall_limit)));
    Ok(registry)
}
