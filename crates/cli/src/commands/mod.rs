//! Subcommand implementations and the wiring they share.

pub mod agent;
pub mod config_cmd;
pub mod doctor;
pub mod render;
pub mod tools;

use chimera_config::{AppConfig, MemoryConfig};
use chimera_core::memory::MemoryBackend;
use chimera_core::tool::ToolRegistry;
use chimera_memory::{FileBackend, InMemoryBackend};
use std::sync::Arc;

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// The long-term memory backend named by `[memory] backend`.
pub fn memory_backend(config: &MemoryConfig) -> Result<Arc<dyn MemoryBackend>, Box<dyn std::error::Error>> {
    match config.backend.as_str() {
        "in_memory" => Ok(Arc::new(InMemoryBackend::new())),
        "file" => Ok(Arc::new(FileBackend::new(config.file_path()))),
        other => Err(format!("Unknown memory backend '{other}' (expected 'in_memory' or 'file')").into()),
    }
}

/// Every built-in tool, sandboxed under `tools.workspace_dir`.
pub fn tool_registry(config: &AppConfig) -> Result<ToolRegistry, Box<dyn std::error::Error>> {
    let memory = memory_backend(&config.memory)?;
    let registry = chimera_tools::default_registry(&config.tools, &config.memory, memory).map_err(|e| {
        format!(
            "Failed to prepare the sandbox at {}: {e}",
            config.tools.workspace_dir.display()
        )
    })?;
    Ok(registry)
}
