//! Configuration loading, validation, and management for Chimera.
//!
//! Loads configuration from `~/.chimera/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.chimera/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default decision engine provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Loop limits and escalation
    #[serde(default)]
    pub agent: AgentConfig,

    /// Tool sandbox and per-capability settings
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Long-term memory configuration
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "vllm".into()
}
fn default_model() -> String {
    "meta-llama/Llama-3.1-8B-Instruct".into()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_max_tokens() -> u32 {
    2048
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("agent", &self.agent)
            .field("tools", &self.tools)
            .field("memory", &self.memory)
            .field("providers", &self.providers)
            .finish()
    }
}

/// Per-provider endpoint settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Turn ceiling per objective
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    /// Consecutive failures before the operator is asked for help
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Also treat observations containing "Error:" as failures
    #[serde(default)]
    pub error_marker_compat: bool,

    /// Replaces the generated system prompt entirely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

fn default_max_turns() -> usize {
    15
}
fn default_failure_threshold() -> u32 {
    3
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            failure_threshold: default_failure_threshold(),
            error_marker_compat: false,
            system_prompt: None,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Root directory every file-touching tool is confined to
    #[serde(default = "default_workspace_dir")]
    pub workspace_dir: PathBuf,

    /// Timeout for tools without a dedicated setting
    #[serde(default = "default_tool_timeout")]
    pub default_timeout_secs: u64,

    #[serde(default = "default_code_timeout")]
    pub code_timeout_secs: u64,

    #[serde(default = "default_shell_timeout")]
    pub shell_timeout_secs: u64,

    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// Interpreter used by `execute_python`
    #[serde(default = "default_python")]
    pub python_executable: String,

    /// Commands the shell tool may run (first word). Empty allows everything.
    #[serde(default = "default_allowed_commands")]
    pub allowed_commands: Vec<String>,

    /// Tavily API key for `web_search`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_api_key: Option<String>,
}

fn default_workspace_dir() -> PathBuf {
    PathBuf::from("sandbox")
}
fn default_tool_timeout() -> u64 {
    120
}
fn default_code_timeout() -> u64 {
    60
}
fn default_shell_timeout() -> u64 {
    30
}
fn default_http_timeout() -> u64 {
    15
}
fn default_python() -> String {
    "python3".into()
}
fn default_allowed_commands() -> Vec<String> {
    ["ls", "cat", "head", "tail", "wc", "grep", "find", "echo", "pwd", "date", "sort", "uniq", "diff"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            workspace_dir: default_workspace_dir(),
            default_timeout_secs: default_tool_timeout(),
            code_timeout_secs: default_code_timeout(),
            shell_timeout_secs: default_shell_timeout(),
            http_timeout_secs: default_http_timeout(),
            python_executable: default_python(),
            allowed_commands: default_allowed_commands(),
            search_api_key: None,
        }
    }
}

impl std::fmt::Debug for ToolsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolsConfig")
            .field("workspace_dir", &self.workspace_dir)
            .field("default_timeout_secs", &self.default_timeout_secs)
            .field("code_timeout_secs", &self.code_timeout_secs)
            .field("shell_timeout_secs", &self.shell_timeout_secs)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("python_executable", &self.python_executable)
            .field("allowed_commands", &self.allowed_commands)
            .field("search_api_key", &redact(&self.search_api_key))
            .finish()
    }
}

impl ToolsConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    pub fn code_timeout(&self) -> Duration {
        Duration::from_secs(self.code_timeout_secs)
    }

    pub fn shell_timeout(&self) -> Duration {
        Duration::from_secs(self.shell_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// "in_memory" or "file"
    #[serde(default = "default_memory_backend")]
    pub backend: String,

    /// JSONL file used by the "file" backend. Defaults to ~/.chimera/memory.jsonl
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Default number of facts returned by `recall`
    #[serde(default = "default_recall_limit")]
    pub recall_limit: usize,
}

fn default_memory_backend() -> String {
    "file".into()
}
fn default_recall_limit() -> usize {
    3
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: default_memory_backend(),
            path: None,
            recall_limit: default_recall_limit(),
        }
    }
}

impl MemoryConfig {
    pub fn file_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("memory.jsonl"))
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.chimera/config.toml).
    ///
    /// Also checks environment variables:
    /// - `CHIMERA_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `CHIMERA_PROVIDER`, `CHIMERA_MODEL`
    /// - `TAVILY_API_KEY` for web search
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in `load`).
    pub fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = var("CHIMERA_API_KEY").or_else(|| var("OPENAI_API_KEY"));
        }

        if let Some(provider) = var("CHIMERA_PROVIDER") {
            self.default_provider = provider;
        }

        if let Some(model) = var("CHIMERA_MODEL") {
            self.default_model = model;
        }

        if self.tools.search_api_key.is_none() {
            self.tools.search_api_key = var("TAVILY_API_KEY");
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".chimera")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_turns == 0 {
            return Err(ConfigError::ValidationError("agent.max_turns must be at least 1".into()));
        }

        if self.agent.failure_threshold == 0 {
            return Err(ConfigError::ValidationError(
                "agent.failure_threshold must be at least 1".into(),
            ));
        }

        let timeouts = [
            ("tools.default_timeout_secs", self.tools.default_timeout_secs),
            ("tools.code_timeout_secs", self.tools.code_timeout_secs),
            ("tools.shell_timeout_secs", self.tools.shell_timeout_secs),
            ("tools.http_timeout_secs", self.tools.http_timeout_secs),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, secs)| *secs == 0) {
            return Err(ConfigError::ValidationError(format!("{name} must be greater than 0")));
        }

        if !matches!(self.memory.backend.as_str(), "in_memory" | "file") {
            return Err(ConfigError::ValidationError(format!(
                "unknown memory backend '{}' (expected \"in_memory\" or \"file\")",
                self.memory.backend
            )));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for the `config` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            agent: AgentConfig::default(),
            tools: ToolsConfig::default(),
            memory: MemoryConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
