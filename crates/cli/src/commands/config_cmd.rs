//! `chimera config`: Configuration management commands.

use chimera_config::AppConfig;

use super::CmdResult;

const REDACTED: &str = "***";

pub async fn validate() -> CmdResult {
    println!("🔍 Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let mut warnings = Vec::new();
            if !config.has_api_key() && !is_local(&config.default_provider) {
                warnings.push("No API key set (set CHIMERA_API_KEY or OPENAI_API_KEY)");
            }
            if config.tools.search_api_key.is_none() {
                warnings.push("No search key set: web_search will fail (set TAVILY_API_KEY)");
            }
            if config.tools.allowed_commands.is_empty() {
                warnings.push("tools.allowed_commands is empty: the shell tool may run any command");
            }

            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Provider:  {}", config.default_provider);
            println!("   Model:     {}", config.default_model);
            println!("   Turns:     {}", config.agent.max_turns);
            println!("   Escalate:  after {} failures", config.agent.failure_threshold);
            println!("   Sandbox:   {}", config.tools.workspace_dir.display());
            println!("   Memory:    {}", config.memory.backend);
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show() -> CmdResult {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&redacted(config))?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> CmdResult {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}

pub async fn init(force: bool) -> CmdResult {
    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() && !force {
        println!("   Config already exists at {} (use --force to overwrite)", config_path.display());
        return Ok(());
    }
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("   ✅ Wrote {}", config_path.display());
    Ok(())
}

/// Providers that normally run without a key.
pub(crate) fn is_local(provider: &str) -> bool {
    matches!(provider, "vllm" | "ollama" | "llamacpp" | "llama.cpp" | "lmstudio")
}

fn redacted(mut config: AppConfig) -> AppConfig {
    if config.api_key.is_some() {
        config.api_key = Some(REDACTED.into());
    }
    if config.tools.search_api_key.is_some() {
        config.tools.search_api_key = Some(REDACTED.into());
    }
    for provider in config.providers.values_mut() {
        if provider.api_key.is_some() {
            provider.api_key = Some(REDACTED.into());
        }
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use chimera_config::ProviderConfig;

    #[test]
    fn secrets_never_reach_the_printout() {
        let mut config = AppConfig::default();
        config.api_key = Some("sk-secret".into());
        config.tools.search_api_key = Some("tvly-secret".into());
        config.providers.insert(
            "openai".into(),
            ProviderConfig {
                api_key: Some("sk-other".into()),
                api_url: None,
                default_model: None,
            },
        );

        let text = toml::to_string_pretty(&redacted(config)).unwrap();
        assert!(!text.contains("secret"));
        assert!(!text.contains("sk-other"));
        assert!(text.contains(REDACTED));
    }

    #[test]
    fn local_providers_need_no_key() {
        assert!(is_local("vllm"));
        assert!(is_local("ollama"));
        assert!(!is_local("openai"));
    }
}
