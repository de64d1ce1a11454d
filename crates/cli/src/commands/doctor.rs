//! `chimera doctor`: Diagnose system health.

use chimera_config::AppConfig;
use tokio::process::Command;

use super::{CmdResult, config_cmd::is_local, memory_backend};

pub async fn run() -> CmdResult {
    println!("🩺 Chimera Doctor — System Diagnostics");
    println!("======================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if !config_path.exists() {
        println!("  ⚠️  No config file, using defaults (run `chimera config init`)");
    }
    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            config
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
            println!("\n  ⚠️  1 issue(s) found. Fix the config and run doctor again.");
            return Ok(());
        }
    };

    if config.has_api_key() || is_local(&config.default_provider) {
        println!("  ✅ Provider credentials ({})", config.default_provider);
    } else {
        println!("  ⚠️  No API key for '{}': set CHIMERA_API_KEY", config.default_provider);
        issues += 1;
    }

    let router = chimera_providers::router::build_from_config(&config);
    match router.default() {
        Some(provider) => match provider.health_check().await {
            Ok(true) => println!("  ✅ Provider '{}' reachable", provider.name()),
            Ok(false) => {
                println!("  ❌ Provider '{}' answered but is not healthy", provider.name());
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ Provider '{}' unreachable: {e}", provider.name());
                issues += 1;
            }
        },
        None => {
            println!("  ❌ No default provider configured");
            issues += 1;
        }
    }

    match chimera_tools::Sandbox::new(&config.tools.workspace_dir) {
        Ok(sandbox) => println!("  ✅ Sandbox ready at {}", sandbox.root().display()),
        Err(e) => {
            println!("  ❌ Sandbox {} unusable: {e}", config.tools.workspace_dir.display());
            issues += 1;
        }
    }

    match Command::new(&config.tools.python_executable).arg("--version").output().await {
        Ok(out) if out.status.success() => {
            let version = String::from_utf8_lossy(&out.stdout);
            let version = if version.trim().is_empty() {
                String::from_utf8_lossy(&out.stderr).trim().to_string()
            } else {
                version.trim().to_string()
            };
            println!("  ✅ Interpreter: {version}");
        }
        _ => {
            println!("  ❌ '{}' not found: execute_python will fail", config.tools.python_executable);
            issues += 1;
        }
    }

    if config.tools.search_api_key.is_some() {
        println!("  ✅ Search API key configured");
    } else {
        println!("  ⚠️  No search API key: web_search is unavailable (set TAVILY_API_KEY)");
        issues += 1;
    }

    match memory_backend(&config.memory) {
        Ok(backend) => match backend.count().await {
            Ok(n) => println!("  ✅ Memory backend '{}' ({n} facts)", backend.name()),
            Err(e) => {
                println!("  ❌ Memory backend '{}' failed: {e}", backend.name());
                issues += 1;
            }
        },
        Err(e) => {
            println!("  ❌ {e}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
