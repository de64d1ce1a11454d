//! `chimera agent`: Interactive or single-objective mode.

use chimera_agent::{AgentSession, ObjectiveOutcome, TurnExecutor, system_prompt};
use chimera_config::AppConfig;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{CmdResult, render, tool_registry};

pub async fn run(message: Option<String>, model: Option<String>, max_turns: Option<usize>) -> CmdResult {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if let Some(max_turns) = max_turns {
        config.agent.max_turns = max_turns.max(1);
    }

    let router = chimera_providers::router::build_from_config(&config);
    let provider = router.default().ok_or("No default provider configured")?;
    let model = model.unwrap_or_else(|| chimera_providers::router::resolve_model(&config));

    let registry = Arc::new(tool_registry(&config)?);
    let prompt = system_prompt(&registry, config.agent.system_prompt.as_deref());
    let executor = TurnExecutor::from_config(provider, registry.clone(), &model, &config);
    let mut session = AgentSession::new(prompt);
    info!(session = %session.id(), provider = %config.default_provider, model = %model, "Session started");

    if let Some(objective) = message {
        let outcome = run_objective(&executor, &mut session, &objective).await?;
        info!(status = %outcome.status, turns = outcome.turns, "Objective ended");
        return Ok(());
    }

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║          Chimera Agent — Interactive         ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:  {}", config.default_provider);
    println!("  Model:     {model}");
    println!("  Tools:     {}", registry.names().join(", "));
    println!("  Sandbox:   {}", config.tools.workspace_dir.display());
    println!("  Turns:     {} per objective", executor.max_turns());
    println!();
    println!("  Type an objective and press Enter.");
    println!("  '/reset' clears the conversation, 'quit' or 'exit' leaves.");
    println!("  Ctrl+C stops the objective in progress.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\n  You > ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break; // EOF (Ctrl+D) or Ctrl+C at the prompt
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("quit") || input.eq_ignore_ascii_case("exit") {
            break;
        }
        if input == "/reset" {
            session.reset();
            println!("  Conversation cleared.");
            continue;
        }

        if let Err(e) = run_objective(&executor, &mut session, input).await {
            eprintln!("  [Error] {e}");
        }
    }

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

/// Run one objective with live event output and Ctrl+C cancellation.
async fn run_objective(
    executor: &TurnExecutor,
    session: &mut AgentSession,
    objective: &str,
) -> Result<ObjectiveOutcome, chimera_core::Error> {
    let (tx, rx) = mpsc::channel(64);
    let printer = render::spawn_printer(rx);

    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let result = executor.run_objective(session, objective, Some(&tx), &cancel).await;

    watcher.abort();
    drop(tx);
    if let Err(e) = printer.await {
        warn!(error = %e, "Event printer stopped unexpectedly");
    }
    result
}
