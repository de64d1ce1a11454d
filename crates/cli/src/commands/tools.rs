//! `chimera tools`: Show the tool catalog.

use chimera_config::AppConfig;
use chimera_core::tool::{FINISH_TOOL, ToolSpec};

use super::{CmdResult, tool_registry};

pub async fn run() -> CmdResult {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let registry = tool_registry(&config)?;

    println!("🧰 Chimera tools (sandbox: {})\n", config.tools.workspace_dir.display());
    println!("  {FINISH_TOOL}");
    println!("      Finish the objective with an answer for the user. args: text\n");
    for spec in registry.specs() {
        print!("{}", describe(spec));
    }
    Ok(())
}

fn describe(spec: &ToolSpec) -> String {
    let mut out = format!("  {}{}\n", spec.name, if spec.terminal_output { "  [terminal]" } else { "" });
    out.push_str(&format!("      {}\n", spec.description));
    for op in &spec.operations {
        let params: Vec<String> = op
            .params
            .iter()
            .map(|p| if p.required { p.name.clone() } else { format!("[{}]", p.name) })
            .collect();
        if spec.is_multi_operation() {
            out.push_str(&format!("      • {}({}): {}\n", op.name, params.join(", "), op.description));
        } else {
            out.push_str(&format!("      args: {}\n", params.join(", ")));
        }
    }
    out.push('\n');
    out
}
