//! System prompt construction.
//!
//! The directive tells the model the response format, lists every registered
//! tool from its [`ToolSpec`] and states the working rules. A configured
//! prompt replaces the generated one entirely.

use chimera_core::tool::{FINISH_TOOL, OPERATION_KEY, ToolRegistry, ToolSpec};
use std::fmt::Write as _;

const PREAMBLE: &str = "You are Chimera, a highly capable reasoning agent. Your goal is to achieve the user's \
objective by breaking it down into a sequence of Thought-Action-Observation steps.";

const FORMAT: &str = r#"At each step, respond with a single JSON object and nothing else:
{
  "thought": "Your internal monologue. Analyze the situation, reflect on previous steps, and decide what to do next. If the last observation was an error, analyze the error and form a new plan to fix it.",
  "action": {
    "tool": "tool_name",
    "args": {"arg_name": "value"}
  }
}"#;

const RULES: &str = "Key guidelines:
- Before using `web_search`, use `memory` with operation `recall` to check whether you already know the answer.
- After finding key information, store it with `memory` operation `remember`.
- To run code, first write it to a file with `filesystem` operation `write`, then run it with `execute_python` operation `execute_script`.
- Filesystem content must be a single string. Escape newlines as \\n inside JSON strings.
- If a tool returns an error, your next thought must explain why it happened and how your next action fixes it. Do not repeat the exact same action.
- When you have the final answer, you MUST use `respond_to_user`.
- If you are stuck or keep failing, use `respond_to_user` to ask the user for help.";

const EXAMPLE: &str = r#"Example workflow for "What is the capital of Australia?":
{"thought": "I should check memory first.", "action": {"tool": "memory", "args": {"operation": "recall", "query": "capital of Australia"}}}
{"thought": "Memory had nothing. I will search the web.", "action": {"tool": "web_search", "args": {"query": "capital of Australia"}}}
{"thought": "The capital is Canberra. I will remember it and answer.", "action": {"tool": "memory", "args": {"operation": "remember", "fact": "The capital of Australia is Canberra."}}}
{"thought": "Stored. Now I answer.", "action": {"tool": "respond_to_user", "args": {"text": "The capital of Australia is Canberra."}}}"#;

/// The system prompt for `registry`, or `custom` when one is configured.
pub fn system_prompt(registry: &ToolRegistry, custom: Option<&str>) -> String {
    match custom.map(str::trim).filter(|p| !p.is_empty()) {
        Some(custom) => custom.to_string(),
        None => build_system_prompt(&registry.specs()),
    }
}

/// Assemble the directive from tool specs.
pub fn build_system_prompt(specs: &[&ToolSpec]) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "{PREAMBLE}\n\n{FORMAT}\n\nYour available tools:\n");
    let _ = writeln!(
        prompt,
        "- {FINISH_TOOL}: Give the user your final answer, or ask them for help or clarification.\n  args: {{\"text\": \"Your response to the user.\"}}"
    );
    for spec in specs {
        prompt.push_str(&describe_tool(spec));
    }
    let _ = write!(prompt, "\n{RULES}\n\n{EXAMPLE}\n\nBegin.");
    prompt
}

fn describe_tool(spec: &ToolSpec) -> String {
    let mut out = format!("- {}: {}\n", spec.name, spec.description);
    if spec.is_multi_operation() {
        let _ = writeln!(out, "  Set \"{OPERATION_KEY}\" in args to one of:");
        for op in &spec.operations {
            let _ = writeln!(out, "  - {}: {} args: {}", op.name, op.description, params_line(&op.params));
        }
    } else if let Some(op) = spec.operations.first() {
        let _ = writeln!(out, "  args: {}", params_line(&op.params));
    }
    out
}

fn params_line(params: &[chimera_core::tool::ParamSpec]) -> String {
    if params.is_empty() {
        return "{}".into();
    }
    let fields: Vec<String> = params
        .iter()
        .map(|p| {
            let marker = if p.required { "" } else { " (optional)" };
            format!("\"{}\"{marker}: {}", p.name, p.description)
        })
        .collect();
    format!("{{{}}}", fields.join(", "))
}
