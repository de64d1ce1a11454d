//! Terminal rendering of loop events.
//!
//! The reasoning trace and script output go to stderr; the final answer goes
//! to stdout so `chimera agent -m ...` can be piped.

use chimera_agent::{AgentEvent, EventChannel};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Print events until the sender side is dropped.
pub fn spawn_printer(mut rx: mpsc::Receiver<AgentEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event.channel() {
                EventChannel::Final => println!("{}", format_event(&event)),
                EventChannel::Log | EventChannel::Terminal => eprintln!("{}", format_event(&event)),
            }
        }
    })
}

pub fn format_event(event: &AgentEvent) -> String {
    match event {
        AgentEvent::TurnStarted {
            turn,
            max_turns,
            consecutive_failures,
        } => format!("\n  --- Turn {turn}/{max_turns} (failures: {consecutive_failures}) ---"),
        AgentEvent::Thought { content, .. } => format!("  Thought: {content}"),
        AgentEvent::Action { tool, args, .. } => format!("  Action:  {tool} {args}"),
        AgentEvent::Observation {
            tool,
            succeeded,
            output,
            terminal: true,
            ..
        } => {
            let status = if *succeeded { "ok" } else { "failed" };
            let body: Vec<String> = output.lines().map(|l| format!("  │ {l}")).collect();
            format!("  ┌─ {tool} ({status})\n{}\n  └─", body.join("\n"))
        }
        AgentEvent::Observation { output, .. } => format!("  Observation: {output}"),
        AgentEvent::Diagnostic { message, .. } => {
            let first = message.lines().next().unwrap_or_default();
            format!("  [format error] {first}")
        }
        AgentEvent::Escalation { .. } => "  [!] Repeated failures: the agent will ask you for help.".into(),
        AgentEvent::Final { output, .. } => indent("Chimera > ", output),
        AgentEvent::Exhausted { message, .. } => indent("Chimera > ", message),
        AgentEvent::Cancelled { .. } => "\n  [cancelled] The objective was stopped.".into(),
    }
}

fn indent(prefix: &str, text: &str) -> String {
    let lines: Vec<String> = text.lines().map(|l| format!("  {prefix}{l}")).collect();
    format!("\n{}", lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_output_is_boxed() {
        let event = AgentEvent::observation(3, "shell", true, "a.txt\nb.txt", true);
        let text = format_event(&event);
        assert!(text.starts_with("  ┌─ shell (ok)"));
        assert!(text.contains("  │ a.txt\n  │ b.txt"));
    }

    #[test]
    fn diagnostic_shows_only_the_first_line() {
        let event = AgentEvent::Diagnostic {
            turn: 1,
            message: "Your response was not valid JSON.\nYour output was:\nblah".into(),
        };
        assert_eq!(format_event(&event), "  [format error] Your response was not valid JSON.");
    }

    #[test]
    fn answers_are_prefixed_per_line() {
        let event = AgentEvent::Final {
            turns: 2,
            output: "line one\nline two".into(),
        };
        assert_eq!(format_event(&event), "\n  Chimera > line one\n  Chimera > line two");
    }
}
