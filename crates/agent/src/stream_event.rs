//! Loop events for presenters.
//!
//! `AgentEvent` is what the executor streams while an objective runs. Each
//! event belongs to a presentation channel so a front end can keep script
//! output apart from the reasoning trace and the final answer.

use serde::{Deserialize, Serialize};

/// Observations longer than this are cut in events; the history keeps them whole.
pub const MAX_DISPLAY_CHARS: usize = 2000;

/// Where a presenter should show an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventChannel {
    /// Reasoning trace: turns, thoughts, actions, ordinary observations.
    Log,
    /// Output of script and shell runs.
    Terminal,
    /// The answer, exhaustion notice or cancellation notice.
    Final,
}

/// Events emitted by the executor while an objective runs.
///
/// Events for a turn are sent before the next turn starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// A new turn is starting.
    TurnStarted {
        turn: usize,
        max_turns: usize,
        consecutive_failures: u32,
    },

    /// The model's reasoning for this turn.
    Thought { turn: usize, content: String },

    /// The action about to be dispatched.
    Action {
        turn: usize,
        tool: String,
        args: serde_json::Value,
    },

    /// What the tool reported.
    Observation {
        turn: usize,
        tool: String,
        succeeded: bool,
        output: String,
        terminal: bool,
    },

    /// The response could not be used; the model is told why.
    Diagnostic { turn: usize, message: String },

    /// The model is being told to ask the operator for help.
    Escalation { turn: usize, message: String },

    /// The objective finished with an answer.
    Final { turns: usize, output: String },

    /// The turn limit was reached.
    Exhausted { turns: usize, message: String },

    /// The operator cancelled the objective.
    Cancelled { turns: usize },
}

impl AgentEvent {
    /// Build an observation event, truncating the text for display.
    pub fn observation(turn: usize, tool: &str, succeeded: bool, output: &str, terminal: bool) -> Self {
        Self::Observation {
            turn,
            tool: tool.to_string(),
            succeeded,
            output: truncate_for_display(output),
            terminal,
        }
    }

    pub fn channel(&self) -> EventChannel {
        match self {
            Self::Observation { terminal: true, .. } => EventChannel::Terminal,
            Self::Final { .. } | Self::Exhausted { .. } | Self::Cancelled { .. } => EventChannel::Final,
            _ => EventChannel::Log,
        }
    }

    /// Wire name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TurnStarted { .. } => "turn_started",
            Self::Thought { .. } => "thought",
            Self::Action { .. } => "action",
            Self::Observation { .. } => "observation",
            Self::Diagnostic { .. } => "diagnostic",
            Self::Escalation { .. } => "escalation",
            Self::Final { .. } => "final",
            Self::Exhausted { .. } => "exhausted",
            Self::Cancelled { .. } => "cancelled",
        }
    }
}

/// Cut `text` to [`MAX_DISPLAY_CHARS`] characters.
pub fn truncate_for_display(text: &str) -> String {
    match text.char_indices().nth(MAX_DISPLAY_CHARS) {
        Some((cut, _)) => format!("{}... (truncated)", &text[..cut]),
        None => text.to_string(),
    }
}
