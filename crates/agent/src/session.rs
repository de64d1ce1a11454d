//! Per-conversation state: the history and the loop bookkeeping.

use chimera_core::message::{ConversationHistory, Message, SessionId};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::escalation::EscalationPolicy;

/// Where an objective's loop stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopStatus {
    Running,
    Finished,
    Exhausted,
    Cancelled,
}

impl fmt::Display for LoopStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Finished => "finished",
            Self::Exhausted => "exhausted",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Bookkeeping for the objective in progress. Reset when a new objective starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopState {
    pub turn_index: usize,
    pub escalation: EscalationPolicy,
    pub escalation_pending: bool,
    pub status: LoopStatus,
    pub final_output: Option<String>,
}

impl LoopState {
    pub fn new(failure_threshold: u32) -> Self {
        Self {
            turn_index: 0,
            escalation: EscalationPolicy::new(failure_threshold),
            escalation_pending: false,
            status: LoopStatus::Running,
            final_output: None,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.escalation.consecutive_failures()
    }

    pub fn is_running(&self) -> bool {
        self.status == LoopStatus::Running
    }
}

impl Default for LoopState {
    fn default() -> Self {
        Self::new(crate::escalation::DEFAULT_FAILURE_THRESHOLD)
    }
}

/// One operator conversation. Each session owns its history; the tool
/// registry and provider are shared between sessions.
#[derive(Debug, Clone)]
pub struct AgentSession {
    id: SessionId,
    history: ConversationHistory,
    state: LoopState,
}

impl AgentSession {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            id: SessionId::new(),
            history: ConversationHistory::new(system_prompt),
            state: LoopState::default(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    /// Forget everything but the system prompt.
    pub fn reset(&mut self) {
        self.history.reset();
        self.state = LoopState::new(self.state.escalation.threshold());
    }

    /// Start a fresh objective: reset the loop state and state the goal.
    pub(crate) fn begin_objective(&mut self, objective: &str, failure_threshold: u32) {
        self.state = LoopState::new(failure_threshold);
        self.history.push(Message::user(format!("My objective is: {objective}")));
    }

    pub(crate) fn push(&mut self, message: Message) {
        self.history.push(message);
    }

    pub(crate) fn state_mut(&mut self) -> &mut LoopState {
        &mut self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chimera_core::message::Role;

    #[test]
    fn objective_is_appended_after_the_system_prompt() {
        let mut session = AgentSession::new("You are Chimera.");
        session.begin_objective("count the files", 3);

        let messages = session.history().messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].content, "My objective is: count the files");
        assert!(session.state().is_running());
    }

    #[test]
    fn new_objective_resets_loop_state_but_keeps_history() {
        let mut session = AgentSession::new("sys");
        session.begin_objective("first", 3);
        session.state_mut().turn_index = 4;
        session.state_mut().status = LoopStatus::Finished;
        session.state_mut().escalation_pending = true;

        session.begin_objective("second", 3);
        assert_eq!(session.state().turn_index, 0);
        assert!(!session.state().escalation_pending);
        assert!(session.state().is_running());
        assert_eq!(session.history().len(), 3);
    }

    #[test]
    fn reset_keeps_only_the_system_prompt() {
        let mut session = AgentSession::new("sys");
        session.begin_objective("first", 5);
        session.push(Message::assistant("{}"));
        session.reset();

        assert_eq!(session.history().len(), 1);
        assert_eq!(session.history().system_prompt(), "sys");
        assert_eq!(session.state().escalation.threshold(), 5);
    }

    #[test]
    fn sessions_have_distinct_ids() {
        assert_ne!(AgentSession::new("a").id(), AgentSession::new("a").id());
    }
}
