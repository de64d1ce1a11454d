//! Consecutive-failure tracking and the ask-for-help directive.

use serde::{Deserialize, Serialize};

pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Appended as a user message on the turn after an escalation.
pub const ESCALATION_DIRECTIVE: &str = "Observation: You have failed multiple times in a row. You MUST ask the user for help. \
Use 'respond_to_user' to describe the problem and ask for a suggestion.";

/// Counts consecutive failed turns and says when to ask the operator for help.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationPolicy {
    threshold: u32,
    consecutive_failures: u32,
}

impl EscalationPolicy {
    /// A threshold of zero is treated as one.
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            consecutive_failures: 0,
        }
    }

    /// Record one turn. Returns `true` when this failure reaches the threshold;
    /// the count then starts over.
    pub fn record(&mut self, failed: bool) -> bool {
        if !failed {
            self.consecutive_failures = 0;
            return false;
        }
        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.threshold {
            self.consecutive_failures = 0;
            return true;
        }
        false
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_THRESHOLD)
    }
}
