//! The Chimera agent loop.
//!
//! An objective runs as a sequence of **Thought → Action → Observation** turns:
//!
//! 1. **Decide**: send the full history to the provider (one call per turn)
//! 2. **Extract**: pull the proposed action out of the model's text
//! 3. **Act**: dispatch it through the tool registry
//! 4. **Observe**: append the outcome and update the failure tally
//!
//! The loop ends when the model calls `respond_to_user`, when the turn limit
//! is reached, or when the operator cancels. Repeated failures make the loop
//! tell the model to ask the operator for help.

pub mod escalation;
pub mod executor;
pub mod extractor;
pub mod prompt;
pub mod session;
pub mod stream_event;

#[cfg(test)]
mod test_helpers;

pub use escalation::EscalationPolicy;
pub use executor::{ObjectiveOutcome, TurnExecutor};
pub use extractor::{ExtractionError, ProposedAction, extract};
pub use prompt::{build_system_prompt, system_prompt};
pub use session::{AgentSession, LoopState, LoopStatus};
pub use stream_event::{AgentEvent, EventChannel};
