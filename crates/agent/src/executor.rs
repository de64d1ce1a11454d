//! The turn executor: the Thought → Action → Observation loop.
//!
//! Each turn makes exactly one decision call, extracts the proposed action,
//! dispatches it through the [`ToolRegistry`] and folds the outcome back into
//! the session history. The loop ends when the model calls
//! `respond_to_user`, when the turn limit is reached, or when the operator
//! cancels. Only provider failures abort an objective with an error; every
//! other problem becomes an observation the model can react to.

use chimera_config::AppConfig;
use chimera_core::error::{Error, Result};
use chimera_core::message::Message;
use chimera_core::provider::{Provider, ProviderRequest};
use chimera_core::tool::{DispatchOutcome, ToolRegistry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::escalation::{DEFAULT_FAILURE_THRESHOLD, ESCALATION_DIRECTIVE};
use crate::extractor::{self, ProposedAction};
use crate::session::{AgentSession, LoopStatus};
use crate::stream_event::AgentEvent;

pub const DEFAULT_MAX_TURNS: usize = 15;

const MISSING_TOOL: &str = "Your JSON is missing the 'tool' key inside 'action'. \
Every action must name a tool, for example {\"tool\": \"respond_to_user\", \"args\": {\"text\": \"...\"}}.";

const CANCELLED_NOTICE: &str = "Objective cancelled by the operator.";

/// How an objective ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectiveOutcome {
    pub status: LoopStatus,

    /// The answer, or the exhaustion or cancellation notice.
    pub final_output: String,

    /// Turns started, including the last one.
    pub turns: usize,
}

/// What one turn decided about the loop.
enum TurnEnd {
    Continue,
    Finished(String),
    Cancelled,
}

/// Drives objectives for any number of sessions.
///
/// The provider and registry are shared; all per-conversation state lives in
/// the [`AgentSession`] passed to [`TurnExecutor::run_objective`].
pub struct TurnExecutor {
    provider: Arc<dyn Provider>,
    registry: Arc<ToolRegistry>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    max_turns: usize,
    failure_threshold: u32,
    error_marker_compat: bool,
}

impl TurnExecutor {
    pub fn new(provider: Arc<dyn Provider>, registry: Arc<ToolRegistry>, model: impl Into<String>) -> Self {
        Self {
            provider,
            registry,
            model: model.into(),
            temperature: 0.1,
            max_tokens: None,
            max_turns: DEFAULT_MAX_TURNS,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            error_marker_compat: false,
        }
    }

    /// Apply the `[agent]` section and generation settings from config.
    pub fn from_config(
        provider: Arc<dyn Provider>,
        registry: Arc<ToolRegistry>,
        model: impl Into<String>,
        config: &AppConfig,
    ) -> Self {
        Self::new(provider, registry, model)
            .with_temperature(config.default_temperature)
            .with_max_tokens(config.default_max_tokens)
            .with_max_turns(config.agent.max_turns)
            .with_failure_threshold(config.agent.failure_threshold)
            .with_error_marker_compat(config.agent.error_marker_compat)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    /// Also count a successful observation containing `Error:` as a failure.
    pub fn with_error_marker_compat(mut self, enabled: bool) -> Self {
        self.error_marker_compat = enabled;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Run one operator objective to completion, exhaustion or cancellation.
    pub async fn run_objective(
        &self,
        session: &mut AgentSession,
        objective: &str,
        events: Option<&mpsc::Sender<AgentEvent>>,
        cancel: &CancellationToken,
    ) -> Result<ObjectiveOutcome> {
        session.begin_objective(objective, self.failure_threshold);
        info!(
            session = %session.id(),
            model = %self.model,
            max_turns = self.max_turns,
            "Objective started"
        );

        loop {
            let turn = {
                let state = session.state_mut();
                state.turn_index += 1;
                state.turn_index
            };

            let end = self.run_turn(session, turn, events, cancel).await?;
            match end {
                TurnEnd::Finished(output) => {
                    info!(session = %session.id(), turns = turn, "Objective finished");
                    emit(events, AgentEvent::Final {
                        turns: turn,
                        output: output.clone(),
                    })
                    .await;
                    return Ok(conclude(session, LoopStatus::Finished, output, turn));
                }
                TurnEnd::Cancelled => {
                    info!(session = %session.id(), turns = turn, "Objective cancelled");
                    emit(events, AgentEvent::Cancelled { turns: turn }).await;
                    return Ok(conclude(session, LoopStatus::Cancelled, CANCELLED_NOTICE.into(), turn));
                }
                TurnEnd::Continue if turn >= self.max_turns => {
                    warn!(session = %session.id(), max_turns = self.max_turns, "Turn limit reached");
                    let notice = format!(
                        "I reached the limit of {} turns without completing the objective. \
                         Please refine the request or break it into smaller steps.",
                        self.max_turns
                    );
                    emit(events, AgentEvent::Exhausted {
                        turns: turn,
                        message: notice.clone(),
                    })
                    .await;
                    return Ok(conclude(session, LoopStatus::Exhausted, notice, turn));
                }
                TurnEnd::Continue => {}
            }
        }
    }

    async fn run_turn(
        &self,
        session: &mut AgentSession,
        turn: usize,
        events: Option<&mpsc::Sender<AgentEvent>>,
        cancel: &CancellationToken,
    ) -> Result<TurnEnd> {
        debug!(turn, failures = session.state().consecutive_failures(), "Turn starting");
        emit(events, AgentEvent::TurnStarted {
            turn,
            max_turns: self.max_turns,
            consecutive_failures: session.state().consecutive_failures(),
        })
        .await;

        if session.state().escalation_pending {
            session.state_mut().escalation_pending = false;
            session.push(Message::user(ESCALATION_DIRECTIVE));
            emit(events, AgentEvent::Escalation {
                turn,
                message: ESCALATION_DIRECTIVE.into(),
            })
            .await;
        }

        let request = ProviderRequest {
            model: self.model.clone(),
            messages: session.history().messages().to_vec(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stop: Vec::new(),
        };

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(TurnEnd::Cancelled),
            response = self.provider.complete(request) => response.map_err(Error::Provider)?,
        };
        if cancel.is_cancelled() {
            return Ok(TurnEnd::Cancelled);
        }

        let raw = response.message.content;
        let action = match extractor::extract(&raw) {
            Ok(action) => action,
            Err(e) => {
                warn!(turn, error = %e, "Could not extract an action");
                let diagnostic = e.diagnostic();
                session.push(Message::user(diagnostic.clone()));
                emit(events, AgentEvent::Diagnostic { turn, message: diagnostic }).await;
                self.record(session, true, turn);
                return Ok(TurnEnd::Continue);
            }
        };

        let Some(tool) = action.tool.clone() else {
            warn!(turn, "Action names no tool");
            session.push(Message::user(MISSING_TOOL));
            emit(events, AgentEvent::Diagnostic {
                turn,
                message: MISSING_TOOL.into(),
            })
            .await;
            self.record(session, true, turn);
            return Ok(TurnEnd::Continue);
        };

        self.act(session, turn, tool, action, events, cancel).await
    }

    /// Steps after a usable action: record it, dispatch, observe.
    async fn act(
        &self,
        session: &mut AgentSession,
        turn: usize,
        tool: String,
        action: ProposedAction,
        events: Option<&mpsc::Sender<AgentEvent>>,
        cancel: &CancellationToken,
    ) -> Result<TurnEnd> {
        emit(events, AgentEvent::Thought {
            turn,
            content: action.thought.clone(),
        })
        .await;
        emit(events, AgentEvent::Action {
            turn,
            tool: tool.clone(),
            args: serde_json::Value::Object(action.args.clone()),
        })
        .await;
        session.push(Message::assistant(action.to_history_entry()));

        let dispatched = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            outcome = self.registry.dispatch(&tool, action.args) => Some(outcome),
        };
        let Some(outcome) = dispatched else {
            // The action is already in the history; pair it with an observation.
            session.push(Message::user(format!("Observation: Error: {CANCELLED_NOTICE}")));
            return Ok(TurnEnd::Cancelled);
        };

        let failed = self.is_failure(&outcome);
        self.record(session, failed, turn);

        session.push(Message::user(render_observation(&outcome)));
        emit(
            events,
            AgentEvent::observation(turn, &tool, !failed, &outcome.observation, outcome.terminal_output),
        )
        .await;

        if let Some(output) = outcome.finished {
            return Ok(TurnEnd::Finished(output));
        }
        if cancel.is_cancelled() {
            return Ok(TurnEnd::Cancelled);
        }
        Ok(TurnEnd::Continue)
    }

    fn is_failure(&self, outcome: &DispatchOutcome) -> bool {
        !outcome.succeeded || (self.error_marker_compat && outcome.observation.contains("Error:"))
    }

    fn record(&self, session: &mut AgentSession, failed: bool, turn: usize) {
        let state = session.state_mut();
        if state.escalation.record(failed) {
            warn!(turn, threshold = state.escalation.threshold(), "Repeated failures, asking the operator for help");
            state.escalation_pending = true;
        }
    }
}

fn render_observation(outcome: &DispatchOutcome) -> String {
    if outcome.succeeded || outcome.is_finished() {
        format!("Observation: {}", outcome.observation)
    } else {
        format!(
            "Observation: {}\nThe tool returned an error. Analyze it and try a different approach.",
            outcome.observation
        )
    }
}

fn conclude(session: &mut AgentSession, status: LoopStatus, output: String, turns: usize) -> ObjectiveOutcome {
    let state = session.state_mut();
    state.status = status;
    state.final_output = Some(output.clone());
    ObjectiveOutcome {
        status,
        final_output: output,
        turns,
    }
}

async fn emit(events: Option<&mpsc::Sender<AgentEvent>>, event: AgentEvent) {
    if let Some(tx) = events
        && tx.send(event).await.is_err()
    {
        debug!("Event receiver dropped");
    }
}
