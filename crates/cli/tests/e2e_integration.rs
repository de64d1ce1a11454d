//! End-to-end tests for the Chimera agent loop.
//!
//! These drive whole objectives through the real tool set in a temporary
//! sandbox, with a scripted provider standing in for the model.

use std::path::Path;
use std::sync::{Arc, Mutex};

use chimera_agent::escalation::ESCALATION_DIRECTIVE;
use chimera_agent::{AgentEvent, AgentSession, EventChannel, LoopStatus, TurnExecutor, system_prompt};
use chimera_config::{MemoryConfig, ToolsConfig};
use chimera_core::error::ProviderError;
use chimera_core::memory::MemoryBackend;
use chimera_core::message::Message;
use chimera_core::provider::{Provider, ProviderRequest, ProviderResponse};
use chimera_core::tool::ToolRegistry;
use chimera_memory::InMemoryBackend;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

// ── Scripted Provider ────────────────────────────────────────────────────

/// Returns scripted responses in sequence and keeps every request.
struct ScriptedProvider {
    responses: Mutex<Vec<String>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Content of the last message the model saw on call `n` (0-based).
    fn last_seen(&self, n: usize) -> String {
        let requests = self.requests.lock().unwrap();
        requests[n].messages.last().unwrap().content.clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let responses = self.responses.lock().unwrap();
        let call = requests.len();
        let text = responses
            .get(call)
            .unwrap_or_else(|| panic!("ScriptedProvider: no response for call #{call}"))
            .clone();
        requests.push(request);
        Ok(ProviderResponse {
            message: Message::assistant(text),
            usage: None,
            model: "e2e-model".into(),
        })
    }
}

fn act(thought: &str, tool: &str, args: Value) -> String {
    json!({"thought": thought, "action": {"tool": tool, "args": args}}).to_string()
}

fn answer(text: &str) -> String {
    act("Done.", "respond_to_user", json!({"text": text}))
}

// ── Harness ──────────────────────────────────────────────────────────────

fn registry(sandbox: &Path, memory: Arc<dyn MemoryBackend>) -> ToolRegistry {
    let tools = ToolsConfig {
        workspace_dir: sandbox.to_path_buf(),
        python_executable: "sh".into(),
        ..ToolsConfig::default()
    };
    chimera_tools::default_registry(&tools, &MemoryConfig::default(), memory).unwrap()
}

struct Harness {
    _dir: tempfile::TempDir,
    sandbox: std::path::PathBuf,
    provider: Arc<ScriptedProvider>,
    executor: TurnExecutor,
    session: AgentSession,
}

impl Harness {
    fn new(responses: Vec<String>) -> Self {
        Self::with_memory(responses, Arc::new(InMemoryBackend::new()))
    }

    fn with_memory(responses: Vec<String>, memory: Arc<dyn MemoryBackend>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = dir.path().join("sandbox");
        let registry = Arc::new(registry(&sandbox, memory));
        let provider = Arc::new(ScriptedProvider::new(responses));
        let session = AgentSession::new(system_prompt(&registry, None));
        let executor = TurnExecutor::new(provider.clone(), registry, "e2e-model");
        Self {
            _dir: dir,
            sandbox,
            provider,
            executor,
            session,
        }
    }

    async fn run(&mut self, objective: &str) -> (chimera_agent::ObjectiveOutcome, Vec<AgentEvent>) {
        let (tx, mut rx) = mpsc::channel(256);
        let outcome = self
            .executor
            .run_objective(&mut self.session, objective, Some(&tx), &CancellationToken::new())
            .await
            .unwrap();
        drop(tx);
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        (outcome, events)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_system_prompt_lists_every_builtin_tool() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry(dir.path(), Arc::new(InMemoryBackend::new()));
    let prompt = system_prompt(&registry, None);

    for tool in [
        "respond_to_user",
        "filesystem",
        "execute_python",
        "shell",
        "web_search",
        "web_reader",
        "downloader",
        "memory",
    ] {
        assert!(prompt.contains(&format!("- {tool}:")), "prompt is missing {tool}");
    }
}

#[tokio::test]
async fn e2e_write_then_read_a_file() {
    let mut h = Harness::new(vec![
        act(
            "Save the note.",
            "filesystem",
            json!({"operation": "write", "filename": "notes/todo.txt", "content": ["buy milk", "call bob"]}),
        ),
        act("Check it.", "filesystem", json!({"operation": "read", "filename": "notes/todo.txt", "mode": "fast"})),
        answer("Your note is saved."),
    ]);

    let (outcome, _) = h.run("save my todo list").await;
    assert_eq!(outcome.status, LoopStatus::Finished);
    assert_eq!(outcome.final_output, "Your note is saved.");
    assert_eq!(outcome.turns, 3);

    let on_disk = std::fs::read_to_string(h.sandbox.join("notes/todo.txt")).unwrap();
    assert_eq!(on_disk, "buy milk\ncall bob");
    assert_eq!(h.provider.last_seen(2), "Observation: buy milk\ncall bob");
}

#[tokio::test]
async fn e2e_sandbox_escape_is_an_observation_not_a_crash() {
    let mut h = Harness::new(vec![
        act("Read the password file.", "filesystem", json!({"operation": "read", "filename": "../../etc/passwd"})),
        answer("I can't read files outside the sandbox."),
    ]);

    let (outcome, events) = h.run("read /etc/passwd").await;
    assert_eq!(outcome.status, LoopStatus::Finished);
    assert!(h.provider.last_seen(1).starts_with("Observation: Error"));

    let failed = events.iter().any(|e| matches!(e, AgentEvent::Observation { succeeded: false, .. }));
    assert!(failed);
}

#[tokio::test]
async fn e2e_memory_survives_across_objectives() {
    let memory: Arc<dyn MemoryBackend> = Arc::new(InMemoryBackend::new());
    let mut h = Harness::with_memory(
        vec![
            act(
                "Store it.",
                "memory",
                json!({"operation": "remember", "fact": "The deploy window is Tuesday 14:00 UTC"}),
            ),
            answer("Noted."),
            act("Check memory first.", "memory", json!({"operation": "recall", "query": "deploy window"})),
            answer("Tuesday 14:00 UTC."),
        ],
        memory.clone(),
    );

    h.run("remember the deploy window").await;
    let (outcome, _) = h.run("when is the deploy window?").await;

    assert_eq!(outcome.final_output, "Tuesday 14:00 UTC.");
    assert_eq!(memory.count().await.unwrap(), 1);
    assert!(h.provider.last_seen(3).contains("Recalled memories:\n- The deploy window is Tuesday 14:00 UTC"));
}

#[tokio::test]
async fn e2e_repeated_failures_escalate_once() {
    let read_missing = act("Read it.", "filesystem", json!({"operation": "read", "filename": "missing.csv"}));
    let mut h = Harness::new(vec![
        read_missing.clone(),
        act("Maybe without the operation.", "filesystem", json!({"filename": "missing.csv"})),
        read_missing,
        answer("I can't find missing.csv. Where should I look?"),
    ]);

    let (outcome, events) = h.run("summarize missing.csv").await;
    assert_eq!(outcome.status, LoopStatus::Finished);
    assert_eq!(h.provider.calls(), 4);
    assert_eq!(h.provider.last_seen(3), ESCALATION_DIRECTIVE);

    let directives = h
        .session
        .history()
        .messages()
        .iter()
        .filter(|m| m.content == ESCALATION_DIRECTIVE)
        .count();
    assert_eq!(directives, 1);
    assert_eq!(events.iter().filter(|e| matches!(e, AgentEvent::Escalation { .. })).count(), 1);
}

#[tokio::test]
async fn e2e_turn_limit_gives_a_notice() {
    let list = act("Look around.", "filesystem", json!({"operation": "list"}));
    let mut h = Harness::new(vec![list; 3]);
    let tools = Arc::new(registry(&h.sandbox, Arc::new(InMemoryBackend::new())));
    h.executor = TurnExecutor::new(h.provider.clone(), tools, "e2e-model").with_max_turns(3);

    let (outcome, events) = h.run("explore forever").await;
    assert_eq!(outcome.status, LoopStatus::Exhausted);
    assert_eq!(outcome.turns, 3);
    let last = events.last().unwrap();
    assert!(matches!(last, AgentEvent::Exhausted { .. }));
    assert_eq!(last.channel(), EventChannel::Final);
}

#[cfg(unix)]
#[tokio::test]
async fn e2e_shell_output_uses_the_terminal_channel() {
    let mut h = Harness::new(vec![
        act("Create a file.", "filesystem", json!({"operation": "write", "filename": "hello.txt", "content": "hi"})),
        act("List it.", "shell", json!({"command": "ls"})),
        answer("There is one file."),
    ]);

    let (_, events) = h.run("what files exist?").await;
    let terminal: Vec<&AgentEvent> = events.iter().filter(|e| e.channel() == EventChannel::Terminal).collect();
    assert_eq!(terminal.len(), 1);
    let AgentEvent::Observation { tool, output, .. } = terminal[0] else {
        panic!("expected an observation");
    };
    assert_eq!(tool, "shell");
    assert!(output.contains("hello.txt"));
}

#[tokio::test]
async fn e2e_reset_keeps_only_the_system_prompt() {
    let mut h = Harness::new(vec![answer("hi")]);
    h.run("say hi").await;
    assert!(h.session.history().len() > 1);

    h.session.reset();
    assert_eq!(h.session.history().len(), 1);
    assert!(h.session.history().system_prompt().contains("respond_to_user"));
}
