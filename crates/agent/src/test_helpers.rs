//! Shared test doubles for the executor tests.

use chimera_core::error::{ProviderError, ToolError};
use chimera_core::message::Message;
use chimera_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use chimera_core::tool::{ParamSpec, Tool, ToolArgs, ToolResult, ToolSpec};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};

/// A provider that returns scripted responses in order and records every request.
///
/// Panics if more calls are made than responses provided.
pub struct ScriptedProvider {
    responses: Mutex<Vec<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(texts: &[&str]) -> Self {
        Self::with_results(texts.iter().map(|t| Ok(make_text_response(t))).collect())
    }

    pub fn with_results(responses: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// The same response `n` times.
    pub fn repeating(text: &str, n: usize) -> Self {
        Self::new(&vec![text; n])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let responses = self.responses.lock().unwrap();
        let call = requests.len();
        if call >= responses.len() {
            panic!("ScriptedProvider: no more responses (call #{call}, have {})", responses.len());
        }
        requests.push(request);
        responses[call].clone()
    }
}

pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "scripted-model".into(),
    }
}

/// A well-formed action as the model would write it.
pub fn action(thought: &str, tool: &str, args: Value) -> String {
    json!({"thought": thought, "action": {"tool": tool, "args": args}}).to_string()
}

pub fn finish(text: &str) -> String {
    action("I have the answer.", "respond_to_user", json!({"text": text}))
}

/// A search tool that records the arguments it receives.
///
/// Clones share the call log, so a test can keep one handle and register another.
#[derive(Clone)]
pub struct RecordingSearch {
    spec: ToolSpec,
    pub calls: Arc<Mutex<Vec<ToolArgs>>>,
    reply: String,
}

impl RecordingSearch {
    pub fn new(reply: &str) -> Self {
        Self {
            spec: ToolSpec::single("web_search", "Search", vec![ParamSpec::required("query", "Query")]),
            calls: Arc::new(Mutex::new(Vec::new())),
            reply: reply.into(),
        }
    }
}

#[async_trait::async_trait]
impl Tool for RecordingSearch {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, _operation: &str, args: ToolArgs) -> Result<ToolResult, ToolError> {
        self.calls.lock().unwrap().push(args);
        Ok(ToolResult::ok(self.reply.clone()))
    }
}

/// Always reports a failed run.
pub struct BrokenScript;

#[async_trait::async_trait]
impl Tool for BrokenScript {
    fn spec(&self) -> &ToolSpec {
        static SPEC: std::sync::OnceLock<ToolSpec> = std::sync::OnceLock::new();
        SPEC.get_or_init(|| {
            ToolSpec::single("execute_python", "Run a script", vec![ParamSpec::required("filename", "Script")])
                .terminal()
        })
    }

    async fn execute(&self, _operation: &str, _args: ToolArgs) -> Result<ToolResult, ToolError> {
        Ok(ToolResult::failed("Process exited with code 1.\nSTDERR:\nNameError: x"))
    }
}
