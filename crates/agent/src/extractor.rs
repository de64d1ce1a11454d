//! Response extraction: turn raw model text into a [`ProposedAction`].
//!
//! Models wrap their JSON in prose, code fences and the occasional stray
//! quote. Extraction scans for brace-delimited candidates, decodes each into
//! the `{thought, action: {tool, args}}` shape and, when a candidate does not
//! decode, retries it once after a repair pass for the defects small models
//! commonly produce (unescaped quotes, literal newlines, a response that is
//! itself a JSON-encoded string).

use chimera_core::tool::ToolArgs;
use serde_json::Value;
use std::borrow::Cow;
use std::fmt::Write as _;
use thiserror::Error;
use tracing::debug;

/// Used when the model omits its reasoning.
pub const DEFAULT_THOUGHT: &str = "(No thought provided)";

/// The action the model proposed for this turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ProposedAction {
    pub thought: String,

    /// `None` when the action object names no tool.
    pub tool: Option<String>,

    pub args: ToolArgs,

    /// The decoded object, kept so the history records exactly what was parsed.
    pub source: Value,
}

impl ProposedAction {
    /// Pretty-printed decoded object, as appended to the history.
    pub fn to_history_entry(&self) -> String {
        serde_json::to_string_pretty(&self.source).unwrap_or_else(|_| self.source.to_string())
    }
}

/// No candidate block decoded into an action.
#[derive(Debug, Clone, Error)]
#[error("{reason}")]
pub struct ExtractionError {
    /// Why the last candidate was rejected.
    pub reason: String,

    /// The model output, verbatim.
    pub raw: String,
}

impl ExtractionError {
    /// Corrective message fed back to the model.
    pub fn diagnostic(&self) -> String {
        format!(
            "Your response was not valid JSON. You MUST follow the specified format. Error: {}\nYour output was:\n{}",
            self.reason, self.raw
        )
    }
}

/// Extract the proposed action from one model response.
pub fn extract(raw: &str) -> Result<ProposedAction, ExtractionError> {
    let text = unwrap_encoded(raw);
    let candidates = candidate_blocks(&text);

    if candidates.is_empty() {
        return Err(ExtractionError {
            reason: "no JSON object found in the response".into(),
            raw: raw.to_string(),
        });
    }

    let mut reason = String::new();
    for candidate in candidates {
        match decode(candidate) {
            Ok(action) => return Ok(action),
            Err(first) => {
                let repaired = repair(candidate);
                match decode(&repaired) {
                    Ok(action) => {
                        debug!(error = %first, "Recovered action after repairing model output");
                        return Ok(action);
                    }
                    Err(e) => reason = e,
                }
            }
        }
    }

    Err(ExtractionError {
        reason,
        raw: raw.to_string(),
    })
}

/// A response that is a JSON string literal is replaced by its contents.
fn unwrap_encoded(raw: &str) -> Cow<'_, str> {
    let trimmed = raw.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        if let Ok(inner) = serde_json::from_str::<String>(trimmed) {
            return Cow::Owned(inner);
        }
        return Cow::Borrowed(&trimmed[1..trimmed.len() - 1]);
    }
    Cow::Borrowed(raw)
}

/// Top-level balanced `{...}` spans in order, then first `{` to last `}`.
///
/// A `{` that never closes restarts the scan just past it, so a stray brace
/// in the prose does not swallow the blocks that follow.
fn candidate_blocks(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut offset = 0;
    while let Some(unclosed) = balanced_spans(text, offset, &mut blocks) {
        offset = unclosed + 1;
    }

    if let (Some(first), Some(last)) = (text.find('{'), text.rfind('}'))
        && first < last
    {
        let widest = &text[first..=last];
        if !blocks.contains(&widest) {
            blocks.push(widest);
        }
    }
    blocks
}

/// Push every top-level balanced span of `text[offset..]` onto `blocks`.
/// Returns the start of a span still open at the end of the text.
fn balanced_spans<'a>(text: &'a str, offset: usize, blocks: &mut Vec<&'a str>) -> Option<usize> {
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, b) in text.bytes().enumerate().skip(offset) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' if depth > 0 => in_string = true,
            b'{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            b'}' if depth > 0 => {
                depth -= 1;
                if depth == 0
                    && let Some(s) = start.take()
                {
                    let span = &text[s..=i];
                    if !blocks.contains(&span) {
                        blocks.push(span);
                    }
                }
            }
            _ => {}
        }
    }
    start
}

fn decode(candidate: &str) -> Result<ProposedAction, String> {
    let source: Value = serde_json::from_str(candidate).map_err(|e| e.to_string())?;
    let Some(object) = source.as_object() else {
        return Err("expected a JSON object".into());
    };

    let action = match object.get("action") {
        Some(Value::Object(action)) => action,
        Some(_) => return Err("'action' must be an object".into()),
        None => return Err("Your JSON is missing the 'action' key.".into()),
    };

    let thought = object
        .get("thought")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_THOUGHT)
        .to_string();

    let tool = action
        .get("tool")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    let args = match action.get("args") {
        None | Some(Value::Null) => ToolArgs::new(),
        Some(Value::Object(args)) => args.clone(),
        Some(_) => return Err("'args' must be an object".into()),
    };

    Ok(ProposedAction {
        thought,
        tool,
        args,
        source,
    })
}

/// Escape quotes and control characters that sit inside string values.
///
/// A quote closes the current string only when what follows it could
/// continue the JSON structure; any other quote is treated as content.
fn repair(candidate: &str) -> String {
    let chars: Vec<char> = candidate.chars().collect();
    let mut out = String::with_capacity(candidate.len() + 16);
    let mut in_string = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if !in_string {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
            i += 1;
            continue;
        }

        match c {
            '\\' => match chars.get(i + 1) {
                Some(&next) if !next.is_control() => {
                    out.push('\\');
                    out.push(next);
                    i += 1;
                }
                _ => out.push_str("\\\\"),
            },
            '"' => {
                if closes_string(&chars[i + 1..]) {
                    in_string = false;
                    out.push('"');
                } else {
                    out.push_str("\\\"");
                }
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
        i += 1;
    }
    out
}

fn closes_string(rest: &[char]) -> bool {
    let mut tokens = rest.iter().copied().filter(|c| !c.is_whitespace());
    match tokens.next() {
        None | Some(':') | Some('}') | Some(']') => true,
        Some(',') => matches!(
            tokens.next(),
            None | Some('"') | Some('{') | Some('[') | Some('}') | Some(']') | Some('-') | Some('0'..='9')
        ),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_object() {
        let action = extract(r#"{"thought": "look", "action": {"tool": "web_search", "args": {"query": "rust"}}}"#).unwrap();
        assert_eq!(action.thought, "look");
        assert_eq!(action.tool.as_deref(), Some("web_search"));
        assert_eq!(Value::Object(action.args), json!({"query": "rust"}));
    }

    #[test]
    fn prose_around_the_block_is_ignored() {
        let raw = "Sure! Here is my next step:\n```json\n{\"thought\": \"t\", \"action\": {\"tool\": \"memory\", \"args\": {\"operation\": \"recall\", \"query\": \"x\"}}}\n```\nLet me know {if} that helps.";
        let action = extract(raw).unwrap();
        assert_eq!(action.tool.as_deref(), Some("memory"));
        assert_eq!(action.args["operation"], "recall");
    }

    #[test]
    fn first_block_with_an_action_wins() {
        let raw = r#"Context: {"note": "not an action"} then {"thought": "a", "action": {"tool": "shell", "args": {"command": "ls"}}} and {"thought": "b", "action": {"tool": "other"}}"#;
        let action = extract(raw).unwrap();
        assert_eq!(action.thought, "a");
        assert_eq!(action.tool.as_deref(), Some("shell"));
    }

    #[test]
    fn braces_inside_strings_do_not_split_blocks() {
        let raw = r#"{"thought": "use } and { freely", "action": {"tool": "execute_python", "args": {"code": "print({'a': 1})"}}}"#;
        let action = extract(raw).unwrap();
        assert_eq!(action.args["code"], "print({'a': 1})");
    }

    #[test]
    fn literal_newlines_in_code_are_repaired() {
        let raw = "{\"thought\": \"write it\", \"action\": {\"tool\": \"filesystem\", \"args\": {\"operation\": \"write\", \"filename\": \"a.py\", \"content\": \"import os\n\tprint(1)\"}}}";
        let action = extract(raw).unwrap();
        assert_eq!(action.args["content"], "import os\n\tprint(1)");
    }

    #[test]
    fn interior_quotes_are_repaired() {
        let raw = r#"{"thought": "The user said "hello, world" to me", "action": {"tool": "respond_to_user", "args": {"text": "You said "hi""}}}"#;
        let action = extract(raw).unwrap();
        assert_eq!(action.thought, r#"The user said "hello, world" to me"#);
        assert_eq!(action.args["text"], r#"You said "hi""#);
    }

    #[test]
    fn json_encoded_response_is_unwrapped() {
        let inner = json!({"thought": "t", "action": {"tool": "shell", "args": {"command": "pwd"}}}).to_string();
        let raw = serde_json::to_string(&inner).unwrap();
        let action = extract(&raw).unwrap();
        assert_eq!(action.tool.as_deref(), Some("shell"));
    }

    #[test]
    fn thought_defaults_and_args_may_be_null() {
        let action = extract(r#"{"action": {"tool": "filesystem", "args": null}}"#).unwrap();
        assert_eq!(action.thought, DEFAULT_THOUGHT);
        assert!(action.args.is_empty());

        let action = extract(r#"{"thought": 7, "action": {"tool": "filesystem"}}"#).unwrap();
        assert_eq!(action.thought, DEFAULT_THOUGHT);
        assert!(action.args.is_empty());
    }

    #[test]
    fn thought_text_is_kept_verbatim() {
        let action = extract(r#"{"thought": "  indented plan ", "action": {"tool": "shell"}}"#).unwrap();
        assert_eq!(action.thought, "  indented plan ");

        let action = extract(r#"{"thought": "", "action": {"tool": "shell"}}"#).unwrap();
        assert_eq!(action.thought, "");
    }

    #[test]
    fn unmatched_brace_in_prose_does_not_hide_the_block() {
        let raw = r#"I will use the { operator. {"thought": "a", "action": {"tool": "shell", "args": {"command": "ls"}}}"#;
        let action = extract(raw).unwrap();
        assert_eq!(action.thought, "a");
        assert_eq!(action.tool.as_deref(), Some("shell"));
        assert_eq!(action.args["command"], "ls");

        let raw = r#"{ {"thought": "b", "action": {"tool": "memory"}} and { trailing"#;
        assert_eq!(extract(raw).unwrap().thought, "b");
    }

    #[test]
    fn missing_tool_still_decodes() {
        let action = extract(r#"{"thought": "hmm", "action": {"args": {"x": 1}}}"#).unwrap();
        assert!(action.tool.is_none());

        let action = extract(r#"{"thought": "hmm", "action": {"tool": "  "}}"#).unwrap();
        assert!(action.tool.is_none());
    }

    #[test]
    fn missing_action_quotes_the_raw_text() {
        let raw = r#"I think {"thought": "only thinking"}"#;
        let err = extract(raw).unwrap_err();
        assert_eq!(err.raw, raw);
        assert!(err.diagnostic().contains(raw));
        assert!(err.diagnostic().starts_with("Your response was not valid JSON"));
    }

    #[test]
    fn non_object_args_are_rejected() {
        let err = extract(r#"{"thought": "t", "action": {"tool": "shell", "args": "ls"}}"#).unwrap_err();
        assert!(err.reason.contains("args"));
    }

    #[test]
    fn no_braces_at_all() {
        let err = extract("I'm not sure what to do next.").unwrap_err();
        assert!(err.reason.contains("no JSON object"));
    }

    #[test]
    fn history_entry_is_the_decoded_object() {
        let action = extract(r#"noise {"thought": "t", "action": {"tool": "shell", "args": {"command": "ls"}}} noise"#).unwrap();
        let entry: Value = serde_json::from_str(&action.to_history_entry()).unwrap();
        assert_eq!(entry, action.source);
        assert!(!action.to_history_entry().contains("noise"));
    }
}
