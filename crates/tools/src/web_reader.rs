//! Web reader tool: fetch a page and return its visible text.

use async_trait::async_trait;
use chimera_core::error::ToolError;
use chimera_core::tool::{ParamSpec, Tool, ToolArgs, ToolResult, ToolSpec};
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::debug;

use crate::args::required_str;
use crate::http_client;

/// Page text beyond this many characters is cut off.
pub const MAX_PAGE_CHARS: usize = 8000;

/// Elements whose text never reaches the model.
const HIDDEN_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "svg", "head", "header", "footer", "nav", "aside",
];

pub struct WebReaderTool {
    client: reqwest::Client,
    spec: ToolSpec,
}

impl WebReaderTool {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            spec: ToolSpec::single(
                "web_reader",
                "Read the main text of a web page.",
                vec![ParamSpec::required("url", "Full http(s) URL of the page")],
            ),
        }
    }
}

/// Title plus visible body text, one text run per line.
pub fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let title = Selector::parse("title")
        .ok()
        .and_then(|sel| document.select(&sel).next())
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());

    let mut lines: Vec<&str> = Vec::new();
    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|el| HIDDEN_TAGS.contains(&el.name()))
        });
        if hidden {
            continue;
        }
        let text = text.trim();
        if !text.is_empty() {
            lines.push(text);
        }
    }

    let body = lines.join("\n");
    match title {
        Some(title) => format!("Title: {title}\n\n{body}"),
        None => body,
    }
}

/// Cut `text` to at most `max` characters, marking the cut.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}\n... [truncated]", &text[..cut]),
        None => text.to_string(),
    }
}

#[async_trait]
impl Tool for WebReaderTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, _operation: &str, args: ToolArgs) -> Result<ToolResult, ToolError> {
        let url = required_str(&args, "url")?;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ToolError::InvalidArguments(format!("'{url}' is not an http(s) URL")));
        }

        debug!(url = %url, "Reading web page");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "web_reader".into(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Ok(ToolResult::failed(format!("Fetching {url} returned {status}")));
        }

        let html = response.text().await.map_err(|e| ToolError::ExecutionFailed {
            tool_name: "web_reader".into(),
            reason: e.to_string(),
        })?;

        let text = visible_text(&html);
        if text.trim().is_empty() {
            return Ok(ToolResult::ok(format!("The page at {url} has no readable text.")));
        }
        Ok(ToolResult::ok(truncate_chars(&text, MAX_PAGE_CHARS)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!doctype html>
<html><head><title> Release notes </title><style>body { color: red }</style></head>
<body>
  <nav><a href="/">Home</a></nav>
  <header>Site banner</header>
  <main><h1>Version 2.0</h1><p>Faster builds.</p><script>track()</script></main>
  <aside>Related links</aside>
  <footer>Copyright</footer>
</body></html>"#;

    #[test]
    fn boilerplate_is_stripped() {
        let text = visible_text(PAGE);
        assert!(text.starts_with("Title: Release notes"));
        assert!(text.contains("Version 2.0"));
        assert!(text.contains("Faster builds."));
        for hidden in ["Home", "Site banner", "track()", "Related links", "Copyright", "color: red"] {
            assert!(!text.contains(hidden), "leaked {hidden}");
        }
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "é".repeat(10);
        let cut = truncate_chars(&text, 4);
        assert!(cut.starts_with("éééé\n"));
        assert!(cut.ends_with("[truncated]"));
        assert_eq!(truncate_chars("short", 100), "short");
    }

    #[tokio::test]
    async fn non_http_urls_are_rejected() {
        let tool = WebReaderTool::new(Duration::from_secs(1));
        let args = serde_json::json!({"url": "file:///etc/passwd"}).as_object().cloned().unwrap();
        let err = tool.execute("web_reader", args).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
