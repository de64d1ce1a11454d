//! Web search tool: queries the Tavily search API.

use async_trait::async_trait;
use chimera_core::error::ToolError;
use chimera_core::tool::{ParamSpec, Tool, ToolArgs, ToolResult, ToolSpec};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::args::{optional_usize, required_str};
use crate::http_client;

const TAVILY_URL: &str = "https://api.tavily.com/search";
const DEFAULT_RESULTS: usize = 5;
const MAX_RESULTS: usize = 10;

pub struct WebSearchTool {
    api_key: Option<String>,
    endpoint: String,
    client: reqwest::Client,
    spec: ToolSpec,
}

impl WebSearchTool {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            endpoint: TAVILY_URL.into(),
            client: http_client(timeout),
            spec: ToolSpec::single(
                "web_search",
                "Search the web. Returns titles, URLs and snippets; use web_reader to open a result.",
                vec![
                    ParamSpec::required("query", "The search query"),
                    ParamSpec::optional("num_results", "Number of results (default 5)"),
                ],
            ),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

fn format_hits(query: &str, hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return format!("No results found for '{query}'.");
    }
    hits.iter()
        .enumerate()
        .map(|(i, hit)| format!("{}. {}\n   URL: {}\n   {}", i + 1, hit.title, hit.url, hit.content.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait]
impl Tool for WebSearchTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, _operation: &str, args: ToolArgs) -> Result<ToolResult, ToolError> {
        let query = required_str(&args, "query")?;
        let num_results = optional_usize(&args, "num_results")
            .unwrap_or(DEFAULT_RESULTS)
            .clamp(1, MAX_RESULTS);

        let Some(api_key) = &self.api_key else {
            return Err(ToolError::NotConfigured {
                tool_name: "web_search".into(),
                reason: "set TAVILY_API_KEY or tools.search_api_key".into(),
            });
        };

        debug!(query = %query, num_results, "Searching the web");

        let body = serde_json::json!({
            "api_key": api_key,
            "query": query,
            "max_results": num_results,
        });
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "web_search".into(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Search API returned error");
            return Ok(ToolResult::failed(format!("Search API returned {status}: {text}")));
        }

        let parsed: SearchResponse = response.json().await.map_err(|e| ToolError::ExecutionFailed {
            tool_name: "web_search".into(),
            reason: format!("unreadable search response: {e}"),
        })?;

        Ok(ToolResult::ok(format_hits(query, &parsed.results)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn formats_numbered_results() {
        let parsed: SearchResponse = serde_json::from_value(json!({
            "results": [
                { "title": "The Rust Book", "url": "https://doc.rust-lang.org/book/", "content": "Learn Rust. " },
                { "title": "Rust by Example", "url": "https://doc.rust-lang.org/rust-by-example/" }
            ]
        }))
        .unwrap();

        let text = format_hits("rust", &parsed.results);
        assert!(text.starts_with("1. The Rust Book"));
        assert!(text.contains("URL: https://doc.rust-lang.org/book/"));
        assert!(text.contains("2. Rust by Example"));
    }

    #[test]
    fn empty_results_are_reported() {
        assert_eq!(format_hits("zzz", &[]), "No results found for 'zzz'.");
    }

    #[tokio::test]
    async fn missing_key_fails_per_call() {
        let tool = WebSearchTool::new(Some("  ".into()), Duration::from_secs(1));
        let args = json!({"query": "rust"}).as_object().cloned().unwrap();
        let err = tool.execute("web_search", args).await.unwrap_err();
        assert!(matches!(err, ToolError::NotConfigured { .. }));
        assert!(err.to_string().contains("TAVILY_API_KEY"));
    }
}
