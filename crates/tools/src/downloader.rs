//! Downloader tool: stream a remote file into the sandbox.

use async_trait::async_trait;
use chimera_core::error::ToolError;
use chimera_core::tool::{ParamSpec, Tool, ToolArgs, ToolResult, ToolSpec};
use futures::StreamExt;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::args::required_str;
use crate::http_client;
use crate::sandbox::Sandbox;

pub struct DownloaderTool {
    sandbox: Sandbox,
    client: reqwest::Client,
    spec: ToolSpec,
}

impl DownloaderTool {
    pub fn new(sandbox: Sandbox, timeout: Duration) -> Self {
        Self {
            sandbox,
            client: http_client(timeout),
            spec: ToolSpec::single(
                "downloader",
                "Download a file from a URL and save it in the sandbox.",
                vec![
                    ParamSpec::required("url", "Direct link to the file"),
                    ParamSpec::required("filename", "Name to save it under, relative to the sandbox"),
                ],
            ),
        }
    }

    fn failed(reason: impl std::fmt::Display) -> ToolError {
        ToolError::ExecutionFailed {
            tool_name: "downloader".into(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl Tool for DownloaderTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, _operation: &str, args: ToolArgs) -> Result<ToolResult, ToolError> {
        let url = required_str(&args, "url")?;
        let filename = required_str(&args, "filename")?;
        let path = self.sandbox.resolve(filename)?;

        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ToolError::InvalidArguments(format!("'{url}' is not an http(s) URL")));
        }

        debug!(url = %url, target = %path.display(), "Starting download");

        let response = self.client.get(url).send().await.map_err(Self::failed)?;
        let status = response.status();
        if !status.is_success() {
            return Ok(ToolResult::failed(format!("Download from {url} returned {status}")));
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(Self::failed)?;
        }
        let mut file = tokio::fs::File::create(&path).await.map_err(Self::failed)?;

        let mut written: u64 = 0;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(Self::failed)?;
            file.write_all(&chunk).await.map_err(Self::failed)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(Self::failed)?;

        info!(url = %url, bytes = written, "Download complete");
        Ok(ToolResult::ok(format!(
            "Successfully downloaded {written} bytes from {url} and saved as '{}'.",
            self.sandbox.display(&path)
        )))
    }
}
