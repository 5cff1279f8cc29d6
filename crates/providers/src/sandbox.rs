//! Code sandbox clients.
//!
//! [`HttpSandbox`] posts snippets to a remote execution service
//! (`POST {base}/execute`). [`DisabledSandbox`] stands in when no service is
//! configured and reports every call as unavailable.

use async_trait::async_trait;
use docent_core::error::SandboxError;
use docent_core::sandbox::{CodeSandbox, ExecutionOutcome, ExecutionRequest};
use std::time::Duration;
use tracing::{debug, warn};

pub struct HttpSandbox {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl HttpSandbox {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        // The invoker enforces the per-call deadline; this only caps a hung socket.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(600))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            client,
        }
    }
}

#[async_trait]
impl CodeSandbox for HttpSandbox {
    fn name(&self) -> &str {
        "http"
    }

    async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionOutcome, SandboxError> {
        let url = format!("{}/execute", self.base_url);
        debug!(
            url = %url,
            language = request.language.as_str(),
            bytes = request.code.len(),
            "Submitting code"
        );

        let mut builder = self.client.post(&url).json(&request);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| SandboxError::Unreachable(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(SandboxError::Rejected(format!("{status}: {body}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "Sandbox returned error");
            return Err(SandboxError::Unreachable(format!("{status}: {body}")));
        }

        response
            .json::<ExecutionOutcome>()
            .await
            .map_err(|e| SandboxError::Unreachable(format!("unreadable sandbox response: {e}")))
    }
}

/// Used when no sandbox URL is configured.
pub struct DisabledSandbox;

#[async_trait]
impl CodeSandbox for DisabledSandbox {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn execute(&self, _request: ExecutionRequest) -> Result<ExecutionOutcome, SandboxError> {
        Err(SandboxError::NotConfigured)
    }

    fn is_configured(&self) -> bool {
        false
    }
}
