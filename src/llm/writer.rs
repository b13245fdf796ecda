use crate::llm::client::CompletionClient;
use crate::narrative::{fallback_summary, NarrativeError, NarrativeRequest, SYSTEM_PROMPT};
use log::{info, warn};
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Turns a [`NarrativeRequest`] into commentary through the completion API,
/// bounded by a timeout.
pub struct NarrativeWriter {
    client: CompletionClient,
    model: String,
    system_prompt: String,
    timeout: Duration,
}

impl NarrativeWriter {
    pub fn new(client: CompletionClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            system_prompt: SYSTEM_PROMPT.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn write(&self, request: &NarrativeRequest) -> Result<String, NarrativeError> {
        info!(
            "Requesting narrative for {} ({} view, {} driver lines)",
            request.period_label,
            request.grouping_label,
            request.lines.len()
        );

        let prompt = request.to_prompt();
        let call = self
            .client
            .complete(&self.model, &self.system_prompt, &prompt);

        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(NarrativeError::Timeout(self.timeout)),
        }
    }

    /// Like [`write`](Self::write), but any failure yields the local summary.
    pub async fn write_or_fallback(&self, request: &NarrativeRequest) -> String {
        match self.write(request).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Narrative unavailable, using fallback summary: {}", e);
                fallback_summary(request)
            }
        }
    }
}
