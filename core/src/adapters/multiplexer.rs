//! Ties provider adapters, re-chunking, tool-call detection, retry, and
//! usage/cost tracking into one normalized output stream (spec §4.5,
//! "Common pipeline").

use std::sync::Arc;

use futures::StreamExt;
use serde_json::Value as JsonValue;
use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;
use writeflow_protocol::ErrorKind;
use writeflow_protocol::ModelProfile;
use writeflow_protocol::RuntimeError;
use writeflow_protocol::StreamChunk;
use writeflow_protocol::StreamId;
use writeflow_protocol::Usage;

use crate::adapters::AdapterState;
use crate::adapters::ProviderAdapter;
use crate::adapters::ProviderEvent;
use crate::adapters::rechunk::rechunk;
use crate::adapters::retry::RetryPolicy;
use crate::adapters::retry::is_retryable;
use crate::adapters::toolcall::TextSegment;
use crate::adapters::toolcall::ToolCallAccumulator;

/// One multiplexed output: a normalized chunk for the UI, or a tool-call
/// candidate detected inside the model's text, surfaced separately from
/// the surrounding prose.
#[derive(Debug, Clone)]
pub enum MultiplexedEvent {
    Chunk(StreamChunk),
    ToolUse(JsonValue),
}

pub struct StreamMultiplexer {
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl Default for StreamMultiplexer {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
            retry: RetryPolicy::default(),
        }
    }
}

impl StreamMultiplexer {
    pub fn new(client: reqwest::Client, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    /// Drives one streaming completion request, forwarding normalized
    /// events to `out`. Transient errors are retried with exponential
    /// backoff up to the policy's budget; a non-retryable error, or one
    /// surviving the budget, terminates the stream with an error chunk.
    pub async fn stream(
        &self,
        adapter: Arc<dyn ProviderAdapter>,
        profile: &ModelProfile,
        messages: &[JsonValue],
        out: UnboundedSender<MultiplexedEvent>,
    ) {
        let stream_id = StreamId::new();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.attempt_stream(&adapter, profile, messages, stream_id, &out).await {
                Ok(()) => return,
                Err(err) if is_retryable(&err.message) && attempt <= self.retry.max_retries => {
                    let delay = self.retry.backoff(attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        provider = adapter.name(),
                        "retrying transient provider error"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    let _ = out.send(MultiplexedEvent::Chunk(StreamChunk {
                        stream_id,
                        content_delta: String::new(),
                        reasoning_delta: None,
                        done: true,
                        error: Some(err.kind),
                        usage: None,
                    }));
                    return;
                }
            }
        }
    }

    async fn attempt_stream(
        &self,
        adapter: &Arc<dyn ProviderAdapter>,
        profile: &ModelProfile,
        messages: &[JsonValue],
        stream_id: StreamId,
        out: &UnboundedSender<MultiplexedEvent>,
    ) -> Result<(), RuntimeError> {
        let body = adapter.transform_request(&profile.model_name, messages);
        let url = profile.base_url.clone().unwrap_or_default();

        let response = self
            .client
            .post(&url)
            .bearer_auth(&profile.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| RuntimeError::new(ErrorKind::ProviderTransient, err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let kind = if status.is_server_error() {
                ErrorKind::ProviderTransient
            } else {
                ErrorKind::ProviderFatal
            };
            return Err(RuntimeError::new(kind, format!("provider returned status {status}")));
        }

        let mut adapter_state = AdapterState::default();
        let mut tool_calls = ToolCallAccumulator::new();
        let mut usage_acc: Option<Usage> = None;
        let mut byte_stream = response.bytes_stream();

        while let Some(next) = byte_stream.next().await {
            let bytes = next.map_err(|err| RuntimeError::new(ErrorKind::ProviderTransient, err.to_string()))?;
            let text = String::from_utf8_lossy(&bytes);
            for event in adapter.parse_chunk(&text, &mut adapter_state) {
                match event {
                    ProviderEvent::Content(delta) => {
                        for segment in tool_calls.push(&delta) {
                            self.emit_segment(stream_id, segment, out);
                        }
                    }
                    ProviderEvent::Reasoning(delta) => {
                        let _ = out.send(MultiplexedEvent::Chunk(StreamChunk {
                            stream_id,
                            content_delta: String::new(),
                            reasoning_delta: Some(delta),
                            done: false,
                            error: None,
                            usage: None,
                        }));
                    }
                    ProviderEvent::Usage(usage) => usage_acc = Some(usage),
                    ProviderEvent::Done => {
                        for segment in tool_calls.flush() {
                            self.emit_segment(stream_id, segment, out);
                        }
                        let _ = out.send(MultiplexedEvent::Chunk(StreamChunk::terminal(stream_id, usage_acc.take())));
                        return Ok(());
                    }
                }
            }
        }

        for segment in tool_calls.flush() {
            self.emit_segment(stream_id, segment, out);
        }
        let _ = out.send(MultiplexedEvent::Chunk(StreamChunk::terminal(stream_id, usage_acc.take())));
        Ok(())
    }

    fn emit_segment(&self, stream_id: StreamId, segment: TextSegment, out: &UnboundedSender<MultiplexedEvent>) {
        match segment {
            TextSegment::Plain(text) => {
                for piece in rechunk(&text) {
                    let _ = out.send(MultiplexedEvent::Chunk(StreamChunk::delta(stream_id, piece.text)));
                }
            }
            TextSegment::ToolCall(value) => {
                let _ = out.send(MultiplexedEvent::ToolUse(value));
            }
        }
    }
}

/// `cost = inputTokens × inRate + outputTokens × outRate` (spec §4.5,
/// rates expressed per 1k tokens on the model profile).
pub fn estimate_cost(usage: &Usage, profile: &ModelProfile) -> f64 {
    (usage.prompt_tokens as f64) * profile.in_rate_per_1k / 1000.0
        + (usage.completion_tokens as f64) * profile.out_rate_per_1k / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::Mock;
    use wiremock::MockServer;
    use wiremock::ResponseTemplate;
    use wiremock::matchers::method;
    use wiremock::matchers::path;

    use crate::adapters::openai_compatible::OpenAiCompatibleAdapter;

    fn profile(base_url: String) -> ModelProfile {
        ModelProfile {
            name: "test".to_string(),
            provider: "openai".to_string(),
            model_name: "gpt-test".to_string(),
            base_url: Some(base_url),
            api_key: "sk-test".to_string(),
            max_tokens: 4096,
            context_length: 8192,
            in_rate_per_1k: 0.001,
            out_rate_per_1k: 0.002,
        }
    }

    #[tokio::test]
    async fn streams_content_and_terminates_on_done() {
        let server = MockServer::start().await;
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"hi\"}}]}\n\ndata: [DONE]\n\n";
        Mock::given(method("POST"))
            .and(path("/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let multiplexer = StreamMultiplexer::default();
        let adapter: Arc<dyn ProviderAdapter> = Arc::new(OpenAiCompatibleAdapter::new("openai"));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        multiplexer
            .stream(adapter, &profile(format!("{}/chat", server.uri())), &[], tx)
            .await;

        let mut saw_content = false;
        let mut saw_done = false;
        while let Some(event) = rx.recv().await {
            if let MultiplexedEvent::Chunk(chunk) = event {
                if !chunk.content_delta.is_empty() {
                    saw_content = true;
                }
                if chunk.done {
                    saw_done = true;
                }
            }
        }
        assert!(saw_content);
        assert!(saw_done);
    }

    #[test]
    fn cost_combines_input_and_output_rates() {
        let usage = Usage {
            prompt_tokens: 1000,
            completion_tokens: 500,
            cache_hit_tokens: None,
            cache_miss_tokens: None,
        };
        let cost = estimate_cost(&usage, &profile("http://x".to_string()));
        assert_eq!(cost, 0.001 + 0.001);
    }
}
