//! OpenAI-compatible chat-completions client
//!
//! Serves both OpenAI and Ollama (through its `/v1` compatibility layer); the
//! model identifier picks the endpoint.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::clients::routing::{ModelRoute, ProviderKind};
use crate::clients::sse::{SseEvent, SseParser};
use crate::clients::traits::{CompletionProvider, CompletionRequest, FragmentStream, ProviderError};
use crate::config::{Config, ProviderConfig};
use crate::extract::truncate_chars;

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Clone, Debug)]
pub struct OpenAiCompatibleClient {
    client: Client,
    provider: ProviderConfig,
    api_key: Option<String>,
}

impl OpenAiCompatibleClient {
    pub fn new(config: &Config) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.provider.timeout_ms))
            .build()
            .map_err(|e| ProviderError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            provider: config.provider.clone(),
            api_key: config.runtime.openai_api_key.clone(),
        })
    }

    async fn send(
        &self,
        request: &CompletionRequest,
        stream: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let route = ModelRoute::parse(&request.model)?;
        let endpoint = format!(
            "{}/chat/completions",
            route.base_url(&self.provider).trim_end_matches('/')
        );

        let body = json!({
            "model": route.name,
            "messages": [
                {"role": "user", "content": request.message}
            ],
            "stream": stream
        });

        let mut builder = self.client.post(&endpoint).json(&body);
        if route.kind == ProviderKind::OpenAi
            && let Some(key) = &self.api_key
        {
            builder = builder.bearer_auth(key);
        }

        tracing::debug!(
            "POST {} (model={}, chars={}, stream={})",
            endpoint,
            route.name,
            request.message.len(),
            stream
        );

        let res = builder
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let text = res.text().await.unwrap_or_default();
            return Err(ProviderError::Http {
                status,
                body: truncate_chars(text.trim(), 500),
            });
        }

        Ok(res)
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompatibleClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let res = self.send(request, false).await?;
        let parsed: ChatResponse = res
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(ProviderError::Empty);
        }
        Ok(content)
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<FragmentStream, ProviderError> {
        let res = self.send(request, true).await?;
        let bytes = res.bytes_stream().boxed();

        let state = (bytes, SseParser::new(), VecDeque::new(), false);
        let fragments = futures_util::stream::unfold(
            state,
            |(mut bytes, mut parser, mut pending, mut finished)| async move {
                loop {
                    if let Some(item) = pending.pop_front() {
                        return Some((item, (bytes, parser, pending, finished)));
                    }
                    if finished {
                        return None;
                    }
                    match bytes.next().await {
                        Some(Ok(chunk)) => {
                            finished = queue_events(parser.push(&chunk), &mut pending);
                        }
                        Some(Err(e)) => {
                            pending.push_back(Err(ProviderError::Stream(e.to_string())));
                            finished = true;
                        }
                        None => finished = true,
                    }
                }
            },
        );

        Ok(fragments.boxed())
    }
}

/// Queue fragments and errors; true once the stream has ended
fn queue_events(
    events: Vec<SseEvent>,
    pending: &mut VecDeque<Result<String, ProviderError>>,
) -> bool {
    let mut finished = false;
    for event in events {
        match event {
            SseEvent::Fragment(text) => pending.push_back(Ok(text)),
            SseEvent::Error(message) => {
                pending.push_back(Err(ProviderError::Stream(message)));
                finished = true;
            }
            SseEvent::Done => finished = true,
        }
    }
    finished
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_shape() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"hi"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("hi"));
    }

    #[test]
    fn test_in_band_error_becomes_stream_error() {
        let mut pending = VecDeque::new();
        let finished = queue_events(
            vec![
                SseEvent::Fragment("par".into()),
                SseEvent::Error("rate limit exceeded".into()),
            ],
            &mut pending,
        );
        assert!(finished);
        assert_eq!(pending.pop_front().unwrap().unwrap(), "par");
        match pending.pop_front().unwrap() {
            Err(ProviderError::Stream(message)) => assert_eq!(message, "rate limit exceeded"),
            other => panic!("unexpected item {:?}", other),
        }
    }

    #[test]
    fn test_fragments_keep_stream_open() {
        let mut pending = VecDeque::new();
        assert!(!queue_events(vec![SseEvent::Fragment("a".into())], &mut pending));
        assert!(queue_events(vec![SseEvent::Done], &mut pending));
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn test_unsupported_model_fails_before_network() {
        let client = OpenAiCompatibleClient::new(&Config::default()).unwrap();
        let err = client
            .complete(&CompletionRequest::new("bedrock/claude", "hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnsupportedModel(_)));
    }
}
