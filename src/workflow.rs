//! Retry-and-validate completion workflow
//!
//! One invocation submits a prompt up to `max_attempts` times. A non-streaming
//! attempt succeeds once the reply contains a fenced JSON mapping that passes
//! the optional schema and has been written to the output file. Provider,
//! extraction, validation and encoding failures are logged and absorbed until
//! the budget runs out, at which point the last one is wrapped in
//! [`UplanError::RetriesExhausted`]. Nothing from a failed attempt is carried
//! into the next.
//!
//! Streaming attempts only forward fragments; the reply is never parsed or
//! persisted. A stream that ends without any text counts as a failed attempt.
//!
//! A document the reviewer sends back is removed when the budget runs out
//! before a replacement is accepted.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::StreamExt;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::clients::{CompletionProvider, CompletionRequest, ProviderError};
use crate::error::{Result, UplanError};
use crate::extract;
use crate::prompt::Payload;
use crate::review::{ReviewChannel, ReviewDecision};
use crate::schema::Schema;
use crate::storage;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Everything one workflow invocation needs
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub payload: Payload,
    pub model: String,
    pub output_file: PathBuf,
    pub schema: Option<Schema>,
    pub max_attempts: u32,
    pub streaming: bool,
}

impl GenerationRequest {
    pub fn new(payload: Payload, model: impl Into<String>, output_file: impl Into<PathBuf>) -> Self {
        Self {
            payload,
            model: model.into(),
            output_file: output_file.into(),
            schema: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            streaming: false,
        }
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    fn check(&self) -> Result<()> {
        if self.payload.is_empty() {
            return Err(UplanError::InvalidParams {
                message: "payload cannot be empty".into(),
            });
        }
        if self.max_attempts == 0 {
            return Err(UplanError::InvalidParams {
                message: "max_attempts must be at least 1".into(),
            });
        }
        if self.model.trim().is_empty() {
            return Err(UplanError::InvalidParams {
                message: "model cannot be empty".into(),
            });
        }
        Ok(())
    }
}

/// How a successful invocation ended
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Document persisted and accepted
    Success {
        document: Value,
        output_file: PathBuf,
        attempts: u32,
    },
    /// Streaming run finished; `text` is every fragment concatenated
    Streamed { text: String, attempts: u32 },
    /// Reviewer chose to stop
    Exit { output_file: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
    Exit,
}

/// Tri-state result handed to callers instead of an error
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowResponse {
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl WorkflowResponse {
    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    /// Plan failures that should stop a follow-up step
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, Status::Error | Status::Exit)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            data: None,
            output_file: None,
            message: Some(message.into()),
        }
    }
}

impl From<Result<Outcome>> for WorkflowResponse {
    fn from(result: Result<Outcome>) -> Self {
        match result {
            Ok(Outcome::Success {
                document,
                output_file,
                ..
            }) => Self {
                status: Status::Success,
                data: Some(document),
                output_file: Some(output_file),
                message: None,
            },
            Ok(Outcome::Streamed { text, .. }) => Self {
                status: Status::Success,
                data: Some(Value::String(text)),
                output_file: None,
                message: None,
            },
            Ok(Outcome::Exit { output_file }) => Self {
                status: Status::Exit,
                data: None,
                output_file: Some(output_file),
                message: None,
            },
            Err(e) => Self::error(e.to_string()),
        }
    }
}

pub struct CompletionWorkflow {
    provider: Arc<dyn CompletionProvider>,
    review: Option<Arc<dyn ReviewChannel>>,
}

impl CompletionWorkflow {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            provider,
            review: None,
        }
    }

    /// Ask a reviewer after every persisted document (non-streaming only)
    pub fn with_review(mut self, review: Arc<dyn ReviewChannel>) -> Self {
        self.review = Some(review);
        self
    }

    pub async fn execute(
        &self,
        request: &GenerationRequest,
        mut on_chunk: Option<&mut (dyn FnMut(&str) + Send)>,
    ) -> Result<Outcome> {
        request.check()?;

        let completion = CompletionRequest::new(&request.model, request.payload.to_prompt());
        let mut last_error: Option<UplanError> = None;
        let mut rejected_on_disk = false;

        for attempt in 1..=request.max_attempts {
            debug!(
                "Attempt {}/{} with model {} ({} prompt chars, stream={})",
                attempt,
                request.max_attempts,
                request.model,
                completion.message.len(),
                request.streaming
            );

            if request.streaming {
                match self.stream_attempt(&completion, &mut on_chunk).await {
                    Ok(text) => {
                        return Ok(Outcome::Streamed {
                            text,
                            attempts: attempt,
                        });
                    }
                    Err(e) if e.is_retryable() => {
                        warn!("Attempt {}/{} failed: {}", attempt, request.max_attempts, e);
                        last_error = Some(e);
                    }
                    Err(e) => return Err(e),
                }
                continue;
            }

            match self.document_attempt(&completion, request).await {
                Ok(document) => {
                    rejected_on_disk = false;
                    info!(
                        "Attempt {}/{} persisted {}",
                        attempt,
                        request.max_attempts,
                        request.output_file.display()
                    );
                    let decision = match &self.review {
                        Some(review) => review.review(&request.output_file)?,
                        None => ReviewDecision::Accept,
                    };
                    match decision {
                        ReviewDecision::Accept => {
                            return Ok(Outcome::Success {
                                document,
                                output_file: request.output_file.clone(),
                                attempts: attempt,
                            });
                        }
                        ReviewDecision::Exit => {
                            info!("Review aborted at attempt {}", attempt);
                            return Ok(Outcome::Exit {
                                output_file: request.output_file.clone(),
                            });
                        }
                        ReviewDecision::Regenerate => {
                            info!("Regeneration requested at attempt {}", attempt);
                            rejected_on_disk = true;
                            last_error = Some(UplanError::Rejected {
                                message: format!(
                                    "{} was sent back for regeneration",
                                    request.output_file.display()
                                ),
                            });
                        }
                    }
                }
                Err(e) if e.is_retryable() => {
                    warn!("Attempt {}/{} failed: {}", attempt, request.max_attempts, e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        if rejected_on_disk {
            discard_rejected(&request.output_file);
        }

        Err(UplanError::RetriesExhausted {
            attempts: request.max_attempts,
            last: Box::new(last_error.unwrap_or_else(|| UplanError::Internal {
                message: "no attempt was made".into(),
            })),
        })
    }

    async fn document_attempt(
        &self,
        completion: &CompletionRequest,
        request: &GenerationRequest,
    ) -> Result<Value> {
        let reply = self.provider.complete(completion).await?;
        let document = extract::parse_document(&reply)?;
        if let Some(schema) = request.schema {
            schema.validate(&document)?;
        }
        storage::write_document(&request.output_file, &document)?;
        Ok(document)
    }

    async fn stream_attempt(
        &self,
        completion: &CompletionRequest,
        on_chunk: &mut Option<&mut (dyn FnMut(&str) + Send)>,
    ) -> Result<String> {
        let mut fragments = self.provider.stream(completion).await?;
        let mut text = String::new();
        while let Some(fragment) = fragments.next().await {
            let fragment = fragment?;
            if let Some(sink) = on_chunk.as_deref_mut() {
                sink(&fragment);
            }
            text.push_str(&fragment);
        }
        if text.trim().is_empty() {
            return Err(ProviderError::Empty.into());
        }
        Ok(text)
    }
}

/// Remove a document the reviewer sent back once no attempt is left to replace it
fn discard_rejected(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => info!("Removed rejected {}", path.display()),
        Err(e) => warn!("Failed to remove rejected {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_checks() {
        let payload = Payload::from_value(json!({"setup": {"goal": "cli"}})).unwrap();
        assert!(
            GenerationRequest::new(payload.clone(), "ollama/qwq", "plan.toml")
                .check()
                .is_ok()
        );
        assert!(
            GenerationRequest::new(Payload::new(), "ollama/qwq", "plan.toml")
                .check()
                .is_err()
        );
        assert!(
            GenerationRequest::new(payload.clone(), " ", "plan.toml")
                .check()
                .is_err()
        );
        assert!(
            GenerationRequest::new(payload, "ollama/qwq", "plan.toml")
                .with_max_attempts(0)
                .check()
                .is_err()
        );
    }

    #[test]
    fn test_response_serialization() {
        let ok: WorkflowResponse = Ok(Outcome::Success {
            document: json!({"a": {"b": "c"}}),
            output_file: PathBuf::from("out/plan.toml"),
            attempts: 1,
        })
        .into();
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"status": "success", "data": {"a": {"b": "c"}}, "output_file": "out/plan.toml"})
        );

        let exit: WorkflowResponse = Ok(Outcome::Exit {
            output_file: PathBuf::from("out/plan.toml"),
        })
        .into();
        assert_eq!(exit.status, Status::Exit);
        assert!(exit.is_terminal());

        let err: WorkflowResponse = Err(UplanError::Provider {
            message: "boom".into(),
        })
        .into();
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({"status": "error", "message": "Provider error: boom"})
        );
    }
}
