use serde::Deserialize;

/// Event decoded from a chat-completions SSE body
#[derive(Debug, Clone, PartialEq)]
pub enum SseEvent {
    Fragment(String),
    /// In-band `{"error": ...}` payload; the stream carries nothing after it
    Error(String),
    Done,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    delta: ChunkDelta,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

fn error_message(error: &serde_json::Value) -> String {
    match error {
        serde_json::Value::String(s) => s.clone(),
        other => other
            .get("message")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| other.to_string()),
    }
}

/// Line-buffered parser for `data:` events
///
/// Raw bytes are buffered so a multi-byte character split across two network
/// chunks is decoded only once its line is complete.
pub struct SseParser {
    buffer: Vec<u8>,
    done: bool,
}

impl Default for SseParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SseParser {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            done: false,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        if self.done {
            return Vec::new();
        }
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim();

            if line.is_empty() || line.starts_with(':') {
                continue;
            }

            let Some(data) = line.strip_prefix("data:") else {
                // event:/id:/retry: fields carry nothing we use
                continue;
            };
            let data = data.trim();

            if data == "[DONE]" {
                self.done = true;
                self.buffer.clear();
                events.push(SseEvent::Done);
                break;
            }

            match serde_json::from_str::<ChatChunk>(data) {
                Ok(ChatChunk {
                    error: Some(error), ..
                }) => {
                    self.done = true;
                    self.buffer.clear();
                    events.push(SseEvent::Error(error_message(&error)));
                    break;
                }
                Ok(chunk) => {
                    let text = chunk
                        .choices
                        .into_iter()
                        .next()
                        .and_then(|c| c.delta.content)
                        .unwrap_or_default();
                    if !text.is_empty() {
                        events.push(SseEvent::Fragment(text));
                    }
                }
                Err(e) => {
                    tracing::debug!("Failed to parse stream JSON line: {}", e);
                    tracing::debug!("Problematic line: {}", data);
                }
            }
        }

        events
    }
}
