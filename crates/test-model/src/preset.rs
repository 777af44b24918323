use objgen_model::{TokenUsage, ToolCallRequest};
use serde::{Deserialize, Serialize};

/// The events in a preset response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PresetEvent {
    #[serde(rename = "message_delta")]
    MessageDelta(String),
    #[serde(rename = "tool_call")]
    ToolCall(ToolCallRequest),
    #[serde(rename = "warning")]
    Warning(String),
}

/// The preset response for an assistant turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PresetResponse {
    /// Events in this response.
    pub events: Vec<PresetEvent>,
    /// If set, the request will fail in the first `failures` attempts.
    /// `Some(0)` means the request will fail infinitely.
    pub failures: Option<u64>,
    /// Token accounting reported at the end of the response.
    pub usage: Option<TokenUsage>,
}

impl PresetResponse {
    /// Creates a `PresetResponse` with the specified events.
    #[inline]
    pub fn with_events(events: impl Into<Vec<PresetEvent>>) -> Self {
        Self {
            events: events.into(),
            failures: None,
            usage: None,
        }
    }

    /// Creates a `PresetResponse` that streams the given text split
    /// into chunks of `chunk_len` bytes.
    pub fn with_text_chunks(text: &str, chunk_len: usize) -> Self {
        let events: Vec<_> = text
            .as_bytes()
            .chunks(chunk_len.max(1))
            .map(|chunk| {
                PresetEvent::MessageDelta(
                    String::from_utf8_lossy(chunk).into_owned(),
                )
            })
            .collect();
        Self::with_events(Vec::from_iter(events))
    }

    /// Sets failure times before a successful response. `0` means the
    /// response will always be a failure.
    #[inline]
    pub fn with_failures(mut self, failures: u64) -> Self {
        self.failures = Some(failures);
        self
    }

    /// Sets the token accounting reported at the end of the response.
    #[inline]
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }
}
