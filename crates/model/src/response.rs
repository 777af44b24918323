use std::pin::Pin;
use std::task::{self, Poll};

use serde::{Deserialize, Serialize};

use crate::provider::ModelProviderError;
use crate::request::ToolCallRequest;

/// A response from the model transport.
pub trait ModelResponse: Sized + Send + 'static {
    /// The error type that may be returned by the transport.
    type Error: ModelProviderError;

    /// Attempts to pull out the next event from the response.
    ///
    /// # Return value
    ///
    /// There are several possible return values, each indicating a
    /// distinct response state:
    ///
    /// - `Poll::Pending` means that this response is still waiting for
    ///   the next event. Implementations will ensure that the current
    ///   task will be notified when the next event may be ready.
    /// - `Poll::Ready(Ok(Some(event)))` means the response has an event
    ///   to deliver, and may produce further events on subsequent
    ///   `poll_next_event` calls.
    /// - `Poll::Ready(Ok(None))` means the response has completed.
    /// - `Poll::Ready(Err(error))` means an error occurred while
    ///   processing the response.
    ///
    /// Calling this method after completion should always return `None`.
    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>>;
}

/// The reason why a model response has finished.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum FinishReason {
    /// The model has finished generating text.
    Stop,
    /// The token limit was reached before the model finished.
    Length,
    /// The endpoint filtered the content.
    ContentFilter,
    /// The model needs to call a tool.
    ToolCalls,
    /// The endpoint reported an error as the reason.
    Error,
    /// A reason this protocol does not enumerate.
    Other,
    /// The endpoint did not report a reason.
    #[default]
    Unknown,
}

/// Token accounting for a response.
///
/// Counters the endpoint did not report are `None`, never zero.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct TokenUsage {
    /// Tokens consumed by the input.
    pub input_tokens: Option<u64>,
    /// Tokens produced in the output.
    pub output_tokens: Option<u64>,
    /// Total tokens billed for the call.
    pub total_tokens: Option<u64>,
    /// Tokens spent on reasoning, when the endpoint separates them.
    pub reasoning_tokens: Option<u64>,
    /// Input tokens served from the endpoint's cache.
    pub cached_input_tokens: Option<u64>,
}

/// Identifying metadata for a response.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResponseMetadata {
    /// The endpoint-assigned response id.
    pub id: Option<String>,
    /// The model that actually served the request.
    pub model: Option<String>,
    /// The endpoint-reported creation timestamp, in Unix seconds.
    pub timestamp: Option<u64>,
}

/// The event from a model response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ModelResponseEvent {
    /// Identifying metadata became known, usually with the first chunk.
    Metadata(ResponseMetadata),
    /// Received a message delta.
    MessageDelta(String),
    /// Received a tool call request.
    ToolCall(ToolCallRequest),
    /// The endpoint flagged something about the request without
    /// failing it.
    Warning(String),
    /// Token accounting became known, usually with the last chunk.
    Usage(TokenUsage),
    /// The response has been completed.
    Completed(FinishReason),
}
