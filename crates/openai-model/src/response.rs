use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use objgen_model::{
    ErrorKind, FinishReason, ModelResponse, ModelResponseEvent,
    ResponseMetadata, TokenUsage, ToolCallRequest,
};
use pin_project_lite::pin_project;
use serde_json::Value;

use crate::Error;
use crate::io::{Sse, SseError};
use crate::proto::{ChatCompletionChunk, ToolCall, Usage};

struct PartialState {
    sse: Sse,
    id: Option<String>,
    pending_metadata: Option<ResponseMetadata>,
    tool_calls: Vec<ToolCall>,
    // This field records the index of the tool calls that are generated but
    // not yet sent to the model user. When calling `poll_next_event`, the
    // response will return the pending tool calls.
    pending_tool_call_idx: VecDeque<usize>,
    // These fields will be cleared after the corresponding event is
    // returned.
    pending_message_delta: Option<String>,
    pending_usage: Option<TokenUsage>,
    pending_finish_reason: Option<FinishReason>,
}

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextEvent = Result<(Option<ModelResponseEvent>, PartialState), Error>;

pin_project! {
    pub struct OpenAIResponse {
        next_event_fut: Option<PinnedFuture<NextEvent>>,
    }
}

impl OpenAIResponse {
    #[inline]
    pub(crate) fn from_sse(sse: Sse) -> Self {
        let partial_state = PartialState {
            sse,
            id: None,
            pending_metadata: None,
            tool_calls: Default::default(),
            pending_tool_call_idx: Default::default(),
            pending_message_delta: None,
            pending_usage: None,
            pending_finish_reason: None,
        };
        let next_event_fut = async move { next_event(partial_state).await };
        Self {
            next_event_fut: Some(Box::pin(next_event_fut)),
        }
    }
}

impl ModelResponse for OpenAIResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.project();
        let Some(next_event_fut) = this.next_event_fut else {
            // The stream has been exhausted, actually this should be an error.
            return Poll::Ready(Ok(None));
        };
        let (event, partial_state) =
            match ready!(next_event_fut.as_mut().poll(cx)) {
                Ok((Some(event), partial_state)) => (event, partial_state),
                Ok((None, _)) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Ok(None));
                }
                Err(err) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Err(err));
                }
            };

        // The stream may still have more data to pull, create a new future for
        // the next event.
        let next_event_fut = async move { next_event(partial_state).await };
        *this.next_event_fut = Some(Box::pin(next_event_fut));

        Poll::Ready(Ok(Some(event)))
    }
}

fn map_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "stop" => FinishReason::Stop,
        "length" => FinishReason::Length,
        "content_filter" => FinishReason::ContentFilter,
        "tool_calls" => FinishReason::ToolCalls,
        "error" => FinishReason::Error,
        _ => FinishReason::Other,
    }
}

fn map_usage(usage: &Usage) -> TokenUsage {
    TokenUsage {
        input_tokens: usage.prompt_tokens,
        output_tokens: usage.completion_tokens,
        total_tokens: usage.total_tokens,
        reasoning_tokens: usage
            .completion_tokens_details
            .and_then(|d| d.reasoning_tokens),
        cached_input_tokens: usage
            .prompt_tokens_details
            .and_then(|d| d.cached_tokens),
    }
}

async fn next_event(
    mut partial_state: PartialState,
) -> Result<(Option<ModelResponseEvent>, PartialState), Error> {
    let sse = &mut partial_state.sse;

    loop {
        let sse_event = match sse.next_event().await {
            Ok(Some(event)) => event,
            Ok(None) => break,
            Err(SseError::ChunksError(err)) => {
                // The chunk source already classified the failure,
                // keep its kind.
                return Err(Error::new(err.message(), err.kind()));
            }
            Err(SseError::InvalidPayload) => {
                return Err(Error::new(
                    "invalid event payload",
                    ErrorKind::Other,
                ));
            }
        };
        trace!("got sse event: {sse_event}");
        if sse_event == "[DONE]" {
            break;
        }

        let mut chunk = serde_json::from_str::<ChatCompletionChunk>(&sse_event)
            .map_err(|err| Error::new(format!("{err}"), ErrorKind::Other))?;
        if partial_state.id.is_none() {
            partial_state.id = Some(chunk.id.clone());
            partial_state.pending_metadata = Some(ResponseMetadata {
                id: Some(chunk.id.clone()),
                model: chunk.model.clone(),
                timestamp: chunk.created,
            });
        } else if partial_state.id.as_deref() != Some(chunk.id.as_str()) {
            return Err(Error::new("chunk id mismatch", ErrorKind::Other));
        }

        if let Some(usage) = &chunk.usage {
            partial_state.pending_usage = Some(map_usage(usage));
        }

        // The usage chunk carries no choices; keep pulling.
        let Some(choice) = chunk.choices.pop() else {
            continue;
        };

        if let Some(finish_reason) = &choice.finish_reason {
            // Don't break here: the usage chunk comes after the finish
            // chunk, and the completion event must be emitted last.
            partial_state.pending_finish_reason =
                Some(map_finish_reason(finish_reason));
        }

        if let Some(content) = choice.delta.content
            && !content.is_empty()
        {
            partial_state
                .pending_message_delta
                .get_or_insert_default()
                .push_str(&content);
        }
        if let Some(tool_calls) = choice.delta.tool_calls {
            for tool_call in tool_calls {
                let Some(partial_tool_call) = partial_state
                    .tool_calls
                    .iter_mut()
                    .find(|t| t.index == tool_call.index)
                else {
                    partial_state
                        .pending_tool_call_idx
                        .push_back(partial_state.tool_calls.len());
                    partial_state.tool_calls.push(tool_call);
                    continue;
                };
                // Patch the partial tool call.
                if let Some(id) = tool_call.id {
                    partial_tool_call.id.get_or_insert_default().push_str(&id);
                }
                if let Some(ty) = tool_call.r#type {
                    partial_tool_call
                        .r#type
                        .get_or_insert_default()
                        .push_str(&ty);
                }
                if let Some(function) = tool_call.function {
                    match partial_tool_call.function {
                        Some(ref mut partial_func) => {
                            if let Some(name) = function.name {
                                partial_func
                                    .name
                                    .get_or_insert_default()
                                    .push_str(&name);
                            }
                            if let Some(arguments) = function.arguments {
                                partial_func
                                    .arguments
                                    .get_or_insert_default()
                                    .push_str(&arguments);
                            }
                        }
                        None => partial_tool_call.function = Some(function),
                    }
                }
            }
        }

        if partial_state.pending_message_delta.is_some()
            || partial_state.pending_metadata.is_some()
        {
            break;
        }
    }

    // The order of events is important. Metadata always goes out first,
    // then message deltas, then pending tool calls, then usage, and
    // finally the pending finish reason if any.

    if let Some(metadata) = partial_state.pending_metadata.take() {
        return Ok((
            Some(ModelResponseEvent::Metadata(metadata)),
            partial_state,
        ));
    }

    if let Some(message_delta) = partial_state.pending_message_delta.take() {
        return Ok((
            Some(ModelResponseEvent::MessageDelta(message_delta)),
            partial_state,
        ));
    }

    if let Some(idx) = partial_state.pending_tool_call_idx.pop_front() {
        let tool_call = &partial_state.tool_calls[idx];
        let id = tool_call.id.clone().unwrap_or_default();
        let name = tool_call
            .function
            .as_ref()
            .and_then(|f| f.name.clone())
            .unwrap_or_default();
        let arguments = tool_call
            .function
            .as_ref()
            .and_then(|f| f.arguments.as_deref())
            .and_then(|args| serde_json::from_str::<Value>(args).ok())
            .unwrap_or_default();
        return Ok((
            Some(ModelResponseEvent::ToolCall(ToolCallRequest {
                id,
                name,
                arguments,
            })),
            partial_state,
        ));
    }

    if let Some(usage) = partial_state.pending_usage.take() {
        return Ok((Some(ModelResponseEvent::Usage(usage)), partial_state));
    }

    if let Some(finish_reason) = partial_state.pending_finish_reason.take() {
        return Ok((
            Some(ModelResponseEvent::Completed(finish_reason)),
            partial_state,
        ));
    }

    Ok((None, partial_state))
}
