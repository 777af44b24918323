//! A local fake transport for testing purpose.

mod preset;

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use objgen_model::{
    ErrorKind, FinishReason, ModelProvider, ModelProviderError, ModelRequest,
    ModelResponse, ModelResponseEvent, ResponseMetadata,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    #[allow(dead_code)]
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(self, f)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

#[derive(Default)]
struct Stats {
    requests: AtomicUsize,
    // Attempts made so far, per script step. Used to drive the
    // injected failure budget across retries.
    attempts: Mutex<HashMap<usize, u64>>,
}

#[derive(Clone)]
enum ConversationStep {
    UserTurn,
    AssistantTurn(PresetResponse),
}

/// A local fake transport for testing purpose.
///
/// Before sending requests, you need to setup the conversation script,
/// which is how the model should respond to a request. The added turns
/// will be selected according to the history messages in your request.
/// If there are no enough turns in the script, an error will be
/// returned.
///
/// Every response emits a metadata event first and a completion event
/// last; a usage event is emitted when the preset carries one. A turn
/// with an injected failure budget fails at request time with a
/// retryable error until the budget is spent.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy
/// memory copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    conversation_script: Vec<ConversationStep>,
    delay: Option<Duration>,
    stats: Arc<Stats>,
}

impl TestModelProvider {
    /// Appends an assistant turn to the conversation script.
    #[inline]
    pub fn add_assistant_turn(&mut self, preset: PresetResponse) {
        self.conversation_script
            .push(ConversationStep::AssistantTurn(preset));
    }

    /// Appends a placeholder for a caller-supplied message (user,
    /// system, or tool result) to the conversation script.
    #[inline]
    pub fn add_user_turn(&mut self) {
        self.conversation_script.push(ConversationStep::UserTurn);
    }

    /// Sets the pacing delay between emitted events.
    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns how many requests this provider (and its clones) have
    /// received, failed attempts included.
    #[inline]
    pub fn request_count(&self) -> usize {
        self.stats.requests.load(Ordering::SeqCst)
    }
}

impl ModelProvider for TestModelProvider {
    type Error = Error;
    type Response = TestModelResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        self.stats.requests.fetch_add(1, Ordering::SeqCst);

        let step_idx = req.messages.len();
        let result = 'blk: {
            let Some(step) = self.conversation_script.get(step_idx) else {
                break 'blk Err(Error {
                    message: "no enough turns",
                    kind: ErrorKind::InvalidRequest,
                });
            };
            let preset = match step {
                ConversationStep::UserTurn => {
                    break 'blk Err(Error {
                        message: "not an assistant turn",
                        kind: ErrorKind::InvalidRequest,
                    });
                }
                ConversationStep::AssistantTurn(preset) => preset,
            };

            if let Some(failures) = preset.failures {
                let mut attempts = self.stats.attempts.lock().unwrap();
                let made = attempts.entry(step_idx).or_insert(0);
                // `Some(0)` keeps failing forever.
                if failures == 0 || *made < failures {
                    *made += 1;
                    break 'blk Err(Error {
                        message: "injected failure",
                        kind: ErrorKind::ServerError,
                    });
                }
            }

            Ok(TestModelResponse {
                preset: preset.clone(),
                step_idx,
                delay: self.delay.unwrap_or(Duration::from_millis(1)),
                event_idx: 0,
                sleep: None,
            })
        };
        ready(result)
    }
}

#[derive(Debug)]
pub struct TestModelResponse {
    preset: PresetResponse,
    step_idx: usize,
    delay: Duration,
    event_idx: usize,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl TestModelResponse {
    fn next_scripted_event(&mut self) -> Option<ModelResponseEvent> {
        // Event order: metadata first, then the preset events, then
        // usage when present, then completion.
        let preset_len = self.preset.events.len();
        let idx = self.event_idx;
        self.event_idx += 1;

        if idx == 0 {
            return Some(ModelResponseEvent::Metadata(ResponseMetadata {
                id: Some(format!("resp:{}", self.step_idx)),
                model: Some("test-model".to_owned()),
                timestamp: Some(0),
            }));
        }

        if let Some(event) = self.preset.events.get(idx - 1) {
            return Some(match event {
                PresetEvent::MessageDelta(msg) => {
                    ModelResponseEvent::MessageDelta(msg.clone())
                }
                PresetEvent::ToolCall(req) => {
                    ModelResponseEvent::ToolCall(req.clone())
                }
                PresetEvent::Warning(warning) => {
                    ModelResponseEvent::Warning(warning.clone())
                }
            });
        }

        if idx == preset_len + 1 {
            if let Some(usage) = self.preset.usage {
                return Some(ModelResponseEvent::Usage(usage));
            }
            self.event_idx += 1;
        }

        if self.event_idx == preset_len + 3 {
            let has_tool_call = self
                .preset
                .events
                .iter()
                .any(|event| matches!(event, PresetEvent::ToolCall(_)));
            return Some(ModelResponseEvent::Completed(if has_tool_call {
                FinishReason::ToolCalls
            } else {
                FinishReason::Stop
            }));
        }

        // In case this method is called after completion.
        None
    }
}

impl ModelResponse for TestModelResponse {
    type Error = Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        // SAFETY: This type does not require to be pinned.
        let this = unsafe { self.get_unchecked_mut() };

        if let Some(sleep) = &mut this.sleep {
            let sleep = sleep.as_mut();
            ready!(sleep.poll(cx));
            this.sleep = None;

            return Poll::Ready(Ok(this.next_scripted_event()));
        }
        this.sleep = Some(Box::pin(sleep(this.delay)));
        Pin::new(this).poll_next_event(cx)
    }
}
