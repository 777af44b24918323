//! Streaming generation handles.

use std::panic::{AssertUnwindSafe, catch_unwind};

use objgen_model::ModelResponseEvent;
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::client::EventSource;
use crate::error::Error;
use crate::output::OutputStrategy;
use crate::partial_json::parse_partial;
use crate::result::{GenerateResult, StepOutcome};

type OnFinish<T> =
    Box<dyn FnOnce(&Result<GenerateResult<T>, Error>) + Send>;

/// A live streaming generation.
///
/// The fragment sequence is single-pass and finite: fragments are
/// consumed in order, never rewound, and never produced again after
/// exhaustion. Failures that occur mid-stream do not surface through
/// the fragments; they are held back and delivered by
/// [`finalize`](Self::finalize).
pub struct ObjectStream<O: OutputStrategy> {
    output: O,
    source: EventSource,
    outcome: StepOutcome,
    stashed: Option<Error>,
    done: bool,
    last_partial: Option<Value>,
    cancellation: CancellationToken,
    deadline: Option<Instant>,
    on_finish: Option<OnFinish<O::Output>>,
}

impl<O: OutputStrategy> ObjectStream<O> {
    pub(crate) fn new(
        output: O,
        source: EventSource,
        cancellation: CancellationToken,
        deadline: Option<Instant>,
    ) -> Self {
        Self {
            output,
            source,
            outcome: StepOutcome::default(),
            stashed: None,
            done: false,
            last_partial: None,
            cancellation,
            deadline,
            on_finish: None,
        }
    }

    /// Registers an observer invoked exactly once when the stream
    /// settles, with the settled result.
    ///
    /// The observer runs isolated from the caller: a panic inside it
    /// is caught and logged, never propagated into settlement.
    pub fn set_on_finish(
        &mut self,
        on_finish: impl FnOnce(&Result<GenerateResult<O::Output>, Error>)
        + Send
        + 'static,
    ) {
        self.on_finish = Some(Box::new(on_finish));
    }

    /// Returns the next partial value, or `None` once the stream is
    /// exhausted.
    ///
    /// Partial values are best-effort re-parses of the accumulated raw
    /// text: fields the text has not confidently produced yet are
    /// omitted. A delta that does not change the presentable value
    /// yields no fragment.
    pub async fn next_partial(&mut self) -> Option<Value> {
        while let Some(event) = self.pull_event().await {
            let is_delta =
                matches!(event, ModelResponseEvent::MessageDelta(_));
            self.outcome.apply_event(event);
            if !is_delta {
                continue;
            }
            let Some(repaired) = parse_partial(&self.outcome.raw_text)
            else {
                continue;
            };
            let Some(partial) = self.output.partial_value(repaired) else {
                continue;
            };
            if self.last_partial.as_ref() == Some(&partial) {
                continue;
            }
            self.last_partial = Some(partial.clone());
            return Some(partial);
        }
        None
    }

    /// Drains any remaining fragments and settles the stream.
    ///
    /// The accumulated raw text is validated exactly once, here. The
    /// settled result is the typed value, or the error held back from
    /// the stream, or a validation error carrying the raw text and the
    /// mismatch description.
    pub async fn finalize(
        mut self,
    ) -> Result<GenerateResult<O::Output>, Error> {
        while let Some(event) = self.pull_event().await {
            self.outcome.apply_event(event);
        }

        let result = match self.stashed.take() {
            Some(err) => Err(err),
            None => match self.output.parse(&self.outcome.raw_text) {
                Ok(object) => {
                    let outcome = std::mem::take(&mut self.outcome);
                    Ok(GenerateResult::from_outcome(outcome, object))
                }
                Err(schema_error) => Err(Error::type_validation(
                    std::mem::take(&mut self.outcome.raw_text),
                    schema_error,
                )),
            },
        };

        if let Some(on_finish) = self.on_finish.take() {
            // The observer must not be able to disturb settlement.
            if catch_unwind(AssertUnwindSafe(|| on_finish(&result)))
                .is_err()
            {
                warn!("on_finish observer panicked");
            }
        }

        result
    }

    /// Pulls the next transport event, or `None` once the stream is
    /// over. A failure ends the stream and is stashed for settlement.
    async fn pull_event(&mut self) -> Option<ModelResponseEvent> {
        if self.done {
            return None;
        }
        let result = tokio::select! {
            _ = self.cancellation.cancelled() => Err(Error::aborted()),
            _ = until(self.deadline) => Err(Error::timeout()),
            event = self.source.next_event() => {
                event.map_err(Error::request_failed)
            }
        };
        match result {
            Ok(Some(event)) => Some(event),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.stashed = Some(err);
                self.done = true;
                None
            }
        }
    }
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as StdError;
    use std::fmt::{self, Display};
    use std::pin::Pin;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::{Context, Poll};

    use objgen_model::{
        ErrorKind as ModelErrorKind, FinishReason, ModelProvider,
        ModelProviderError, ModelRequest, ModelResponse,
    };
    use objgen_test_model::{PresetResponse, TestModelProvider};
    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::client::GenerationClient;
    use crate::error::ErrorKind;
    use crate::output::{ArrayOutput, NoSchemaOutput, ObjectOutput};
    use crate::request::GenerateRequest;
    use crate::schema::TypedSchema;

    #[derive(Debug, Deserialize, schemars::JsonSchema, PartialEq)]
    struct Notification {
        name: String,
        message: String,
    }

    fn scripted(preset: PresetResponse) -> TestModelProvider {
        let mut provider = TestModelProvider::default();
        provider.add_user_turn();
        provider.add_assistant_turn(preset);
        provider
    }

    #[tokio::test]
    async fn test_fragments_then_settlement() {
        let provider = scripted(PresetResponse::with_text_chunks(
            "{\"name\": \"Alice\", \"message\": \"brunch?\"}",
            8,
        ));
        let client = GenerationClient::new(provider);

        let req = GenerateRequest::new(ObjectOutput::new(
            TypedSchema::<Notification>::new(),
        ))
        .with_prompt("Generate a notification");
        let mut stream = client.stream(req).await.unwrap();

        let mut fragments = vec![];
        while let Some(partial) = stream.next_partial().await {
            fragments.push(partial);
        }
        assert!(!fragments.is_empty());
        // Consumed in order, never rewound: each fragment is distinct
        // from its predecessor, and the last one is the full object.
        for pair in fragments.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
        assert_eq!(
            fragments.last().unwrap(),
            &json!({ "name": "Alice", "message": "brunch?" })
        );
        // Exhausted streams stay exhausted.
        assert_eq!(stream.next_partial().await, None);

        let result = stream.finalize().await.unwrap();
        assert_eq!(result.object.name, "Alice");
        assert_eq!(result.finish_reason, FinishReason::Stop);
    }

    #[tokio::test]
    async fn test_finalize_without_consuming_fragments() {
        let provider = scripted(PresetResponse::with_text_chunks(
            "{\"elements\": [{\"name\": \"A\", \"message\": \"hi\"}]}",
            5,
        ));
        let client = GenerationClient::new(provider);

        let req = GenerateRequest::new(ArrayOutput::new(
            TypedSchema::<Notification>::new(),
        ))
        .with_prompt("Generate notifications");
        let stream = client.stream(req).await.unwrap();
        let result = stream.finalize().await.unwrap();
        assert_eq!(result.object.len(), 1);
        assert_eq!(result.object[0].name, "A");
    }

    #[tokio::test]
    async fn test_validation_failure_settles_with_raw_text() {
        let provider = scripted(PresetResponse::with_text_chunks(
            "{\"name\": 42}",
            3,
        ));
        let client = GenerationClient::new(provider);

        let req = GenerateRequest::new(ObjectOutput::new(
            TypedSchema::<Notification>::new(),
        ))
        .with_prompt("Generate a notification");
        let mut stream = client.stream(req).await.unwrap();
        // Fragments flow regardless; validation only happens at
        // settlement.
        while stream.next_partial().await.is_some() {}
        let err = stream.finalize().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeValidation);
        assert_eq!(err.raw_text(), Some("{\"name\": 42}"));
    }

    #[tokio::test]
    async fn test_on_finish_runs_once_and_is_isolated() {
        let provider = scripted(PresetResponse::with_text_chunks(
            "{\"ok\": true}",
            2,
        ));
        let client = GenerationClient::new(provider);

        let req = GenerateRequest::new(NoSchemaOutput).with_prompt("Hi");
        let mut stream = client.stream(req).await.unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        stream.set_on_finish({
            let calls = Arc::clone(&calls);
            move |result| {
                assert!(result.is_ok());
                calls.fetch_add(1, Ordering::SeqCst);
                panic!("observer misbehaves");
            }
        });

        // The observer's panic never disturbs settlement.
        let result = stream.finalize().await.unwrap();
        assert_eq!(result.object, json!({ "ok": true }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[derive(Debug)]
    struct HalfwayError;

    impl Display for HalfwayError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "connection reset")
        }
    }

    impl StdError for HalfwayError {}

    impl ModelProviderError for HalfwayError {
        fn kind(&self) -> ModelErrorKind {
            ModelErrorKind::Network
        }
    }

    struct HalfwayResponse {
        emitted: bool,
    }

    impl ModelResponse for HalfwayResponse {
        type Error = HalfwayError;

        fn poll_next_event(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
            let this = self.get_mut();
            if !this.emitted {
                this.emitted = true;
                return Poll::Ready(Ok(Some(
                    ModelResponseEvent::MessageDelta(
                        "{\"partial\": true".to_owned(),
                    ),
                )));
            }
            Poll::Ready(Err(HalfwayError))
        }
    }

    struct HalfwayProvider;

    impl ModelProvider for HalfwayProvider {
        type Error = HalfwayError;
        type Response = HalfwayResponse;

        fn send_request(
            &self,
            _req: &ModelRequest,
        ) -> impl Future<Output = Result<Self::Response, Self::Error>>
        + Send
        + 'static {
            std::future::ready(Ok(HalfwayResponse { emitted: false }))
        }
    }

    #[tokio::test]
    async fn test_midstream_failure_is_delivered_at_settlement() {
        let client = GenerationClient::new(HalfwayProvider);

        let req = GenerateRequest::new(NoSchemaOutput).with_prompt("Hi");
        let mut stream = client.stream(req).await.unwrap();

        // The fragment sequence never carries the failure.
        let first = stream.next_partial().await.unwrap();
        assert_eq!(first, json!({ "partial": true }));
        assert_eq!(stream.next_partial().await, None);

        let err = stream.finalize().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RequestFailed);
    }
}
