//! The structured generation client.

use std::future::poll_fn;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use backoff::ExponentialBackoff;
use backoff::backoff::Backoff;
use objgen_model::{
    ModelProvider, ModelProviderError, ModelRequest, ModelResponse,
    ModelResponseEvent,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::error::Error;
use crate::output::OutputStrategy;
use crate::request::GenerateRequest;
use crate::result::{GenerateResult, StepOutcome};
use crate::stream::ObjectStream;

pub(crate) type EventResult =
    Result<Option<ModelResponseEvent>, Box<dyn ModelProviderError>>;

trait ErasedResponse: Send {
    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<EventResult>;
}

impl<R: ModelResponse> ErasedResponse for R {
    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<EventResult> {
        self.poll_next_event(cx).map(|result| {
            result.map_err(|err| Box::new(err) as Box<dyn ModelProviderError>)
        })
    }
}

/// A connected transport response with the provider type erased.
pub(crate) struct EventSource {
    inner: Pin<Box<dyn ErasedResponse>>,
}

impl EventSource {
    fn new<R: ModelResponse>(resp: R) -> Self {
        Self {
            inner: Box::pin(resp),
        }
    }

    pub(crate) async fn next_event(&mut self) -> EventResult {
        poll_fn(|cx| self.inner.as_mut().poll_next(cx)).await
    }
}

type ConnectResult = Result<EventSource, Box<dyn ModelProviderError>>;
type BoxedConnectFuture =
    Pin<Box<dyn Future<Output = ConnectResult> + Send>>;
#[rustfmt::skip]
type HandlerFn = Arc<
    dyn Fn(ModelRequest) -> BoxedConnectFuture + Send + Sync
>;

/// A failed attempt; decides whether the retry budget applies.
enum AttemptFailure {
    Transport(Box<dyn ModelProviderError>),
    TimedOut,
}

impl AttemptFailure {
    fn is_retryable(&self) -> bool {
        match self {
            AttemptFailure::Transport(err) => err.is_retryable(),
            AttemptFailure::TimedOut => true,
        }
    }

    fn into_error(self) -> Error {
        match self {
            AttemptFailure::Transport(err) => Error::request_failed(err),
            AttemptFailure::TimedOut => Error::timeout(),
        }
    }
}

/// A client that performs schema-validated generations against a model
/// transport.
///
/// The client is cheap to clone and safe to use from concurrent tasks;
/// every call is an independent logical request with no shared mutable
/// state.
#[derive(Clone)]
pub struct GenerationClient {
    handler_fn: HandlerFn,
}

impl GenerationClient {
    /// Creates a client on top of the given transport.
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        // We have to erase the type `P`, since `GenerationClient`
        // doesn't have a generic parameter and we don't want it either.
        let handler_fn: HandlerFn = Arc::new(move |req| {
            let fut = provider.send_request(&req);
            Box::pin(
                async move {
                    trace!("issuing a request: {req:?}");
                    match fut.await {
                        Ok(resp) => Ok(EventSource::new(resp)),
                        Err(err) => {
                            error!("transport refused the request: {err}");
                            Err(Box::new(err) as Box<dyn ModelProviderError>)
                        }
                    }
                }
                .instrument(trace_span!("generation req")),
            )
        });
        Self { handler_fn }
    }

    /// Performs a one-shot structured generation.
    ///
    /// This is one logical remote call: transient transport failures
    /// (network, server errors, rate limits, timeouts) are retried
    /// with backoff up to the request's budget; other failures are
    /// returned immediately. The raw output is validated exactly once
    /// after the response completes, and a validation failure is never
    /// retried.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. No partial result is observable
    /// when the operation is cancelled.
    pub async fn generate<O: OutputStrategy>(
        &self,
        req: GenerateRequest<O>,
    ) -> Result<GenerateResult<O::Output>, Error> {
        let outcome = self.run_step(&req).await?;
        match req.output.parse(&outcome.raw_text) {
            Ok(object) => Ok(GenerateResult::from_outcome(outcome, object)),
            Err(schema_error) => {
                Err(Error::type_validation(outcome.raw_text, schema_error))
            }
        }
    }

    /// Runs one conversation step without validating the output.
    ///
    /// A step that finishes by issuing tool calls carries no final
    /// payload to validate; callers absorb the outcome into a
    /// conversation, resolve the calls, and submit the next step. The
    /// retry taxonomy matches [`generate`](Self::generate).
    pub async fn send_step<O: OutputStrategy>(
        &self,
        req: &GenerateRequest<O>,
    ) -> Result<StepOutcome, Error> {
        self.run_step(req).await
    }

    async fn run_step<O: OutputStrategy>(
        &self,
        req: &GenerateRequest<O>,
    ) -> Result<StepOutcome, Error> {
        req.check()?;

        let cancellation = req.cancellation.clone().unwrap_or_default();
        let timeout = req.timeout;
        let handler_fn = Arc::clone(&self.handler_fn);
        with_retries(&cancellation, req.max_retries, || {
            let model_req = req.to_model_request();
            let handler_fn = Arc::clone(&handler_fn);
            async move {
                let attempt = async {
                    let mut source = handler_fn(model_req)
                        .await
                        .map_err(AttemptFailure::Transport)?;
                    let mut outcome = StepOutcome::default();
                    while let Some(event) = source
                        .next_event()
                        .await
                        .map_err(AttemptFailure::Transport)?
                    {
                        outcome.apply_event(event);
                    }
                    Ok(outcome)
                };
                bounded(timeout, attempt).await
            }
        })
        .await
    }

    /// Starts a streaming structured generation.
    ///
    /// Connect-time failures follow the same retry taxonomy as
    /// [`generate`](Self::generate). Once events flow, failures are no
    /// longer retried and are delivered through
    /// [`ObjectStream::finalize`], never through the fragment
    /// sequence.
    pub async fn stream<O: OutputStrategy>(
        &self,
        req: GenerateRequest<O>,
    ) -> Result<ObjectStream<O>, Error> {
        req.check()?;

        let cancellation = req.cancellation.clone().unwrap_or_default();
        let timeout = req.timeout;
        let handler_fn = Arc::clone(&self.handler_fn);
        let (source, deadline) =
            with_retries(&cancellation, req.max_retries, || {
                let model_req = req.to_model_request();
                let handler_fn = Arc::clone(&handler_fn);
                async move {
                    let started = Instant::now();
                    let connect = async {
                        handler_fn(model_req)
                            .await
                            .map_err(AttemptFailure::Transport)
                    };
                    let source = bounded(timeout, connect).await?;
                    // The deadline covers the whole attempt, streaming
                    // included.
                    Ok((source, timeout.map(|timeout| started + timeout)))
                }
            })
            .await?;

        Ok(ObjectStream::new(req.output, source, cancellation, deadline))
    }
}

async fn bounded<T>(
    timeout: Option<Duration>,
    fut: impl Future<Output = Result<T, AttemptFailure>>,
) -> Result<T, AttemptFailure> {
    match timeout {
        Some(duration) => match tokio::time::timeout(duration, fut).await {
            Ok(result) => result,
            Err(_) => Err(AttemptFailure::TimedOut),
        },
        None => fut.await,
    }
}

async fn with_retries<T, F, Fut>(
    cancellation: &CancellationToken,
    max_retries: u32,
    mut attempt: F,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AttemptFailure>>,
{
    let mut backoff = ExponentialBackoff::default();
    let mut remaining = max_retries;
    loop {
        let result = tokio::select! {
            _ = cancellation.cancelled() => return Err(Error::aborted()),
            result = attempt() => result,
        };
        let failure = match result {
            Ok(value) => return Ok(value),
            Err(failure) => failure,
        };
        if !failure.is_retryable() || remaining == 0 {
            return Err(failure.into_error());
        }
        remaining -= 1;
        let delay = backoff.next_backoff().unwrap_or_default();
        debug!("attempt failed, retrying in {delay:?}");
        tokio::select! {
            _ = cancellation.cancelled() => return Err(Error::aborted()),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
