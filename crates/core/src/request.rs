//! Generation request types.

use std::time::Duration;

use objgen_model::{
    GenerationParams, ModelMessage, ModelRequest, ModelTool,
};
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::output::OutputStrategy;

/// The default number of retries after the initial attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// A single structured generation request.
///
/// Built once and immutable afterwards; the client never mutates a
/// request, so reissuing an attempt during retries reuses the same
/// value.
pub struct GenerateRequest<O: OutputStrategy> {
    pub(crate) output: O,
    pub(crate) model: Option<String>,
    pub(crate) system: Option<String>,
    pub(crate) prompt: Option<String>,
    pub(crate) messages: Vec<ModelMessage>,
    pub(crate) tools: Vec<ModelTool>,
    pub(crate) params: GenerationParams,
    pub(crate) max_retries: u32,
    pub(crate) timeout: Option<Duration>,
    pub(crate) cancellation: Option<CancellationToken>,
}

impl<O: OutputStrategy> GenerateRequest<O> {
    /// Creates a request with the given output strategy.
    pub fn new(output: O) -> Self {
        Self {
            output,
            model: None,
            system: None,
            prompt: None,
            messages: vec![],
            tools: vec![],
            params: GenerationParams::default(),
            max_retries: DEFAULT_MAX_RETRIES,
            timeout: None,
            cancellation: None,
        }
    }

    /// Overrides the model id for this request. The provider's default
    /// model is used when unset.
    #[inline]
    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the system instruction.
    #[inline]
    pub fn with_system<S: Into<String>>(mut self, system: S) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Sets the user prompt. Appended after any explicit messages.
    #[inline]
    pub fn with_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Appends a message to the conversation history.
    #[inline]
    pub fn with_message(mut self, message: ModelMessage) -> Self {
        self.messages.push(message);
        self
    }

    /// Replaces the conversation history.
    #[inline]
    pub fn with_messages(mut self, messages: Vec<ModelMessage>) -> Self {
        self.messages = messages;
        self
    }

    /// Declares a tool the model may call during this request.
    #[inline]
    pub fn with_tool(mut self, tool: ModelTool) -> Self {
        self.tools.push(tool);
        self
    }

    /// Declares a set of tools the model may call during this request.
    #[inline]
    pub fn with_tools(mut self, tools: Vec<ModelTool>) -> Self {
        self.tools.extend(tools);
        self
    }

    /// Sets the generation parameters.
    #[inline]
    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    /// Sets the number of retries after the initial attempt.
    #[inline]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Bounds the whole attempt (including streaming) by a deadline.
    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Attaches a cancellation token; cancelling it aborts the request
    /// at the next await point.
    #[inline]
    pub fn with_cancellation_token(
        mut self,
        token: CancellationToken,
    ) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Checks the request for misconfiguration. Runs before any
    /// transport call.
    pub(crate) fn check(&self) -> Result<(), Error> {
        self.output.check()?;
        let has_prompt = self
            .prompt
            .as_deref()
            .is_some_and(|prompt| !prompt.trim().is_empty());
        if !has_prompt && self.messages.is_empty() {
            return Err(Error::configuration(
                "a prompt or at least one message is required",
            ));
        }
        Ok(())
    }

    /// Assembles the transport request for one attempt.
    pub(crate) fn to_model_request(&self) -> ModelRequest {
        let mut messages = Vec::with_capacity(self.messages.len() + 2);
        if let Some(system) = &self.system {
            messages.push(ModelMessage::System(system.clone()));
        }
        messages.extend(self.messages.iter().cloned());
        if let Some(prompt) = &self.prompt {
            if !prompt.trim().is_empty() {
                messages.push(ModelMessage::User(prompt.clone()));
            }
        }
        ModelRequest {
            model: self.model.clone(),
            messages,
            tools: self.tools.clone(),
            response_format: Some(self.output.response_format()),
            params: self.params.clone(),
        }
    }
}
