//! Generation result types.

use objgen_model::{
    FinishReason, ModelResponseEvent, ResponseMetadata, TokenUsage,
    ToolCallRequest,
};

/// The outcome of a completed generation step, before output parsing.
///
/// This is what a drained response boils down to: the raw text and the
/// bookkeeping around it. One-shot callers never see it; streaming and
/// conversation plumbing do.
#[derive(Clone, Debug, Default)]
pub struct StepOutcome {
    /// The full raw text produced by the model.
    pub raw_text: String,
    /// Tool calls requested by the model in this step.
    pub tool_calls: Vec<ToolCallRequest>,
    /// The reason the model finished generating.
    pub finish_reason: FinishReason,
    /// Token accounting, when the transport reported it.
    pub usage: Option<TokenUsage>,
    /// Identifying metadata for the remote response.
    pub metadata: Option<ResponseMetadata>,
    /// Non-fatal notices emitted by the transport.
    pub warnings: Vec<String>,
}

impl StepOutcome {
    /// Folds one transport event into the outcome.
    pub(crate) fn apply_event(&mut self, event: ModelResponseEvent) {
        match event {
            ModelResponseEvent::Metadata(metadata) => {
                self.metadata = Some(metadata);
            }
            ModelResponseEvent::MessageDelta(delta) => {
                self.raw_text.push_str(&delta);
            }
            ModelResponseEvent::ToolCall(req) => {
                self.tool_calls.push(req);
            }
            ModelResponseEvent::Warning(warning) => {
                self.warnings.push(warning);
            }
            ModelResponseEvent::Usage(usage) => {
                self.usage = Some(usage);
            }
            ModelResponseEvent::Completed(reason) => {
                self.finish_reason = reason;
            }
        }
    }
}

/// A completed, validated generation result.
///
/// Constructed once per request and immutable afterwards.
#[derive(Clone, Debug)]
pub struct GenerateResult<T> {
    /// The validated output value.
    pub object: T,
    /// The full raw text the value was parsed from.
    pub raw_text: String,
    /// Tool calls requested by the model in this step.
    pub tool_calls: Vec<ToolCallRequest>,
    /// The reason the model finished generating.
    pub finish_reason: FinishReason,
    /// Token accounting, when the transport reported it.
    pub usage: Option<TokenUsage>,
    /// Identifying metadata for the remote response.
    pub metadata: Option<ResponseMetadata>,
    /// Non-fatal notices emitted by the transport.
    pub warnings: Vec<String>,
}

impl<T> GenerateResult<T> {
    pub(crate) fn from_outcome(outcome: StepOutcome, object: T) -> Self {
        Self {
            object,
            raw_text: outcome.raw_text,
            tool_calls: outcome.tool_calls,
            finish_reason: outcome.finish_reason,
            usage: outcome.usage,
            metadata: outcome.metadata,
            warnings: outcome.warnings,
        }
    }

    /// Consumes the result, returning the validated output value.
    #[inline]
    pub fn into_object(self) -> T {
        self.object
    }
}
