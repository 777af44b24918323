//! Conversation state across generation steps.

use objgen_model::{
    AssistantMessage, ModelMessage, ToolCallRequest, ToolCallResult,
};

use crate::error::Error;
use crate::result::GenerateResult;
use crate::tool::RoundTripTracker;

/// A conversation whose steps may include tool round trips.
///
/// The conversation owns the message history and the round-trip
/// bookkeeping for tool calls: a step whose calls are not all resolved
/// cannot produce the message list for the next one.
#[derive(Clone, Debug, Default)]
pub struct Conversation {
    messages: Vec<ModelMessage>,
    tracker: RoundTripTracker,
}

impl Conversation {
    /// Creates an empty conversation.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a user message.
    pub fn push_user<S: Into<String>>(&mut self, text: S) {
        self.messages.push(ModelMessage::User(text.into()));
    }

    /// Absorbs a completed generation step into the history.
    #[inline]
    pub fn absorb<T>(&mut self, result: &GenerateResult<T>) {
        let text = if result.raw_text.is_empty() {
            None
        } else {
            Some(result.raw_text.clone())
        };
        self.absorb_step(text, result.tool_calls.clone());
    }

    /// Records an assistant turn, issuing every tool call it carries.
    pub fn absorb_step(
        &mut self,
        text: Option<String>,
        tool_calls: Vec<ToolCallRequest>,
    ) {
        for call in &tool_calls {
            self.tracker.issue(call.id.clone());
        }
        self.messages
            .push(ModelMessage::Assistant(AssistantMessage {
                text,
                tool_calls,
            }));
    }

    /// Supplies the result for an issued tool call.
    ///
    /// The first resolution wins: a repeated resolution (or one for an
    /// unknown id) is a no-op, returns `false`, and leaves the history
    /// untouched.
    pub fn resolve_tool(&mut self, result: ToolCallResult) -> bool {
        if !self.tracker.resolve(&result.id) {
            return false;
        }
        self.messages.push(ModelMessage::Tool(result));
        true
    }

    /// Whether every issued tool call has been resolved.
    #[inline]
    pub fn is_settled(&self) -> bool {
        self.tracker.is_settled()
    }

    /// Builds the message list for the next generation step.
    ///
    /// Fails when any tool call from a prior step is still unresolved,
    /// naming the offending call.
    pub fn build_messages(&self) -> Result<Vec<ModelMessage>, Error> {
        if let Some(id) = self.tracker.first_unresolved() {
            return Err(Error::missing_tool_result(id));
        }
        Ok(self.messages.clone())
    }

    /// Returns the message history recorded so far.
    #[inline]
    pub fn messages(&self) -> &[ModelMessage] {
        &self.messages
    }
}

#[cfg(test)]
mod tests {
    use objgen_model::ToolOutput;
    use serde_json::json;

    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_unresolved_call_blocks_next_step() {
        let mut conversation = Conversation::new();
        conversation.push_user("Check my todo");
        conversation.absorb_step(
            None,
            vec![ToolCallRequest {
                id: "call:1".to_owned(),
                name: "read_file".to_owned(),
                arguments: json!({ "filename": "todo.txt" }),
            }],
        );

        let err = conversation.build_messages().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingToolResult);
        assert_eq!(err.tool_call_id(), Some("call:1"));

        assert!(conversation.resolve_tool(ToolCallResult {
            id: "call:1".to_owned(),
            output: ToolOutput::Success("1. brunch".to_owned()),
        }));
        let messages = conversation.build_messages().unwrap();
        assert_eq!(messages.len(), 3);
        assert!(matches!(messages[2], ModelMessage::Tool(_)));
    }

    #[test]
    fn test_partial_resolution_still_blocks() {
        let mut conversation = Conversation::new();
        conversation.push_user("Check the weather and my todo");
        conversation.absorb_step(
            None,
            vec![
                ToolCallRequest {
                    id: "call:1".to_owned(),
                    name: "weather".to_owned(),
                    arguments: json!({ "city": "Tokyo" }),
                },
                ToolCallRequest {
                    id: "call:2".to_owned(),
                    name: "read_file".to_owned(),
                    arguments: json!({ "filename": "todo.txt" }),
                },
            ],
        );

        assert!(conversation.resolve_tool(ToolCallResult {
            id: "call:1".to_owned(),
            output: ToolOutput::Success("sunny".to_owned()),
        }));
        assert!(!conversation.is_settled());

        // The next step stays blocked, naming the call that is still
        // open.
        let err = conversation.build_messages().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingToolResult);
        assert_eq!(err.tool_call_id(), Some("call:2"));

        assert!(conversation.resolve_tool(ToolCallResult {
            id: "call:2".to_owned(),
            output: ToolOutput::Success("1. brunch".to_owned()),
        }));
        assert!(conversation.is_settled());
        assert_eq!(conversation.build_messages().unwrap().len(), 4);
    }

    #[test]
    fn test_repeated_resolution_is_a_no_op() {
        let mut conversation = Conversation::new();
        conversation.absorb_step(
            None,
            vec![ToolCallRequest {
                id: "call:1".to_owned(),
                name: "lookup".to_owned(),
                arguments: json!({}),
            }],
        );

        let result = ToolCallResult {
            id: "call:1".to_owned(),
            output: ToolOutput::Success("first".to_owned()),
        };
        assert!(conversation.resolve_tool(result.clone()));
        assert!(!conversation.resolve_tool(ToolCallResult {
            id: "call:1".to_owned(),
            output: ToolOutput::Success("second".to_owned()),
        }));

        // The history keeps the first resolution only.
        let tool_messages: Vec<_> = conversation
            .messages()
            .iter()
            .filter(|msg| matches!(msg, ModelMessage::Tool(_)))
            .collect();
        assert_eq!(tool_messages.len(), 1);
        assert!(matches!(
            tool_messages[0],
            ModelMessage::Tool(r) if r.output == ToolOutput::Success("first".to_owned())
        ));
    }
}
