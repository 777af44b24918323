use serde_json::Value;

/// A request to be sent to the model transport.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelRequest {
    /// Overrides the transport's default model identifier.
    pub model: Option<String>,
    /// The input messages.
    pub messages: Vec<ModelMessage>,
    /// Tools that are available to the model.
    pub tools: Vec<ModelTool>,
    /// The expected shape of the model output.
    pub response_format: Option<ResponseFormat>,
    /// Sampling parameters for this request.
    pub params: GenerationParams,
}

/// A complete message.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelMessage {
    /// The system instructions.
    System(String),
    /// A user input text.
    User(String),
    /// An assistant turn, possibly carrying tool call requests.
    Assistant(AssistantMessage),
    /// A tool call result.
    Tool(ToolCallResult),
}

/// An assistant turn.
///
/// Tool calls issued in the turn are kept alongside the text, since
/// transports need to replay them verbatim in the conversation history
/// and the round-trip bookkeeping needs their ids to stay visible.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AssistantMessage {
    /// The text content of the turn, if any.
    pub text: Option<String>,
    /// Tool calls issued by the model in this turn.
    pub tool_calls: Vec<ToolCallRequest>,
}

impl AssistantMessage {
    /// Creates a text-only assistant message.
    #[inline]
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self {
            text: Some(text.into()),
            tool_calls: vec![],
        }
    }
}

/// Describes a tool call request from the model.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolCallRequest {
    /// The unique identifier for the tool call request.
    pub id: String,
    /// The name of the tool to call.
    pub name: String,
    /// The arguments to pass to the tool, conforming to its input
    /// schema.
    pub arguments: Value,
}

/// The result of calling a tool.
#[derive(
    Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct ToolCallResult {
    /// The unique identifier for the tool call request this result
    /// resolves.
    pub id: String,
    /// The outcome of the tool call.
    pub output: ToolOutput,
}

/// The outcome supplied back for a tool call.
#[derive(
    Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ToolOutput {
    /// The tool ran and produced this payload.
    Success(String),
    /// The tool failed; the payload describes why.
    Error(String),
}

impl ToolOutput {
    /// Returns the payload text regardless of the outcome.
    #[inline]
    pub fn payload(&self) -> &str {
        match self {
            ToolOutput::Success(payload) => payload,
            ToolOutput::Error(payload) => payload,
        }
    }
}

/// Describes a tool that can be used by the model.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelTool {
    /// Name of the tool.
    pub name: String,
    /// Description of the tool.
    pub description: String,
    /// Parameters definition of the tool.
    ///
    /// For most model transports, the parameters should typically be
    /// defined by a [JSON schema](https://json-schema.org/).
    pub parameters: Value,
}

/// The expected shape of the model output.
#[derive(Clone, Debug, PartialEq)]
pub enum ResponseFormat {
    /// Free-form text.
    Text,
    /// Any syntactically valid JSON value.
    JsonObject,
    /// JSON conforming to the given schema.
    JsonSchema {
        /// A short name for the schema, required by some endpoints.
        name: String,
        /// The JSON schema itself.
        schema: Value,
    },
}

/// Sampling parameters for a request.
///
/// Every field is optional; `None` means the transport's (or the
/// endpoint's) default applies.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GenerationParams {
    /// Sampling temperature.
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold.
    pub top_p: Option<f64>,
    /// Upper bound on generated tokens.
    pub max_tokens: Option<u32>,
    /// Frequency penalty.
    pub frequency_penalty: Option<f64>,
    /// Presence penalty.
    pub presence_penalty: Option<f64>,
    /// Deterministic sampling seed.
    pub seed: Option<u64>,
}
