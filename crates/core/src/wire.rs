//! Wire rendering for server-style callers.
//!
//! Two response shapes are offered: a one-shot JSON rendering, and a
//! line-framed stream rendering where every line is `<tag>:<json>\n`.
//! The framing is a compatibility surface consumed by existing
//! clients; tags and payload shapes are stable and must not change
//! across versions.

use std::error::Error as StdError;
use std::fmt::{self, Display};

use objgen_model::{
    FinishReason, TokenUsage, ToolCallRequest, ToolCallResult, ToolOutput,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The content type of the one-shot JSON rendering.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// A one-shot HTTP response rendering.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JsonRendering {
    /// The HTTP status code. Always 200; failures are not rendered.
    pub status: u16,
    /// The `Content-Type` header value.
    pub content_type: &'static str,
    /// The serialized JSON body.
    pub body: String,
}

/// Renders a value as a one-shot JSON response.
pub fn render_json<T: Serialize>(
    value: &T,
) -> Result<JsonRendering, serde_json::Error> {
    Ok(JsonRendering {
        status: 200,
        content_type: JSON_CONTENT_TYPE,
        body: serde_json::to_string(value)?,
    })
}

/// A single part of the line-framed stream rendering.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamPart {
    /// A text fragment (tag `0`).
    Text(String),
    /// A structured data payload (tag `2`).
    Data(Value),
    /// A terminal error (tag `3`).
    Error(String),
    /// A tool call issued by the model (tag `9`).
    ToolCall(ToolCallRequest),
    /// The result paired with a tool call (tag `a`).
    ToolResult(ToolCallResult),
    /// The closing frame (tag `d`).
    Finish {
        /// Why the generation finished.
        finish_reason: FinishReason,
        /// Token accounting, when known.
        usage: Option<TokenUsage>,
    },
}

// Payload shapes are part of the protocol; field order and naming are
// load-bearing.

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolCallPayload {
    tool_call_id: String,
    tool_name: String,
    args: Value,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolResultPayload {
    tool_call_id: String,
    result: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    is_error: bool,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinishPayload {
    finish_reason: FinishReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    usage: Option<UsagePayload>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsagePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    prompt_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    completion_tokens: Option<u64>,
}

impl StreamPart {
    fn tag(&self) -> char {
        match self {
            StreamPart::Text(_) => '0',
            StreamPart::Data(_) => '2',
            StreamPart::Error(_) => '3',
            StreamPart::ToolCall(_) => '9',
            StreamPart::ToolResult(_) => 'a',
            StreamPart::Finish { .. } => 'd',
        }
    }

    fn payload(&self) -> Result<String, serde_json::Error> {
        match self {
            StreamPart::Text(text) => serde_json::to_string(text),
            StreamPart::Data(value) => serde_json::to_string(value),
            StreamPart::Error(message) => serde_json::to_string(message),
            StreamPart::ToolCall(req) => {
                serde_json::to_string(&ToolCallPayload {
                    tool_call_id: req.id.clone(),
                    tool_name: req.name.clone(),
                    args: req.arguments.clone(),
                })
            }
            StreamPart::ToolResult(result) => {
                serde_json::to_string(&ToolResultPayload {
                    tool_call_id: result.id.clone(),
                    result: result.output.payload().to_owned(),
                    is_error: matches!(
                        result.output,
                        ToolOutput::Error(_)
                    ),
                })
            }
            StreamPart::Finish {
                finish_reason,
                usage,
            } => serde_json::to_string(&FinishPayload {
                finish_reason: *finish_reason,
                usage: usage.map(|usage| UsagePayload {
                    prompt_tokens: usage.input_tokens,
                    completion_tokens: usage.output_tokens,
                }),
            }),
        }
    }

    /// Encodes this part as one framed line, trailing newline
    /// included.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        Ok(format!("{}:{}\n", self.tag(), self.payload()?))
    }

    /// Decodes one framed line. The trailing newline is optional.
    pub fn decode(line: &str) -> Result<Self, DecodeError> {
        let line = line.strip_suffix('\n').unwrap_or(line);
        let Some((tag, payload)) = line.split_once(':') else {
            return Err(DecodeError::new("missing tag separator"));
        };
        let parse_err =
            |err: serde_json::Error| DecodeError::new(format!("{err}"));
        match tag {
            "0" => {
                Ok(StreamPart::Text(
                    serde_json::from_str(payload).map_err(parse_err)?,
                ))
            }
            "2" => {
                Ok(StreamPart::Data(
                    serde_json::from_str(payload).map_err(parse_err)?,
                ))
            }
            "3" => {
                Ok(StreamPart::Error(
                    serde_json::from_str(payload).map_err(parse_err)?,
                ))
            }
            "9" => {
                let payload: ToolCallPayload =
                    serde_json::from_str(payload).map_err(parse_err)?;
                Ok(StreamPart::ToolCall(ToolCallRequest {
                    id: payload.tool_call_id,
                    name: payload.tool_name,
                    arguments: payload.args,
                }))
            }
            "a" => {
                let payload: ToolResultPayload =
                    serde_json::from_str(payload).map_err(parse_err)?;
                let output = if payload.is_error {
                    ToolOutput::Error(payload.result)
                } else {
                    ToolOutput::Success(payload.result)
                };
                Ok(StreamPart::ToolResult(ToolCallResult {
                    id: payload.tool_call_id,
                    output,
                }))
            }
            "d" => {
                let payload: FinishPayload =
                    serde_json::from_str(payload).map_err(parse_err)?;
                Ok(StreamPart::Finish {
                    finish_reason: payload.finish_reason,
                    usage: payload.usage.map(|usage| TokenUsage {
                        input_tokens: usage.prompt_tokens,
                        output_tokens: usage.completion_tokens,
                        ..Default::default()
                    }),
                })
            }
            _ => Err(DecodeError::new(format!("unknown tag: {tag}"))),
        }
    }
}

/// The error returned when a framed line cannot be decoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodeError {
    message: String,
}

impl DecodeError {
    fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed stream part: {}", self.message)
    }
}

impl StdError for DecodeError {}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_render_json() {
        let rendering =
            render_json(&json!({ "answer": 42 })).unwrap();
        assert_eq!(rendering.status, 200);
        assert_eq!(
            rendering.content_type,
            "application/json; charset=utf-8"
        );
        assert_eq!(rendering.body, "{\"answer\":42}");
    }

    #[test]
    fn test_encoding_is_bit_exact() {
        assert_eq!(
            StreamPart::Text("Hello".to_owned()).encode().unwrap(),
            "0:\"Hello\"\n"
        );
        assert_eq!(
            StreamPart::Data(json!([{ "k": 1 }])).encode().unwrap(),
            "2:[{\"k\":1}]\n"
        );
        assert_eq!(
            StreamPart::Error("boom".to_owned()).encode().unwrap(),
            "3:\"boom\"\n"
        );
        assert_eq!(
            StreamPart::ToolCall(ToolCallRequest {
                id: "call:1".to_owned(),
                name: "lookup".to_owned(),
                arguments: json!({ "q": "x" }),
            })
            .encode()
            .unwrap(),
            "9:{\"toolCallId\":\"call:1\",\"toolName\":\"lookup\",\"args\":{\"q\":\"x\"}}\n"
        );
        assert_eq!(
            StreamPart::ToolResult(ToolCallResult {
                id: "call:1".to_owned(),
                output: ToolOutput::Success("42".to_owned()),
            })
            .encode()
            .unwrap(),
            "a:{\"toolCallId\":\"call:1\",\"result\":\"42\"}\n"
        );
        assert_eq!(
            StreamPart::Finish {
                finish_reason: FinishReason::Stop,
                usage: Some(TokenUsage {
                    input_tokens: Some(10),
                    output_tokens: Some(7),
                    ..Default::default()
                }),
            }
            .encode()
            .unwrap(),
            "d:{\"finishReason\":\"stop\",\"usage\":{\"promptTokens\":10,\"completionTokens\":7}}\n"
        );
    }

    #[test]
    fn test_decode_round_trip() {
        let parts = [
            StreamPart::Text("partial".to_owned()),
            StreamPart::Data(json!({ "elements": [1, 2] })),
            StreamPart::ToolCall(ToolCallRequest {
                id: "call:9".to_owned(),
                name: "lookup".to_owned(),
                arguments: json!({}),
            }),
            StreamPart::ToolResult(ToolCallResult {
                id: "call:9".to_owned(),
                output: ToolOutput::Error("nope".to_owned()),
            }),
            StreamPart::Finish {
                finish_reason: FinishReason::ToolCalls,
                usage: None,
            },
        ];
        for part in parts {
            let line = part.encode().unwrap();
            assert_eq!(StreamPart::decode(&line).unwrap(), part);
        }
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(StreamPart::decode("no separator").is_err());
        assert!(StreamPart::decode("z:{}").is_err());
        assert!(StreamPart::decode("0:not json").is_err());
    }
}
