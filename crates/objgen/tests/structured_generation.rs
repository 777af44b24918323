//! End-to-end tests against the scripted test transport.

use std::future::ready;

use objgen::model::{FinishReason, ToolCallRequest};
use objgen::tool::{Executor, Tool, ToolResult};
use objgen::{
    ArrayOutput, Conversation, EnumOutput, ErrorKind, GenerateRequest,
    GenerationClient, ObjectOutput, RawJsonSchema, TypedSchema,
};
use objgen_test_model::{PresetEvent, PresetResponse, TestModelProvider};
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn scripted(preset: PresetResponse) -> TestModelProvider {
    let mut provider = TestModelProvider::default();
    provider.add_user_turn();
    provider.add_assistant_turn(preset);
    provider
}

#[derive(Debug, Deserialize, schemars::JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
struct Notification {
    name: String,
    message: String,
    minutes_ago: f64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema, PartialEq)]
struct Notifications {
    notifications: Vec<Notification>,
}

#[tokio::test]
async fn test_generate_notifications() {
    let raw = "{\"notifications\": [\
        {\"name\": \"Alice\", \"message\": \"brunch this weekend?\", \"minutesAgo\": 5}, \
        {\"name\": \"Bob\", \"message\": \"running late\", \"minutesAgo\": 12}]}";
    let provider = scripted(PresetResponse::with_text_chunks(raw, 6));
    let client = GenerationClient::new(provider);

    let req = GenerateRequest::new(ObjectOutput::new(
        TypedSchema::<Notifications>::new(),
    ))
    .with_system("You generate fictional app data.")
    .with_prompt("Generate 2 plausible lock screen notifications");
    let result = client.generate(req).await.unwrap();

    assert_eq!(result.object.notifications.len(), 2);
    assert_eq!(result.object.notifications[0].name, "Alice");
    assert_eq!(result.object.notifications[1].minutes_ago, 12.0);
    assert_eq!(result.finish_reason, FinishReason::Stop);
    assert_eq!(result.raw_text, raw);
}

#[tokio::test]
async fn test_generate_enum() {
    let provider = scripted(PresetResponse::with_text_chunks(
        "{\"result\": \"positive\"}",
        3,
    ));
    let client = GenerationClient::new(provider);

    let req = GenerateRequest::new(EnumOutput::new([
        "positive", "negative", "neutral",
    ]))
    .with_prompt("Classify: \"what a lovely day\"");
    let result = client.generate(req).await.unwrap();
    assert_eq!(result.object, "positive");
}

#[tokio::test]
async fn test_generate_with_raw_json_schema() {
    let provider = scripted(PresetResponse::with_text_chunks(
        "{\"color\": \"blue\"}",
        2,
    ));
    let client = GenerationClient::new(provider);

    let schema = RawJsonSchema::new(
        "color",
        json!({
            "type": "object",
            "properties": { "color": { "type": "string" } },
            "required": ["color"],
        }),
    )
    .unwrap();
    let req = GenerateRequest::new(ObjectOutput::new(schema))
        .with_prompt("Pick a color");
    let result = client.generate(req).await.unwrap();
    assert_eq!(result.object, json!({ "color": "blue" }));
}

#[tokio::test]
async fn test_empty_enum_makes_no_transport_call() {
    let provider = TestModelProvider::default();
    let counter = provider.clone();
    let client = GenerationClient::new(provider);

    let req = GenerateRequest::new(EnumOutput::new(Vec::<String>::new()))
        .with_prompt("Classify this");
    let err = client.generate(req).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(counter.request_count(), 0);
}

#[tokio::test]
async fn test_stream_array_fragments() {
    let raw = "{\"elements\": [\
        {\"name\": \"A\", \"message\": \"hi\", \"minutesAgo\": 1}, \
        {\"name\": \"B\", \"message\": \"yo\", \"minutesAgo\": 2}]}";
    let provider = scripted(PresetResponse::with_text_chunks(raw, 10));
    let client = GenerationClient::new(provider);

    let req = GenerateRequest::new(ArrayOutput::new(
        TypedSchema::<Notification>::new(),
    ))
    .with_prompt("Generate 2 notifications");
    let mut stream = client.stream(req).await.unwrap();

    let mut fragments = vec![];
    while let Some(partial) = stream.next_partial().await {
        assert!(partial.is_array());
        fragments.push(partial);
    }
    assert!(fragments.len() > 1);
    assert_eq!(fragments.last().unwrap().as_array().unwrap().len(), 2);

    let result = stream.finalize().await.unwrap();
    assert_eq!(result.object.len(), 2);
    assert_eq!(result.object[1].name, "B");
}

#[tokio::test]
async fn test_cancellation_aborts_the_stream() {
    let provider = scripted(PresetResponse::with_text_chunks(
        "{\"result\": \"positive\"}",
        3,
    ));
    let client = GenerationClient::new(provider);

    let token = CancellationToken::new();
    let req = GenerateRequest::new(EnumOutput::new(["positive"]))
        .with_prompt("Classify: \"what a lovely day\"")
        .with_cancellation_token(token.clone());
    let mut stream = client.stream(req).await.unwrap();
    token.cancel();

    // No fragment flows after the abort; the failure is delivered at
    // settlement.
    assert_eq!(stream.next_partial().await, None);
    let err = stream.finalize().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Aborted);
}

struct TodoTool;

impl Tool for TodoTool {
    type Input = serde_json::Value;

    fn name(&self) -> &str {
        "todo_list"
    }

    fn definition(&self) -> objgen::model::ModelTool {
        objgen::model::ModelTool {
            name: "todo_list".to_owned(),
            description: "Returns the user's todo list".to_owned(),
            parameters: json!({ "type": "object", "properties": {} }),
        }
    }

    fn execute(
        &self,
        _input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        ready(Ok("1. brunch with Alice".to_owned()))
    }
}

#[derive(Debug, Deserialize, schemars::JsonSchema, PartialEq)]
struct Summary {
    summary: String,
}

#[tokio::test]
async fn test_tool_round_trip() {
    let mut provider = TestModelProvider::default();
    provider.add_user_turn();
    provider.add_assistant_turn(PresetResponse::with_events([
        PresetEvent::ToolCall(ToolCallRequest {
            id: "call:1".to_owned(),
            name: "todo_list".to_owned(),
            arguments: json!({}),
        }),
    ]));
    provider.add_user_turn();
    provider.add_assistant_turn(PresetResponse::with_text_chunks(
        "{\"summary\": \"brunch with Alice\"}",
        2,
    ));
    let client = GenerationClient::new(provider);

    let mut executor = Executor::new();
    executor.register(TodoTool);

    let mut conversation = Conversation::new();
    conversation.push_user("Summarize my todo list");

    let req = GenerateRequest::new(ObjectOutput::new(
        TypedSchema::<Summary>::new(),
    ))
    .with_messages(conversation.build_messages().unwrap())
    .with_tools(executor.definitions());
    let step = client.send_step(&req).await.unwrap();
    assert_eq!(step.finish_reason, FinishReason::ToolCalls);
    assert_eq!(step.tool_calls.len(), 1);
    conversation.absorb_step(None, step.tool_calls.clone());

    // The next step is blocked until every call is resolved.
    let err = conversation.build_messages().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingToolResult);
    assert_eq!(err.tool_call_id(), Some("call:1"));

    for result in executor.execute_all(&step.tool_calls).await {
        assert!(conversation.resolve_tool(result));
    }
    assert!(conversation.is_settled());

    let req = GenerateRequest::new(ObjectOutput::new(
        TypedSchema::<Summary>::new(),
    ))
    .with_messages(conversation.build_messages().unwrap())
    .with_tools(executor.definitions());
    let result = client.generate(req).await.unwrap();
    assert_eq!(result.object.summary, "brunch with Alice");
    conversation.absorb(&result);
    assert!(conversation.is_settled());
}

#[tokio::test(start_paused = true)]
async fn test_retries_are_observable_at_the_transport() {
    let provider = scripted(
        PresetResponse::with_text_chunks("{\"result\": \"neutral\"}", 2)
            .with_failures(2),
    );
    let counter = provider.clone();
    let client = GenerationClient::new(provider);

    let req = GenerateRequest::new(EnumOutput::new(["neutral"]))
        .with_prompt("Classify: \"meh\"");
    let result = client.generate(req).await.unwrap();
    assert_eq!(result.object, "neutral");
    // Two injected failures, then the successful attempt.
    assert_eq!(counter.request_count(), 3);
}
