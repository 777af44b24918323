//! Streams a structured object from an OpenAI-compatible endpoint.
//!
//! Usage: `OPENAI_API_KEY=... cargo run --example notifications`

use std::env;

use objgen::openai::{OpenAIConfigBuilder, OpenAIProvider};
use objgen::{GenerateRequest, GenerationClient, ObjectOutput, TypedSchema};
use serde::Deserialize;

#[derive(Debug, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
struct Notification {
    name: String,
    message: String,
    minutes_ago: f64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct Notifications {
    notifications: Vec<Notification>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let Ok(api_key) = env::var("OPENAI_API_KEY") else {
        eprintln!("OPENAI_API_KEY environment variable is not set");
        return;
    };
    let config = OpenAIConfigBuilder::with_api_key(api_key).build();
    let client = GenerationClient::new(OpenAIProvider::new(config));

    let req = GenerateRequest::new(ObjectOutput::new(
        TypedSchema::<Notifications>::new(),
    ))
    .with_prompt(
        "Generate 3 notifications for a messages app in the style of a \
         lock screen",
    );
    let mut stream = match client.stream(req).await {
        Ok(stream) => stream,
        Err(err) => {
            eprintln!("request failed: {err}");
            return;
        }
    };

    while let Some(partial) = stream.next_partial().await {
        println!("partial: {partial}");
    }
    match stream.finalize().await {
        Ok(result) => {
            println!("final: {:#?}", result.object);
            if let Some(usage) = result.usage {
                println!("usage: {usage:?}");
            }
        }
        Err(err) => eprintln!("generation failed: {err}"),
    }
}
