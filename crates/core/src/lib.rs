//! Core logic of the structured generation client: output modes,
//! schema validation, retries, streaming settlement, and tool round
//! trips.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod client;
pub mod conversation;
mod error;
mod output;
mod partial_json;
mod request;
mod result;
mod schema;
mod stream;
pub mod tool;
pub mod wire;

pub use client::GenerationClient;
pub use conversation::Conversation;
pub use error::{Error, ErrorKind};
pub use output::{
    ArrayOutput, EnumOutput, NoSchemaOutput, ObjectOutput, OutputMode,
    OutputStrategy,
};
pub use request::{DEFAULT_MAX_RETRIES, GenerateRequest};
pub use result::{GenerateResult, StepOutcome};
pub use schema::{
    RawJsonSchema, Schema, SchemaError, SchemaViolation, TypedSchema,
};
pub use stream::ObjectStream;
