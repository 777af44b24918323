//! Tool call supports.

mod error;
mod executor;
mod tracker;

use async_trait::async_trait;
use objgen_model::ModelTool;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use error::{Error, ErrorKind};
pub use executor::Executor;
pub use tracker::RoundTripTracker;

/// The result of a tool call.
pub type ToolResult = Result<String, Error>;

/// A tool that can be called by the model.
///
/// Implementations of this trait should be stateless, and may not
/// maintain any internal state.
///
/// The tool can be context-aware, meaning it can access additional
/// information about the current execution context. To do this, make
/// the context an immutable state of the tool, which can be set during
/// initialization, and copy it when executing.
pub trait Tool: Send + Sync + 'static {
    /// The type of input that the tool accepts.
    type Input: DeserializeOwned;

    /// Returns the name of the tool.
    fn name(&self) -> &str;

    /// Returns the definition advertised to the model.
    fn definition(&self) -> ModelTool;

    /// Executes the tool with the given input.
    ///
    /// This method must return a future that is fully independent of
    /// `self`, and the future should be cancellation safe.
    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static;
}

#[async_trait]
pub(crate) trait ToolObject: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn definition(&self) -> ModelTool;

    async fn execute(&self, arguments: Value) -> ToolResult;
}

pub(crate) struct AnyTool<T: Tool>(pub T);

#[async_trait]
impl<T: Tool> ToolObject for AnyTool<T> {
    #[inline]
    fn name(&self) -> &str {
        self.0.name()
    }

    #[inline]
    fn definition(&self) -> ModelTool {
        self.0.definition()
    }

    async fn execute(&self, arguments: Value) -> ToolResult {
        let input: T::Input = match serde_json::from_value(arguments) {
            Ok(input) => input,
            Err(err) => {
                let reason = format!("{err}");
                return Err(Error::invalid_input().with_reason(reason));
            }
        };
        self.0.execute(input).await
    }
}
