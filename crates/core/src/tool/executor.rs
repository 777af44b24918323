use std::collections::HashMap;

use objgen_model::{ModelTool, ToolCallRequest, ToolCallResult, ToolOutput};
use tracing::Instrument;

use crate::tool::{AnyTool, Error, Tool, ToolObject};

async fn run_one(
    tool: &dyn ToolObject,
    req: &ToolCallRequest,
) -> ToolOutput {
    trace!("executing a tool ({}) with args: {:?}", req.id, req.arguments);
    match tool.execute(req.arguments.clone()).await {
        Ok(payload) => ToolOutput::Success(payload),
        Err(err) => ToolOutput::Error(err.reason().into_owned()),
    }
}

/// An executor that handles tool call requests from the model.
#[derive(Default)]
pub struct Executor {
    tools: HashMap<String, Box<dyn ToolObject>>,
}

impl Executor {
    /// Creates an executor with no tools registered.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool. A tool registered later under the same name
    /// replaces the earlier one.
    pub fn register<T: Tool>(&mut self, tool: T) {
        let name = tool.name().to_owned();
        self.tools.insert(name, Box::new(AnyTool(tool)));
    }

    /// Returns the definitions of every registered tool, for
    /// advertising them in a request.
    #[inline]
    pub fn definitions(&self) -> Vec<ModelTool> {
        self.tools.values().map(|tool| tool.definition()).collect()
    }

    /// Executes the given call requests in order, producing exactly one
    /// result per request.
    ///
    /// A request naming an unregistered tool resolves to an error
    /// result; it is never skipped, since every issued call needs a
    /// paired result before the next step.
    pub async fn execute_all(
        &self,
        requests: &[ToolCallRequest],
    ) -> Vec<ToolCallResult> {
        async {
            let mut results = Vec::with_capacity(requests.len());
            for req in requests {
                let output = match self.tools.get(&req.name) {
                    Some(tool) => run_one(tool.as_ref(), req).await,
                    None => {
                        warn!("tool not found: {}", req.name);
                        let err = Error::not_found().with_reason(format!(
                            "no tool is registered as `{}`",
                            req.name
                        ));
                        ToolOutput::Error(err.reason().into_owned())
                    }
                };
                results.push(ToolCallResult {
                    id: req.id.clone(),
                    output,
                });
            }
            results
        }
        .instrument(debug_span!("tool executor"))
        .await
    }
}
