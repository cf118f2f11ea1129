//! Tool trait definition

use async_trait::async_trait;
use finagent_core::Result;
use serde_json::Value;

/// Trait for tools that agents can execute
///
/// Each tool must provide a name, a description and a JSON schema for its
/// input. The name must be unique within a [`ToolRegistry`](crate::ToolRegistry).
#[async_trait]
pub trait Tool: Send + Sync {
    /// Execute the tool with given parameters
    ///
    /// `params` should match [`Tool::input_schema`]. Problems with the data
    /// itself are part of the returned value; `Err` is reserved for
    /// parameters that cannot be decoded at all.
    async fn execute(&self, params: Value) -> Result<Value>;

    /// Get the tool's name
    fn name(&self) -> &str;

    /// Get the tool's description
    ///
    /// This description helps the LLM understand when to use this tool
    fn description(&self) -> &str;

    /// Get the tool's input schema (JSON Schema format)
    fn input_schema(&self) -> Value;

    /// Whether the raw output is returned to the caller without narration
    fn return_direct(&self) -> bool {
        false
    }
}
