//! Tool management for finagent
//!
//! Tools are the functions the reasoning agent may call. Each one carries a
//! JSON schema for its input and a `return_direct` flag telling the executor
//! whether its output goes straight back to the caller.

pub mod registry;
pub mod tool;

pub use registry::ToolRegistry;
pub use tool::Tool;
