//! LLM provider abstraction layer for finagent
//!
//! This crate provides provider-agnostic types for talking to a chat model:
//!
//! - Message types, including tool-use and tool-result blocks
//! - Completion request/response types
//! - Tool definitions for function calling
//! - The [`LLMProvider`] trait and an OpenAI-compatible implementation

pub mod completion;
pub mod error;
pub mod messages;
pub mod provider;
pub mod providers;
pub mod tools;

pub use completion::{CompletionRequest, CompletionResponse, ResponseFormat, StopReason, TokenUsage};
pub use error::{LLMError, Result};
pub use messages::{ContentBlock, Message, MessageContent, Role};
pub use provider::LLMProvider;
pub use tools::ToolDefinition;
