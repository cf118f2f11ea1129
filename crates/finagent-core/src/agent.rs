//! Core Agent trait definition

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What an agent hands back for one query
///
/// A narrated reply is text the model composed itself, possibly after calling
/// tools whose output it was asked to summarize. A raw payload is the
/// unmodified output of a tool flagged as return-direct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AgentReply {
    /// Final text produced by the model
    Narrated(String),
    /// Output of a return-direct tool, passed through untouched
    RawPayload(Value),
}

impl AgentReply {
    /// Returns the narrated text, if this is a narrated reply
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Narrated(text) => Some(text),
            Self::RawPayload(_) => None,
        }
    }

    /// Whether the reply bypassed narration
    pub fn is_raw(&self) -> bool {
        matches!(self, Self::RawPayload(_))
    }
}

/// Trait for agents that answer a single natural-language query
///
/// Implementations hold no memory between calls: every invocation starts
/// from a fresh conversation.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Answer one query
    async fn invoke(&self, query: &str) -> Result<AgentReply>;

    /// Get the agent's name
    fn name(&self) -> &str;
}
