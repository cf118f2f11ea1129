//! Sampling settings shared by every model call

use finagent_llm::CompletionRequest;
use finagent_llm::completion::CompletionRequestBuilder;
use serde::{Deserialize, Serialize};

/// Model and sampling parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Model identifier
    pub model: String,

    /// Max tokens per completion
    pub max_tokens: usize,

    /// Sampling temperature
    pub temperature: Option<f32>,

    /// Nucleus sampling mass
    pub top_p: Option<f32>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            max_tokens: 4096,
            temperature: Some(0.0),
            top_p: None,
        }
    }
}

impl ModelSettings {
    /// Start a request carrying these settings
    pub fn request(&self) -> CompletionRequestBuilder {
        let mut builder = CompletionRequest::builder(&self.model).max_tokens(self.max_tokens);
        if let Some(temperature) = self.temperature {
            builder = builder.temperature(temperature);
        }
        if let Some(top_p) = self.top_p {
            builder = builder.top_p(top_p);
        }
        builder
    }
}
