//! Structured-output chains
//!
//! A [`StructuredChain`] sends one prompt in JSON mode and decodes the reply
//! into a Rust type. Replies that fail to decode or validate are sent back to
//! the model with the reason, up to `max_attempts` times; after that the chain
//! fails with [`Error::InvalidOutput`].

use crate::ModelSettings;
use finagent_core::{Error, Result};
use finagent_llm::{LLMProvider, Message};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, warn};

/// A type the model is asked to produce as a JSON object
pub trait StructuredOutput: DeserializeOwned + Send {
    /// JSON schema shown to the model
    fn schema() -> Value;

    /// Checks serde cannot express
    fn validate(&self) -> std::result::Result<(), String> {
        Ok(())
    }
}

/// Decode a model reply into `T`
///
/// Accepts the object bare or wrapped in a Markdown code fence, with or
/// without surrounding prose.
pub fn parse_structured<T: StructuredOutput>(raw: &str) -> std::result::Result<T, String> {
    let body = extract_json_object(raw).ok_or_else(|| "no JSON object found".to_string())?;
    let value: T = serde_json::from_str(body).map_err(|e| e.to_string())?;
    value.validate()?;
    Ok(value)
}

fn extract_json_object(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .map_or(trimmed, str::trim);

    let start = unfenced.find('{')?;
    let end = unfenced.rfind('}')?;
    (start < end).then(|| &unfenced[start..=end])
}

fn format_instructions(schema: &Value) -> String {
    let schema = serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
    format!(
        "Chỉ trả về MỘT đối tượng JSON hợp lệ tuân theo JSON schema dưới đây, \
         không kèm giải thích hay văn bản nào khác.\n```json\n{schema}\n```"
    )
}

/// Prompt → JSON object → `T`, with validation and retry
pub struct StructuredChain<T> {
    name: String,
    provider: Arc<dyn LLMProvider>,
    settings: ModelSettings,
    system_prompt: String,
    max_attempts: usize,
    _output: PhantomData<fn() -> T>,
}

impl<T: StructuredOutput> StructuredChain<T> {
    /// Create a chain; the output schema is appended to `system_prompt`
    pub fn new(
        name: impl Into<String>,
        provider: Arc<dyn LLMProvider>,
        settings: ModelSettings,
        system_prompt: &str,
        max_attempts: usize,
    ) -> Self {
        Self {
            name: name.into(),
            provider,
            settings,
            system_prompt: format!("{system_prompt}\n\n{}", format_instructions(&T::schema())),
            max_attempts: max_attempts.max(1),
            _output: PhantomData,
        }
    }

    /// Chain name, used in logs and errors
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full system prompt, including the format instructions
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Run the chain on one user prompt
    pub async fn invoke(&self, user_prompt: &str) -> Result<T> {
        let mut conversation = vec![Message::user(user_prompt)];
        let mut last_error = String::new();

        for attempt in 1..=self.max_attempts {
            let request = self
                .settings
                .request()
                .system(&self.system_prompt)
                .messages(conversation.clone())
                .json_output()
                .build();

            let response = self
                .provider
                .complete(request)
                .await
                .map_err(|e| Error::ProcessingFailed(format!("{}: {e}", self.name)))?;

            let raw = response.message.text().unwrap_or_default().to_string();
            match parse_structured::<T>(&raw) {
                Ok(value) => {
                    debug!(chain = %self.name, attempt, "Structured output accepted");
                    return Ok(value);
                }
                Err(reason) => {
                    warn!(chain = %self.name, attempt, error = %reason, "Structured output rejected");
                    conversation.push(Message::assistant(raw));
                    conversation.push(Message::user(format!(
                        "Phản hồi không hợp lệ ({reason}). Hãy trả lời lại bằng đúng một \
                         đối tượng JSON theo schema đã cho."
                    )));
                    last_error = reason;
                }
            }
        }

        Err(Error::InvalidOutput(format!(
            "{} failed after {} attempts: {last_error}",
            self.name, self.max_attempts
        )))
    }
}
