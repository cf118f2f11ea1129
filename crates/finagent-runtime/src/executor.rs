//! Agent executor for running tool-calling loops
//!
//! The loop:
//! 1. Call the LLM with the conversation and the registered tools
//! 2. If it asked for tools, run them in order
//! 3. If one of them is return-direct, stop and hand its output back as-is
//! 4. Otherwise feed the results back and go round again
//! 5. When the model ends its turn, return its text

use crate::ModelSettings;
use finagent_core::{AgentReply, Error, Result};
use finagent_llm::{ContentBlock, LLMProvider, Message, StopReason, ToolDefinition};
use finagent_tools::ToolRegistry;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Reply used when the model keeps calling tools past the iteration budget
pub const MAX_ITERATIONS_REPLY: &str =
    "Không thể hoàn thành yêu cầu trong số bước xử lý cho phép.";

/// Configuration for agent execution
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum number of LLM round trips (prevents infinite loops)
    pub max_iterations: usize,

    /// Model and sampling parameters
    pub model: ModelSettings,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            model: ModelSettings::default(),
        }
    }
}

/// What came out of running one batch of tool calls
enum ToolBatch {
    /// Results to append to the conversation
    Continue(Vec<Message>),
    /// A return-direct tool produced this value
    Direct(Value),
}

/// Executes an agent loop: LLM → tool calls → execution → loop back
pub struct AgentExecutor {
    provider: Arc<dyn LLMProvider>,
    tool_registry: Arc<ToolRegistry>,
    config: ExecutorConfig,
}

impl AgentExecutor {
    /// Create a new agent executor
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        tool_registry: Arc<ToolRegistry>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            provider,
            tool_registry,
            config,
        }
    }

    /// Get the executor configuration
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run the loop for one user message under the given system prompt
    ///
    /// Every call starts from an empty conversation.
    pub async fn run(&self, system_prompt: &str, user_message: &str) -> Result<AgentReply> {
        let mut conversation = vec![Message::user(user_message)];
        let tools = self.build_tool_definitions();

        for iteration in 1..=self.config.max_iterations {
            debug!(iteration, tool_count = tools.len(), "Agent iteration started");

            let request = self
                .config
                .model
                .request()
                .system(system_prompt)
                .messages(conversation.clone())
                .tools(tools.clone())
                .build();

            let response = self
                .provider
                .complete(request)
                .await
                .map_err(|e| Error::ProcessingFailed(e.to_string()))?;

            info!(
                iteration,
                stop_reason = ?response.stop_reason,
                input_tokens = response.usage.input_tokens,
                output_tokens = response.usage.output_tokens,
                "LLM response received"
            );

            match response.stop_reason {
                StopReason::ToolUse if response.message.has_tool_uses() => {
                    let batch = self.execute_tools(&response.message).await;
                    conversation.push(response.message);
                    match batch {
                        ToolBatch::Direct(value) => return Ok(AgentReply::RawPayload(value)),
                        ToolBatch::Continue(results) => conversation.extend(results),
                    }
                }
                StopReason::MaxTokens => {
                    warn!(iteration, "Hit max tokens in LLM response");
                    let text = response.message.text().unwrap_or_default();
                    return Ok(AgentReply::Narrated(if text.is_empty() {
                        "Câu trả lời bị cắt do vượt giới hạn độ dài.".to_string()
                    } else {
                        text.to_string()
                    }));
                }
                _ => {
                    let text = response.message.text().unwrap_or_default().to_string();
                    info!(iteration, response_length = text.len(), "Agent completed");
                    return Ok(AgentReply::Narrated(text));
                }
            }
        }

        warn!(
            max_iterations = self.config.max_iterations,
            "Max iterations reached, stopping"
        );
        Ok(AgentReply::Narrated(MAX_ITERATIONS_REPLY.to_string()))
    }

    fn build_tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tool_registry
            .list_tools()
            .iter()
            .map(|tool| ToolDefinition::new(tool.name(), tool.description(), tool.input_schema()))
            .collect()
    }

    /// Run the tool calls of one assistant message, in order
    ///
    /// Unknown tools and tool errors are reported back to the model rather
    /// than failing the run.
    async fn execute_tools(&self, message: &Message) -> ToolBatch {
        let mut results = Vec::new();

        for block in message.tool_uses() {
            let ContentBlock::ToolUse { id, name, input } = block else {
                continue;
            };

            let Some(tool) = self.tool_registry.get(name) else {
                warn!(tool_name = %name, "Model requested unknown tool");
                results.push(Message::tool_error(id.clone(), format!("Tool not found: {name}")));
                continue;
            };

            let input_preview: String = input.to_string().chars().take(300).collect();
            info!(tool_name = %name, tool_id = %id, input_preview = %input_preview, "Executing tool");

            let started = Instant::now();
            match tool.execute(input.clone()).await {
                Ok(result) => {
                    let duration_ms = started.elapsed().as_millis() as u64;
                    info!(
                        tool_name = %name,
                        duration_ms,
                        return_direct = tool.return_direct(),
                        "Tool execution succeeded"
                    );

                    if tool.return_direct() {
                        return ToolBatch::Direct(result);
                    }
                    results.push(Message::tool_result(id.clone(), result.to_string()));
                }
                Err(e) => {
                    let duration_ms = started.elapsed().as_millis() as u64;
                    warn!(tool_name = %name, duration_ms, error = %e, "Tool execution failed");
                    results.push(Message::tool_error(id.clone(), format!("Error: {e}")));
                }
            }
        }

        ToolBatch::Continue(results)
    }
}

/// Builder for AgentExecutor
pub struct AgentExecutorBuilder {
    provider: Option<Arc<dyn LLMProvider>>,
    tool_registry: Arc<ToolRegistry>,
    config: ExecutorConfig,
}

impl AgentExecutorBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            provider: None,
            tool_registry: Arc::new(ToolRegistry::new()),
            config: ExecutorConfig::default(),
        }
    }

    /// Set the LLM provider
    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the tool registry
    pub fn tool_registry(mut self, registry: Arc<ToolRegistry>) -> Self {
        self.tool_registry = registry;
        self
    }

    /// Set maximum iterations
    pub fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    /// Set the model settings
    pub fn model(mut self, model: ModelSettings) -> Self {
        self.config.model = model;
        self
    }

    /// Build the executor
    pub fn build(self) -> Result<AgentExecutor> {
        let provider = self
            .provider
            .ok_or_else(|| Error::InitializationFailed("Provider not set".to_string()))?;

        if self.config.max_iterations == 0 {
            return Err(Error::InitializationFailed(
                "max_iterations must be greater than 0".to_string(),
            ));
        }

        Ok(AgentExecutor::new(provider, self.tool_registry, self.config))
    }
}

impl Default for AgentExecutorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
