//! Query classification and decomposition

use crate::prompts::Prompts;
use finagent_core::{Error, Result};
use finagent_llm::LLMProvider;
use finagent_runtime::{ModelSettings, StructuredChain, StructuredOutput};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{info, instrument};

/// Whether a question needs more than one tool call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Classification {
    pub is_complex: bool,
    pub reasoning: String,
}

impl StructuredOutput for Classification {
    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "is_complex": {
                    "type": "boolean",
                    "description": "true nếu câu hỏi phức tạp, false nếu đơn giản"
                },
                "reasoning": {"type": "string", "description": "Lý do phân loại"}
            },
            "required": ["is_complex", "reasoning"],
            "additionalProperties": false
        })
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.reasoning.trim().is_empty() {
            return Err("reasoning is empty".to_string());
        }
        Ok(())
    }
}

/// Ordered sub-questions of a complex question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Decomposition {
    pub sub_queries: Vec<String>,
    pub reasoning: String,
}

impl StructuredOutput for Decomposition {
    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "sub_queries": {
                    "type": "array",
                    "items": {"type": "string"},
                    "minItems": 2,
                    "description": "Danh sách các câu hỏi con, theo thứ tự"
                },
                "reasoning": {"type": "string", "description": "Lý do phân tách câu hỏi"}
            },
            "required": ["sub_queries", "reasoning"],
            "additionalProperties": false
        })
    }

    fn validate(&self) -> std::result::Result<(), String> {
        let non_empty = self
            .sub_queries
            .iter()
            .filter(|q| !q.trim().is_empty())
            .count();
        if non_empty < 2 {
            return Err(format!(
                "expected at least 2 non-empty sub_queries, got {non_empty}"
            ));
        }
        Ok(())
    }
}

/// Classifier and decomposer chains
pub struct QueryPlanner {
    classifier: StructuredChain<Classification>,
    decomposer: StructuredChain<Decomposition>,
    prompts: Arc<Prompts>,
}

impl QueryPlanner {
    /// `tool_summaries` are `"name: description"` lines shown to the classifier
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        settings: ModelSettings,
        prompts: Arc<Prompts>,
        tool_summaries: &[String],
        max_attempts: usize,
    ) -> Result<Self> {
        let render_err = |e: crate::FinanceError| Error::InitializationFailed(e.to_string());
        let classifier_prompt = prompts.classifier_system(tool_summaries).map_err(render_err)?;
        let decomposer_prompt = prompts.decomposer_system().map_err(render_err)?;

        Ok(Self {
            classifier: StructuredChain::new(
                "classifier",
                Arc::clone(&provider),
                settings.clone(),
                &classifier_prompt,
                max_attempts,
            ),
            decomposer: StructuredChain::new(
                "decomposer",
                provider,
                settings,
                &decomposer_prompt,
                max_attempts,
            ),
            prompts,
        })
    }

    #[instrument(skip(self))]
    pub async fn classify(&self, query: &str) -> Result<Classification> {
        let prompt = self
            .prompts
            .classifier_user(query)
            .map_err(|e| Error::ProcessingFailed(e.to_string()))?;
        let classification = self.classifier.invoke(&prompt).await?;
        info!(
            is_complex = classification.is_complex,
            reasoning = %classification.reasoning,
            "Query classified"
        );
        Ok(classification)
    }

    /// Trimmed, non-empty sub-questions in order
    #[instrument(skip(self))]
    pub async fn decompose(&self, query: &str) -> Result<Vec<String>> {
        let prompt = self
            .prompts
            .decomposer_user(query)
            .map_err(|e| Error::ProcessingFailed(e.to_string()))?;
        let decomposition = self.decomposer.invoke(&prompt).await?;

        let sub_queries: Vec<String> = decomposition
            .sub_queries
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .collect();
        info!(count = sub_queries.len(), "Query decomposed");
        Ok(sub_queries)
    }
}
