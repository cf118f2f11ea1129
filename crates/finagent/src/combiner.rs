//! Merging sub-answers into one reply

use crate::prompts::Prompts;
use finagent_core::{Error, Result};
use finagent_llm::LLMProvider;
use finagent_runtime::{ModelSettings, StructuredChain, StructuredOutput};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{info, instrument};

/// The combiner's structured reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CombinedAnswer {
    pub combined_answer: String,
    pub original_query: String,
}

impl StructuredOutput for CombinedAnswer {
    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "combined_answer": {
                    "type": "string",
                    "description": "Câu trả lời tổng hợp từ tất cả các kết quả"
                },
                "original_query": {"type": "string", "description": "Câu hỏi gốc"}
            },
            "required": ["combined_answer", "original_query"],
            "additionalProperties": false
        })
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.combined_answer.trim().is_empty() {
            return Err("combined_answer is empty".to_string());
        }
        Ok(())
    }
}

/// Numbered block of sub-answers, in the order they were produced
pub fn format_results(results: &[String]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, answer)| format!("Kết quả {}:\n{answer}\n\n", i + 1))
        .collect()
}

pub struct ResultCombiner {
    chain: StructuredChain<CombinedAnswer>,
    prompts: Arc<Prompts>,
}

impl ResultCombiner {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        settings: ModelSettings,
        prompts: Arc<Prompts>,
        max_attempts: usize,
    ) -> Result<Self> {
        let system_prompt = prompts
            .combiner_system()
            .map_err(|e| Error::InitializationFailed(e.to_string()))?;
        Ok(Self {
            chain: StructuredChain::new("combiner", provider, settings, &system_prompt, max_attempts),
            prompts,
        })
    }

    #[instrument(skip(self, results), fields(result_count = results.len()))]
    pub async fn combine(&self, original_query: &str, results: &[String]) -> Result<String> {
        let prompt = self
            .prompts
            .combiner_user(original_query, &format_results(results))
            .map_err(|e| Error::ProcessingFailed(e.to_string()))?;
        let combined = self.chain.invoke(&prompt).await?;
        info!(answer_length = combined.combined_answer.len(), "Results combined");
        Ok(combined.combined_answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{scripted, text_response};

    #[test]
    fn test_format_results_numbers_from_one() {
        let block = format_results(&["SMA9 = 10".to_string(), "SMA20 = 11".to_string()]);
        assert_eq!(block, "Kết quả 1:\nSMA9 = 10\n\nKết quả 2:\nSMA20 = 11\n\n");
        assert_eq!(format_results(&[]), "");
    }

    #[tokio::test]
    async fn test_combine_sends_numbered_results() {
        let (provider, seen) = scripted(vec![text_response(
            r#"{"combined_answer": "SMA9 của VIC cao hơn SMA20.", "original_query": "So sánh SMA9 và SMA20 của VIC"}"#,
        )]);
        let combiner = ResultCombiner::new(
            Arc::new(provider),
            ModelSettings::default(),
            Arc::new(Prompts::new().unwrap()),
            3,
        )
        .unwrap();

        let answer = combiner
            .combine(
                "So sánh SMA9 và SMA20 của VIC",
                &["SMA9 = 10".to_string(), "SMA20 = 11".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(answer, "SMA9 của VIC cao hơn SMA20.");

        let requests = seen.lock().unwrap();
        let user = requests[0].messages[0].text().unwrap();
        assert!(user.contains("Câu hỏi gốc: So sánh SMA9 và SMA20 của VIC"));
        assert!(user.contains("Kết quả 2:\nSMA20 = 11"));
    }

    #[tokio::test]
    async fn test_empty_answer_is_retried() {
        let (provider, seen) = scripted(vec![
            text_response(r#"{"combined_answer": " ", "original_query": "q"}"#),
            text_response(r#"{"combined_answer": "Tổng hợp", "original_query": "q"}"#),
        ]);
        let combiner = ResultCombiner::new(
            Arc::new(provider),
            ModelSettings::default(),
            Arc::new(Prompts::new().unwrap()),
            3,
        )
        .unwrap();

        let answer = combiner.combine("q", &["a".to_string()]).await.unwrap();
        assert_eq!(answer, "Tổng hợp");
        assert_eq!(seen.lock().unwrap().len(), 2);
    }
}
