//! Request orchestration
//!
//! One request runs classify → (agent | decompose → agent per sub-question →
//! combine). Sub-questions run sequentially, in the order the planner gave.

use crate::agent::FinanceAgent;
use crate::combiner::ResultCombiner;
use crate::config::FinanceConfig;
use crate::error::{FinanceError, Result};
use crate::planner::QueryPlanner;
use crate::prompts::Prompts;
use crate::render::extract_answer;
use crate::tools::finance_tools;
use finagent_core::Agent;
use finagent_llm::LLMProvider;
use finagent_llm::providers::OpenAICompatProvider;
use finagent_market::{MarketDataGateway, SystemClock, TimeSource, VciGateway};
use finagent_runtime::AgentExecutorBuilder;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

/// Answer to one user question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    pub is_complex: bool,
    pub reasoning: String,
}

pub struct Orchestrator {
    planner: QueryPlanner,
    agent: Arc<dyn Agent>,
    combiner: ResultCombiner,
}

impl Orchestrator {
    /// Wire the pipeline over an existing provider, gateway and clock
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        gateway: Arc<dyn MarketDataGateway>,
        clock: Arc<dyn TimeSource>,
        config: &FinanceConfig,
    ) -> Result<Self> {
        config.validate()?;
        let prompts = Arc::new(Prompts::new()?);
        let settings = config.model_settings();

        let registry = Arc::new(finance_tools(gateway, Arc::clone(&clock)));
        let tool_summaries: Vec<String> = registry
            .list_tools()
            .iter()
            .map(|tool| format!("{}: {}", tool.name(), tool.description()))
            .collect();

        let executor = AgentExecutorBuilder::new()
            .provider(Arc::clone(&provider))
            .tool_registry(registry)
            .max_iterations(config.max_iterations)
            .model(settings.clone())
            .build()
            .map_err(|e| FinanceError::Config(e.to_string()))?;
        let agent = FinanceAgent::new(executor, Arc::clone(&prompts), clock);

        let planner = QueryPlanner::new(
            Arc::clone(&provider),
            settings.clone(),
            Arc::clone(&prompts),
            &tool_summaries,
            config.structured_attempts,
        )
        .map_err(|e| FinanceError::Config(e.to_string()))?;
        let combiner = ResultCombiner::new(provider, settings, prompts, config.structured_attempts)
            .map_err(|e| FinanceError::Config(e.to_string()))?;

        Ok(Self::from_parts(planner, Arc::new(agent), combiner))
    }

    /// Production wiring: OpenAI-compatible model, Vietcap data, wall clock
    pub fn from_config(config: &FinanceConfig) -> Result<Self> {
        let provider = OpenAICompatProvider::with_config(config.provider_config())
            .map_err(|e| FinanceError::Config(format!("language model client: {e}")))?;
        let gateway = VciGateway::new(config.vci_config())
            .map_err(|e| FinanceError::Config(format!("market data client: {e}")))?;
        info!(model = %config.model, api_base = %config.api_base, "Pipeline configured");
        Self::new(
            Arc::new(provider),
            Arc::new(gateway),
            Arc::new(SystemClock),
            config,
        )
    }

    pub fn from_parts(planner: QueryPlanner, agent: Arc<dyn Agent>, combiner: ResultCombiner) -> Self {
        Self {
            planner,
            agent,
            combiner,
        }
    }

    /// Answer one question
    pub async fn process_query(&self, query: &str) -> Result<QueryResponse> {
        let query = query.trim();
        if query.is_empty() {
            return Err(FinanceError::InvalidQuery("query is empty".to_string()));
        }

        let request_id = Uuid::new_v4();
        let span = info_span!("process_query", %request_id);
        self.run(query).instrument(span).await
    }

    async fn run(&self, query: &str) -> Result<QueryResponse> {
        let started = Instant::now();
        info!(query = %query, "Processing query");

        let classification = self
            .planner
            .classify(query)
            .await
            .map_err(|e| FinanceError::Planning(e.to_string()))?;

        let answer = if classification.is_complex {
            self.answer_complex(query).await?
        } else {
            self.answer_simple(query).await?
        };

        info!(
            is_complex = classification.is_complex,
            duration_ms = started.elapsed().as_millis() as u64,
            "Query answered"
        );
        Ok(QueryResponse {
            answer,
            is_complex: classification.is_complex,
            reasoning: classification.reasoning,
        })
    }

    async fn answer_simple(&self, query: &str) -> Result<String> {
        let reply = self
            .agent
            .invoke(query)
            .await
            .map_err(|e| FinanceError::Agent(e.to_string()))?;
        Ok(extract_answer(reply))
    }

    async fn answer_complex(&self, query: &str) -> Result<String> {
        let sub_queries = self
            .planner
            .decompose(query)
            .await
            .map_err(|e| FinanceError::Planning(e.to_string()))?;

        let mut answers = Vec::with_capacity(sub_queries.len());
        for (i, sub_query) in sub_queries.iter().enumerate() {
            info!(index = i + 1, total = sub_queries.len(), sub_query = %sub_query, "Answering sub-query");
            answers.push(self.answer_simple(sub_query).await?);
        }

        self.combiner
            .combine(query, &answers)
            .await
            .map_err(|e| FinanceError::Combiner(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        MockGateway, MockProvider, Recorded, clock, daily_series, scripted, text_response,
        tool_call_response,
    };
    use finagent_market::Series;
    use serde_json::json;

    fn orchestrator(provider: MockProvider, gateway: MockGateway) -> Orchestrator {
        let config = FinanceConfig::builder().api_key("test").build().unwrap();
        Orchestrator::new(Arc::new(provider), Arc::new(gateway), clock(), &config).unwrap()
    }

    fn request_count(seen: &Recorded) -> usize {
        seen.lock().unwrap().len()
    }

    #[tokio::test]
    async fn test_simple_price_question_renders_table() {
        let (provider, seen) = scripted(vec![
            text_response(r#"{"is_complex": false, "reasoning": "Chỉ cần công cụ view_ohlcv"}"#),
            tool_call_response(
                "view_ohlcv",
                json!({"symbols": ["VCB"], "start": "2025-03-03", "end": "2025-03-04"}),
            ),
        ]);
        let mut gateway = MockGateway::new();
        gateway
            .expect_fetch_bars()
            .withf(|symbol, _, _| symbol == "VCB")
            .times(1)
            .returning(|_, _, _| Ok(daily_series(&[90.0, 91.0])));

        let response = orchestrator(provider, gateway)
            .process_query("Giá cổ phiếu VCB hôm nay")
            .await
            .unwrap();

        assert!(!response.is_complex);
        assert_eq!(response.reasoning, "Chỉ cần công cụ view_ohlcv");
        assert!(response.answer.contains("2025-03-03 07:00:00"));
        assert!(response.answer.contains("VCB"));
        assert!(response.answer.contains("symbol"));
        // classify + one agent turn, decompose never called
        assert_eq!(request_count(&seen), 2);
    }

    #[tokio::test]
    async fn test_complex_question_is_decomposed_and_combined() {
        let (provider, seen) = scripted(vec![
            text_response(r#"{"is_complex": true, "reasoning": "Cùng một chỉ số với hai chu kỳ"}"#),
            text_response(
                r#"{"sub_queries": ["Tính SMA9 của VIC", "Tính SMA20 của VIC"], "reasoning": "hai cấu hình"}"#,
            ),
            text_response("SMA9 của VIC là 41.2"),
            text_response("SMA20 của VIC là 40.8"),
            text_response(
                r#"{"combined_answer": "SMA9 (41.2) đang nằm trên SMA20 (40.8).", "original_query": "So sánh SMA 9 và SMA 20 của VIC"}"#,
            ),
        ]);
        let gateway = MockGateway::new();

        let response = orchestrator(provider, gateway)
            .process_query("So sánh SMA 9 và SMA 20 của VIC")
            .await
            .unwrap();

        assert!(response.is_complex);
        assert!(!response.reasoning.is_empty());
        assert_eq!(response.answer, "SMA9 (41.2) đang nằm trên SMA20 (40.8).");

        let requests = seen.lock().unwrap();
        assert_eq!(requests.len(), 5);
        assert_eq!(requests[2].messages[0].text(), Some("Tính SMA9 của VIC"));
        assert_eq!(requests[3].messages[0].text(), Some("Tính SMA20 của VIC"));
        let combiner_prompt = requests[4].messages[0].text().unwrap();
        assert!(combiner_prompt.contains("Kết quả 1:\nSMA9 của VIC là 41.2"));
        assert!(combiner_prompt.contains("Kết quả 2:\nSMA20 của VIC là 40.8"));
    }

    #[tokio::test]
    async fn test_unsupported_interval_is_rejected_without_fetch() {
        let (provider, _seen) = scripted(vec![
            text_response(r#"{"is_complex": false, "reasoning": "Một công cụ"}"#),
            tool_call_response("view_ohlcv", json!({"symbols": ["VCB"], "interval": "2D"})),
        ]);
        let mut gateway = MockGateway::new();
        gateway.expect_fetch_bars().never();

        let response = orchestrator(provider, gateway)
            .process_query("Giá VCB khung 2 ngày")
            .await
            .unwrap();
        assert!(response.answer.starts_with("Khung thời gian không hợp lệ"));
        assert!(response.answer.contains("1D"));
    }

    #[tokio::test]
    async fn test_total_volume_is_narrated_per_symbol() {
        let (provider, seen) = scripted(vec![
            text_response(r#"{"is_complex": false, "reasoning": "Một công cụ cho nhiều mã"}"#),
            tool_call_response(
                "calculate_total_volume",
                json!({"symbols": ["VCB", "ZZZZ"], "start": "2025-03-01", "end": "2025-03-14"}),
            ),
            text_response("VCB: 3,000 cổ phiếu. Không có dữ liệu cho ZZZZ."),
        ]);
        let mut gateway = MockGateway::new();
        gateway
            .expect_fetch_bars()
            .withf(|symbol, _, _| symbol == "VCB")
            .returning(|_, _, _| Ok(daily_series(&[90.0, 91.0, 92.0])));
        gateway
            .expect_fetch_bars()
            .withf(|symbol, _, _| symbol == "ZZZZ")
            .returning(|_, _, _| Ok(Series::default()));

        let response = orchestrator(provider, gateway)
            .process_query("Tổng khối lượng giao dịch của VCB và ZZZZ")
            .await
            .unwrap();
        assert_eq!(response.answer, "VCB: 3,000 cổ phiếu. Không có dữ liệu cho ZZZZ.");

        let requests = seen.lock().unwrap();
        let tool_result = serde_json::to_string(&requests[2].messages[2]).unwrap();
        assert!(tool_result.contains("3000"));
        assert!(tool_result.contains("Không tìm thấy dữ liệu OHLCV cho mã ZZZZ"));
    }

    #[tokio::test]
    async fn test_empty_query_makes_no_model_call() {
        let mut provider = MockProvider::new();
        provider.expect_complete().never();

        let err = orchestrator(provider, MockGateway::new())
            .process_query("   ")
            .await
            .unwrap_err();
        assert!(matches!(err, FinanceError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn test_planning_failure_fails_request() {
        let (provider, seen) = scripted(vec![
            text_response("không biết"),
            text_response("vẫn không biết"),
            text_response("{}"),
        ]);

        let err = orchestrator(provider, MockGateway::new())
            .process_query("Giá VCB")
            .await
            .unwrap_err();
        assert!(matches!(err, FinanceError::Planning(_)));
        assert_eq!(request_count(&seen), 3);
    }

    #[test]
    fn test_client_construction_failure_is_reported_as_config() {
        let config = FinanceConfig::builder()
            .api_key("test")
            .api_base("")
            .build()
            .unwrap();
        let Err(err) = Orchestrator::from_config(&config) else {
            panic!("an empty api_base must be rejected");
        };
        assert!(matches!(err, FinanceError::Config(ref message) if message.starts_with("language model client:")));
    }

    #[tokio::test]
    async fn test_agent_failure_is_not_a_config_error() {
        let mut provider = MockProvider::new();
        let mut calls = 0;
        provider.expect_complete().returning(move |_| {
            calls += 1;
            if calls == 1 {
                Ok(text_response(r#"{"is_complex": false, "reasoning": "Một công cụ"}"#))
            } else {
                Err(finagent_llm::LLMError::RateLimitExceeded("quota".to_string()))
            }
        });

        let err = orchestrator(provider, MockGateway::new())
            .process_query("Giá VCB")
            .await
            .unwrap_err();
        assert!(matches!(err, FinanceError::Agent(ref message) if message.contains("quota")));
    }

    #[test]
    fn test_response_serialization() {
        let response = QueryResponse {
            answer: "ok".to_string(),
            is_complex: false,
            reasoning: "đơn giản".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"answer": "ok", "is_complex": false, "reasoning": "đơn giản"})
        );
    }
}
