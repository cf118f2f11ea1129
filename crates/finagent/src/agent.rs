//! The reasoning agent over the market tools

use crate::prompts::Prompts;
use async_trait::async_trait;
use finagent_core::{Agent, AgentReply, Error, Result};
use finagent_market::TimeSource;
use finagent_runtime::AgentExecutor;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Tool-calling agent answering one simple question at a time
///
/// The system prompt is rendered on every call so "today" is always read
/// from the clock, never cached.
pub struct FinanceAgent {
    executor: AgentExecutor,
    prompts: Arc<Prompts>,
    clock: Arc<dyn TimeSource>,
}

impl FinanceAgent {
    pub fn new(executor: AgentExecutor, prompts: Arc<Prompts>, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            executor,
            prompts,
            clock,
        }
    }
}

#[async_trait]
impl Agent for FinanceAgent {
    #[instrument(skip(self), fields(agent = "finance"))]
    async fn invoke(&self, query: &str) -> Result<AgentReply> {
        let today = self.clock.today();
        let system_prompt = self
            .prompts
            .agent_system(today)
            .map_err(|e| Error::ProcessingFailed(e.to_string()))?;
        debug!(%today, "Rendered agent prompt");

        self.executor.run(&system_prompt, query).await
    }

    fn name(&self) -> &str {
        "finance_agent"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockGateway, clock, daily_series, scripted, text_response, tool_call_response};
    use crate::tools::finance_tools;
    use finagent_runtime::AgentExecutorBuilder;
    use serde_json::json;

    fn agent(provider: crate::testing::MockProvider, gateway: MockGateway) -> FinanceAgent {
        let registry = finance_tools(Arc::new(gateway), clock());
        let executor = AgentExecutorBuilder::new()
            .provider(Arc::new(provider))
            .tool_registry(Arc::new(registry))
            .build()
            .unwrap();
        FinanceAgent::new(executor, Arc::new(Prompts::new().unwrap()), clock())
    }

    #[tokio::test]
    async fn test_direct_tool_returns_raw_payload() {
        let (provider, seen) = scripted(vec![tool_call_response(
            "view_ohlcv",
            json!({"symbols": ["VCB"], "start": "2025-03-14", "end": "2025-03-14"}),
        )]);
        let mut gateway = MockGateway::new();
        gateway
            .expect_fetch_bars()
            .times(1)
            .returning(|_, _, _| Ok(daily_series(&[90.0])));

        let reply = agent(provider, gateway).invoke("Giá cổ phiếu VCB hôm nay").await.unwrap();
        assert!(reply.is_raw());

        let requests = seen.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let system = requests[0].system.as_deref().unwrap();
        assert!(system.contains("Hôm nay là ngày 2025-03-15"));
        assert_eq!(requests[0].tools.as_ref().unwrap().len(), 7);
    }

    #[tokio::test]
    async fn test_narrated_tool_goes_back_to_model() {
        let (provider, seen) = scripted(vec![
            tool_call_response("calculate_total_volume", json!({"symbols": ["VCB"]})),
            text_response("Tổng khối lượng của VCB là 2,000 cổ phiếu."),
        ]);
        let mut gateway = MockGateway::new();
        gateway
            .expect_fetch_bars()
            .returning(|_, _, _| Ok(daily_series(&[90.0, 91.0])));

        let reply = agent(provider, gateway)
            .invoke("Tổng khối lượng giao dịch của VCB")
            .await
            .unwrap();
        assert_eq!(
            reply.as_text(),
            Some("Tổng khối lượng của VCB là 2,000 cổ phiếu.")
        );
        // second call carries the tool result
        assert_eq!(seen.lock().unwrap()[1].messages.len(), 3);
    }
}
