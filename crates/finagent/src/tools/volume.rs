//! Total traded volume tool

use super::{BarRequest, SymbolResults, parse_params, symbols_schema, window_schema};
use async_trait::async_trait;
use finagent_core::Result;
use finagent_llm::tools::schema;
use finagent_market::{MarketDataGateway, TimeSource};
use finagent_tools::Tool;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct TotalVolumeParams {
    symbols: Vec<String>,
    #[serde(default)]
    start: Option<String>,
    #[serde(default)]
    end: Option<String>,
    #[serde(default)]
    interval: Option<String>,
}

/// Sum of bar volumes per symbol over a window
pub struct TotalVolumeTool {
    gateway: Arc<dyn MarketDataGateway>,
    clock: Arc<dyn TimeSource>,
}

impl TotalVolumeTool {
    pub fn new(gateway: Arc<dyn MarketDataGateway>, clock: Arc<dyn TimeSource>) -> Self {
        Self { gateway, clock }
    }

    async fn run(&self, params: TotalVolumeParams) -> Value {
        let request = match BarRequest::resolve(
            &params.symbols,
            params.start.as_deref(),
            params.end.as_deref(),
            params.interval.as_deref(),
            self.clock.as_ref(),
        ) {
            Ok(request) => request,
            Err(message) => return Value::String(message),
        };

        let mut results = SymbolResults::new();
        for symbol in &request.symbols {
            match self
                .gateway
                .fetch_bars(symbol, &request.range, request.interval)
                .await
            {
                Ok(series) if series.is_empty() => {
                    results.err(symbol, request.no_data_message(symbol));
                }
                Ok(series) => results.ok(symbol, Value::from(series.total_volume())),
                Err(e) => {
                    results.err(symbol, format!("Lỗi khi tính tổng khối lượng cho mã {symbol}: {e}"));
                }
            }
        }
        results.into_value()
    }
}

#[async_trait]
impl Tool for TotalVolumeTool {
    async fn execute(&self, params: Value) -> Result<Value> {
        let params: TotalVolumeParams = parse_params(self.name(), params)?;
        Ok(self.run(params).await)
    }

    fn name(&self) -> &str {
        "calculate_total_volume"
    }

    fn description(&self) -> &str {
        "Tính tổng khối lượng giao dịch của các cổ phiếu Việt Nam trong khoảng thời gian chỉ \
         định. Trả về tổng khối lượng cho từng mã."
    }

    fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        properties.insert("symbols".to_string(), symbols_schema());
        for (name, property) in window_schema() {
            properties.insert(name.to_string(), property);
        }
        schema::object(Value::Object(properties), vec!["symbols"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockGateway, clock, daily_series};
    use finagent_market::Series;
    use serde_json::json;

    #[tokio::test]
    async fn test_total_volume_with_missing_symbol() {
        let mut gateway = MockGateway::new();
        gateway
            .expect_fetch_bars()
            .withf(|symbol, _, _| symbol == "VCB")
            .returning(|_, _, _| Ok(daily_series(&[90.0, 91.0, 92.0])));
        gateway
            .expect_fetch_bars()
            .withf(|symbol, _, _| symbol == "ZZZZ")
            .returning(|_, _, _| Ok(Series::default()));

        let tool = TotalVolumeTool::new(Arc::new(gateway), clock());
        let output = tool
            .execute(json!({"symbols": ["VCB", "ZZZZ"], "start": "2025-03-01", "end": "2025-03-14"}))
            .await
            .unwrap();

        assert_eq!(output["VCB"], json!(3000));
        assert!(output["VCB"].is_u64());
        assert_eq!(
            output["ZZZZ"],
            "Không tìm thấy dữ liệu OHLCV cho mã ZZZZ từ 2025-03-01 đến 2025-03-14 với khung thời gian 1D"
        );
    }

    #[tokio::test]
    async fn test_inverted_range_skips_fetch() {
        let mut gateway = MockGateway::new();
        gateway.expect_fetch_bars().never();

        let tool = TotalVolumeTool::new(Arc::new(gateway), clock());
        let output = tool
            .execute(json!({"symbols": ["VCB"], "start": "2025-03-14", "end": "2025-03-01"}))
            .await
            .unwrap();
        assert!(output.is_string());
    }

    #[test]
    fn test_tool_metadata() {
        let tool = TotalVolumeTool::new(Arc::new(MockGateway::new()), clock());
        assert_eq!(tool.name(), "calculate_total_volume");
        assert!(!tool.return_direct());
    }
}
