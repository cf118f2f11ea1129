//! Price history tool

use super::records::{encode_records, select_columns};
use super::{BarRequest, SymbolResults, parse_params, symbols_schema, window_schema};
use async_trait::async_trait;
use finagent_core::Result;
use finagent_llm::tools::schema;
use finagent_market::{MarketDataGateway, TimeSource};
use finagent_tools::Tool;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct ViewOhlcvParams {
    symbols: Vec<String>,
    #[serde(default)]
    start: Option<String>,
    #[serde(default)]
    end: Option<String>,
    #[serde(default)]
    interval: Option<String>,
    #[serde(default)]
    columns: Option<Vec<String>>,
}

/// OHLCV bars for one or more symbols, returned without narration
pub struct ViewOhlcvTool {
    gateway: Arc<dyn MarketDataGateway>,
    clock: Arc<dyn TimeSource>,
}

impl ViewOhlcvTool {
    pub fn new(gateway: Arc<dyn MarketDataGateway>, clock: Arc<dyn TimeSource>) -> Self {
        Self { gateway, clock }
    }

    async fn run(&self, params: ViewOhlcvParams) -> Value {
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
        let columns = match select_columns(params.columns.as_deref()) {
            Ok(columns) => columns,
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
                Ok(series) => {
                    debug!(%symbol, bars = series.len(), "Encoding OHLCV records");
                    results.ok(symbol, Value::String(encode_records(&series, &columns, &[])));
                }
                Err(e) => {
                    results.err(symbol, format!("Lỗi khi lấy dữ liệu OHLCV cho mã {symbol}: {e}"));
                }
            }
        }
        results.into_value()
    }
}

#[async_trait]
impl Tool for ViewOhlcvTool {
    async fn execute(&self, params: Value) -> Result<Value> {
        let params: ViewOhlcvParams = parse_params(self.name(), params)?;
        Ok(self.run(params).await)
    }

    fn name(&self) -> &str {
        "view_ohlcv"
    }

    fn description(&self) -> &str {
        "Lấy dữ liệu OHLCV (giá mở cửa, cao nhất, thấp nhất, đóng cửa, khối lượng) của cổ phiếu \
         Việt Nam theo khung thời gian và khoảng ngày. Có thể chọn các cột cần lấy. Dùng khi cần \
         giá lịch sử, giá hiện tại hoặc khối lượng theo từng phiên."
    }

    fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        properties.insert("symbols".to_string(), symbols_schema());
        for (name, property) in window_schema() {
            properties.insert(name.to_string(), property);
        }
        properties.insert(
            "columns".to_string(),
            schema::array(
                "Các cột cần lấy; bỏ trống để lấy tất cả",
                json!({"type": "string", "enum": ["time", "open", "high", "low", "close", "volume"]}),
            ),
        );
        schema::object(Value::Object(properties), vec!["symbols"])
    }

    fn return_direct(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockGateway, clock, daily_series, date};
    use finagent_market::{Interval, MarketError, Series};
    use mockall::predicate::eq;

    #[tokio::test]
    async fn test_view_ohlcv_selected_columns() {
        let mut gateway = MockGateway::new();
        gateway
            .expect_fetch_bars()
            .withf(|symbol, range, interval| {
                symbol == "VCB"
                    && range.start() == date(2025, 3, 1)
                    && range.end() == date(2025, 3, 15)
                    && *interval == Interval::OneDay
            })
            .times(1)
            .returning(|_, _, _| Ok(daily_series(&[90.0, 91.5])));

        let tool = ViewOhlcvTool::new(Arc::new(gateway), clock());
        let output = tool
            .execute(json!({"symbols": ["vcb"], "start": "2025-03-01", "columns": ["close"]}))
            .await
            .unwrap();

        let records: Value = serde_json::from_str(output["VCB"].as_str().unwrap()).unwrap();
        assert_eq!(records.as_array().unwrap().len(), 2);
        assert_eq!(records[0], json!({"time": 1_740_960_000_000_i64, "close": 90.0}));
    }

    #[tokio::test]
    async fn test_invalid_interval_skips_fetch() {
        let mut gateway = MockGateway::new();
        gateway.expect_fetch_bars().never();

        let tool = ViewOhlcvTool::new(Arc::new(gateway), clock());
        let output = tool
            .execute(json!({"symbols": ["VCB"], "interval": "2D"}))
            .await
            .unwrap();
        assert_eq!(
            output,
            Value::String(
                "Khung thời gian không hợp lệ. Các khung thời gian có sẵn: 1m, 5m, 15m, 30m, 1H, 1D, 1W, 1M"
                    .to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_invalid_columns_skip_fetch() {
        let mut gateway = MockGateway::new();
        gateway.expect_fetch_bars().never();

        let tool = ViewOhlcvTool::new(Arc::new(gateway), clock());
        let output = tool
            .execute(json!({"symbols": ["VCB"], "columns": ["price"]}))
            .await
            .unwrap();
        assert!(output.as_str().unwrap().starts_with("Cột không hợp lệ: price."));
    }

    #[tokio::test]
    async fn test_symbols_are_isolated() {
        let mut gateway = MockGateway::new();
        gateway
            .expect_fetch_bars()
            .with(eq("VCB"), mockall::predicate::always(), eq(Interval::OneDay))
            .returning(|_, _, _| Ok(daily_series(&[90.0])));
        gateway
            .expect_fetch_bars()
            .with(eq("ZZZZ"), mockall::predicate::always(), eq(Interval::OneDay))
            .returning(|_, _, _| Ok(Series::default()));
        gateway
            .expect_fetch_bars()
            .with(eq("ERR"), mockall::predicate::always(), eq(Interval::OneDay))
            .returning(|_, _, _| Err(MarketError::Provider("503".to_string())));

        let tool = ViewOhlcvTool::new(Arc::new(gateway), clock());
        let output = tool
            .execute(json!({"symbols": ["VCB", "ZZZZ", "ERR"]}))
            .await
            .unwrap();

        assert!(output["VCB"].as_str().unwrap().starts_with('['));
        assert_eq!(
            output["ZZZZ"],
            "Không tìm thấy dữ liệu OHLCV cho mã ZZZZ từ 2025-02-13 đến 2025-03-15 với khung thời gian 1D"
        );
        assert_eq!(
            output["ERR"],
            "Lỗi khi lấy dữ liệu OHLCV cho mã ERR: Provider error: 503"
        );
    }

    #[tokio::test]
    async fn test_repeated_calls_are_identical() {
        let mut gateway = MockGateway::new();
        gateway
            .expect_fetch_bars()
            .withf(|symbol, _, _| symbol == "VCB")
            .times(2)
            .returning(|_, _, _| Ok(daily_series(&[90.0, 91.5, 92.0])));
        gateway
            .expect_fetch_bars()
            .withf(|symbol, _, _| symbol == "ZZZZ")
            .times(2)
            .returning(|_, _, _| Ok(Series::default()));

        let tool = ViewOhlcvTool::new(Arc::new(gateway), clock());
        let params = json!({
            "symbols": ["VCB", "ZZZZ"],
            "start": "2025-03-01",
            "end": "2025-03-14",
            "columns": ["close", "volume"]
        });
        let first = tool.execute(params.clone()).await.unwrap();
        let second = tool.execute(params).await.unwrap();

        let keys = |v: &Value| v.as_object().unwrap().keys().cloned().collect::<Vec<_>>();
        assert_eq!(keys(&first), vec!["VCB", "ZZZZ"]);
        assert_eq!(keys(&first), keys(&second));

        let decode = |v: &Value| serde_json::from_str::<Vec<Value>>(v["VCB"].as_str().unwrap()).unwrap();
        let (a, b) = (decode(&first), decode(&second));
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(keys(x), vec!["time", "close", "volume"]);
            assert_eq!(keys(x), keys(y));
        }
        assert_eq!(a, b);
        assert_eq!(first["ZZZZ"], second["ZZZZ"]);
    }

    #[tokio::test]
    async fn test_undecodable_params_are_errors() {
        let tool = ViewOhlcvTool::new(Arc::new(MockGateway::new()), clock());
        assert!(tool.execute(json!({"symbols": "VCB"})).await.is_err());
    }

    #[test]
    fn test_tool_metadata() {
        let tool = ViewOhlcvTool::new(Arc::new(MockGateway::new()), clock());
        assert_eq!(tool.name(), "view_ohlcv");
        assert!(tool.return_direct());
        let schema = tool.input_schema();
        assert_eq!(schema["required"], json!(["symbols"]));
        assert_eq!(schema["properties"]["interval"]["enum"][5], "1D");
    }
}
