//! Company reference data tools

use super::{SymbolResults, normalize_symbols, parse_params, symbols_schema};
use async_trait::async_trait;
use finagent_core::Result;
use finagent_llm::tools::schema;
use finagent_market::{CompanyFacet, MarketDataGateway};
use finagent_tools::Tool;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct CompanyParams {
    symbols: Vec<String>,
}

/// One tool per [`CompanyFacet`]: managers, shareholders or subsidiaries
///
/// Output is narrated by the model.
pub struct CompanyFacetTool {
    facet: CompanyFacet,
    gateway: Arc<dyn MarketDataGateway>,
}

impl CompanyFacetTool {
    pub fn new(facet: CompanyFacet, gateway: Arc<dyn MarketDataGateway>) -> Self {
        Self { facet, gateway }
    }

    pub fn facet(&self) -> CompanyFacet {
        self.facet
    }

    async fn run(&self, params: CompanyParams) -> Value {
        let symbols = match normalize_symbols(&params.symbols) {
            Ok(symbols) => symbols,
            Err(message) => return Value::String(message),
        };
        let label = self.facet.label_vi();

        let mut results = SymbolResults::new();
        for symbol in &symbols {
            match self.gateway.fetch_company_facet(symbol, self.facet).await {
                Ok(records) if records.is_empty() => {
                    results.err(symbol, format!("Không tìm thấy thông tin {label} cho mã {symbol}"));
                }
                Ok(records) => {
                    results.ok(symbol, Value::String(Value::Array(records).to_string()));
                }
                Err(e) => {
                    results.err(
                        symbol,
                        format!("Lỗi khi lấy thông tin {label} cho mã {symbol}: {e}"),
                    );
                }
            }
        }
        results.into_value()
    }
}

#[async_trait]
impl Tool for CompanyFacetTool {
    async fn execute(&self, params: Value) -> Result<Value> {
        let params: CompanyParams = parse_params(self.name(), params)?;
        Ok(self.run(params).await)
    }

    fn name(&self) -> &str {
        match self.facet {
            CompanyFacet::Management => "view_management",
            CompanyFacet::Shareholders => "view_shareholders",
            CompanyFacet::Subsidiaries => "view_subsidiaries",
        }
    }

    fn description(&self) -> &str {
        match self.facet {
            CompanyFacet::Management => {
                "Lấy danh sách ban lãnh đạo đang làm việc (họ tên, chức vụ, tỷ lệ sở hữu) của các \
                 công ty niêm yết Việt Nam."
            }
            CompanyFacet::Shareholders => {
                "Lấy danh sách cổ đông lớn và cơ cấu sở hữu của các công ty niêm yết Việt Nam."
            }
            CompanyFacet::Subsidiaries => {
                "Lấy danh sách công ty con và công ty liên kết của các công ty niêm yết Việt Nam."
            }
        }
    }

    fn input_schema(&self) -> Value {
        schema::object(json!({ "symbols": symbols_schema() }), vec!["symbols"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockGateway;
    use finagent_market::MarketError;

    #[tokio::test]
    async fn test_management_records_and_missing_symbol() {
        let mut gateway = MockGateway::new();
        gateway
            .expect_fetch_company_facet()
            .withf(|symbol, facet| symbol == "VCB" && *facet == CompanyFacet::Management)
            .returning(|_, _| {
                Ok(vec![json!({"full_name": "Nguyễn Văn A", "position": "Tổng giám đốc"})])
            });
        gateway
            .expect_fetch_company_facet()
            .withf(|symbol, _| symbol == "ZZZZ")
            .returning(|_, _| Ok(Vec::new()));

        let tool = CompanyFacetTool::new(CompanyFacet::Management, Arc::new(gateway));
        let output = tool.execute(json!({"symbols": ["VCB", "ZZZZ"]})).await.unwrap();

        let records: Value = serde_json::from_str(output["VCB"].as_str().unwrap()).unwrap();
        assert_eq!(records[0]["position"], "Tổng giám đốc");
        assert_eq!(
            output["ZZZZ"],
            "Không tìm thấy thông tin ban lãnh đạo cho mã ZZZZ"
        );
    }

    #[tokio::test]
    async fn test_provider_failure_is_per_symbol() {
        let mut gateway = MockGateway::new();
        gateway
            .expect_fetch_company_facet()
            .returning(|_, _| Err(MarketError::InvalidResponse("bad json".to_string())));

        let tool = CompanyFacetTool::new(CompanyFacet::Subsidiaries, Arc::new(gateway));
        let output = tool.execute(json!({"symbols": ["VIC"]})).await.unwrap();
        assert_eq!(
            output["VIC"],
            "Lỗi khi lấy thông tin công ty con cho mã VIC: Invalid response: bad json"
        );
    }

    #[test]
    fn test_tool_metadata() {
        let gateway: Arc<dyn MarketDataGateway> = Arc::new(MockGateway::new());
        let names: Vec<String> = [
            CompanyFacet::Management,
            CompanyFacet::Shareholders,
            CompanyFacet::Subsidiaries,
        ]
        .into_iter()
        .map(|facet| CompanyFacetTool::new(facet, Arc::clone(&gateway)).name().to_string())
        .collect();
        assert_eq!(names, vec!["view_management", "view_shareholders", "view_subsidiaries"]);

        let tool = CompanyFacetTool::new(CompanyFacet::Shareholders, gateway);
        assert!(!tool.return_direct());
        assert_eq!(tool.facet(), CompanyFacet::Shareholders);
    }
}
