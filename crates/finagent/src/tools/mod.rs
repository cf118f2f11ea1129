//! Market tools callable by the reasoning agent
//!
//! Every tool follows the same shape:
//! 1. validate the structural inputs; a failure short-circuits the whole
//!    call with one Vietnamese message and no fetch
//! 2. walk the symbols in order, each one independently
//! 3. hand back a [`SymbolResults`] map of payloads and per-symbol messages

pub mod company;
pub mod indicators;
pub mod ohlcv;
pub mod records;
pub mod volume;

pub use company::CompanyFacetTool;
pub use indicators::{RsiTool, SmaTool};
pub use ohlcv::ViewOhlcvTool;
pub use records::Column;
pub use volume::TotalVolumeTool;

use chrono::NaiveDate;
use finagent_core::{Error, Result};
use finagent_market::{CompanyFacet, DateRange, Interval, MarketDataGateway, TimeSource};
use finagent_tools::ToolRegistry;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Interval used when the caller gives none
pub const DEFAULT_INTERVAL: Interval = Interval::OneDay;

/// Register the seven market tools
pub fn finance_tools(
    gateway: Arc<dyn MarketDataGateway>,
    clock: Arc<dyn TimeSource>,
) -> ToolRegistry {
    let registry = ToolRegistry::new();
    registry.register(Arc::new(ViewOhlcvTool::new(
        Arc::clone(&gateway),
        Arc::clone(&clock),
    )));
    for facet in [
        CompanyFacet::Management,
        CompanyFacet::Shareholders,
        CompanyFacet::Subsidiaries,
    ] {
        registry.register(Arc::new(CompanyFacetTool::new(facet, Arc::clone(&gateway))));
    }
    registry.register(Arc::new(TotalVolumeTool::new(
        Arc::clone(&gateway),
        Arc::clone(&clock),
    )));
    registry.register(Arc::new(SmaTool::new(Arc::clone(&gateway), Arc::clone(&clock))));
    registry.register(Arc::new(RsiTool::new(gateway, clock)));
    registry
}

/// Per-symbol outcomes, in input order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolResults {
    entries: Vec<(String, std::result::Result<Value, String>)>,
}

impl SymbolResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ok(&mut self, symbol: &str, payload: Value) {
        self.entries.push((symbol.to_string(), Ok(payload)));
    }

    pub fn err(&mut self, symbol: &str, message: impl Into<String>) {
        self.entries.push((symbol.to_string(), Err(message.into())));
    }

    pub fn get(&self, symbol: &str) -> Option<&std::result::Result<Value, String>> {
        self.entries
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, result)| result)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `{symbol: payload | message}`; a repeated symbol keeps its last outcome
    pub fn into_value(self) -> Value {
        let map: Map<String, Value> = self
            .entries
            .into_iter()
            .map(|(symbol, result)| (symbol, result.unwrap_or_else(Value::String)))
            .collect();
        Value::Object(map)
    }
}

/// Decode tool arguments; only undecodable input is an `Err`
pub(crate) fn parse_params<T: DeserializeOwned>(tool: &str, params: Value) -> Result<T> {
    serde_json::from_value(params)
        .map_err(|e| Error::ProcessingFailed(format!("{tool}: invalid parameters: {e}")))
}

/// Trimmed, uppercased, non-empty symbols in input order
pub(crate) fn normalize_symbols(symbols: &[String]) -> std::result::Result<Vec<String>, String> {
    let symbols: Vec<String> = symbols
        .iter()
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect();
    if symbols.is_empty() {
        return Err("Cần cung cấp ít nhất một mã cổ phiếu.".to_string());
    }
    Ok(symbols)
}

pub(crate) fn parse_interval(raw: Option<&str>) -> std::result::Result<Interval, String> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(DEFAULT_INTERVAL),
        Some(code) => code.parse().map_err(|_| {
            format!(
                "Khung thời gian không hợp lệ. Các khung thời gian có sẵn: {}",
                Interval::codes()
            )
        }),
    }
}

fn parse_date(raw: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| format!("Ngày không hợp lệ: {raw}. Định dạng yêu cầu: YYYY-MM-DD"))
}

/// Resolve optional dates against the default window ending today
pub(crate) fn resolve_range(
    start: Option<&str>,
    end: Option<&str>,
    clock: &dyn TimeSource,
) -> std::result::Result<DateRange, String> {
    let default = DateRange::default_from(clock);
    fn present(raw: Option<&str>) -> Option<&str> {
        raw.filter(|s| !s.trim().is_empty())
    }
    let start = present(start).map_or(Ok(default.start()), parse_date)?;
    let end = present(end).map_or(Ok(default.end()), parse_date)?;
    DateRange::new(start, end)
        .map_err(|_| format!("Ngày bắt đầu {start} phải trước hoặc bằng ngày kết thúc {end}"))
}

/// Window and sampling shared by every bar-based tool
#[derive(Debug, Clone)]
pub(crate) struct BarRequest {
    pub symbols: Vec<String>,
    pub range: DateRange,
    pub interval: Interval,
}

impl BarRequest {
    /// Validate the common fields; the interval is checked first
    pub fn resolve(
        symbols: &[String],
        start: Option<&str>,
        end: Option<&str>,
        interval: Option<&str>,
        clock: &dyn TimeSource,
    ) -> std::result::Result<Self, String> {
        let interval = parse_interval(interval)?;
        let range = resolve_range(start, end, clock)?;
        let symbols = normalize_symbols(symbols)?;
        Ok(Self {
            symbols,
            range,
            interval,
        })
    }

    pub fn no_data_message(&self, symbol: &str) -> String {
        format!(
            "Không tìm thấy dữ liệu OHLCV cho mã {symbol} từ {} đến {} với khung thời gian {}",
            self.range.start(),
            self.range.end(),
            self.interval
        )
    }
}

pub(crate) fn missing_column_message(column: &str, symbol: &str) -> String {
    format!("Không tìm thấy cột '{column}' trong dữ liệu cho mã {symbol}")
}

pub(crate) fn symbols_schema() -> Value {
    finagent_llm::tools::schema::array(
        "Danh sách mã cổ phiếu Việt Nam (ví dụ: [\"VIC\", \"VCB\", \"FPT\"])",
        serde_json::json!({"type": "string"}),
    )
}

pub(crate) fn window_schema() -> [(&'static str, Value); 3] {
    use finagent_llm::tools::schema;
    [
        (
            "start",
            schema::string("Ngày bắt đầu (YYYY-MM-DD), mặc định 30 ngày trước"),
        ),
        ("end", schema::string("Ngày kết thúc (YYYY-MM-DD), mặc định hôm nay")),
        (
            "interval",
            schema::string_enum(
                "Khung thời gian, mặc định 1D",
                &Interval::ALL.map(Interval::as_str),
            ),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use finagent_market::FixedClock;

    fn clock() -> FixedClock {
        FixedClock::on(NaiveDate::from_ymd_opt(2025, 3, 15).unwrap())
    }

    #[test]
    fn test_registry_has_seven_tools() {
        let gateway = Arc::new(crate::testing::MockGateway::new());
        let registry = finance_tools(gateway, Arc::new(clock()));
        let names: Vec<String> = registry
            .list_tools()
            .iter()
            .map(|t| t.name().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "calculate_rsi",
                "calculate_sma",
                "calculate_total_volume",
                "view_management",
                "view_ohlcv",
                "view_shareholders",
                "view_subsidiaries",
            ]
        );

        let direct: Vec<bool> = registry
            .list_tools()
            .iter()
            .map(|t| t.return_direct())
            .collect();
        assert_eq!(direct, vec![true, true, false, false, true, false, false]);
    }

    #[test]
    fn test_symbol_results_keep_order() {
        let mut results = SymbolResults::new();
        results.ok("VCB", Value::from(10));
        results.err("ZZZZ", "không có dữ liệu");
        let value = results.into_value();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["VCB", "ZZZZ"]);
        assert_eq!(value["ZZZZ"], "không có dữ liệu");
    }

    #[test]
    fn test_interval_validation_message() {
        assert_eq!(parse_interval(None).unwrap(), Interval::OneDay);
        assert_eq!(parse_interval(Some("1W")).unwrap(), Interval::OneWeek);
        assert_eq!(
            parse_interval(Some("2D")).unwrap_err(),
            "Khung thời gian không hợp lệ. Các khung thời gian có sẵn: 1m, 5m, 15m, 30m, 1H, 1D, 1W, 1M"
        );
    }

    #[test]
    fn test_range_defaults_and_validation() {
        let range = resolve_range(None, None, &clock()).unwrap();
        assert_eq!(range.start(), NaiveDate::from_ymd_opt(2025, 2, 13).unwrap());
        assert_eq!(range.end(), NaiveDate::from_ymd_opt(2025, 3, 15).unwrap());

        let range = resolve_range(Some("2025-01-02"), Some(""), &clock()).unwrap();
        assert_eq!(range.start(), NaiveDate::from_ymd_opt(2025, 1, 2).unwrap());

        assert!(resolve_range(Some("02/01/2025"), None, &clock()).is_err());
        assert!(resolve_range(Some("2025-03-10"), Some("2025-03-01"), &clock()).is_err());
    }

    #[test]
    fn test_symbols_are_normalized() {
        let symbols = normalize_symbols(&[" vcb ".to_string(), String::new(), "Fpt".to_string()]);
        assert_eq!(symbols.unwrap(), vec!["VCB", "FPT"]);
        assert!(normalize_symbols(&[]).is_err());
    }
}
