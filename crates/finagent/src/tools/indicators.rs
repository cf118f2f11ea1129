//! Moving-average and relative-strength tools
//!
//! Both return the full OHLCV records with one extra column per indicator
//! (`SMA_{p}`, `RSI_{p}`) and go straight back to the caller.

use super::records::{Column, IndicatorColumn, encode_records};
use super::{
    BarRequest, SymbolResults, missing_column_message, parse_params, symbols_schema,
    window_schema,
};
use async_trait::async_trait;
use finagent_core::Result;
use finagent_llm::tools::schema;
use finagent_market::{MarketDataGateway, Series, TimeSource, indicators};
use finagent_tools::Tool;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;

const DEFAULT_SMA_PERIOD: i64 = 20;
const DEFAULT_RSI_PERIOD: i64 = 14;

/// How a period may arrive from the model
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum PeriodRepr {
    Int(i64),
    Float(f64),
    Text(String),
}

/// An integral period; `20`, `20.0` and `"20"` all decode to 20
///
/// The sign is checked later so a negative value gets the Vietnamese message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "PeriodRepr")]
struct Period(i64);

impl TryFrom<PeriodRepr> for Period {
    type Error = String;

    fn try_from(repr: PeriodRepr) -> std::result::Result<Self, Self::Error> {
        let integral = |value: f64| {
            (value.is_finite() && value.fract().abs() < f64::EPSILON)
                .then(|| Period(value as i64))
                .ok_or_else(|| format!("period must be an integer, got {value}"))
        };
        match repr {
            PeriodRepr::Int(p) => Ok(Period(p)),
            PeriodRepr::Float(value) => integral(value),
            PeriodRepr::Text(raw) => {
                let raw = raw.trim();
                match raw.parse::<i64>() {
                    Ok(p) => Ok(Period(p)),
                    Err(_) => raw
                        .parse::<f64>()
                        .map_err(|_| format!("period must be an integer, got '{raw}'"))
                        .and_then(integral),
                }
            }
        }
    }
}

/// A single period or a list of them
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Periods {
    One(Period),
    Many(Vec<Period>),
}

impl Periods {
    fn into_vec(self) -> Vec<i64> {
        match self {
            Periods::One(p) => vec![p.0],
            Periods::Many(ps) if ps.is_empty() => vec![DEFAULT_SMA_PERIOD],
            Periods::Many(ps) => ps.into_iter().map(|p| p.0).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SmaParams {
    symbols: Vec<String>,
    #[serde(default)]
    start: Option<String>,
    #[serde(default)]
    end: Option<String>,
    #[serde(default)]
    interval: Option<String>,
    #[serde(default)]
    period: Option<Periods>,
}

#[derive(Debug, Deserialize)]
struct RsiParams {
    symbols: Vec<String>,
    #[serde(default)]
    start: Option<String>,
    #[serde(default)]
    end: Option<String>,
    #[serde(default)]
    interval: Option<String>,
    #[serde(default)]
    period: Option<Period>,
}

/// Reject the whole call on the first non-positive period
fn validate_periods(indicator: &str, periods: &[i64]) -> std::result::Result<Vec<usize>, String> {
    periods
        .iter()
        .map(|&p| {
            usize::try_from(p)
                .ok()
                .filter(|p| *p > 0)
                .ok_or_else(|| format!("Chu kỳ {indicator} phải là số dương. Giá trị nhận được: {p}"))
        })
        .collect()
}

/// Closes of a series, or `None` when any of them is unusable
fn usable_closes(series: &Series) -> Option<Vec<f64>> {
    let closes = series.closes();
    closes.iter().all(|c| c.is_finite()).then_some(closes)
}

/// Fetch, compute and encode one indicator family for every symbol
async fn run_indicator(
    gateway: &dyn MarketDataGateway,
    request: &BarRequest,
    indicator: &str,
    periods: &[usize],
    compute: fn(&[f64], usize) -> finagent_market::Result<Vec<Option<f64>>>,
) -> Value {
    let mut results = SymbolResults::new();
    for symbol in &request.symbols {
        let series = match gateway
            .fetch_bars(symbol, &request.range, request.interval)
            .await
        {
            Ok(series) if series.is_empty() => {
                results.err(symbol, request.no_data_message(symbol));
                continue;
            }
            Ok(series) => series,
            Err(e) => {
                results.err(symbol, format!("Lỗi khi tính toán {indicator} cho mã {symbol}: {e}"));
                continue;
            }
        };

        let Some(closes) = usable_closes(&series) else {
            results.err(symbol, missing_column_message("close", symbol));
            continue;
        };

        let columns: std::result::Result<Vec<IndicatorColumn>, _> = periods
            .iter()
            .map(|&p| {
                compute(&closes, p).map(|values| IndicatorColumn {
                    name: format!("{indicator}_{p}"),
                    values,
                })
            })
            .collect();

        match columns {
            Ok(columns) => results.ok(
                symbol,
                Value::String(encode_records(&series, &Column::ALL, &columns)),
            ),
            Err(e) => {
                results.err(symbol, format!("Lỗi khi tính toán {indicator} cho mã {symbol}: {e}"));
            }
        }
    }
    results.into_value()
}

fn indicator_schema(period: Value) -> Value {
    let mut properties = Map::new();
    properties.insert("symbols".to_string(), symbols_schema());
    for (name, property) in window_schema() {
        properties.insert(name.to_string(), property);
    }
    properties.insert("period".to_string(), period);
    schema::object(Value::Object(properties), vec!["symbols"])
}

/// Simple moving average over one or more periods
pub struct SmaTool {
    gateway: Arc<dyn MarketDataGateway>,
    clock: Arc<dyn TimeSource>,
}

impl SmaTool {
    pub fn new(gateway: Arc<dyn MarketDataGateway>, clock: Arc<dyn TimeSource>) -> Self {
        Self { gateway, clock }
    }

    async fn run(&self, params: SmaParams) -> Value {
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
        let periods = params
            .period
            .map_or_else(|| vec![DEFAULT_SMA_PERIOD], Periods::into_vec);
        let periods = match validate_periods("SMA", &periods) {
            Ok(periods) => periods,
            Err(message) => return Value::String(message),
        };

        run_indicator(
            self.gateway.as_ref(),
            &request,
            "SMA",
            &periods,
            indicators::sma,
        )
        .await
    }
}

#[async_trait]
impl Tool for SmaTool {
    async fn execute(&self, params: Value) -> Result<Value> {
        let params: SmaParams = parse_params(self.name(), params)?;
        Ok(self.run(params).await)
    }

    fn name(&self) -> &str {
        "calculate_sma"
    }

    fn description(&self) -> &str {
        "Tính đường trung bình động đơn giản (SMA) cho các cổ phiếu Việt Nam. Trả về dữ liệu \
         OHLCV kèm cột SMA_{chu kỳ} cho từng mã. Có thể tính nhiều chu kỳ cùng lúc."
    }

    fn input_schema(&self) -> Value {
        indicator_schema(json!({
            "description": "Chu kỳ SMA, ví dụ 20 hoặc [9, 20]; mặc định 20",
            "anyOf": [
                {"type": "integer"},
                {"type": "array", "items": {"type": "integer"}}
            ]
        }))
    }

    fn return_direct(&self) -> bool {
        true
    }
}

/// Relative strength index over one period
pub struct RsiTool {
    gateway: Arc<dyn MarketDataGateway>,
    clock: Arc<dyn TimeSource>,
}

impl RsiTool {
    pub fn new(gateway: Arc<dyn MarketDataGateway>, clock: Arc<dyn TimeSource>) -> Self {
        Self { gateway, clock }
    }

    async fn run(&self, params: RsiParams) -> Value {
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
        let period = params.period.map_or(DEFAULT_RSI_PERIOD, |p| p.0);
        let periods = match validate_periods("RSI", &[period]) {
            Ok(periods) => periods,
            Err(message) => return Value::String(message),
        };

        run_indicator(
            self.gateway.as_ref(),
            &request,
            "RSI",
            &periods,
            indicators::rsi,
        )
        .await
    }
}

#[async_trait]
impl Tool for RsiTool {
    async fn execute(&self, params: Value) -> Result<Value> {
        let params: RsiParams = parse_params(self.name(), params)?;
        Ok(self.run(params).await)
    }

    fn name(&self) -> &str {
        "calculate_rsi"
    }

    fn description(&self) -> &str {
        "Tính chỉ số sức mạnh tương đối (RSI) cho các cổ phiếu Việt Nam. Trả về dữ liệu OHLCV \
         kèm cột RSI_{chu kỳ} cho từng mã."
    }

    fn input_schema(&self) -> Value {
        indicator_schema(schema::integer("Chu kỳ RSI, mặc định 14"))
    }

    fn return_direct(&self) -> bool {
        true
    }
}
