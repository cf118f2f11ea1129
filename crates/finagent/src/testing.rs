//! Test doubles shared by the pipeline tests

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use finagent_llm::CompletionResponse;
use finagent_market::{Bar, CompanyFacet, DateRange, FixedClock, Interval, MarketDataGateway, Series};
use mockall::mock;
use serde_json::Value;
use std::sync::Arc;

pub use finagent_runtime::testing::{MockProvider, Recorded, scripted, text_response};

mock! {
    pub Gateway {}

    #[async_trait]
    impl MarketDataGateway for Gateway {
        async fn fetch_bars(
            &self,
            symbol: &str,
            range: &DateRange,
            interval: Interval,
        ) -> finagent_market::Result<Series>;

        async fn fetch_company_facet(
            &self,
            symbol: &str,
            facet: CompanyFacet,
        ) -> finagent_market::Result<Vec<Value>>;
    }
}

/// One tool call with id `call_{name}`
pub fn tool_call_response(name: &str, input: Value) -> CompletionResponse {
    let id = format!("call_{name}");
    finagent_runtime::testing::tool_call_response(&[(id.as_str(), name, input)])
}

/// Clock stopped on 2025-03-15, a Saturday
pub fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::on(date(2025, 3, 15)))
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

/// Daily bars from 2025-03-03 with the given closes and volume 1000 each
pub fn daily_series(closes: &[f64]) -> Series {
    let start = day(2025, 3, 3);
    Series::new(
        closes
            .iter()
            .enumerate()
            .map(|(i, close)| Bar {
                time: start + chrono::Duration::days(i as i64),
                open: *close,
                high: close + 0.5,
                low: close - 0.5,
                close: *close,
                volume: 1000,
            })
            .collect(),
    )
}
