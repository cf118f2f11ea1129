//! Vietcap (VCI) market data gateway
//!
//! Bars come from the public gap-chart endpoint; company facets from the
//! GraphQL endpoint behind trading.vietcap.com.vn. Intervals the chart API
//! does not serve natively (5m, 15m, 30m, 1W, 1M) are rebuilt locally from
//! finer bars.

use crate::clock::vn_offset;
use crate::error::{MarketError, Result};
use crate::gateway::MarketDataGateway;
use crate::model::{Bar, CompanyFacet, DateRange, Interval, Series, local_instant};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Days, Utc, Weekday};
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, instrument};

/// Default Vietcap trading host
pub const DEFAULT_BASE_URL: &str = "https://trading.vietcap.com.vn";

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Connection settings for [`VciGateway`]
#[derive(Debug, Clone)]
pub struct VciConfig {
    /// Host serving both the chart API and GraphQL
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for VciConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl VciConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn chart_url(&self) -> String {
        format!("{}/api/chart/OHLCChart/gap-chart", self.base_url.trim_end_matches('/'))
    }

    fn graphql_url(&self) -> String {
        format!("{}/data-mt/graphql", self.base_url.trim_end_matches('/'))
    }
}

/// [`MarketDataGateway`] backed by Vietcap
pub struct VciGateway {
    client: reqwest::Client,
    config: VciConfig,
}

impl VciGateway {
    pub fn new(config: VciConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("vi-VN,vi;q=0.9,en-US;q=0.8,en;q=0.7"),
        );
        headers.insert(
            header::REFERER,
            HeaderValue::from_static("https://trading.vietcap.com.vn/"),
        );
        headers.insert(
            header::ORIGIN,
            HeaderValue::from_static("https://trading.vietcap.com.vn"),
        );

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &VciConfig {
        &self.config
    }

    async fn post(&self, url: &str, payload: &Value) -> Result<Value> {
        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl MarketDataGateway for VciGateway {
    #[instrument(skip(self), fields(provider = "vci"))]
    async fn fetch_bars(
        &self,
        symbol: &str,
        range: &DateRange,
        interval: Interval,
    ) -> Result<Series> {
        let payload = json!({
            "timeFrame": time_frame(interval),
            "symbols": [symbol],
            "to": range.end_instant().timestamp(),
            "countBack": count_back(range, interval),
        });
        debug!(%payload, "Requesting chart");

        let body = self.post(&self.config.chart_url(), &payload).await?;
        let bars: Vec<Bar> = parse_chart(&body)?
            .into_iter()
            .filter(|bar| range.contains(bar.time))
            .collect();
        debug!(count = bars.len(), "Bars inside range");

        Ok(resample(Series::new(bars), interval))
    }

    #[instrument(skip(self), fields(provider = "vci"))]
    async fn fetch_company_facet(&self, symbol: &str, facet: CompanyFacet) -> Result<Vec<Value>> {
        let payload = json!({
            "query": graphql_query(facet),
            "variables": { "ticker": symbol.to_uppercase() },
        });

        let body = self.post(&self.config.graphql_url(), &payload).await?;
        let records = decode_facet(&body, facet)?;
        debug!(count = records.len(), "Facet records");
        Ok(records)
    }
}

/// Native chart resolution requested for `interval`
fn time_frame(interval: Interval) -> &'static str {
    match interval {
        Interval::OneMinute
        | Interval::FiveMinutes
        | Interval::FifteenMinutes
        | Interval::ThirtyMinutes => "ONE_MINUTE",
        Interval::OneHour => "ONE_HOUR",
        Interval::OneDay | Interval::OneWeek | Interval::OneMonth => "ONE_DAY",
    }
}

/// Number of native bars to request, counted back from the range end
///
/// Trading sessions are about 6.5 hours; the extra 100 bars cover holidays
/// and half-days the weekday count cannot see.
fn count_back(range: &DateRange, interval: Interval) -> u64 {
    let business_days = range
        .start()
        .iter_days()
        .take_while(|day| *day <= range.end())
        .filter(|day| !matches!(day.weekday(), Weekday::Sat | Weekday::Sun))
        .count() as f64;

    let native = match time_frame(interval) {
        "ONE_DAY" => business_days,
        "ONE_HOUR" => business_days * 6.5,
        _ => business_days * 6.5 * 60.0,
    };
    native as u64 + 100
}

/// Decode a gap-chart body: `[{"o": [..], "h": [..], "l": [..], "c": [..], "v": [..], "t": [..]}]`
fn parse_chart(body: &Value) -> Result<Vec<Bar>> {
    let Some(items) = body.as_array() else {
        return Err(MarketError::InvalidResponse(
            "chart response is not an array".to_string(),
        ));
    };
    let Some(item) = items.first() else {
        return Ok(Vec::new());
    };

    let times = chart_column(item, "t")?;
    let opens = chart_column(item, "o")?;
    let highs = chart_column(item, "h")?;
    let lows = chart_column(item, "l")?;
    let closes = chart_column(item, "c")?;
    let volumes = chart_column(item, "v")?;

    let len = times.len();
    if [opens, highs, lows, closes, volumes]
        .iter()
        .any(|col| col.len() != len)
    {
        return Err(MarketError::InvalidResponse(
            "inconsistent column lengths".to_string(),
        ));
    }

    (0..len)
        .map(|i| {
            let price = |col: &[Value], key: &str| {
                col[i].as_f64().ok_or_else(|| {
                    MarketError::InvalidResponse(format!("non-numeric '{key}' at index {i}"))
                })
            };
            Ok(Bar {
                time: parse_timestamp(&times[i])?,
                open: price(opens, "o")?,
                high: price(highs, "h")?,
                low: price(lows, "l")?,
                close: price(closes, "c")?,
                volume: price(volumes, "v")?.max(0.0).round() as u64,
            })
        })
        .collect()
}

fn chart_column<'a>(item: &'a Value, key: &str) -> Result<&'a [Value]> {
    item.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .ok_or_else(|| MarketError::InvalidResponse(format!("missing column '{key}'")))
}

/// Unix seconds, sent either as a number or a numeric string
fn parse_timestamp(value: &Value) -> Result<DateTime<Utc>> {
    let seconds = match value {
        Value::String(s) => s.parse::<i64>().ok(),
        other => other.as_i64(),
    }
    .ok_or_else(|| MarketError::InvalidResponse(format!("invalid timestamp {value}")))?;

    DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| MarketError::InvalidResponse(format!("timestamp out of range {seconds}")))
}

/// Rebuild `series` at `interval` when the chart API served a finer one
fn resample(series: Series, interval: Interval) -> Series {
    match interval {
        Interval::FiveMinutes | Interval::FifteenMinutes | Interval::ThirtyMinutes => {
            let width = interval.minutes().unwrap_or(1) * 60;
            aggregate(&series, |time| {
                let ts = time.timestamp();
                DateTime::from_timestamp(ts - ts.rem_euclid(width), 0).unwrap_or(time)
            })
        }
        Interval::OneWeek => aggregate(&series, week_start),
        Interval::OneMonth => aggregate(&series, month_start),
        _ => series,
    }
}

/// Group consecutive bars sharing a bucket: first open, max high, min low,
/// last close, summed volume. The bar is stamped with the bucket start.
fn aggregate(series: &Series, bucket_of: impl Fn(DateTime<Utc>) -> DateTime<Utc>) -> Series {
    let mut merged: Vec<Bar> = Vec::new();
    for bar in series.bars() {
        let bucket = bucket_of(bar.time);
        match merged.last_mut() {
            Some(acc) if acc.time == bucket => {
                acc.high = acc.high.max(bar.high);
                acc.low = acc.low.min(bar.low);
                acc.close = bar.close;
                acc.volume += bar.volume;
            }
            _ => merged.push(Bar {
                time: bucket,
                ..*bar
            }),
        }
    }
    Series::new(merged)
}

/// Local Monday 00:00 of the week containing `time`
fn week_start(time: DateTime<Utc>) -> DateTime<Utc> {
    let date = time.with_timezone(&vn_offset()).date_naive();
    let monday = date
        .checked_sub_days(Days::new(u64::from(
            date.weekday().num_days_from_monday(),
        )))
        .unwrap_or(date);
    local_instant(monday, 0, 0, 0)
}

/// Local 00:00 on the first day of the month containing `time`
fn month_start(time: DateTime<Utc>) -> DateTime<Utc> {
    let date = time.with_timezone(&vn_offset()).date_naive();
    local_instant(date.with_day(1).unwrap_or(date), 0, 0, 0)
}

fn graphql_query(facet: CompanyFacet) -> &'static str {
    match facet {
        CompanyFacet::Management => {
            "query Query($ticker: String!) {
  OrganizationManagers(ticker: $ticker) { fullName positionName percentage quantity }
}"
        }
        CompanyFacet::Shareholders => {
            "query Query($ticker: String!) {
  OrganizationShareHolders(ticker: $ticker) { ownerFullName percentage quantity updateDate }
}"
        }
        CompanyFacet::Subsidiaries => {
            "query Query($ticker: String!) {
  Subsidiary(ticker: $ticker) { organCode subOrganCode percentage subOrListingInfo { organName enOrganName } }
}"
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawManager {
    full_name: Option<String>,
    position_name: Option<String>,
    percentage: Option<f64>,
    quantity: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawShareholder {
    owner_full_name: Option<String>,
    percentage: Option<f64>,
    quantity: Option<f64>,
    update_date: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSubsidiary {
    organ_code: Option<String>,
    sub_organ_code: Option<String>,
    percentage: Option<f64>,
    sub_or_listing_info: Option<RawListingInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawListingInfo {
    organ_name: Option<String>,
    en_organ_name: Option<String>,
}

/// Officer currently holding a position
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Manager {
    pub full_name: String,
    pub position: String,
    pub ownership_percent: Option<f64>,
    pub shares: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Shareholder {
    pub owner_name: String,
    pub ownership_percent: Option<f64>,
    pub shares: Option<f64>,
    pub update_date: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subsidiary {
    pub organ_code: Option<String>,
    pub sub_organ_code: Option<String>,
    pub name: Option<String>,
    pub name_en: Option<String>,
    pub ownership_percent: Option<f64>,
}

fn decode_facet(body: &Value, facet: CompanyFacet) -> Result<Vec<Value>> {
    if let Some(errors) = body.get("errors").filter(|e| !e.is_null()) {
        return Err(MarketError::Provider(errors.to_string()));
    }

    let field = match facet {
        CompanyFacet::Management => "OrganizationManagers",
        CompanyFacet::Shareholders => "OrganizationShareHolders",
        CompanyFacet::Subsidiaries => "Subsidiary",
    };
    let raw = body
        .get("data")
        .and_then(|data| data.get(field))
        .cloned()
        .unwrap_or(Value::Null);
    if raw.is_null() {
        return Ok(Vec::new());
    }

    let records = match facet {
        CompanyFacet::Management => serde_json::from_value::<Vec<RawManager>>(raw)?
            .into_iter()
            .filter_map(|m| {
                let position = m.position_name.filter(|p| !p.trim().is_empty())?;
                Some(Manager {
                    full_name: m.full_name.unwrap_or_default(),
                    position,
                    ownership_percent: m.percentage,
                    shares: m.quantity,
                })
            })
            .map(serde_json::to_value)
            .collect::<serde_json::Result<Vec<_>>>()?,
        CompanyFacet::Shareholders => serde_json::from_value::<Vec<RawShareholder>>(raw)?
            .into_iter()
            .map(|s| Shareholder {
                owner_name: s.owner_full_name.unwrap_or_default(),
                ownership_percent: s.percentage,
                shares: s.quantity,
                update_date: s.update_date,
            })
            .map(serde_json::to_value)
            .collect::<serde_json::Result<Vec<_>>>()?,
        CompanyFacet::Subsidiaries => serde_json::from_value::<Vec<RawSubsidiary>>(raw)?
            .into_iter()
            .map(|s| {
                let (name, name_en) = s
                    .sub_or_listing_info
                    .map_or((None, None), |info| (info.organ_name, info.en_organ_name));
                Subsidiary {
                    organ_code: s.organ_code,
                    sub_organ_code: s.sub_organ_code,
                    name,
                    name_en,
                    ownership_percent: s.percentage,
                }
            })
            .map(serde_json::to_value)
            .collect::<serde_json::Result<Vec<_>>>()?,
    };
    Ok(records)
}
