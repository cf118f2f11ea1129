//! Market data model

use crate::clock::{TimeSource, vn_offset};
use crate::error::{MarketError, Result};
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sampling granularity of a bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1H")]
    OneHour,
    #[serde(rename = "1D")]
    OneDay,
    #[serde(rename = "1W")]
    OneWeek,
    #[serde(rename = "1M")]
    OneMonth,
}

impl Interval {
    /// Every supported interval, finest first
    pub const ALL: [Interval; 8] = [
        Interval::OneMinute,
        Interval::FiveMinutes,
        Interval::FifteenMinutes,
        Interval::ThirtyMinutes,
        Interval::OneHour,
        Interval::OneDay,
        Interval::OneWeek,
        Interval::OneMonth,
    ];

    /// Wire code, e.g. `"1D"`
    pub fn as_str(self) -> &'static str {
        match self {
            Interval::OneMinute => "1m",
            Interval::FiveMinutes => "5m",
            Interval::FifteenMinutes => "15m",
            Interval::ThirtyMinutes => "30m",
            Interval::OneHour => "1H",
            Interval::OneDay => "1D",
            Interval::OneWeek => "1W",
            Interval::OneMonth => "1M",
        }
    }

    /// Codes of all intervals joined with `", "`
    pub fn codes() -> String {
        Self::ALL
            .iter()
            .map(|i| i.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Bucket width in minutes for intraday intervals
    pub fn minutes(self) -> Option<i64> {
        match self {
            Interval::OneMinute => Some(1),
            Interval::FiveMinutes => Some(5),
            Interval::FifteenMinutes => Some(15),
            Interval::ThirtyMinutes => Some(30),
            Interval::OneHour => Some(60),
            _ => None,
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown interval code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownInterval(pub String);

impl fmt::Display for UnknownInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown interval '{}'", self.0)
    }
}

impl std::error::Error for UnknownInterval {}

impl FromStr for Interval {
    type Err = UnknownInterval;

    /// Codes are case-sensitive: `1m` is a minute, `1M` a month
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|i| i.as_str() == s)
            .ok_or_else(|| UnknownInterval(s.to_string()))
    }
}

/// One OHLCV observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Bars ordered by time, without duplicate timestamps
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Series {
    bars: Vec<Bar>,
}

impl Series {
    /// Sort `bars` by time; for repeated timestamps the last one wins
    pub fn new(mut bars: Vec<Bar>) -> Self {
        bars.sort_by_key(|b| b.time);
        let mut deduped: Vec<Bar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match deduped.last_mut() {
                Some(last) if last.time == bar.time => *last = bar,
                _ => deduped.push(bar),
            }
        }
        Self { bars: deduped }
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Close prices in time order
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Sum of volumes over every bar
    pub fn total_volume(&self) -> u64 {
        self.bars.iter().map(|b| b.volume).sum()
    }
}

/// Inclusive range of calendar dates in Vietnam time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Days covered by the default range, ending today
    pub const DEFAULT_LOOKBACK_DAYS: u64 = 30;

    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(MarketError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Today minus 30 days through today, read from `clock` at call time
    pub fn default_from(clock: &dyn TimeSource) -> Self {
        let end = clock.today();
        let start = end
            .checked_sub_days(Days::new(Self::DEFAULT_LOOKBACK_DAYS))
            .unwrap_or(end);
        Self { start, end }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// First instant of the start date, local time
    pub fn start_instant(&self) -> DateTime<Utc> {
        local_instant(self.start, 0, 0, 0)
    }

    /// Last second of the end date, local time
    pub fn end_instant(&self) -> DateTime<Utc> {
        local_instant(self.end, 23, 59, 59)
    }

    /// Whether `time` falls inside the range
    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        time >= self.start_instant() && time <= self.end_instant()
    }
}

pub(crate) fn local_instant(date: NaiveDate, hour: u32, min: u32, sec: u32) -> DateTime<Utc> {
    let naive = date.and_hms_opt(hour, min, sec).unwrap_or_default();
    naive
        .and_local_timezone(vn_offset())
        .single()
        .map_or_else(|| naive.and_utc(), |local| local.with_timezone(&Utc))
}

/// Kind of company reference data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanyFacet {
    /// Officers currently in position
    Management,
    /// Major shareholders
    Shareholders,
    /// Subsidiaries and affiliates
    Subsidiaries,
}

impl CompanyFacet {
    /// Vietnamese noun phrase used in user-facing messages
    pub fn label_vi(self) -> &'static str {
        match self {
            CompanyFacet::Management => "ban lãnh đạo",
            CompanyFacet::Shareholders => "cổ đông",
            CompanyFacet::Subsidiaries => "công ty con",
        }
    }
}
