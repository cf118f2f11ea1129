//! Time source
//!
//! Every "today" in the system comes from a [`TimeSource`]. Production code
//! uses [`SystemClock`]; tests pin the date with [`FixedClock`].

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};

/// Vietnam is UTC+7 all year
pub const VN_UTC_OFFSET_SECS: i32 = 7 * 3600;

/// The UTC+7 offset
pub fn vn_offset() -> FixedOffset {
    FixedOffset::east_opt(VN_UTC_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Source of the current instant in Vietnam local time
pub trait TimeSource: Send + Sync {
    /// Current instant in UTC+7
    fn now(&self) -> DateTime<FixedOffset>;

    /// Current calendar date in UTC+7
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&vn_offset())
    }
}

/// A clock stopped at one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(DateTime<FixedOffset>);

impl FixedClock {
    /// Stop the clock at `instant`
    pub fn new(instant: DateTime<FixedOffset>) -> Self {
        Self(instant)
    }

    /// Stop the clock at noon, local time, on `date`
    pub fn on(date: NaiveDate) -> Self {
        let noon = date.and_hms_opt(12, 0, 0).unwrap_or_default();
        Self(
            noon.and_local_timezone(vn_offset())
                .single()
                .unwrap_or_else(|| noon.and_utc().fixed_offset()),
        )
    }
}

impl TimeSource for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}
