//! Market data gateway trait

use crate::error::Result;
use crate::model::{CompanyFacet, DateRange, Interval, Series};
use async_trait::async_trait;
use serde_json::Value;

/// Access to bars and company reference data for one symbol at a time
///
/// "Nothing found" is an empty [`Series`] or an empty record list, not an
/// error. Errors mean the provider could not be reached or answered with
/// something unreadable. Implementations make a single attempt per call.
#[async_trait]
pub trait MarketDataGateway: Send + Sync {
    /// Bars for `symbol` inside `range` at `interval`
    async fn fetch_bars(&self, symbol: &str, range: &DateRange, interval: Interval)
    -> Result<Series>;

    /// Reference records of one kind for `symbol`
    async fn fetch_company_facet(&self, symbol: &str, facet: CompanyFacet) -> Result<Vec<Value>>;
}
