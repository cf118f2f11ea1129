//! Market data for finagent
//!
//! - [`model`]: bars, series, intervals, date ranges and company facets
//! - [`clock`]: the single source of "today" in Vietnam time
//! - [`gateway`]: the [`MarketDataGateway`] trait the tools depend on
//! - [`vci`]: a gateway backed by Vietcap's public endpoints
//! - [`indicators`]: SMA and RSI

pub mod clock;
pub mod error;
pub mod gateway;
pub mod indicators;
pub mod model;
pub mod vci;

pub use clock::{FixedClock, SystemClock, TimeSource, vn_offset};
pub use error::{MarketError, Result};
pub use gateway::MarketDataGateway;
pub use model::{Bar, CompanyFacet, DateRange, Interval, Series};
pub use vci::{VciConfig, VciGateway};
