//! Question answering over Vietnamese equities
//!
//! A question is classified as simple or complex. Simple questions go
//! straight to a tool-calling agent backed by market data tools; complex
//! ones are split into sub-questions, answered one by one, and merged by a
//! combiner. [`Orchestrator::process_query`] is the entry point.

pub mod agent;
pub mod batch;
pub mod combiner;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod planner;
pub mod prompts;
pub mod render;
pub mod telemetry;
pub mod tools;

#[cfg(test)]
pub(crate) mod testing;

pub use agent::FinanceAgent;
pub use batch::{BatchError, BatchSummary, run_batch};
pub use combiner::{CombinedAnswer, ResultCombiner};
pub use config::{FinanceConfig, FinanceConfigBuilder};
pub use error::{FinanceError, Result};
pub use orchestrator::{Orchestrator, QueryResponse};
pub use planner::{Classification, Decomposition, QueryPlanner};
pub use render::{PayloadError, extract_answer, render_payload};
pub use telemetry::init_tracing;
pub use tools::finance_tools;
