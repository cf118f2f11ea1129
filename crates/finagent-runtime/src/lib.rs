//! Agent runtime for finagent
//!
//! Two ways of driving a model live here:
//!
//! - [`AgentExecutor`] runs the tool-calling loop and hands back an
//!   [`AgentReply`](finagent_core::AgentReply).
//! - [`StructuredChain`] asks for a single JSON object, validates it against a
//!   Rust type and retries on mismatch.

pub mod executor;
pub mod settings;
pub mod structured;

#[cfg(any(test, feature = "testing"))]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub mod testing;

pub use executor::{AgentExecutor, AgentExecutorBuilder, ExecutorConfig};
pub use settings::ModelSettings;
pub use structured::{StructuredChain, StructuredOutput, parse_structured};
