//! Core abstractions for finagent
//!
//! This crate defines the traits and types shared by every other crate in the
//! workspace: the [`Agent`] trait, the tagged [`AgentReply`] an agent hands back,
//! and the common [`Error`] type.

pub mod agent;
pub mod error;

pub use agent::{Agent, AgentReply};
pub use error::{Error, Result};
