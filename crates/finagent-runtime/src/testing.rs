//! Test doubles for code that drives a model
//!
//! Compiled for this crate's own tests and, with the `testing` feature, for
//! downstream test suites.

use async_trait::async_trait;
use finagent_llm::{
    CompletionRequest, CompletionResponse, ContentBlock, LLMProvider, Message, Result,
    StopReason, TokenUsage,
};
use mockall::mock;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

mock! {
    pub Provider {}

    #[async_trait]
    impl LLMProvider for Provider {
        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;
        fn name(&self) -> &str;
    }
}

/// Every request a scripted provider received, in order
pub type Recorded = Arc<Mutex<Vec<CompletionRequest>>>;

/// A mock that answers with `responses` in order and records every request
pub fn scripted(responses: Vec<CompletionResponse>) -> (MockProvider, Recorded) {
    let queue = Arc::new(Mutex::new(VecDeque::from(responses)));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);

    let mut provider = MockProvider::new();
    provider.expect_complete().returning(move |request| {
        recorder.lock().unwrap().push(request);
        Ok(queue
            .lock()
            .unwrap()
            .pop_front()
            .expect("scripted provider ran out of responses"))
    });
    (provider, seen)
}

pub fn text_response(text: &str) -> CompletionResponse {
    CompletionResponse {
        message: Message::assistant(text),
        stop_reason: StopReason::EndTurn,
        usage: TokenUsage::default(),
    }
}

pub fn tool_call_response(calls: &[(&str, &str, Value)]) -> CompletionResponse {
    let blocks = calls
        .iter()
        .map(|(id, name, input)| ContentBlock::ToolUse {
            id: (*id).to_string(),
            name: (*name).to_string(),
            input: input.clone(),
        })
        .collect();
    CompletionResponse {
        message: Message::assistant_blocks(blocks),
        stop_reason: StopReason::ToolUse,
        usage: TokenUsage::default(),
    }
}
