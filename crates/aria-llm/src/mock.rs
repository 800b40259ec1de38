//! Scripted provider for tests. Each `complete` call pops the next scripted
//! step; no network involved.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use aria_core::{AriaError, Result, ToolArgs, ToolCall};
use parking_lot::Mutex;
use serde_json::Value;

use crate::provider::{LlmProvider, LlmRequest, LlmResponse, StopReason, Usage};

/// Reply used once the script runs dry.
pub const SCRIPT_EXHAUSTED: &str = "(mock: script exhausted)";

/// One scripted step.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Reply(LlmResponse),
    /// Fail the call with `AriaError::LlmProvider(message)`.
    Fail(String),
}

impl MockResponse {
    pub fn text(text: &str) -> Self {
        Self::Reply(reply(Some(text.to_string()), Vec::new()))
    }

    /// Several tool calls in one response, kept in the given order.
    pub fn tool_calls(calls: Vec<(&str, Value)>) -> Self {
        Self::Reply(reply(None, calls.into_iter().map(|(n, a)| call(n, a)).collect()))
    }

    /// Narration plus tool calls, as models often send.
    pub fn text_with_tool_calls(text: &str, calls: Vec<(&str, Value)>) -> Self {
        Self::Reply(reply(
            Some(text.to_string()),
            calls.into_iter().map(|(n, a)| call(n, a)).collect(),
        ))
    }

    pub fn fail(message: &str) -> Self {
        Self::Fail(message.to_string())
    }
}

fn reply(text: Option<String>, tool_calls: Vec<ToolCall>) -> LlmResponse {
    let stop_reason = if tool_calls.is_empty() {
        StopReason::EndTurn
    } else {
        StopReason::ToolUse
    };
    LlmResponse {
        text,
        tool_calls,
        stop_reason,
        usage: Usage {
            input_tokens: 100,
            output_tokens: 50,
            estimated_cost_usd: 0.0,
        },
    }
}

fn call(name: &str, args: Value) -> ToolCall {
    ToolCall {
        id: format!("toolu_{}", uuid::Uuid::new_v4().simple()),
        name: name.to_string(),
        arguments: ToolArgs::from_json(args),
    }
}

/// Provider that plays back a script and records every request.
///
/// ```
/// use aria_llm::mock::MockProvider;
/// let provider = MockProvider::new("mock")
///     .with_tool_call("read_screen", serde_json::json!({}))
///     .with_response("All done.");
/// assert_eq!(provider.remaining(), 2);
/// ```
pub struct MockProvider {
    name: String,
    script: Mutex<VecDeque<MockResponse>>,
    requests: Arc<Mutex<Vec<LlmRequest>>>,
    delay: Option<Duration>,
}

impl MockProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(VecDeque::new()),
            requests: Arc::new(Mutex::new(Vec::new())),
            delay: None,
        }
    }

    pub fn with_mock_response(self, step: MockResponse) -> Self {
        self.script.lock().push_back(step);
        self
    }

    pub fn with_response(self, text: &str) -> Self {
        self.with_mock_response(MockResponse::text(text))
    }

    pub fn with_tool_call(self, name: &str, args: Value) -> Self {
        self.with_mock_response(MockResponse::tool_calls(vec![(name, args)]))
    }

    pub fn with_error(self, message: &str) -> Self {
        self.with_mock_response(MockResponse::fail(message))
    }

    /// Sleep this long inside every `complete` call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Shared view of every request seen so far, in call order.
    pub fn recorded_requests(&self) -> Arc<Mutex<Vec<LlmRequest>>> {
        Arc::clone(&self.requests)
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().len()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        self.requests.lock().push(request.clone());
        let step = self.script.lock().pop_front();

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match step {
            Some(MockResponse::Reply(response)) => Ok(response),
            Some(MockResponse::Fail(message)) => Err(AriaError::LlmProvider(message)),
            None => Ok(reply(Some(SCRIPT_EXHAUSTED.to_string()), Vec::new())),
        }
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
