use async_trait::async_trait;
use aria_core::{Result, ToolCall, ToolDefinition, Turn};
use serde::{Deserialize, Serialize};

/// Everything one model call needs: history, tool schemas, system prompt.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    /// Oldest first. Tool-call and tool-result turns alternate after the
    /// user turn that started the exchange.
    pub turns: Vec<Turn>,
    pub tools: Vec<ToolDefinition>,
    pub system: Option<String>,
    pub max_tokens: u32,
}

impl LlmRequest {
    pub fn new(model: impl Into<String>, turns: Vec<Turn>) -> Self {
        Self {
            model: model.into(),
            turns,
            tools: Vec::new(),
            system: None,
            max_tokens: 4096,
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// What came back: text, tool calls, or both.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Text blocks joined; `None` when the model wrote nothing.
    pub text: Option<String>,
    /// One per `tool_use` block, in the order the model listed them.
    pub tool_calls: Vec<ToolCall>,
    pub stop_reason: StopReason,
    pub usage: Usage,
}

impl LlmResponse {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
}

impl StopReason {
    /// Unknown or missing reasons read as `EndTurn`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("tool_use") => Self::ToolUse,
            Some("max_tokens") => Self::MaxTokens,
            Some("stop_sequence") => Self::StopSequence,
            _ => Self::EndTurn,
        }
    }
}

/// Token counts for one call, or summed over a run with [`Usage::merge`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub estimated_cost_usd: f64,
}

impl Usage {
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens.saturating_add(self.output_tokens)
    }

    pub fn merge(&mut self, other: &Usage) {
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
        self.estimated_cost_usd += other.estimated_cost_usd;
    }
}

/// A tool-calling chat model.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    /// One non-streaming call. Transport failures, non-2xx statuses and
    /// timeouts all come back as `Err`.
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse>;

    /// Fails when the provider cannot be used at all, e.g. no API key.
    async fn health_check(&self) -> Result<()>;
}
