//! # aria-llm
//!
//! Tool-calling LLM client. Serializes conversation turns and tool schemas
//! to the Anthropic Messages API and parses text and `tool_use` blocks back.

pub mod anthropic;
pub mod mock;
pub mod provider;

pub use anthropic::AnthropicProvider;
pub use mock::MockProvider;
pub use provider::{LlmProvider, LlmRequest, LlmResponse, StopReason, Usage};
