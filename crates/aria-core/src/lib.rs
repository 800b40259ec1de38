//! # aria-core
//!
//! Shared vocabulary for the Aria phone-operator agent: the workspace error
//! type, conversation turns, tool definitions and argument values, and the
//! tool registry the orchestrator dispatches through.

pub mod error;
pub mod message;
pub mod registry;
pub mod tool;

pub use error::{AriaError, Result};
pub use message::{Role, Turn, TurnBody};
pub use registry::{DEFAULT_TOOL_RATE_LIMIT, ToolRegistry};
pub use tool::{FnTool, ToolArgs, ToolCall, ToolDefinition, ToolHandler, ToolResult, ToolValue, tool_fn};
