//! # aria-runtime
//!
//! The conversation orchestrator. Owns per-session turn history, calls the
//! LLM with the registry's tool schemas, executes requested tools in order and
//! loops until the model answers in plain text or the iteration cap is hit.

pub mod agent;
pub mod prompts;
pub mod session;

pub use agent::{AgentReply, AgentSettings, ITERATION_CAP_REPLY, Orchestrator, truncate_tool_result};
pub use session::{Session, SessionManager};
