use thiserror::Error;

/// Unified error type for the Aria workspace.
#[derive(Error, Debug)]
pub enum AriaError {
    // ── Agent errors ───────────────────────────────────────────
    #[error("agent error: {0}")]
    Agent(String),

    // ── LLM errors ─────────────────────────────────────────────
    #[error("llm provider error: {0}")]
    LlmProvider(String),

    #[error("llm http error {status}: {message}")]
    LlmHttp { status: u16, message: String },

    #[error("llm rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("llm request timed out: {0}")]
    LlmTimeout(String),

    // ── Tool errors ────────────────────────────────────────────
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("tool already registered: {0}")]
    DuplicateTool(String),

    #[error("tool execution failed: {tool}: {reason}")]
    ToolExecution { tool: String, reason: String },

    #[error("invalid arguments for tool '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    // ── Automation / device errors ─────────────────────────────
    #[error("automation transport error: {0}")]
    Transport(String),

    #[error("automation command failed: {method}: {reason}")]
    Automation { method: String, reason: String },

    #[error("device error: {0}")]
    Device(String),

    // ── Config errors ──────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    #[error("config validation failed: {field}: {reason}")]
    ConfigValidation { field: String, reason: String },

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AriaError {
    /// Shorthand for a tool execution failure.
    pub fn tool(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        AriaError::ToolExecution {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error came from the model provider (network, HTTP, timeout).
    pub fn is_llm(&self) -> bool {
        matches!(
            self,
            AriaError::LlmProvider(_)
                | AriaError::LlmHttp { .. }
                | AriaError::RateLimited { .. }
                | AriaError::LlmTimeout(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AriaError>;
