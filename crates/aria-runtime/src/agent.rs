//! The agent loop: user text in, tool calls executed, final answer out.

use std::sync::Arc;
use std::time::Instant;

use aria_config::AgentConfig;
use aria_core::{AriaError, Result, ToolRegistry, ToolResult, Turn};
use aria_llm::{LlmProvider, LlmRequest, Usage};
use tracing::{debug, info, warn};

use crate::prompts;
use crate::session::{Session, SessionManager};

/// Reply appended when the model keeps asking for tools past the cap.
pub const ITERATION_CAP_REPLY: &str =
    "Sorry, I couldn't finish that within my step limit. Here's where I got to; ask me to continue if you'd like.";

/// Loop settings, resolved from `[agent]`.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub model: String,
    pub max_tokens: u32,
    pub max_iterations: u32,
    pub system_prompt: String,
    pub tool_result_max_chars: usize,
    pub history_max_turns: usize,
    pub history_max_tokens: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            model: "claude-opus-4-6".into(),
            max_tokens: 4096,
            max_iterations: 5,
            system_prompt: prompts::default_system_prompt(),
            tool_result_max_chars: 12_000,
            history_max_turns: 40,
            history_max_tokens: 180_000,
        }
    }
}

impl AgentSettings {
    /// Resolve settings from config. A `system_prompt_file` wins over an
    /// inline `system_prompt`, which wins over the built-in prompt.
    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        let system_prompt = match (&config.system_prompt_file, &config.system_prompt) {
            (Some(path), _) => std::fs::read_to_string(path).map_err(|e| {
                AriaError::Config(format!(
                    "failed to read system prompt file {}: {e}",
                    path.display()
                ))
            })?,
            (None, Some(inline)) if !inline.trim().is_empty() => inline.clone(),
            _ => prompts::default_system_prompt(),
        };

        Ok(Self {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            max_iterations: config.max_iterations.max(1),
            system_prompt,
            tool_result_max_chars: config.tool_result_max_chars,
            history_max_turns: config.history_max_turns,
            history_max_tokens: config.history_max_tokens,
        })
    }
}

/// Outcome of one [`Orchestrator::run`].
#[derive(Debug, Clone, PartialEq)]
pub struct AgentReply {
    pub text: String,
    /// The model could not be reached; `text` describes the failure.
    pub is_error: bool,
    /// The loop stopped at the iteration cap.
    pub hit_iteration_cap: bool,
    pub model_calls: u32,
    pub tool_calls: u32,
    pub usage: Usage,
}

/// Runs conversations against an LLM provider and a tool registry.
pub struct Orchestrator {
    llm: Arc<dyn LlmProvider>,
    registry: Arc<ToolRegistry>,
    sessions: SessionManager,
    settings: AgentSettings,
}

impl Orchestrator {
    pub fn new(llm: Arc<dyn LlmProvider>, registry: Arc<ToolRegistry>, settings: AgentSettings) -> Self {
        Self {
            llm,
            registry,
            sessions: SessionManager::new(),
            settings,
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    /// Handle one user message in `session_id`. Never fails: an unreachable
    /// model comes back as an error reply and leaves no assistant turn behind.
    pub async fn run(&self, session_id: &str, user_text: &str) -> AgentReply {
        let started = Instant::now();
        let session = self.sessions.get_or_create(session_id).await;
        let mut session = session.lock().await;

        session.push(Turn::user_text(user_text));
        session.trim(self.settings.history_max_turns, self.settings.history_max_tokens);

        let reply = self.drive(&mut session).await;

        info!(
            session = %session_id,
            model_calls = reply.model_calls,
            tool_calls = reply.tool_calls,
            is_error = reply.is_error,
            hit_cap = reply.hit_iteration_cap,
            turns = session.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "agent run complete"
        );
        reply
    }

    async fn drive(&self, session: &mut Session) -> AgentReply {
        let tools = self.registry.schemas();
        let mut reply = AgentReply {
            text: String::new(),
            is_error: false,
            hit_iteration_cap: false,
            model_calls: 0,
            tool_calls: 0,
            usage: Usage::default(),
        };

        while reply.model_calls < self.settings.max_iterations {
            let request = LlmRequest::new(self.settings.model.clone(), session.turns.clone())
                .with_tools(tools.clone())
                .with_system(self.settings.system_prompt.clone())
                .with_max_tokens(self.settings.max_tokens);

            reply.model_calls += 1;
            let response = match self.llm.complete(&request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(session = %session.id, provider = self.llm.name(), error = %e, "LLM call failed");
                    reply.is_error = true;
                    reply.text = user_facing_error(&e);
                    return reply;
                }
            };
            reply.usage.merge(&response.usage);

            if !response.has_tool_calls() {
                let text = match response.text {
                    Some(text) if !text.trim().is_empty() => text,
                    _ => "(no response)".to_string(),
                };
                session.push(Turn::assistant_text(text.clone()));
                reply.text = text;
                return reply;
            }

            let calls = response.tool_calls;
            debug!(
                session = %session.id,
                iteration = reply.model_calls,
                tools = ?calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
                "model requested tools"
            );
            session.push(Turn::tool_calls(response.text, calls.clone()));

            // Sequential, in the order the model asked.
            let mut results = Vec::with_capacity(calls.len());
            for call in &calls {
                reply.tool_calls += 1;
                let result = self.registry.dispatch(call).await;
                results.push(ToolResult {
                    content: truncate_tool_result(&result.content, self.settings.tool_result_max_chars),
                    ..result
                });
            }
            session.push(Turn::tool_results(results));
        }

        warn!(session = %session.id, max_iterations = self.settings.max_iterations, "max agent iterations reached");
        session.push(Turn::assistant_text(ITERATION_CAP_REPLY));
        reply.text = ITERATION_CAP_REPLY.to_string();
        reply.hit_iteration_cap = true;
        reply
    }
}

fn user_facing_error(e: &AriaError) -> String {
    match e {
        AriaError::RateLimited { retry_after_secs } => format!(
            "I'm being rate limited by the language model. Try again in {retry_after_secs} seconds."
        ),
        AriaError::LlmTimeout(_) => "The language model took too long to answer. Please try again.".into(),
        other => format!("Sorry, I couldn't reach the language model: {other}"),
    }
}

/// Keep the first 60% and last 20% of the allowed characters, with a note in
/// between. `max_chars == 0` disables truncation.
pub fn truncate_tool_result(content: &str, max_chars: usize) -> String {
    let total = content.chars().count();
    if max_chars == 0 || total <= max_chars {
        return content.to_string();
    }

    let head_chars = (max_chars * 6) / 10;
    let tail_chars = (max_chars * 2) / 10;
    let head: String = content.chars().take(head_chars).collect();
    let tail: String = content.chars().skip(total - tail_chars).collect();
    let omitted = total - head_chars - tail_chars;

    format!("{head}\n\n[... truncated {omitted} chars ...]\n\n{tail}")
}
