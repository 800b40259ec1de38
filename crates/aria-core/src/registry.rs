use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{AriaError, Result};
use crate::tool::{ToolCall, ToolDefinition, ToolHandler, ToolResult};

struct RegisteredTool {
    definition: ToolDefinition,
    handler: Arc<dyn ToolHandler>,
}

/// Calls allowed per tool inside one window when no limit is configured.
pub const DEFAULT_TOOL_RATE_LIMIT: u32 = 30;

const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Sliding-window call log, one queue of start times per tool.
struct CallLog {
    max_per_window: u32,
    window: Duration,
    calls: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl CallLog {
    fn new(max_per_window: u32) -> Self {
        Self {
            max_per_window,
            window: RATE_WINDOW,
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Record a call if the tool still has room in the window. A limit of 0
    /// disables the check but calls are still counted.
    fn try_record(&self, tool: &str) -> bool {
        let now = Instant::now();
        let mut calls = self.calls.lock();
        let log = calls.entry(tool.to_string()).or_default();
        while log.front().is_some_and(|t| now.duration_since(*t) >= self.window) {
            log.pop_front();
        }
        if self.max_per_window > 0 && log.len() >= self.max_per_window as usize {
            return false;
        }
        log.push_back(now);
        true
    }

    fn recent(&self) -> HashMap<String, usize> {
        let now = Instant::now();
        self.calls
            .lock()
            .iter()
            .map(|(name, log)| {
                let recent = log.iter().filter(|t| now.duration_since(**t) < self.window).count();
                (name.clone(), recent)
            })
            .filter(|(_, recent)| *recent > 0)
            .collect()
    }
}

/// Name → {definition, executable}. Registration order is preserved for `schemas()`.
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
    order: Vec<String>,
    call_log: CallLog,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
            call_log: CallLog::new(DEFAULT_TOOL_RATE_LIMIT),
        }
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap calls per tool per minute. 0 means unlimited.
    pub fn with_rate_limit(mut self, max_per_minute: u32) -> Self {
        self.call_log = CallLog::new(max_per_minute);
        self
    }

    pub fn rate_limit(&self) -> u32 {
        self.call_log.max_per_window
    }

    /// Calls started in the last minute, per tool. Tools with none are left out.
    pub fn call_stats(&self) -> HashMap<String, usize> {
        self.call_log.recent()
    }

    /// Register a tool. A name that is already taken is rejected.
    pub fn register(&mut self, definition: ToolDefinition, handler: Arc<dyn ToolHandler>) -> Result<()> {
        if self.tools.contains_key(&definition.name) {
            return Err(AriaError::DuplicateTool(definition.name));
        }
        debug!(tool = %definition.name, "registered tool");
        self.order.push(definition.name.clone());
        self.tools.insert(
            definition.name.clone(),
            RegisteredTool { definition, handler },
        );
        Ok(())
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn definition(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name).map(|t| &t.definition)
    }

    /// Definitions in registration order, as sent to the model.
    pub fn schemas(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| t.definition.clone())
            .collect()
    }

    /// Execute a call. Never fails: every problem becomes an error result.
    pub async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        let Some(tool) = self.tools.get(&call.name) else {
            warn!(tool = %call.name, "unknown tool requested");
            return ToolResult::error(&call.id, format!("Unknown tool: {}", call.name));
        };

        if let Some(missing) = tool
            .definition
            .required_fields()
            .into_iter()
            .find(|field| !call.arguments.has(field))
        {
            warn!(tool = %call.name, field = missing, "missing required argument");
            return ToolResult::error(
                &call.id,
                format!(
                    "Invalid arguments for tool '{}': missing required argument '{}'",
                    call.name, missing
                ),
            );
        }

        if !self.call_log.try_record(&call.name) {
            warn!(tool = %call.name, limit = self.call_log.max_per_window, "tool rate limit hit");
            return ToolResult::error(
                &call.id,
                format!(
                    "Rate limit exceeded for tool '{}' — max {}/min",
                    call.name, self.call_log.max_per_window
                ),
            );
        }

        let start = Instant::now();
        let outcome = AssertUnwindSafe(tool.handler.call(&call.arguments))
            .catch_unwind()
            .await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(tool = %call.name, elapsed_ms, "tool panicked");
                return ToolResult::error(&call.id, format!("Tool error ({}): panicked", call.name));
            }
        };

        match outcome {
            Ok(content) => {
                debug!(tool = %call.name, elapsed_ms, "tool executed");
                ToolResult::ok(&call.id, content)
            }
            Err(e) => {
                warn!(tool = %call.name, elapsed_ms, error = %e, "tool execution failed");
                ToolResult::error(&call.id, format!("Tool error ({}): {}", call.name, e))
            }
        }
    }
}
