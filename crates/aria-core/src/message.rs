use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tool::{ToolCall, ToolResult};

/// One entry in a conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub id: Uuid,
    pub role: Role,
    pub body: TurnBody,
    pub timestamp: DateTime<Utc>,
}

/// Who produced a turn. Tool results travel as user turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// What a turn carries. Tool calls and tool results never share a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnBody {
    Text {
        text: String,
    },
    /// Assistant request for one or more tool executions, optionally preceded by text.
    ToolCalls {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        calls: Vec<ToolCall>,
    },
    ToolResults {
        results: Vec<ToolResult>,
    },
}

impl Turn {
    fn new(role: Role, body: TurnBody) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            body,
            timestamp: Utc::now(),
        }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self::new(Role::User, TurnBody::Text { text: text.into() })
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, TurnBody::Text { text: text.into() })
    }

    /// Assistant turn requesting tool calls. Empty leading text is dropped.
    pub fn tool_calls(text: Option<String>, calls: Vec<ToolCall>) -> Self {
        let text = text.filter(|t| !t.trim().is_empty());
        Self::new(Role::Assistant, TurnBody::ToolCalls { text, calls })
    }

    pub fn tool_results(results: Vec<ToolResult>) -> Self {
        Self::new(Role::User, TurnBody::ToolResults { results })
    }

    /// Free text of the turn, including the text leading a tool-calls turn.
    pub fn text(&self) -> Option<&str> {
        match &self.body {
            TurnBody::Text { text } => Some(text),
            TurnBody::ToolCalls { text, .. } => text.as_deref(),
            TurnBody::ToolResults { .. } => None,
        }
    }

    pub fn calls(&self) -> &[ToolCall] {
        match &self.body {
            TurnBody::ToolCalls { calls, .. } => calls,
            _ => &[],
        }
    }

    pub fn results(&self) -> &[ToolResult] {
        match &self.body {
            TurnBody::ToolResults { results } => results,
            _ => &[],
        }
    }

    /// A user turn typed by a person, as opposed to a tool-results turn.
    pub fn is_user_text(&self) -> bool {
        self.role == Role::User && matches!(self.body, TurnBody::Text { .. })
    }

    /// Estimate token count for this turn.
    /// Uses a simple heuristic: ~4 chars per token for English text.
    pub fn estimate_tokens(&self) -> usize {
        // Role overhead (~4 tokens for role markers)
        let mut chars = 16usize;

        match &self.body {
            TurnBody::Text { text } => chars += text.len(),
            TurnBody::ToolCalls { text, calls } => {
                chars += text.as_ref().map_or(0, |t| t.len());
                for call in calls {
                    chars += call.id.len();
                    chars += call.name.len();
                    chars += call.arguments.to_json().to_string().len();
                }
            }
            TurnBody::ToolResults { results } => {
                for result in results {
                    chars += result.tool_call_id.len();
                    chars += result.content.len();
                }
            }
        }

        (chars / 4).max(1)
    }
}
