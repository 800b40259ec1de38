use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AriaError, Result};

/// Description of a tool the model may call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    /// Unique name within a registry, e.g. "send_sms", "tap_screen".
    pub name: String,
    /// Human-readable description for the LLM.
    pub description: String,
    /// JSON Schema of the arguments object.
    pub input_schema: Value,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }

    /// Field names listed in the schema's `required` array.
    pub fn required_fields(&self) -> Vec<&str> {
        self.input_schema["required"]
            .as_array()
            .map(|fields| fields.iter().filter_map(|f| f.as_str()).collect())
            .unwrap_or_default()
    }
}

/// A request from the LLM to call a tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: ToolArgs,
}

/// The result of executing a tool call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub content: String,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResult {
    pub fn ok(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            is_error: true,
        }
    }
}

// ─── Argument values ────────────────────────────────────────────

/// A dynamically typed tool argument.
///
/// Numbers are split on integrality: a JSON number with a whole value becomes
/// [`ToolValue::Integer`] (so `3` and `3.0` both decode as `Integer(3)`), any
/// other number becomes [`ToolValue::Float`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum ToolValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Array(Vec<ToolValue>),
    Object(BTreeMap<String, ToolValue>),
}

impl From<Value> for ToolValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => ToolValue::Null,
            Value::Bool(b) => ToolValue::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    return ToolValue::Integer(i);
                }
                let f = n.as_f64().unwrap_or(f64::NAN);
                if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
                    ToolValue::Integer(f as i64)
                } else {
                    ToolValue::Float(f)
                }
            }
            Value::String(s) => ToolValue::String(s),
            Value::Array(items) => ToolValue::Array(items.into_iter().map(ToolValue::from).collect()),
            Value::Object(map) => ToolValue::Object(
                map.into_iter().map(|(k, v)| (k, ToolValue::from(v))).collect(),
            ),
        }
    }
}

impl From<ToolValue> for Value {
    fn from(value: ToolValue) -> Self {
        match value {
            ToolValue::Null => Value::Null,
            ToolValue::Bool(b) => Value::Bool(b),
            ToolValue::Integer(i) => Value::from(i),
            ToolValue::Float(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ToolValue::String(s) => Value::String(s),
            ToolValue::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            ToolValue::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl ToolValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ToolValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ToolValue::Integer(i) => Some(*i),
            ToolValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ToolValue::Integer(i) => Some(*i as f64),
            ToolValue::Float(f) => Some(*f),
            ToolValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ToolValue::Bool(b) => Some(*b),
            ToolValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ToolValue::Null)
    }

    /// Render scalars as plain text; containers as compact JSON.
    pub fn to_text(&self) -> String {
        match self {
            ToolValue::Null => String::new(),
            ToolValue::Bool(b) => b.to_string(),
            ToolValue::Integer(i) => i.to_string(),
            ToolValue::Float(f) => f.to_string(),
            ToolValue::String(s) => s.clone(),
            other => Value::from(other.clone()).to_string(),
        }
    }
}

/// The key → value argument map handed to a tool executable.
///
/// The coercion helpers are for executables; the registry never coerces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolArgs(BTreeMap<String, ToolValue>);

impl ToolArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert a JSON `input` object. Anything that is not an object yields an empty map.
    pub fn from_json(value: Value) -> Self {
        match ToolValue::from(value) {
            ToolValue::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    pub fn to_json(&self) -> Value {
        Value::from(ToolValue::Object(self.0.clone()))
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ToolValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ToolValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ToolValue> {
        self.0.get(key)
    }

    /// Present and not null.
    pub fn has(&self, key: &str) -> bool {
        self.0.get(key).is_some_and(|v| !v.is_null())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ToolValue)> {
        self.0.iter()
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ToolValue::as_str)
    }

    pub fn string_or(&self, key: &str, default: &str) -> String {
        match self.get(key) {
            Some(v) if !v.is_null() => v.to_text(),
            _ => default.to_string(),
        }
    }

    pub fn int_or(&self, key: &str, default: i32) -> i32 {
        self.get(key)
            .and_then(ToolValue::as_i64)
            .and_then(|v| i32::try_from(v).ok())
            .unwrap_or(default)
    }

    pub fn long_or(&self, key: &str, default: i64) -> i64 {
        self.get(key).and_then(ToolValue::as_i64).unwrap_or(default)
    }

    pub fn float_or(&self, key: &str, default: f64) -> f64 {
        self.get(key).and_then(ToolValue::as_f64).unwrap_or(default)
    }

    pub fn bool_or(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(ToolValue::as_bool).unwrap_or(default)
    }

    /// A required, non-empty string argument.
    pub fn require_str(&self, tool: &str, key: &str) -> Result<&str> {
        self.str(key)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| AriaError::InvalidArguments {
                tool: tool.to_string(),
                reason: format!("missing '{key}' argument"),
            })
    }
}

impl From<&str> for ToolValue {
    fn from(s: &str) -> Self {
        ToolValue::String(s.to_string())
    }
}

impl From<String> for ToolValue {
    fn from(s: String) -> Self {
        ToolValue::String(s)
    }
}

impl From<i64> for ToolValue {
    fn from(i: i64) -> Self {
        ToolValue::Integer(i)
    }
}

impl From<f64> for ToolValue {
    fn from(f: f64) -> Self {
        ToolValue::from(Value::from(f))
    }
}

impl From<bool> for ToolValue {
    fn from(b: bool) -> Self {
        ToolValue::Bool(b)
    }
}

// ─── Executables ───────────────────────────────────────────────

/// Anything that can execute a tool call's arguments and produce text.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, args: &ToolArgs) -> Result<String>;
}

/// Adapter turning an async closure into a [`ToolHandler`].
pub struct FnTool<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> ToolHandler for FnTool<F>
where
    F: Fn(ToolArgs) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String>> + Send,
{
    async fn call(&self, args: &ToolArgs) -> Result<String> {
        (self.f)(args.clone()).await
    }
}

/// Wrap an async closure as a shareable tool executable.
pub fn tool_fn<F, Fut>(f: F) -> Arc<dyn ToolHandler>
where
    F: Fn(ToolArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String>> + Send + 'static,
{
    Arc::new(FnTool { f })
}
