use std::time::Duration;

use async_trait::async_trait;
use aria_core::{AriaError, Result, Role, ToolArgs, ToolCall, TurnBody};
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::provider::*;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_RETRY_AFTER_SECS: u64 = 30;

/// Anthropic Messages API provider.
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: "https://api.anthropic.com/v1".into(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Rebuild the HTTP client with a connect timeout and a read timeout.
    /// The read timeout bounds each wait for bytes, not the whole response.
    pub fn with_timeouts(mut self, connect: Duration, read: Duration) -> Result<Self> {
        self.client = Client::builder()
            .connect_timeout(connect)
            .read_timeout(read)
            .build()
            .map_err(|e| AriaError::LlmProvider(format!("cannot build HTTP client: {e}")))?;
        Ok(self)
    }
}

/// Serialize a request into the Messages API body.
pub fn build_request_body(request: &LlmRequest) -> Value {
    let mut messages = Vec::with_capacity(request.turns.len());
    for turn in &request.turns {
        let role = match turn.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        match &turn.body {
            TurnBody::Text { text } => {
                messages.push(json!({
                    "role": role,
                    "content": text,
                }));
            }
            TurnBody::ToolCalls { text, calls } => {
                let mut blocks: Vec<Value> = Vec::with_capacity(calls.len() + 1);
                if let Some(text) = text {
                    blocks.push(json!({
                        "type": "text",
                        "text": text,
                    }));
                }
                for call in calls {
                    blocks.push(json!({
                        "type": "tool_use",
                        "id": call.id,
                        "name": call.name,
                        "input": call.arguments.to_json(),
                    }));
                }
                messages.push(json!({
                    "role": "assistant",
                    "content": blocks,
                }));
            }
            TurnBody::ToolResults { results } => {
                let blocks: Vec<Value> = results
                    .iter()
                    .map(|r| {
                        let mut block = json!({
                            "type": "tool_result",
                            "tool_use_id": r.tool_call_id,
                            "content": r.content,
                        });
                        if r.is_error {
                            block["is_error"] = json!(true);
                        }
                        block
                    })
                    .collect();
                messages.push(json!({
                    "role": "user",
                    "content": blocks,
                }));
            }
        }
    }

    let mut body = json!({
        "model": &request.model,
        "max_tokens": request.max_tokens,
        "messages": messages,
    });

    if let Some(ref system) = request.system {
        body["system"] = json!(system);
    }

    if !request.tools.is_empty() {
        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "input_schema": t.input_schema,
                })
            })
            .collect();
        body["tools"] = json!(tools);
    }

    body
}

/// Parse a successful Messages API response body.
pub fn parse_response(data: &Value, model: &str) -> LlmResponse {
    let blocks = data["content"].as_array().map(Vec::as_slice).unwrap_or(&[]);

    let text: String = blocks
        .iter()
        .filter(|b| b["type"] == "text")
        .filter_map(|b| b["text"].as_str())
        .collect();

    let tool_calls: Vec<ToolCall> = blocks
        .iter()
        .filter(|b| b["type"] == "tool_use")
        .map(|b| ToolCall {
            id: b["id"].as_str().unwrap_or_default().to_string(),
            name: b["name"].as_str().unwrap_or_default().to_string(),
            arguments: ToolArgs::from_json(b["input"].clone()),
        })
        .collect();

    let usage_data = &data["usage"];
    let input_tokens = usage_data["input_tokens"].as_u64().unwrap_or(0) as u32;
    let output_tokens = usage_data["output_tokens"].as_u64().unwrap_or(0) as u32;

    LlmResponse {
        text: (!text.is_empty()).then_some(text),
        tool_calls,
        stop_reason: StopReason::parse(data["stop_reason"].as_str()),
        usage: Usage {
            input_tokens,
            output_tokens,
            estimated_cost_usd: estimate_anthropic_cost(model, input_tokens, output_tokens),
        },
    }
}

/// The provider's `error.message` when the body is a JSON error envelope, else the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

fn map_send_error(e: reqwest::Error) -> AriaError {
    if e.is_timeout() {
        AriaError::LlmTimeout(e.to_string())
    } else {
        AriaError::LlmProvider(e.to_string())
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let body = build_request_body(request);
        debug!(
            model = %request.model,
            turns = request.turns.len(),
            tools = request.tools.len(),
            "sending Anthropic API request"
        );

        let resp = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = resp.status();
        if !status.is_success() {
            if status.as_u16() == 429 {
                let retry_after_secs = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
                warn!(retry_after_secs, "Anthropic API rate limited");
                return Err(AriaError::RateLimited { retry_after_secs });
            }
            let text = resp.text().await.unwrap_or_default();
            let message = error_message(&text);
            warn!(status = status.as_u16(), error = %message, "Anthropic API error");
            return Err(AriaError::LlmHttp {
                status: status.as_u16(),
                message,
            });
        }

        let data: Value = resp.json().await.map_err(map_send_error)?;
        let response = parse_response(&data, &request.model);
        debug!(
            stop_reason = ?response.stop_reason,
            tool_calls = response.tool_calls.len(),
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "Anthropic API response"
        );
        Ok(response)
    }

    async fn health_check(&self) -> Result<()> {
        info!("checking Anthropic API health");
        if self.api_key.is_empty() {
            return Err(AriaError::LlmProvider("ANTHROPIC_API_KEY not set".into()));
        }
        Ok(())
    }
}

/// Estimate cost for Anthropic models (USD per 1M tokens).
fn estimate_anthropic_cost(model: &str, input_tokens: u32, output_tokens: u32) -> f64 {
    let (input_per_m, output_per_m) = match model {
        m if m.contains("opus") => (15.00, 75.00),
        m if m.contains("sonnet") => (3.00, 15.00),
        m if m.contains("haiku") => (0.80, 4.00),
        _ => (3.00, 15.00),
    };
    (input_tokens as f64 * input_per_m + output_tokens as f64 * output_per_m) / 1_000_000.0
}
