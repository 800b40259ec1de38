//! Wire types of the line-delimited JSON automation protocol.
//!
//! One request per line: `{"method": "...", "params": {...}}`.
//! One response per line: `{"success": true, "result": ...}` or
//! `{"success": false, "error": "..."}`.

use aria_core::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default TCP port of the automation service.
pub const DEFAULT_PORT: u16 = 7765;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub method: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

impl RpcRequest {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    /// A parameter by name. Missing when `params` is absent or not an object.
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name).filter(|v| !v.is_null())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RpcResponse {
    pub fn ok(result: Value) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(message.into()),
        }
    }

    /// The result on success, the error text otherwise.
    pub fn into_result(self) -> std::result::Result<Value, String> {
        if self.success {
            Ok(self.result.unwrap_or(Value::Null))
        } else {
            Err(self.error.unwrap_or_else(|| "unknown error".to_string()))
        }
    }
}

/// Decode one request line. The error text is what goes back on the wire.
pub fn decode_request(line: &str) -> std::result::Result<RpcRequest, String> {
    serde_json::from_str::<RpcRequest>(line.trim()).map_err(|e| format!("parse error: {e}"))
}

/// Serialize a message as one newline-terminated line.
pub fn encode_line<T: Serialize>(message: &T) -> Result<String> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_without_params() {
        let req = decode_request(r#"{"method":"ping"}"#).unwrap();
        assert_eq!(req.method, "ping");
        assert!(req.param("anything").is_none());
    }

    #[test]
    fn decode_failure_is_prefixed() {
        let err = decode_request("{not json").unwrap_err();
        assert!(err.starts_with("parse error: "));
        let err = decode_request(r#"{"params":{}}"#).unwrap_err();
        assert!(err.starts_with("parse error: "));
    }

    #[test]
    fn response_shapes() {
        let ok = serde_json::to_value(RpcResponse::ok(json!({"clicked": true}))).unwrap();
        assert_eq!(ok, json!({"success": true, "result": {"clicked": true}}));
        let err = serde_json::to_value(RpcResponse::err("unknown method: fly")).unwrap();
        assert_eq!(err, json!({"success": false, "error": "unknown method: fly"}));
    }

    #[test]
    fn encoded_line_is_newline_terminated() {
        let line = encode_line(&RpcRequest::new("ping", Value::Null)).unwrap();
        assert_eq!(line, "{\"method\":\"ping\"}\n");
    }
}
