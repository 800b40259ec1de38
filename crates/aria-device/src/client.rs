//! Host-side client for the automation protocol.
//!
//! Keeps one persistent connection, sends one request at a time, and drops
//! the connection on any transport error so the next call reconnects.

use std::time::Duration;

use aria_core::{AriaError, Result};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::protocol::{self, RpcRequest, RpcResponse};
use crate::snapshot::{NodeId, UiElement};
use crate::source::GlobalAction;

struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

pub struct AutomationClient {
    addr: String,
    connect_timeout: Duration,
    read_timeout: Duration,
    conn: Mutex<Option<Connection>>,
}

impl AutomationClient {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(10),
            conn: Mutex::new(None),
        }
    }

    pub fn with_timeouts(mut self, connect: Duration, read: Duration) -> Self {
        self.connect_timeout = connect;
        self.read_timeout = read;
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub async fn is_connected(&self) -> bool {
        self.conn.lock().await.is_some()
    }

    /// Drop the current connection, if any.
    pub async fn disconnect(&self) {
        if self.conn.lock().await.take().is_some() {
            info!(addr = %self.addr, "disconnected from automation service");
        }
    }

    async fn connect(&self) -> Result<Connection> {
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| AriaError::Transport(format!("connect to {} timed out", self.addr)))?
            .map_err(|e| AriaError::Transport(format!("connect to {} failed: {e}", self.addr)))?;
        stream.set_nodelay(true).ok();
        info!(addr = %self.addr, "connected to automation service");
        let (read_half, writer) = stream.into_split();
        Ok(Connection {
            reader: BufReader::new(read_half),
            writer,
        })
    }

    /// Send one request and wait for its response line.
    ///
    /// `success: false` answers surface as [`AriaError::Automation`]; the
    /// connection stays up. Transport failures drop the connection.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let mut guard = self.conn.lock().await;
        if guard.is_none() {
            *guard = Some(self.connect().await?);
        }
        let Some(conn) = guard.as_mut() else {
            return Err(AriaError::Transport("no connection".into()));
        };

        let line = protocol::encode_line(&RpcRequest::new(method, params))?;
        let response = match self.exchange(conn, &line).await {
            Ok(response) => response,
            Err(e) => {
                warn!(addr = %self.addr, method, error = %e, "automation transport error, dropping connection");
                *guard = None;
                return Err(e);
            }
        };
        drop(guard);

        debug!(method, success = response.success, "automation response");
        response.into_result().map_err(|reason| AriaError::Automation {
            method: method.to_string(),
            reason,
        })
    }

    async fn exchange(&self, conn: &mut Connection, line: &str) -> Result<RpcResponse> {
        conn.writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| AriaError::Transport(format!("write failed: {e}")))?;
        conn.writer
            .flush()
            .await
            .map_err(|e| AriaError::Transport(format!("write failed: {e}")))?;

        let mut reply = String::new();
        let read = tokio::time::timeout(self.read_timeout, conn.reader.read_line(&mut reply))
            .await
            .map_err(|_| {
                AriaError::Transport(format!(
                    "no response within {}ms",
                    self.read_timeout.as_millis()
                ))
            })?
            .map_err(|e| AriaError::Transport(format!("read failed: {e}")))?;
        if read == 0 {
            return Err(AriaError::Transport("connection closed by service".into()));
        }

        serde_json::from_str::<RpcResponse>(reply.trim())
            .map_err(|e| AriaError::Transport(format!("malformed response: {e}")))
    }

    async fn call_as<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let value = self.call(method, params).await?;
        Ok(serde_json::from_value(value)?)
    }

    fn flag(value: &Value, key: &str) -> bool {
        value[key].as_bool().unwrap_or(false)
    }

    // ── Typed commands ─────────────────────────────────────────

    pub async fn ping(&self) -> Result<Value> {
        self.call("ping", json!({})).await
    }

    pub async fn screen_elements(&self) -> Result<Vec<UiElement>> {
        self.call_as("get_screen_elements", json!({})).await
    }

    pub async fn screen_text(&self) -> Result<String> {
        let value = self.call("get_screen_text", json!({})).await?;
        Ok(value["text"].as_str().unwrap_or_default().to_string())
    }

    pub async fn focused_app(&self) -> Result<String> {
        let value = self.call("get_focused_app", json!({})).await?;
        Ok(value["package"].as_str().unwrap_or_default().to_string())
    }

    pub async fn find_by_text(&self, text: &str) -> Result<Vec<UiElement>> {
        self.call_as("find_element_by_text", json!({ "text": text })).await
    }

    pub async fn find_by_id(&self, view_id: &str) -> Result<Vec<UiElement>> {
        self.call_as("find_element_by_id", json!({ "id": view_id })).await
    }

    pub async fn tap_element(&self, node_id: NodeId) -> Result<bool> {
        let value = self.call("tap_element", json!({ "nodeId": node_id })).await?;
        Ok(Self::flag(&value, "clicked"))
    }

    pub async fn tap_coords(&self, x: f64, y: f64) -> Result<bool> {
        let value = self.call("tap_coords", json!({ "x": x, "y": y })).await?;
        Ok(Self::flag(&value, "tapped"))
    }

    pub async fn swipe(&self, x1: f64, y1: f64, x2: f64, y2: f64, duration_ms: u64) -> Result<bool> {
        let params = json!({ "x1": x1, "y1": y1, "x2": x2, "y2": y2, "duration": duration_ms });
        let value = self.call("swipe", params).await?;
        Ok(Self::flag(&value, "swiped"))
    }

    pub async fn type_text(&self, text: &str) -> Result<bool> {
        let value = self.call("type_text", json!({ "text": text })).await?;
        Ok(Self::flag(&value, "typed"))
    }

    pub async fn press(&self, action: GlobalAction) -> Result<bool> {
        let value = self.call(&format!("press_{}", action.as_str()), json!({})).await?;
        Ok(Self::flag(&value, "performed"))
    }

    /// Scroll forward (`true`) or backward inside `node_id`, or the first scrollable node.
    pub async fn scroll(&self, forward: bool, node_id: Option<NodeId>) -> Result<bool> {
        let method = if forward { "scroll_forward" } else { "scroll_backward" };
        let params = match node_id {
            Some(id) => json!({ "nodeId": id }),
            None => json!({}),
        };
        let value = self.call(method, params).await?;
        Ok(Self::flag(&value, "scrolled"))
    }
}
