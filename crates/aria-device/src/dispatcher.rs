use std::sync::Arc;
use std::time::{Duration, Instant};

use aria_core::AriaError;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, warn};

use crate::protocol::{RpcRequest, RpcResponse};
use crate::snapshot::{self, NodeId, SnapshotBuilder};
use crate::source::{GlobalAction, Gesture, NodeAction, UiNode, UiSource, UiSourceHandle};

/// Default swipe duration when the request does not name one.
pub const DEFAULT_SWIPE_DURATION_MS: u64 = 300;

/// A command failure. The display text is exactly what goes on the wire.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Accessibility service not connected")]
    NotConnected,

    #[error("No active window")]
    NoActiveWindow,

    #[error("missing required param: {0}")]
    MissingParam(&'static str),

    #[error("Node not found with id: {0}")]
    NodeNotFound(NodeId),

    #[error("No focused input field found")]
    NoFocusedInput,

    #[error("unknown method: {0}")]
    UnknownMethod(String),

    #[error("command timed out: {0}")]
    Timeout(String),

    #[error("{0}")]
    Source(#[from] AriaError),

    #[error("{0}")]
    Encode(#[from] serde_json::Error),
}

/// Maps named automation commands onto the bound UI source.
pub struct CommandDispatcher {
    source: UiSourceHandle,
    snapshots: SnapshotBuilder,
    service_name: String,
    command_timeout: Duration,
}

impl CommandDispatcher {
    pub fn new(source: UiSourceHandle) -> Self {
        Self {
            source,
            snapshots: SnapshotBuilder::new(),
            service_name: "aria-accessibility".into(),
            command_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn source(&self) -> &UiSourceHandle {
        &self.source
    }

    /// Run one request under the per-command timeout. Never fails: every
    /// problem is answered as `success: false`.
    pub async fn dispatch(&self, request: &RpcRequest) -> RpcResponse {
        let start = Instant::now();
        let outcome = match tokio::time::timeout(self.command_timeout, self.execute(request)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(CommandError::Timeout(request.method.clone())),
        };
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(result) => {
                debug!(method = %request.method, elapsed_ms, "command ok");
                RpcResponse::ok(result)
            }
            Err(e) => {
                match &e {
                    CommandError::Source(_) | CommandError::Timeout(_) | CommandError::Encode(_) => {
                        warn!(method = %request.method, elapsed_ms, error = %e, "command failed")
                    }
                    _ => debug!(method = %request.method, elapsed_ms, error = %e, "command rejected"),
                }
                RpcResponse::err(e.to_string())
            }
        }
    }

    async fn execute(&self, req: &RpcRequest) -> Result<Value, CommandError> {
        match req.method.as_str() {
            "ping" => Ok(json!({ "status": "ok", "service": self.service_name })),

            // ── Snapshots ──────────────────────────────────────
            "get_screen_elements" => {
                let (_, root) = self.foreground().await?;
                Ok(serde_json::to_value(self.snapshots.capture(&root))?)
            }
            "get_screen_text" => {
                let (_, root) = self.foreground().await?;
                Ok(json!({ "text": snapshot::screen_text(&root) }))
            }
            "get_focused_app" => {
                let (_, root) = self.foreground().await?;
                let package = snapshot::flatten(&root)
                    .into_iter()
                    .find_map(|n| n.package.clone())
                    .unwrap_or_default();
                Ok(json!({ "package": package }))
            }
            "find_element_by_text" => {
                let needle = str_param(req, "text")?;
                let (_, root) = self.foreground().await?;
                let found: Vec<_> = self
                    .snapshots
                    .capture(&root)
                    .into_iter()
                    .filter(|e| snapshot::matches_text(e, needle))
                    .collect();
                Ok(serde_json::to_value(found)?)
            }
            "find_element_by_id" => {
                let id = str_param(req, "id")?;
                let (_, root) = self.foreground().await?;
                let found: Vec<_> = self
                    .snapshots
                    .capture(&root)
                    .into_iter()
                    .filter(|e| snapshot::matches_view_id(e, id))
                    .collect();
                Ok(serde_json::to_value(found)?)
            }

            // ── Node actions ───────────────────────────────────
            "tap_element" => {
                let id = node_id_param(req)?.ok_or(CommandError::MissingParam("nodeId"))?;
                let (source, root) = self.foreground().await?;
                let (index, node) = self.resolve(&root, id)?;
                let clicked = source.perform_action(index, node, NodeAction::Click).await?;
                Ok(json!({ "clicked": clicked }))
            }
            "scroll_forward" => self.scroll(req, NodeAction::ScrollForward, "forward").await,
            "scroll_backward" => self.scroll(req, NodeAction::ScrollBackward, "backward").await,
            "type_text" => {
                let text = str_param(req, "text")?;
                let (source, root) = self.foreground().await?;
                let (index, node) = snapshot::flatten(&root)
                    .into_iter()
                    .enumerate()
                    .find(|(_, n)| n.focused && n.editable)
                    .ok_or(CommandError::NoFocusedInput)?;
                let typed = source
                    .perform_action(index, node, NodeAction::SetText(text.to_string()))
                    .await?;
                Ok(json!({ "typed": typed, "text": text }))
            }

            // ── Gestures ───────────────────────────────────────
            "tap_coords" => {
                let x = num_param(req, "x")?;
                let y = num_param(req, "y")?;
                let source = self.bound()?;
                let tapped = source.dispatch_gesture(Gesture::Tap { x, y }).await?;
                Ok(json!({ "tapped": tapped, "x": x, "y": y }))
            }
            "swipe" => {
                let gesture = Gesture::Swipe {
                    x1: num_param(req, "x1")?,
                    y1: num_param(req, "y1")?,
                    x2: num_param(req, "x2")?,
                    y2: num_param(req, "y2")?,
                    duration_ms: req
                        .param("duration")
                        .and_then(Value::as_f64)
                        .filter(|d| *d > 0.0)
                        .map(|d| d as u64)
                        .unwrap_or(DEFAULT_SWIPE_DURATION_MS),
                };
                let source = self.bound()?;
                let swiped = source.dispatch_gesture(gesture).await?;
                Ok(json!({ "swiped": swiped }))
            }

            // ── Global actions ─────────────────────────────────
            "press_back" => self.global(GlobalAction::Back).await,
            "press_home" => self.global(GlobalAction::Home).await,
            "press_recents" => self.global(GlobalAction::Recents).await,
            "press_notifications" => self.global(GlobalAction::Notifications).await,

            other => Err(CommandError::UnknownMethod(other.to_string())),
        }
    }

    fn bound(&self) -> Result<Arc<dyn UiSource>, CommandError> {
        self.source.current().ok_or(CommandError::NotConnected)
    }

    async fn foreground(&self) -> Result<(Arc<dyn UiSource>, UiNode), CommandError> {
        let source = self.bound()?;
        let root = source.foreground().await?.ok_or(CommandError::NoActiveWindow)?;
        Ok((source, root))
    }

    fn resolve<'a>(&self, root: &'a UiNode, id: NodeId) -> Result<(usize, &'a UiNode), CommandError> {
        self.snapshots.resolve(root, id).map_err(|why| {
            debug!(node_id = %id, generation = id.generation(), reason = %why, "node resolution failed");
            CommandError::NodeNotFound(id)
        })
    }

    async fn scroll(
        &self,
        req: &RpcRequest,
        action: NodeAction,
        direction: &str,
    ) -> Result<Value, CommandError> {
        let target = node_id_param(req)?;
        let (source, root) = self.foreground().await?;
        let (index, node) = match target {
            Some(id) => self.resolve(&root, id)?,
            None => snapshot::flatten(&root)
                .into_iter()
                .enumerate()
                .find(|(_, n)| n.scrollable)
                .unwrap_or((0, &root)),
        };
        let scrolled = source.perform_action(index, node, action).await?;
        Ok(json!({ "scrolled": scrolled, "direction": direction }))
    }

    async fn global(&self, action: GlobalAction) -> Result<Value, CommandError> {
        let source = self.bound()?;
        let performed = source.global_action(action).await?;
        Ok(json!({ "action": action.as_str(), "performed": performed }))
    }
}

// ─── Param helpers ────────────────────────────────────────────────

fn str_param<'a>(req: &'a RpcRequest, name: &'static str) -> Result<&'a str, CommandError> {
    req.param(name)
        .and_then(Value::as_str)
        .ok_or(CommandError::MissingParam(name))
}

fn num_param(req: &RpcRequest, name: &'static str) -> Result<f64, CommandError> {
    req.param(name)
        .and_then(Value::as_f64)
        .ok_or(CommandError::MissingParam(name))
}

/// `nodeId` is optional for scrolls, so absence is `Ok(None)`; a present but
/// unusable value is an error.
fn node_id_param(req: &RpcRequest) -> Result<Option<NodeId>, CommandError> {
    match req.param("nodeId") {
        None => Ok(None),
        Some(raw) => NodeId::from_json(raw)
            .map(Some)
            .ok_or(CommandError::MissingParam("nodeId")),
    }
}
