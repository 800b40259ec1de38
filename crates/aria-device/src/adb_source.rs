//! A [`UiSource`] backed by ADB: `uiautomator dump` for the tree, `input`
//! commands for actions. Slower than an on-device accessibility service but
//! needs nothing installed on the phone.

use std::sync::Arc;

use async_trait::async_trait;
use aria_core::{AriaError, Result};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::debug;

use crate::android::AndroidBridge;
use crate::source::{Bounds, Gesture, GlobalAction, NodeAction, UiNode, UiSource};

pub struct AdbUiSource {
    bridge: Arc<AndroidBridge>,
}

impl AdbUiSource {
    pub fn new(bridge: Arc<AndroidBridge>) -> Self {
        Self { bridge }
    }

    /// Swipe inside `bounds` between 75% and 25% of its height.
    async fn scroll_within(&self, bounds: Bounds, forward: bool) -> Result<bool> {
        let (x, _) = bounds.center();
        let low = bounds.top + bounds.height() * 3 / 4;
        let high = bounds.top + bounds.height() / 4;
        let (from, to) = if forward { (low, high) } else { (high, low) };
        self.bridge.swipe(x, from, x, to, 300).await?;
        Ok(true)
    }
}

#[async_trait]
impl UiSource for AdbUiSource {
    fn name(&self) -> &str {
        "adb-uiautomator"
    }

    async fn foreground(&self) -> Result<Option<UiNode>> {
        let xml = self.bridge.dump_ui().await?;
        parse_hierarchy(&xml)
    }

    async fn perform_action(&self, index: usize, node: &UiNode, action: NodeAction) -> Result<bool> {
        debug!(index, class = %node.class_name, ?action, "adb node action");
        match action {
            NodeAction::Click => {
                let (x, y) = node.bounds.center();
                self.bridge.tap(x, y).await?;
                Ok(true)
            }
            NodeAction::ScrollForward => self.scroll_within(node.bounds, true).await,
            NodeAction::ScrollBackward => self.scroll_within(node.bounds, false).await,
            NodeAction::SetText(text) => {
                self.bridge.type_text(&text).await?;
                Ok(true)
            }
        }
    }

    async fn global_action(&self, action: GlobalAction) -> Result<bool> {
        match action {
            GlobalAction::Back => self.bridge.press_key("back").await?,
            GlobalAction::Home => self.bridge.press_key("home").await?,
            GlobalAction::Recents => self.bridge.press_key("recents").await?,
            GlobalAction::Notifications => self.bridge.expand_notifications().await?,
        }
        Ok(true)
    }

    async fn dispatch_gesture(&self, gesture: Gesture) -> Result<bool> {
        match gesture {
            Gesture::Tap { x, y } => self.bridge.tap(x.round() as i32, y.round() as i32).await?,
            Gesture::Swipe {
                x1,
                y1,
                x2,
                y2,
                duration_ms,
            } => {
                self.bridge
                    .swipe(
                        x1.round() as i32,
                        y1.round() as i32,
                        x2.round() as i32,
                        y2.round() as i32,
                        duration_ms,
                    )
                    .await?
            }
        }
        Ok(true)
    }
}

// ─── uiautomator XML ─────────────────────────────────────────────

/// Parse a `uiautomator dump` document into a tree.
///
/// A document with several top-level `node`s (multi-window dumps) gets a
/// synthetic root; one with none yields `None`.
pub fn parse_hierarchy(xml: &str) -> Result<Option<UiNode>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<UiNode> = Vec::new();
    let mut roots: Vec<UiNode> = Vec::new();

    loop {
        let event = reader.read_event().map_err(|e| {
            AriaError::Device(format!(
                "malformed UI hierarchy at byte {}: {e}",
                reader.buffer_position()
            ))
        })?;
        match event {
            Event::Start(e) if e.name().as_ref() == b"node" => stack.push(node_from(&e)),
            Event::Empty(e) if e.name().as_ref() == b"node" => {
                attach(node_from(&e), &mut stack, &mut roots)
            }
            Event::End(e) if e.name().as_ref() == b"node" => {
                let node = stack
                    .pop()
                    .ok_or_else(|| AriaError::Device("unbalanced </node> in UI hierarchy".into()))?;
                attach(node, &mut stack, &mut roots);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(AriaError::Device("truncated UI hierarchy".into()));
    }

    Ok(match roots.len() {
        0 => None,
        1 => roots.pop(),
        _ => {
            let mut root = UiNode::new("hierarchy");
            root.bounds = roots.iter().fold(Bounds::default(), |acc, n| Bounds {
                left: acc.left.min(n.bounds.left),
                top: acc.top.min(n.bounds.top),
                right: acc.right.max(n.bounds.right),
                bottom: acc.bottom.max(n.bounds.bottom),
            });
            root.children = roots;
            Some(root)
        }
    })
}

fn attach(node: UiNode, stack: &mut [UiNode], roots: &mut Vec<UiNode>) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => roots.push(node),
    }
}

fn node_from(start: &BytesStart<'_>) -> UiNode {
    let mut node = UiNode::default();
    for attr in start.attributes().flatten() {
        let raw = String::from_utf8_lossy(&attr.value);
        let value = quick_xml::escape::unescape(&raw)
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| raw.to_string());
        match attr.key.as_ref() {
            b"resource-id" => node.view_id = non_empty(value),
            b"text" => node.text = non_empty(value),
            b"content-desc" => node.description = non_empty(value),
            b"class" => node.class_name = value,
            b"package" => node.package = non_empty(value),
            b"bounds" => node.bounds = parse_bounds(&value).unwrap_or_default(),
            b"clickable" => node.clickable = value == "true",
            b"scrollable" => node.scrollable = value == "true",
            b"enabled" => node.enabled = value == "true",
            b"focused" => node.focused = value == "true",
            _ => {}
        }
    }
    node.editable = node.class_name.contains("EditText");
    node
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

/// `"[0,63][1080,2337]"` → bounds.
pub fn parse_bounds(raw: &str) -> Option<Bounds> {
    let nums: Vec<i32> = raw
        .split(|c: char| c == '[' || c == ']' || c == ',')
        .filter(|s| !s.is_empty())
        .map(|s| s.trim().parse::<i32>())
        .collect::<std::result::Result<_, _>>()
        .ok()?;
    match nums.as_slice() {
        [left, top, right, bottom] => Some(Bounds::new(*left, *top, *right, *bottom)),
        _ => None,
    }
}
