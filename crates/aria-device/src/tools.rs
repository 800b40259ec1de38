//! Phone tool definitions and executor.
//!
//! Screen tools go through the automation protocol client; telephony and app
//! tools are thin wrappers over ADB. Every tool is registered into a
//! [`ToolRegistry`] under its own name and dispatched back here by name.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use aria_core::{AriaError, Result, ToolArgs, ToolDefinition, ToolHandler, ToolRegistry};
use serde_json::json;
use tracing::info;

use crate::android::{self, AndroidBridge};
use crate::client::AutomationClient;
use crate::dispatcher::DEFAULT_SWIPE_DURATION_MS;
use crate::snapshot::{NodeId, UiElement};
use crate::source::GlobalAction;

/// Friendly app names → package names.
const APP_ALIASES: &[(&str, &str)] = &[
    ("youtube", "com.google.android.youtube"),
    ("chrome", "com.android.chrome"),
    ("google chrome", "com.android.chrome"),
    ("maps", "com.google.android.apps.maps"),
    ("google maps", "com.google.android.apps.maps"),
    ("gmail", "com.google.android.gm"),
    ("phone", "com.google.android.dialer"),
    ("dialer", "com.google.android.dialer"),
    ("messages", "com.google.android.apps.messaging"),
    ("sms", "com.google.android.apps.messaging"),
    ("camera", "com.google.android.GoogleCamera"),
    ("settings", "com.android.settings"),
    ("calculator", "com.google.android.calculator"),
    ("calendar", "com.google.android.calendar"),
    ("contacts", "com.google.android.contacts"),
    ("clock", "com.google.android.deskclock"),
    ("alarm", "com.google.android.deskclock"),
    ("spotify", "com.spotify.music"),
    ("netflix", "com.netflix.mediaclient"),
    ("instagram", "com.instagram.android"),
    ("whatsapp", "com.whatsapp"),
    ("uber", "com.ubercabs.rider"),
    ("files", "com.google.android.documentsui"),
    ("photos", "com.google.android.apps.photos"),
    ("gallery", "com.google.android.apps.photos"),
];

/// Resolve an app name or package name to a package.
pub fn resolve_package(app: &str) -> Option<String> {
    let wanted = app.trim().to_lowercase();
    if wanted.is_empty() {
        return None;
    }
    if let Some((_, pkg)) = APP_ALIASES.iter().find(|(alias, _)| *alias == wanted) {
        return Some(pkg.to_string());
    }
    if wanted.contains('.') && !wanted.contains(' ') {
        return Some(app.trim().to_string());
    }
    None
}

/// Render elements worth acting on, one per line.
pub fn format_elements(elements: &[UiElement]) -> String {
    let mut out = String::new();
    for el in elements {
        let label = el.label();
        let actionable = el.is_clickable || el.is_editable || el.is_scrollable;
        if label.is_empty() && !actionable {
            continue;
        }
        let class = el.class_name.rsplit('.').next().unwrap_or(&el.class_name);
        let (x, y) = el.bounds.center();
        let _ = write!(out, "[{}] {class}", el.node_id);
        if !label.is_empty() {
            let _ = write!(out, " \"{label}\"");
        }
        let mut flags = Vec::new();
        if el.is_clickable {
            flags.push("clickable");
        }
        if el.is_editable {
            flags.push("editable");
        }
        if el.is_scrollable {
            flags.push("scrollable");
        }
        if el.is_focused {
            flags.push("focused");
        }
        if !el.is_enabled {
            flags.push("disabled");
        }
        if !flags.is_empty() {
            let _ = write!(out, " ({})", flags.join(", "));
        }
        let _ = writeln!(out, " @ ({x},{y})");
    }
    if out.is_empty() {
        out.push_str("(no actionable elements on screen)");
    }
    out.trim_end().to_string()
}

/// Holds the device backends and executes tool calls by name.
pub struct DeviceTools {
    pub client: Arc<AutomationClient>,
    pub android: Arc<AndroidBridge>,
}

impl DeviceTools {
    pub fn new(client: Arc<AutomationClient>, android: Arc<AndroidBridge>) -> Self {
        Self { client, android }
    }

    /// Register every phone tool into `registry`.
    pub fn register_all(self: &Arc<Self>, registry: &mut ToolRegistry) -> Result<usize> {
        let definitions = Self::definitions();
        let count = definitions.len();
        for definition in definitions {
            let handler = Arc::new(DeviceTool {
                tools: Arc::clone(self),
                name: definition.name.clone(),
            });
            registry.register(definition, handler)?;
        }
        info!(count, "device tools registered");
        Ok(count)
    }

    /// All phone tool definitions for the LLM.
    pub fn definitions() -> Vec<ToolDefinition> {
        vec![
            // ── Screen ────────────────────────────────────────
            ToolDefinition::new(
                "read_screen",
                "Read the visible text of the current screen and the foreground app's package.",
                json!({ "type": "object", "properties": {} }),
            ),
            ToolDefinition::new(
                "get_screen_elements",
                "List the elements on the current screen with their node ids. Optionally filter by visible text. Node ids are only valid until the next listing.",
                json!({
                    "type": "object",
                    "properties": {
                        "filter": { "type": "string", "description": "Only elements whose text or description contains this" }
                    }
                }),
            ),
            ToolDefinition::new(
                "tap_element",
                "Tap an element by the node id from the most recent get_screen_elements call.",
                json!({
                    "type": "object",
                    "properties": {
                        "node_id": { "type": "integer", "description": "Node id from get_screen_elements" }
                    },
                    "required": ["node_id"]
                }),
            ),
            ToolDefinition::new(
                "tap_text",
                "Find an element showing the given text and tap it.",
                json!({
                    "type": "object",
                    "properties": {
                        "text": { "type": "string", "description": "Visible text or description of the element" }
                    },
                    "required": ["text"]
                }),
            ),
            ToolDefinition::new(
                "tap_coordinates",
                "Tap the screen at pixel coordinates.",
                json!({
                    "type": "object",
                    "properties": {
                        "x": { "type": "number" },
                        "y": { "type": "number" }
                    },
                    "required": ["x", "y"]
                }),
            ),
            ToolDefinition::new(
                "swipe",
                "Swipe between two points on the screen.",
                json!({
                    "type": "object",
                    "properties": {
                        "x1": { "type": "number" },
                        "y1": { "type": "number" },
                        "x2": { "type": "number" },
                        "y2": { "type": "number" },
                        "duration_ms": { "type": "integer", "description": "Default: 300" }
                    },
                    "required": ["x1", "y1", "x2", "y2"]
                }),
            ),
            ToolDefinition::new(
                "scroll",
                "Scroll a list up or down. Targets the given node or the first scrollable element.",
                json!({
                    "type": "object",
                    "properties": {
                        "direction": { "type": "string", "enum": ["down", "up"] },
                        "node_id": { "type": "integer" }
                    },
                    "required": ["direction"]
                }),
            ),
            ToolDefinition::new(
                "type_text",
                "Type text into the currently focused input field.",
                json!({
                    "type": "object",
                    "properties": {
                        "text": { "type": "string" }
                    },
                    "required": ["text"]
                }),
            ),
            ToolDefinition::new(
                "press_button",
                "Press a system button: back, home, recents or notifications.",
                json!({
                    "type": "object",
                    "properties": {
                        "button": { "type": "string", "enum": ["back", "home", "recents", "notifications"] }
                    },
                    "required": ["button"]
                }),
            ),
            // ── Apps & telephony ──────────────────────────────
            ToolDefinition::new(
                "open_app",
                "Open an app by name (e.g. \"spotify\", \"maps\") or package name.",
                json!({
                    "type": "object",
                    "properties": {
                        "app": { "type": "string" }
                    },
                    "required": ["app"]
                }),
            ),
            ToolDefinition::new(
                "send_sms",
                "Send a text message to a contact name or phone number.",
                json!({
                    "type": "object",
                    "properties": {
                        "to": { "type": "string", "description": "Contact name or phone number" },
                        "message": { "type": "string" }
                    },
                    "required": ["to", "message"]
                }),
            ),
            ToolDefinition::new(
                "make_call",
                "Call a contact name or phone number.",
                json!({
                    "type": "object",
                    "properties": {
                        "to": { "type": "string", "description": "Contact name or phone number" }
                    },
                    "required": ["to"]
                }),
            ),
            ToolDefinition::new(
                "search_contacts",
                "Search contacts by name or number.",
                json!({
                    "type": "object",
                    "properties": {
                        "query": { "type": "string" },
                        "limit": { "type": "integer", "description": "Default: 10" }
                    },
                    "required": ["query"]
                }),
            ),
        ]
    }

    /// Execute a phone tool by name.
    pub async fn execute(&self, name: &str, args: &ToolArgs) -> Result<String> {
        match name {
            // ── Screen ────────────────────────────────────────
            "read_screen" => {
                let app = self.client.focused_app().await?;
                let text = self.client.screen_text().await?;
                let text = if text.trim().is_empty() {
                    "(no text on screen)".to_string()
                } else {
                    text
                };
                Ok(format!("Foreground app: {app}\n\n{text}"))
            }
            "get_screen_elements" => {
                let elements = match args.str("filter").filter(|f| !f.trim().is_empty()) {
                    Some(filter) => self.client.find_by_text(filter).await?,
                    None => self.client.screen_elements().await?,
                };
                Ok(format_elements(&elements))
            }
            "tap_element" => {
                let id = node_id_arg(name, args, "node_id")?.ok_or_else(|| AriaError::InvalidArguments {
                    tool: name.into(),
                    reason: "missing 'node_id' argument".into(),
                })?;
                let clicked = self.client.tap_element(id).await?;
                Ok(if clicked {
                    format!("Tapped element {id}")
                } else {
                    format!("Element {id} did not accept the tap")
                })
            }
            "tap_text" => {
                let text = args.require_str(name, "text")?;
                let matches = self.client.find_by_text(text).await?;
                let target = matches
                    .iter()
                    .find(|e| e.is_clickable && e.is_enabled)
                    .or_else(|| matches.first())
                    .ok_or_else(|| AriaError::tool(name, format!("no element showing '{text}'")))?;
                let label = target.label().to_string();
                if target.is_clickable {
                    self.client.tap_element(target.node_id).await?;
                } else {
                    let (x, y) = target.bounds.center();
                    self.client.tap_coords(x as f64, y as f64).await?;
                }
                Ok(format!("Tapped \"{label}\""))
            }
            "tap_coordinates" => {
                let (x, y) = (args.float_or("x", 0.0), args.float_or("y", 0.0));
                self.client.tap_coords(x, y).await?;
                Ok(format!("Tapped ({x}, {y})"))
            }
            "swipe" => {
                let (x1, y1) = (args.float_or("x1", 0.0), args.float_or("y1", 0.0));
                let (x2, y2) = (args.float_or("x2", 0.0), args.float_or("y2", 0.0));
                let duration = args.long_or("duration_ms", DEFAULT_SWIPE_DURATION_MS as i64).max(1) as u64;
                self.client.swipe(x1, y1, x2, y2, duration).await?;
                Ok(format!("Swiped ({x1}, {y1}) to ({x2}, {y2}) over {duration}ms"))
            }
            "scroll" => {
                let direction = args.string_or("direction", "down").to_lowercase();
                let forward = match direction.as_str() {
                    "down" | "forward" => true,
                    "up" | "backward" => false,
                    other => {
                        return Err(AriaError::InvalidArguments {
                            tool: name.into(),
                            reason: format!("unknown direction '{other}'"),
                        });
                    }
                };
                let node = node_id_arg(name, args, "node_id")?;
                let scrolled = self.client.scroll(forward, node).await?;
                Ok(if scrolled {
                    format!("Scrolled {direction}")
                } else {
                    "Nothing scrolled (already at the end?)".to_string()
                })
            }
            "type_text" => {
                let text = args.str("text").unwrap_or_default();
                self.client.type_text(text).await?;
                Ok(format!("Typed {} characters", text.chars().count()))
            }
            "press_button" => {
                let button = args.require_str(name, "button")?;
                let action = GlobalAction::parse(button).ok_or_else(|| AriaError::InvalidArguments {
                    tool: name.into(),
                    reason: format!("unknown button '{button}'"),
                })?;
                self.client.press(action).await?;
                Ok(format!("Pressed {}", action.as_str()))
            }

            // ── Apps & telephony ──────────────────────────────
            "open_app" => {
                let app = args.require_str(name, "app")?;
                let package = resolve_package(app)
                    .ok_or_else(|| AriaError::tool(name, format!("unknown app '{app}'")))?;
                self.android.launch_app(&package).await?;
                Ok(format!("Opened {app} ({package})"))
            }
            "send_sms" => {
                let to = args.require_str(name, "to")?;
                let message = args.require_str(name, "message")?;
                let (display, number) = self.recipient(name, to).await?;
                self.android.send_sms(&number, message).await?;
                Ok(format!("SMS sent to {display} ({number})"))
            }
            "make_call" => {
                let to = args.require_str(name, "to")?;
                let (display, number) = self.recipient(name, to).await?;
                let dialed = self.android.dial(&number).await?;
                Ok(format!("Calling {display} ({dialed})"))
            }
            "search_contacts" => {
                let query = args.require_str(name, "query")?;
                let limit = args.int_or("limit", 10).clamp(1, 100) as usize;
                let contacts = self.android.search_contacts(query, limit).await?;
                if contacts.is_empty() {
                    return Ok(format!("No contacts matching '{query}'"));
                }
                Ok(contacts
                    .iter()
                    .map(|c| format!("{}: {}", c.name, c.numbers.join(", ")))
                    .collect::<Vec<_>>()
                    .join("\n"))
            }

            other => Err(AriaError::ToolNotFound(other.to_string())),
        }
    }

    /// Resolve a contact name or raw number to `(display name, number)`.
    async fn recipient(&self, tool: &str, to: &str) -> Result<(String, String)> {
        if android::is_phone_number(to) {
            return Ok((to.to_string(), android::dialable(to)));
        }
        let contact = self
            .android
            .find_contact(to)
            .await?
            .ok_or_else(|| AriaError::tool(tool, format!("no contact found matching '{to}'")))?;
        let number = contact
            .primary_number()
            .ok_or_else(|| AriaError::tool(tool, format!("{} has no phone number", contact.name)))?
            .to_string();
        Ok((contact.name, number))
    }
}

fn node_id_arg(tool: &str, args: &ToolArgs, key: &str) -> Result<Option<NodeId>> {
    let Some(value) = args.get(key).filter(|v| !v.is_null()) else {
        return Ok(None);
    };
    value
        .as_i64()
        .filter(|n| *n >= 0)
        .map(|n| Some(NodeId::from_raw(n as u64)))
        .ok_or_else(|| AriaError::InvalidArguments {
            tool: tool.to_string(),
            reason: format!("'{key}' must be a node id from get_screen_elements"),
        })
}

/// Registry entry for one named phone tool.
struct DeviceTool {
    tools: Arc<DeviceTools>,
    name: String,
}

#[async_trait]
impl ToolHandler for DeviceTool {
    async fn call(&self, args: &ToolArgs) -> Result<String> {
        self.tools.execute(&self.name, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SnapshotBuilder;
    use crate::source::{Bounds, UiNode};

    #[test]
    fn aliases_and_packages() {
        assert_eq!(resolve_package("Spotify").as_deref(), Some("com.spotify.music"));
        assert_eq!(resolve_package(" maps ").as_deref(), Some("com.google.android.apps.maps"));
        assert_eq!(resolve_package("org.mozilla.firefox").as_deref(), Some("org.mozilla.firefox"));
        assert_eq!(resolve_package("some app"), None);
        assert_eq!(resolve_package(""), None);
    }

    #[test]
    fn definitions_are_unique_and_registrable() {
        let defs = DeviceTools::definitions();
        let mut registry = ToolRegistry::new();
        for def in defs.iter().cloned() {
            registry
                .register(def, aria_core::tool_fn(|_| async { Ok(String::new()) }))
                .unwrap();
        }
        assert_eq!(registry.len(), defs.len());
        let sms = registry.definition("send_sms").unwrap();
        assert_eq!(sms.required_fields(), vec!["to", "message"]);
    }

    #[test]
    fn element_listing_skips_inert_nodes() {
        let root = UiNode::new("android.widget.FrameLayout")
            .with_child(
                UiNode::new("android.widget.Button")
                    .with_text("Send")
                    .clickable()
                    .with_bounds(Bounds::new(0, 0, 100, 50)),
            )
            .with_child(UiNode::new("android.widget.EditText").editable().focused());
        let elements = SnapshotBuilder::describe(&root);
        let listing = format_elements(&elements);
        let lines: Vec<_> = listing.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "[1] Button \"Send\" (clickable) @ (50,25)");
        assert!(lines[1].ends_with("EditText (editable, focused) @ (0,0)"));

        assert_eq!(format_elements(&[]), "(no actionable elements on screen)");
    }
}
