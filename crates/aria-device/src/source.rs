//! The UI-source capability: whatever can hand out the current foreground
//! element tree and act on it (an accessibility service, `uiautomator` over
//! ADB, or an in-memory tree in tests).

use std::sync::Arc;

use async_trait::async_trait;
use aria_core::Result;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Screen rectangle in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Bounds {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn center(&self) -> (i32, i32) {
        ((self.left + self.right) / 2, (self.top + self.bottom) / 2)
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

/// One node of a live UI tree. Children are owned, so a tree is dropped as a whole.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UiNode {
    pub view_id: Option<String>,
    pub text: Option<String>,
    pub description: Option<String>,
    pub class_name: String,
    pub package: Option<String>,
    pub bounds: Bounds,
    pub clickable: bool,
    pub editable: bool,
    pub scrollable: bool,
    pub enabled: bool,
    pub focused: bool,
    pub children: Vec<UiNode>,
}

impl UiNode {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            enabled: true,
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_view_id(mut self, id: impl Into<String>) -> Self {
        self.view_id = Some(id.into());
        self
    }

    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = Some(package.into());
        self
    }

    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn clickable(mut self) -> Self {
        self.clickable = true;
        self
    }

    pub fn editable(mut self) -> Self {
        self.editable = true;
        self
    }

    pub fn scrollable(mut self) -> Self {
        self.scrollable = true;
        self
    }

    pub fn focused(mut self) -> Self {
        self.focused = true;
        self
    }

    pub fn with_child(mut self, child: UiNode) -> Self {
        self.children.push(child);
        self
    }
}

/// An action against a single resolved node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeAction {
    Click,
    ScrollForward,
    ScrollBackward,
    SetText(String),
}

/// A system-wide navigation action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalAction {
    Back,
    Home,
    Recents,
    Notifications,
}

impl GlobalAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            GlobalAction::Back => "back",
            GlobalAction::Home => "home",
            GlobalAction::Recents => "recents",
            GlobalAction::Notifications => "notifications",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "back" => Some(GlobalAction::Back),
            "home" => Some(GlobalAction::Home),
            "recents" | "recent" | "overview" => Some(GlobalAction::Recents),
            "notifications" | "notification" => Some(GlobalAction::Notifications),
            _ => None,
        }
    }
}

/// A geometric gesture, dispatched without any tree lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    Tap {
        x: f64,
        y: f64,
    },
    Swipe {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        duration_ms: u64,
    },
}

/// Source of the current foreground UI.
#[async_trait]
pub trait UiSource: Send + Sync {
    /// Human-readable name for logs.
    fn name(&self) -> &str;

    /// The root of the foreground window, or `None` when no window is active.
    async fn foreground(&self) -> Result<Option<UiNode>>;

    /// Act on the node at pre-order position `index` of the tree last returned
    /// by [`foreground`](UiSource::foreground).
    async fn perform_action(&self, index: usize, node: &UiNode, action: NodeAction) -> Result<bool>;

    async fn global_action(&self, action: GlobalAction) -> Result<bool>;

    async fn dispatch_gesture(&self, gesture: Gesture) -> Result<bool>;
}

/// Whether a UI source is currently available.
#[derive(Clone, Default)]
pub enum SourceState {
    #[default]
    Unbound,
    Bound(Arc<dyn UiSource>),
}

/// Shared slot through which the dispatcher reaches the UI source.
///
/// The source binds when it comes up and unbinds when it goes away; commands
/// issued while unbound are answered in-band instead of failing the server.
#[derive(Clone, Default)]
pub struct UiSourceHandle {
    state: Arc<RwLock<SourceState>>,
}

impl UiSourceHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle that starts out bound to `source`.
    pub fn bound(source: Arc<dyn UiSource>) -> Self {
        let handle = Self::new();
        handle.bind(source);
        handle
    }

    pub fn bind(&self, source: Arc<dyn UiSource>) {
        info!(source = source.name(), "UI source bound");
        *self.state.write() = SourceState::Bound(source);
    }

    pub fn unbind(&self) {
        let previous = std::mem::take(&mut *self.state.write());
        if let SourceState::Bound(source) = previous {
            info!(source = source.name(), "UI source unbound");
        }
    }

    pub fn is_bound(&self) -> bool {
        matches!(*self.state.read(), SourceState::Bound(_))
    }

    /// The bound source, if any. The lock is released before the caller awaits on it.
    pub fn current(&self) -> Option<Arc<dyn UiSource>> {
        match &*self.state.read() {
            SourceState::Bound(source) => Some(Arc::clone(source)),
            SourceState::Unbound => None,
        }
    }
}
