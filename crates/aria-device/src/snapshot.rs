//! Flat, ordered snapshots of a UI tree and the identities handed out with them.

use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::source::{Bounds, UiNode};

/// Identity of an element within one snapshot: generation in the high 32 bits,
/// pre-order index in the low 32 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    pub fn new(generation: u32, index: u32) -> Self {
        Self(((generation as u64) << 32) | index as u64)
    }

    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn generation(&self) -> u32 {
        (self.0 >> 32) as u32
    }

    pub fn index(&self) -> u32 {
        self.0 as u32
    }

    /// Accept a JSON number or a numeric string.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_u64().map(Self),
            Value::String(s) => s.trim().parse::<u64>().ok().map(Self),
            _ => None,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.0)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(NodeId(n)),
            Raw::Text(s) => s
                .trim()
                .parse::<u64>()
                .map(NodeId)
                .map_err(|_| serde::de::Error::custom(format!("invalid node id: {s}"))),
        }
    }
}

/// Wire descriptor of one element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiElement {
    pub node_id: NodeId,
    #[serde(default)]
    pub view_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub content_description: String,
    #[serde(default)]
    pub class_name: String,
    #[serde(default)]
    pub package_name: String,
    #[serde(default)]
    pub bounds: Bounds,
    #[serde(default)]
    pub is_clickable: bool,
    #[serde(default)]
    pub is_editable: bool,
    #[serde(default)]
    pub is_scrollable: bool,
    #[serde(default)]
    pub is_enabled: bool,
    #[serde(default)]
    pub is_focused: bool,
    #[serde(default)]
    pub child_count: usize,
}

impl UiElement {
    fn from_node(node_id: NodeId, node: &UiNode) -> Self {
        Self {
            node_id,
            view_id: node.view_id.clone().unwrap_or_default(),
            text: node.text.clone().unwrap_or_default(),
            content_description: node.description.clone().unwrap_or_default(),
            class_name: node.class_name.clone(),
            package_name: node.package.clone().unwrap_or_default(),
            bounds: node.bounds,
            is_clickable: node.clickable,
            is_editable: node.editable,
            is_scrollable: node.scrollable,
            is_enabled: node.enabled,
            is_focused: node.focused,
            child_count: node.children.len(),
        }
    }

    /// Text if present, else the content description.
    pub fn label(&self) -> &str {
        if self.text.is_empty() {
            &self.content_description
        } else {
            &self.text
        }
    }
}

/// Depth-first pre-order flattening of a tree.
pub fn flatten(root: &UiNode) -> Vec<&UiNode> {
    fn walk<'a>(node: &'a UiNode, out: &mut Vec<&'a UiNode>) {
        out.push(node);
        for child in &node.children {
            walk(child, out);
        }
    }

    let mut out = Vec::new();
    walk(root, &mut out);
    out
}

/// What must still hold for a recorded identity to denote the same live node.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Fingerprint {
    class_name: String,
    view_id: Option<String>,
    bounds: Bounds,
}

impl Fingerprint {
    fn of(node: &UiNode) -> Self {
        Self {
            class_name: node.class_name.clone(),
            view_id: node.view_id.clone(),
            bounds: node.bounds,
        }
    }
}

#[derive(Default)]
struct GenerationRecord {
    generation: u32,
    fingerprints: Vec<Fingerprint>,
}

/// Why an identity could not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveFailure {
    /// Issued by an older snapshot (or never issued).
    Stale { latest: u32 },
    /// Index beyond the recorded or live tree.
    Missing,
    /// The live node at that index no longer matches what was recorded.
    Changed,
}

impl fmt::Display for ResolveFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveFailure::Stale { latest } => write!(f, "stale generation (latest is {latest})"),
            ResolveFailure::Missing => write!(f, "index out of range"),
            ResolveFailure::Changed => write!(f, "node changed since snapshot"),
        }
    }
}

/// Builds snapshots and remembers the latest one for identity resolution.
///
/// The generation record is the only state shared between connections.
#[derive(Default)]
pub struct SnapshotBuilder {
    latest: Mutex<GenerationRecord>,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot `root` under a fresh generation, recording fingerprints for
    /// later [`resolve`](Self::resolve) calls.
    pub fn capture(&self, root: &UiNode) -> Vec<UiElement> {
        let nodes = flatten(root);
        let fingerprints: Vec<Fingerprint> = nodes.iter().map(|n| Fingerprint::of(n)).collect();

        let generation = {
            let mut latest = self.latest.lock();
            // Generation 0 is never issued so a zeroed id is always stale.
            latest.generation = latest.generation.checked_add(1).unwrap_or(1);
            latest.fingerprints = fingerprints;
            latest.generation
        };

        nodes
            .iter()
            .enumerate()
            .map(|(index, node)| UiElement::from_node(NodeId::new(generation, index as u32), node))
            .collect()
    }

    /// Describe `root` without issuing a generation. The returned ids are not resolvable.
    pub fn describe(root: &UiNode) -> Vec<UiElement> {
        flatten(root)
            .iter()
            .enumerate()
            .map(|(index, node)| UiElement::from_node(NodeId::new(0, index as u32), node))
            .collect()
    }

    pub fn latest_generation(&self) -> u32 {
        self.latest.lock().generation
    }

    /// Map an identity back to a node of the freshly fetched `root`.
    pub fn resolve<'a>(
        &self,
        root: &'a UiNode,
        id: NodeId,
    ) -> Result<(usize, &'a UiNode), ResolveFailure> {
        let index = id.index() as usize;
        let recorded = {
            let latest = self.latest.lock();
            if id.generation() == 0 || id.generation() != latest.generation {
                return Err(ResolveFailure::Stale {
                    latest: latest.generation,
                });
            }
            latest
                .fingerprints
                .get(index)
                .cloned()
                .ok_or(ResolveFailure::Missing)?
        };

        let node = flatten(root)
            .get(index)
            .copied()
            .ok_or(ResolveFailure::Missing)?;
        if Fingerprint::of(node) != recorded {
            return Err(ResolveFailure::Changed);
        }
        Ok((index, node))
    }
}

/// Concatenated visible text, one element per line, in pre-order.
pub fn screen_text(root: &UiNode) -> String {
    flatten(root)
        .into_iter()
        .filter_map(|n| {
            n.text
                .as_deref()
                .filter(|t| !t.trim().is_empty())
                .or_else(|| n.description.as_deref().filter(|d| !d.trim().is_empty()))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Case-insensitive substring match on text or content description.
pub fn matches_text(element: &UiElement, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    element.text.to_lowercase().contains(&needle)
        || element.content_description.to_lowercase().contains(&needle)
}

/// Exact or substring match on the view id (`com.app:id/send` matches `send`).
pub fn matches_view_id(element: &UiElement, id: &str) -> bool {
    !element.view_id.is_empty() && (element.view_id == id || element.view_id.contains(id))
}
