//! Execution and display graph representations.
//!
//! The execution graph is what `/prompt` consumes: an object keyed by node
//! id whose values carry `class_type`, ordered `inputs` and `_meta`:
//!
//! ```json
//! {
//!   "31": {
//!     "class_type": "KSampler",
//!     "inputs": { "seed": 111, "steps": 20, "model": ["4", 0] },
//!     "_meta": { "title": "KSampler" }
//!   }
//! }
//! ```
//!
//! The display graph is the editor's save format: a `nodes` array whose
//! entries hold positional `widgets_values`, plus opaque `links` and
//! decorative fields that are passed through unchanged.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::NodeId;

/// Returns `true` when an input value is a connection reference.
///
/// ComfyUI encodes wires as `[producer_node_id, output_slot]`. Any
/// two-element array is treated as a connection; every other shape
/// (including longer arrays) is a literal value.
pub fn is_connection(value: &Value) -> bool {
    matches!(value, Value::Array(items) if items.len() == 2)
}

// ---------------------------------------------------------------------------
// Execution graph
// ---------------------------------------------------------------------------

/// `_meta` block of an execution-graph node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeMeta {
    /// User-visible node title shown in the editor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Any other `_meta` keys, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single node of the execution graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// ComfyUI class type (e.g. "KSampler", "CLIPTextEncode").
    pub class_type: String,
    /// Named inputs in their original order.
    #[serde(default)]
    pub inputs: IndexMap<String, Value>,
    /// The `_meta` block; absent in graphs exported without titles.
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<NodeMeta>,
    /// Unrecognised node keys, passed through on serialization.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NodeSpec {
    pub fn new(class_type: impl Into<String>) -> Self {
        Self {
            class_type: class_type.into(),
            inputs: IndexMap::new(),
            meta: None,
            extra: Map::new(),
        }
    }

    /// Builder-style helper used mostly by tests and callers assembling
    /// graphs by hand.
    pub fn with_input(mut self, name: impl Into<String>, value: Value) -> Self {
        self.inputs.insert(name.into(), value);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.meta.get_or_insert_with(NodeMeta::default).title = Some(title.into());
        self
    }

    pub fn title(&self) -> Option<&str> {
        self.meta.as_ref().and_then(|m| m.title.as_deref())
    }

    /// Names of the non-connection inputs, in stored order.
    pub fn value_input_names(&self) -> Vec<&str> {
        self.inputs
            .iter()
            .filter(|(_, value)| !is_connection(value))
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Node-id keyed execution graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionGraph {
    nodes: IndexMap<NodeId, NodeSpec>,
}

impl ExecutionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&NodeSpec> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut NodeSpec> {
        self.nodes.get_mut(id)
    }

    /// Insert or replace a node. Ids stay unique because the graph is a map.
    pub fn insert(&mut self, id: impl Into<NodeId>, spec: NodeSpec) -> Option<NodeSpec> {
        self.nodes.insert(id.into(), spec)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &NodeSpec)> {
        self.nodes.iter()
    }

    /// Key/value pair for `id`, with the key borrowed from the graph.
    pub(crate) fn entry(&self, id: &str) -> Option<(&NodeId, &NodeSpec)> {
        self.nodes.get_key_value(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

impl FromIterator<(NodeId, NodeSpec)> for ExecutionGraph {
    fn from_iter<I: IntoIterator<Item = (NodeId, NodeSpec)>>(iter: I) -> Self {
        Self {
            nodes: iter.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Display graph
// ---------------------------------------------------------------------------

/// A node of the display graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayNode {
    /// Numeric in files saved by the editor; kept as raw JSON.
    pub id: Value,
    /// Class type of the node (`type` in the editor format).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    /// Positional widget values. Usually an array; some custom nodes store
    /// an object here, which sync leaves untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widgets_values: Option<Value>,
    /// Layout and decorative fields (`pos`, `size`, `flags`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DisplayNode {
    pub fn new(id: impl Into<Value>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: Some(node_type.into()),
            widgets_values: None,
            extra: Map::new(),
        }
    }

    pub fn with_widgets(mut self, values: Vec<Value>) -> Self {
        self.widgets_values = Some(Value::Array(values));
        self
    }

    /// Whether this display node corresponds to execution-graph node `id`.
    pub fn has_id(&self, id: &str) -> bool {
        match &self.id {
            Value::String(s) => s == id,
            Value::Number(n) => n.to_string() == id,
            _ => false,
        }
    }

    /// Widget values as a slice when they are stored positionally.
    pub fn widgets(&self) -> Option<&[Value]> {
        match &self.widgets_values {
            Some(Value::Array(items)) => Some(items),
            _ => None,
        }
    }
}

/// Positional representation saved by the ComfyUI editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayGraph {
    /// Display nodes in file order.
    pub nodes: Vec<DisplayNode>,
    /// Wire list; preserved, never interpreted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Value>,
    /// Top-level editor state (`last_node_id`, `groups`, `version`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DisplayGraph {
    pub fn new(nodes: Vec<DisplayNode>) -> Self {
        Self {
            nodes,
            links: Some(Value::Array(Vec::new())),
            extra: Map::new(),
        }
    }

    pub fn node(&self, id: &str) -> Option<&DisplayNode> {
        self.nodes.iter().find(|n| n.has_id(id))
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut DisplayNode> {
        self.nodes.iter_mut().find(|n| n.has_id(id))
    }

    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
