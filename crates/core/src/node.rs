//! Borrowed views onto workflow nodes and their parameters.
//!
//! Views hold only a reference to the owning [`Workflow`] and a node id;
//! reads and writes always go through the owner.

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::CoreError;
use crate::graph::{is_connection, DisplayNode, NodeSpec};
use crate::media::NodeInfo;
use crate::workflow::Workflow;

/// Read-only view of one node.
#[derive(Debug, Clone, Copy)]
pub struct Node<'w> {
    workflow: &'w Workflow,
    id: &'w str,
    spec: &'w NodeSpec,
}

impl<'w> Node<'w> {
    pub(crate) fn new(workflow: &'w Workflow, id: &'w str, spec: &'w NodeSpec) -> Self {
        Self { workflow, id, spec }
    }

    pub fn id(&self) -> &'w str {
        self.id
    }

    pub fn class_type(&self) -> &'w str {
        &self.spec.class_type
    }

    pub fn title(&self) -> Option<&'w str> {
        self.spec.title()
    }

    pub fn inputs(&self) -> &'w IndexMap<String, Value> {
        &self.spec.inputs
    }

    pub fn param(&self, name: &str) -> Param<'w> {
        Param {
            node: *self,
            name: name.to_string(),
        }
    }

    /// The matching display-graph node, when one is loaded.
    pub fn display_node(&self) -> Option<&'w DisplayNode> {
        self.workflow.gui_json()?.node(self.id)
    }

    pub fn info(&self) -> NodeInfo {
        NodeInfo {
            id: self.id.to_string(),
            class_type: self.spec.class_type.clone(),
            title: self.spec.title().map(str::to_string),
        }
    }
}

/// Read-only handle on one named input.
#[derive(Debug, Clone)]
pub struct Param<'w> {
    node: Node<'w>,
    name: String,
}

impl<'w> Param<'w> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current value, or `None` if the node has no such input.
    pub fn get(&self) -> Option<&'w Value> {
        self.node.spec.inputs.get(&self.name)
    }

    pub fn is_connection(&self) -> bool {
        self.get().is_some_and(is_connection)
    }
}

/// Editing view of one node.
#[derive(Debug)]
pub struct NodeMut<'w> {
    workflow: &'w mut Workflow,
    id: String,
}

impl<'w> NodeMut<'w> {
    pub(crate) fn new(workflow: &'w mut Workflow, id: String) -> Self {
        Self { workflow, id }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn param(&mut self, name: &str) -> ParamMut<'_> {
        ParamMut {
            workflow: &mut *self.workflow,
            node_id: &self.id,
            name: name.to_string(),
        }
    }

    /// Shorthand for `param(name).set(value)`.
    pub fn set(&mut self, name: &str, value: Value) -> Result<Option<usize>, CoreError> {
        self.workflow.set_param(&self.id, name, value)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.workflow.param(&self.id, name)
    }
}

/// Read/write handle on one named input.
///
/// Writes update the execution graph and mirror into the display graph.
#[derive(Debug)]
pub struct ParamMut<'n> {
    workflow: &'n mut Workflow,
    node_id: &'n str,
    name: String,
}

impl ParamMut<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self) -> Option<&Value> {
        self.workflow.param(self.node_id, &self.name)
    }

    /// Write `value`. Returns the display slot updated, if any.
    pub fn set(&mut self, value: impl Into<Value>) -> Result<Option<usize>, CoreError> {
        self.workflow.set_param(self.node_id, &self.name, value.into())
    }
}
