//! The workflow graph model.
//!
//! A [`Workflow`] holds an execution graph, a display graph, or both,
//! depending on where it was loaded from. All parameter writes go through
//! [`Workflow::set_param`], which updates the execution graph and then
//! mirrors the edit into the display graph.

use std::collections::HashSet;

use serde_json::Value;

use crate::error::CoreError;
use crate::graph::{DisplayGraph, ExecutionGraph};
use crate::image_metadata::{PROMPT_KEY, WORKFLOW_KEY};
use crate::locator::{self, NodeQuery};
use crate::media::NodeInfo;
use crate::node::{Node, NodeMut};
use crate::sync::{self, WidgetSchema};

#[derive(Debug, Clone, Default)]
pub struct Workflow {
    api: Option<ExecutionGraph>,
    gui: Option<DisplayGraph>,
    widget_schema: WidgetSchema,
}

impl Workflow {
    /// Build a workflow from whichever representations are available.
    pub fn new(api: Option<ExecutionGraph>, gui: Option<DisplayGraph>) -> Self {
        Self {
            api,
            gui,
            widget_schema: WidgetSchema::default(),
        }
    }

    pub fn api_json(&self) -> Option<&ExecutionGraph> {
        self.api.as_ref()
    }

    pub fn gui_json(&self) -> Option<&DisplayGraph> {
        self.gui.as_ref()
    }

    pub fn set_api_json(&mut self, api: ExecutionGraph) {
        self.api = Some(api);
    }

    pub fn set_gui_json(&mut self, gui: DisplayGraph) {
        self.gui = Some(gui);
    }

    pub fn has_execution_graph(&self) -> bool {
        self.api.is_some()
    }

    pub fn has_display_graph(&self) -> bool {
        self.gui.is_some()
    }

    pub fn widget_schema(&self) -> &WidgetSchema {
        &self.widget_schema
    }

    /// Mutable access for registering hidden widgets of custom node types.
    pub fn widget_schema_mut(&mut self) -> &mut WidgetSchema {
        &mut self.widget_schema
    }

    fn execution_graph(&self) -> Result<&ExecutionGraph, CoreError> {
        self.api.as_ref().ok_or_else(|| {
            CoreError::Malformed("Workflow has no execution graph; convert it first".to_string())
        })
    }

    // ---- node lookup ----

    /// Resolve exactly one node.
    pub fn node(&self, query: NodeQuery<'_>) -> Result<Node<'_>, CoreError> {
        let graph = self.execution_graph()?;
        let id = locator::resolve(graph, query)?;
        let (id, spec) = graph
            .entry(id)
            .ok_or_else(|| CoreError::NotFound(format!("node with id '{id}'")))?;
        Ok(Node::new(self, id, spec))
    }

    /// Resolve exactly one node for editing.
    pub fn node_mut(&mut self, query: NodeQuery<'_>) -> Result<NodeMut<'_>, CoreError> {
        let id = locator::resolve(self.execution_graph()?, query)?.clone();
        Ok(NodeMut::new(self, id))
    }

    /// Every node whose title equals `title` or whose class type equals
    /// `class_type`. Order is unspecified.
    pub fn nodes_by(
        &self,
        title: Option<&str>,
        class_type: Option<&str>,
    ) -> Result<Vec<Node<'_>>, CoreError> {
        let graph = self.execution_graph()?;
        let ids: HashSet<_> = locator::union_resolve(graph, title, class_type)?;
        Ok(graph
            .iter()
            .filter(|(id, _)| ids.contains(*id))
            .map(|(id, spec)| Node::new(self, id, spec))
            .collect())
    }

    /// Detached identity of node `id`, if the execution graph has it.
    pub fn node_info(&self, id: &str) -> Option<NodeInfo> {
        let spec = self.api.as_ref()?.get(id)?;
        Some(NodeInfo {
            id: id.to_string(),
            class_type: spec.class_type.clone(),
            title: spec.title().map(str::to_string),
        })
    }

    // ---- parameters ----

    pub fn param(&self, node_id: &str, name: &str) -> Option<&Value> {
        self.api.as_ref()?.get(node_id)?.inputs.get(name)
    }

    /// Write a named input and mirror it into the display graph.
    ///
    /// Inserting a name the node does not have yet appends it to the input
    /// order. Returns the display slot that was updated, if any.
    pub fn set_param(
        &mut self,
        node_id: &str,
        name: &str,
        value: Value,
    ) -> Result<Option<usize>, CoreError> {
        let api = self.api.as_mut().ok_or_else(|| {
            CoreError::Malformed("Workflow has no execution graph; convert it first".to_string())
        })?;
        let spec = api
            .get_mut(node_id)
            .ok_or_else(|| CoreError::NotFound(format!("node with id '{node_id}'")))?;
        spec.inputs.insert(name.to_string(), value);

        let slot = match self.gui.as_mut() {
            Some(gui) => sync::sync_parameter(api, gui, &self.widget_schema, node_id, name),
            None => None,
        };
        Ok(slot)
    }

    // ---- serialization ----

    /// Text chunks to embed when saving an image produced by this workflow.
    pub fn metadata_chunks(&self) -> Result<Vec<(&'static str, String)>, CoreError> {
        let mut chunks = Vec::new();
        if let Some(api) = &self.api {
            chunks.push((PROMPT_KEY, serde_json::to_string(api)?));
        }
        if let Some(gui) = &self.gui {
            chunks.push((WORKFLOW_KEY, serde_json::to_string(gui)?));
        }
        Ok(chunks)
    }
}
