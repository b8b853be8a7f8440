//! Mirrors named-parameter edits into display-graph widget slots.
//!
//! A display node's `widgets_values` array is aligned with the node's
//! non-connection inputs in execution-graph order. Some node types render
//! extra display-only widgets (KSampler's "control after generate" toggle
//! follows the seed) that have no named input; [`WidgetSchema`] records
//! those so the slot index can be shifted past them.

use std::collections::HashMap;

use serde_json::Value;

use crate::graph::{DisplayGraph, ExecutionGraph};

/// KSampler node class type in ComfyUI.
const KSAMPLER_CLASS: &str = "KSampler";

/// Hidden display-only widgets per class type.
///
/// Each entry lists value-input positions that are followed by one hidden
/// widget slot. Class types without an entry have no hidden widgets.
#[derive(Debug, Clone)]
pub struct WidgetSchema {
    hidden_after: HashMap<String, Vec<usize>>,
}

impl Default for WidgetSchema {
    fn default() -> Self {
        let mut schema = Self::empty();
        // Seed is followed by its "control after generate" widget.
        schema.register(KSAMPLER_CLASS, vec![0]);
        schema
    }
}

impl WidgetSchema {
    /// Schema with no hidden widgets for any class type.
    pub fn empty() -> Self {
        Self {
            hidden_after: HashMap::new(),
        }
    }

    /// Declare that `class_type` renders a hidden widget after each of the
    /// given value-input positions. Replaces any previous entry.
    pub fn register(&mut self, class_type: impl Into<String>, hidden_after: Vec<usize>) {
        self.hidden_after.insert(class_type.into(), hidden_after);
    }

    /// Display slot for the value input at `position`.
    pub fn display_slot(&self, class_type: &str, position: usize) -> usize {
        let shift = self
            .hidden_after
            .get(class_type)
            .map(|after| after.iter().filter(|&&p| p < position).count())
            .unwrap_or(0);
        position + shift
    }
}

/// Copy the current value of `node_id.param` from the execution graph into
/// the matching display node's widget slot.
///
/// Value-input order is derived fresh from the node's inputs on every
/// call. Returns the slot written, or `None` when nothing was synced
/// (unknown node, connection-valued or missing parameter, no display node,
/// or non-positional widgets). A missing counterpart is not an error.
pub fn sync_parameter(
    api: &ExecutionGraph,
    gui: &mut DisplayGraph,
    schema: &WidgetSchema,
    node_id: &str,
    param: &str,
) -> Option<usize> {
    let spec = api.get(node_id)?;
    let value = spec.inputs.get(param)?;
    let position = spec.value_input_names().iter().position(|name| *name == param)?;
    let slot = schema.display_slot(&spec.class_type, position);

    let Some(display) = gui.node_mut(node_id) else {
        tracing::warn!(node_id, param, "No display node to sync parameter into");
        return None;
    };

    let widgets = match display.widgets_values.get_or_insert_with(|| Value::Array(Vec::new())) {
        Value::Array(items) => items,
        _ => {
            tracing::warn!(node_id, param, "Display node widgets are not positional, skipping sync");
            return None;
        }
    };

    if widgets.len() <= slot {
        widgets.resize(slot + 1, Value::Null);
    }
    widgets[slot] = value.clone();

    tracing::debug!(
        node_id,
        param,
        class_type = %spec.class_type,
        slot,
        "Synced parameter into display graph",
    );
    Some(slot)
}
