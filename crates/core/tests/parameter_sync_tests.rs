//! Integration tests for parameter edits flowing from the execution graph
//! into the display graph.

use assert_matches::assert_matches;
use serde_json::json;

use commander_core::{CoreError, NodeQuery, Workflow};

fn ksampler_workflow() -> Workflow {
    let api = serde_json::from_value(json!({
        "31": {
            "class_type": "KSampler",
            "inputs": { "seed": 111, "steps": 20, "cfg": 7.0, "sampler_name": "euler" }
        }
    }))
    .unwrap();
    let gui = serde_json::from_value(json!({
        "nodes": [
            { "id": 31, "type": "KSampler", "widgets_values": [111, false, 20, 7.0, "euler"] }
        ],
        "links": []
    }))
    .unwrap();
    Workflow::new(Some(api), Some(gui))
}

fn widgets(workflow: &Workflow, id: &str) -> Vec<serde_json::Value> {
    workflow
        .gui_json()
        .and_then(|g| g.node(id))
        .and_then(|n| n.widgets())
        .map(|w| w.to_vec())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Test: KSampler steps edit lands past the hidden toggle slot
// ---------------------------------------------------------------------------

#[test]
fn setting_steps_updates_slot_two_only() {
    let mut workflow = ksampler_workflow();

    workflow
        .node_mut(NodeQuery::Id("31"))
        .unwrap()
        .param("steps")
        .set(999)
        .unwrap();

    assert_eq!(
        widgets(&workflow, "31"),
        vec![json!(111), json!(false), json!(999), json!(7.0), json!("euler")]
    );
    assert_eq!(workflow.param("31", "steps"), Some(&json!(999)));
}

#[test]
fn setting_seed_updates_slot_zero() {
    let mut workflow = ksampler_workflow();

    workflow
        .node_mut(NodeQuery::ClassType("KSampler"))
        .unwrap()
        .param("seed")
        .set(1234567890)
        .unwrap();

    assert_eq!(widgets(&workflow, "31")[0], json!(1234567890));
    assert_eq!(widgets(&workflow, "31")[2], json!(20));
}

#[test]
fn applying_same_edit_twice_is_idempotent() {
    let mut once = ksampler_workflow();
    once.set_param("31", "cfg", json!(4.5)).unwrap();

    let mut twice = ksampler_workflow();
    twice.set_param("31", "cfg", json!(4.5)).unwrap();
    twice.set_param("31", "cfg", json!(4.5)).unwrap();

    assert_eq!(once.gui_json(), twice.gui_json());
    assert_eq!(once.api_json(), twice.api_json());
}

#[test]
fn connection_input_is_immune_to_scalar_edits() {
    let mut workflow = ksampler_workflow();
    workflow.set_param("31", "model", json!(["4", 0])).unwrap();
    let display_before = widgets(&workflow, "31");
    assert_eq!(display_before.len(), 5);

    for steps in 1..=5 {
        workflow.set_param("31", "steps", json!(steps)).unwrap();
    }

    assert_eq!(workflow.param("31", "model"), Some(&json!(["4", 0])));
    assert_eq!(widgets(&workflow, "31")[2], json!(5));
    assert_eq!(widgets(&workflow, "31").len(), 5);
}

#[test]
fn editing_display_only_workflow_requires_execution_graph() {
    let gui = ksampler_workflow().gui_json().cloned();
    let mut workflow = Workflow::new(None, gui);
    assert_matches!(
        workflow.set_param("31", "steps", json!(1)),
        Err(CoreError::Malformed(_))
    );
}
