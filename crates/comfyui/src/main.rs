//! `comfy-run` -- submit one workflow file to ComfyUI and save its outputs.
//!
//! # Environment variables
//!
//! | Variable        | Required | Default | Description                                   |
//! |-----------------|----------|---------|-----------------------------------------------|
//! | `WORKFLOW_PATH` | yes      | --      | Workflow JSON (execution or display format)   |
//! | `OUTPUT_DIR`    | no       | `.`     | Directory the produced files are written to   |
//! | `WORKFLOW_SET`  | no       | --      | `id.param=value` edits separated by `;`       |
//!
//! Server settings come from [`ComfyUIConfig::from_env`].

use std::path::PathBuf;

use commander_comfyui::{ComfyUIConfig, Orchestrator};
use commander_core::{NodeQuery, Workflow};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// One `node_id.param=value` edit from `WORKFLOW_SET`.
struct ParamEdit {
    node_id: String,
    param: String,
    value: serde_json::Value,
}

/// Parse `WORKFLOW_SET`. Values are read as JSON, falling back to a plain
/// string (so `6.text=a cat` works without quoting).
fn parse_edits(raw: &str) -> Result<Vec<ParamEdit>, String> {
    raw.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|item| {
            let (target, value) = item
                .split_once('=')
                .ok_or_else(|| format!("expected 'node_id.param=value', got '{item}'"))?;
            let (node_id, param) = target
                .split_once('.')
                .ok_or_else(|| format!("expected 'node_id.param', got '{target}'"))?;
            let value = serde_json::from_str(value)
                .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
            Ok(ParamEdit {
                node_id: node_id.trim().to_string(),
                param: param.trim().to_string(),
                value,
            })
        })
        .collect()
}

fn apply_edits(workflow: &mut Workflow, edits: Vec<ParamEdit>) -> Result<(), commander_core::CoreError> {
    for edit in edits {
        let mut node = workflow.node_mut(NodeQuery::Id(&edit.node_id))?;
        let slot = node.param(&edit.param).set(edit.value)?;
        tracing::info!(node_id = %edit.node_id, param = %edit.param, ?slot, "Applied parameter edit");
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "commander_comfyui=info,commander_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let workflow_path = std::env::var("WORKFLOW_PATH").unwrap_or_else(|_| {
        tracing::error!("WORKFLOW_PATH environment variable is required");
        std::process::exit(1);
    });
    let output_dir = PathBuf::from(std::env::var("OUTPUT_DIR").unwrap_or_else(|_| ".".into()));
    let edits = match std::env::var("WORKFLOW_SET") {
        Ok(raw) => parse_edits(&raw).unwrap_or_else(|e| {
            tracing::error!(error = %e, "Invalid WORKFLOW_SET");
            std::process::exit(1);
        }),
        Err(_) => Vec::new(),
    };

    let config = ComfyUIConfig::from_env();
    tracing::info!(
        comfyui_url = %config.base_url,
        workflow = %workflow_path,
        output_dir = %output_dir.display(),
        "Starting comfy-run",
    );

    let orchestrator = Orchestrator::new(config).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to create ComfyUI client");
        std::process::exit(1);
    });

    let mut workflow = orchestrator
        .load_workflow(&workflow_path)
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to load workflow");
            std::process::exit(1);
        });

    if let Err(e) = apply_edits(&mut workflow, edits) {
        tracing::error!(error = %e, "Failed to apply parameter edits");
        std::process::exit(1);
    }

    let result = orchestrator.run(&workflow).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to submit workflow");
        std::process::exit(1);
    });

    if !result.is_success() {
        tracing::error!(
            prompt_id = %result.prompt_id,
            error = result.error_message.as_deref().unwrap_or("unknown error"),
            "Workflow execution failed",
        );
        std::process::exit(1);
    }

    if let Err(e) = std::fs::create_dir_all(&output_dir) {
        tracing::error!(error = %e, "Failed to create output directory");
        std::process::exit(1);
    }

    for output in &result.media {
        let path = output_dir.join(&output.filename);
        match output.save(&path, Some(&workflow)) {
            Ok(()) => tracing::info!(path = %path.display(), "Saved output"),
            Err(e) => tracing::error!(path = %path.display(), error = %e, "Failed to save output"),
        }
    }

    tracing::info!(
        prompt_id = %result.prompt_id,
        outputs = result.media.len(),
        "comfy-run finished",
    );
}
