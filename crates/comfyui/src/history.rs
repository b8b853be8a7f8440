//! Parsing of `/history/{prompt_id}` responses.
//!
//! ComfyUI only adds a prompt to its history once it has stopped running.
//! An entry looks like:
//!
//! ```json
//! {
//!   "<prompt_id>": {
//!     "status": { "status_str": "success", "completed": true, "messages": [...] },
//!     "outputs": { "9": { "images": [{ "filename": "a.png", "subfolder": "", "type": "output" }] } }
//!   }
//! }
//! ```

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

/// Output keys whose entries are downloadable files.
const MEDIA_OUTPUT_KEYS: &[&str] = &["images", "gifs", "videos", "audio"];

const STATUS_SUCCESS: &str = "success";
const STATUS_ERROR: &str = "error";

/// Message kind ComfyUI records when a node raised.
const EXECUTION_ERROR_MESSAGE: &str = "execution_error";

/// One prompt's history record.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub status: Option<HistoryStatus>,
    /// Raw outputs keyed by node id, in the order ComfyUI reported them.
    #[serde(default)]
    pub outputs: IndexMap<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryStatus {
    /// `"success"` or `"error"` on a stock server.
    #[serde(default)]
    pub status_str: String,
    /// Whether execution ran to the end.
    #[serde(default)]
    pub completed: bool,
    /// `[kind, payload]` pairs recorded during execution.
    #[serde(default)]
    pub messages: Vec<Value>,
}

/// Payload of an `execution_error` history message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorData {
    #[serde(default)]
    pub node_id: String,
    #[serde(default)]
    pub node_type: String,
    #[serde(default)]
    pub exception_message: String,
    #[serde(default)]
    pub exception_type: String,
}

/// A file reference inside a node's outputs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OutputFile {
    pub filename: String,
    /// Path below the bucket directory; empty for the bucket root.
    #[serde(default)]
    pub subfolder: String,
    /// Storage bucket (`output`, `temp` or `input`).
    #[serde(rename = "type", default = "default_output_type")]
    pub output_type: String,
}

fn default_output_type() -> String {
    "output".to_string()
}

/// Where a prompt stands according to its history record.
#[derive(Debug, Clone)]
pub enum PromptState {
    /// No history record yet: queued or still running.
    InProgress,
    Succeeded(HistoryEntry),
    /// Finished with an error; carries a human-readable description.
    Failed(String),
}

impl HistoryEntry {
    /// Description of the first `execution_error` message, if any.
    pub fn error_message(&self) -> Option<String> {
        let status = self.status.as_ref()?;
        status.messages.iter().find_map(|message| {
            let pair = message.as_array()?;
            if pair.first()?.as_str()? != EXECUTION_ERROR_MESSAGE {
                return None;
            }
            let data: ErrorData = serde_json::from_value(pair.get(1)?.clone()).ok()?;
            Some(format!(
                "{}: {} (node {} {})",
                data.exception_type, data.exception_message, data.node_id, data.node_type
            ))
        })
    }

    /// Files listed under the media keys of every output node, in order.
    pub fn output_files(&self) -> Vec<(String, OutputFile)> {
        self.outputs
            .iter()
            .flat_map(|(node_id, output)| {
                MEDIA_OUTPUT_KEYS
                    .iter()
                    .filter_map(move |key| output.get(*key).and_then(Value::as_array))
                    .flatten()
                    .filter_map(|item| serde_json::from_value::<OutputFile>(item.clone()).ok())
                    .map(move |file| (node_id.clone(), file))
            })
            .collect()
    }
}

/// Classify a `/history/{prompt_id}` response.
pub fn prompt_state(history: &Value, prompt_id: &str) -> Result<PromptState, serde_json::Error> {
    let Some(raw) = history.get(prompt_id) else {
        return Ok(PromptState::InProgress);
    };
    let entry: HistoryEntry = serde_json::from_value(raw.clone())?;

    let status_str = entry
        .status
        .as_ref()
        .map(|s| s.status_str.as_str())
        .unwrap_or(STATUS_SUCCESS);

    match status_str {
        STATUS_ERROR => {
            let message = entry.error_message().unwrap_or_else(|| {
                format!("ComfyUI reported status '{STATUS_ERROR}' for prompt {prompt_id}")
            });
            Ok(PromptState::Failed(message))
        }
        STATUS_SUCCESS => Ok(PromptState::Succeeded(entry)),
        _ if entry.status.as_ref().is_some_and(|s| s.completed) => Ok(PromptState::Succeeded(entry)),
        _ => Ok(PromptState::InProgress),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn success_history() -> Value {
        json!({
            "p1": {
                "status": { "status_str": "success", "completed": true, "messages": [] },
                "outputs": {
                    "9": {
                        "images": [
                            { "filename": "a.png", "subfolder": "", "type": "output" },
                            { "filename": "b.png", "subfolder": "batch", "type": "output" }
                        ]
                    },
                    "12": {
                        "images": [{ "filename": "preview.png", "subfolder": "", "type": "temp" }],
                        "text": ["not a file"]
                    }
                }
            }
        })
    }

    #[test]
    fn empty_history_is_in_progress() {
        assert_matches!(prompt_state(&json!({}), "p1"), Ok(PromptState::InProgress));
    }

    #[test]
    fn success_status_collects_files_in_order() {
        let state = prompt_state(&success_history(), "p1").unwrap();
        assert_matches!(state, PromptState::Succeeded(entry) => {
            let files = entry.output_files();
            let names: Vec<_> = files.iter().map(|(id, f)| (id.as_str(), f.filename.as_str())).collect();
            assert_eq!(names, vec![("9", "a.png"), ("9", "b.png"), ("12", "preview.png")]);
            assert_eq!(files[1].1.subfolder, "batch");
            assert_eq!(files[2].1.output_type, "temp");
        });
    }

    #[test]
    fn error_status_extracts_exception() {
        let history = json!({
            "p2": {
                "status": {
                    "status_str": "error",
                    "completed": false,
                    "messages": [
                        ["execution_start", { "prompt_id": "p2" }],
                        ["execution_error", {
                            "prompt_id": "p2",
                            "node_id": "3",
                            "node_type": "KSampler",
                            "exception_message": "out of memory",
                            "exception_type": "RuntimeError"
                        }]
                    ]
                },
                "outputs": {}
            }
        });
        assert_matches!(prompt_state(&history, "p2"), Ok(PromptState::Failed(message)) => {
            assert!(message.contains("out of memory"));
            assert!(message.contains("RuntimeError"));
        });
    }

    #[test]
    fn error_status_without_messages_still_fails() {
        let history = json!({ "p3": { "status": { "status_str": "error" }, "outputs": {} } });
        assert_matches!(prompt_state(&history, "p3"), Ok(PromptState::Failed(m)) if m.contains("p3"));
    }

    #[test]
    fn entry_without_status_counts_as_success() {
        let history = json!({ "p4": { "outputs": {} } });
        assert_matches!(prompt_state(&history, "p4"), Ok(PromptState::Succeeded(_)));
    }

    #[test]
    fn output_type_defaults_to_output() {
        let file: OutputFile = serde_json::from_value(json!({ "filename": "x.png" })).unwrap();
        assert_eq!(file.output_type, "output");
        assert_eq!(file.subfolder, "");
    }
}
