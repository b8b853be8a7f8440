//! Loading workflows from JSON files and from PNG metadata.

use std::path::Path;

use serde_json::Value;

use crate::error::CoreError;
use crate::graph::{DisplayGraph, ExecutionGraph};
use crate::image_metadata::{self, PROMPT_KEY, WORKFLOW_KEY};
use crate::workflow::Workflow;

/// Which representation a JSON document holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphFormat {
    /// Node-id keyed `{"<id>": {"class_type": ..., "inputs": ...}}`.
    Execution,
    /// Editor save format with a `nodes` array.
    Display,
}

/// Classify a parsed JSON document.
pub fn detect_format(json: &Value) -> Option<GraphFormat> {
    let obj = json.as_object()?;
    if obj.get("nodes").is_some_and(Value::is_array) {
        return Some(GraphFormat::Display);
    }
    if !obj.is_empty() && obj.values().all(|node| node.get("class_type").is_some()) {
        return Some(GraphFormat::Execution);
    }
    None
}

fn read_json(path: &Path) -> Result<Value, CoreError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

impl Workflow {
    /// Build a workflow from a parsed JSON document of either format.
    pub fn from_json(json: Value) -> Result<Self, CoreError> {
        match detect_format(&json) {
            Some(GraphFormat::Execution) => {
                Ok(Self::new(Some(serde_json::from_value(json)?), None))
            }
            Some(GraphFormat::Display) => Ok(Self::new(None, Some(serde_json::from_value(json)?))),
            None => Err(CoreError::Malformed(
                "JSON is neither an execution graph nor a display graph".to_string(),
            )),
        }
    }

    /// Load a workflow file, detecting its format.
    ///
    /// Only the representation present in the file is populated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let workflow = Self::from_json(read_json(path)?)?;
        tracing::debug!(
            path = %path.display(),
            execution = workflow.has_execution_graph(),
            display = workflow.has_display_graph(),
            "Loaded workflow file",
        );
        Ok(workflow)
    }

    /// Replace the execution graph with the contents of `path`.
    pub fn load_api_json(&mut self, path: impl AsRef<Path>) -> Result<(), CoreError> {
        let graph: ExecutionGraph = serde_json::from_value(read_json(path.as_ref())?)?;
        self.set_api_json(graph);
        Ok(())
    }

    /// Replace the display graph with the contents of `path`.
    pub fn load_gui_json(&mut self, path: impl AsRef<Path>) -> Result<(), CoreError> {
        let graph: DisplayGraph = serde_json::from_value(read_json(path.as_ref())?)?;
        self.set_gui_json(graph);
        Ok(())
    }

    /// Load the workflow embedded in a PNG produced by ComfyUI.
    pub fn from_image(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::from_image_bytes(&bytes)
    }

    /// Parse the `prompt` and `workflow` text chunks of PNG bytes.
    ///
    /// Either chunk may be missing; both missing is an error.
    pub fn from_image_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        let chunks = image_metadata::read_text_chunks(bytes)?;

        let api = chunks
            .get(PROMPT_KEY)
            .map(|text| serde_json::from_str::<ExecutionGraph>(text))
            .transpose()?;
        let gui = chunks
            .get(WORKFLOW_KEY)
            .map(|text| serde_json::from_str::<DisplayGraph>(text))
            .transpose()?;

        if api.is_none() && gui.is_none() {
            return Err(CoreError::Malformed("No workflow metadata found".to_string()));
        }
        Ok(Self::new(api, gui))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_metadata::test_support::{png_with_text, png_with_trailing_text};
    use assert_matches::assert_matches;
    use serde_json::json;
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn api_json() -> Value {
        json!({
            "1": { "class_type": "KSampler", "inputs": { "seed": 123, "steps": 20, "cfg": 7.0 } },
            "2": { "class_type": "CLIPTextEncode", "inputs": { "text": "test prompt" } }
        })
    }

    fn gui_json() -> Value {
        json!({
            "nodes": [
                { "id": 1, "type": "KSampler", "widgets_values": [123, false, 20, 7.0] },
                { "id": 2, "type": "CLIPTextEncode", "widgets_values": ["test prompt"] }
            ],
            "links": [{ "from": 1, "to": 2, "from_slot": 0, "to_slot": 0 }]
        })
    }

    #[test]
    fn detects_both_formats() {
        assert_eq!(detect_format(&api_json()), Some(GraphFormat::Execution));
        assert_eq!(detect_format(&gui_json()), Some(GraphFormat::Display));
        assert_eq!(detect_format(&json!({})), None);
        assert_eq!(detect_format(&json!([1, 2])), None);
        assert_eq!(detect_format(&json!({ "1": { "inputs": {} } })), None);
    }

    #[test]
    fn api_file_populates_only_execution_graph() {
        let file = write_temp(&api_json().to_string());
        let wf = Workflow::from_file(file.path()).unwrap();
        assert!(wf.has_execution_graph());
        assert!(!wf.has_display_graph());
        assert_eq!(wf.api_json().unwrap().to_value().unwrap(), api_json());
    }

    #[test]
    fn gui_file_populates_only_display_graph() {
        let file = write_temp(&gui_json().to_string());
        let wf = Workflow::from_file(file.path()).unwrap();
        assert!(!wf.has_execution_graph());
        assert_eq!(wf.gui_json().unwrap().to_value().unwrap(), gui_json());
    }

    #[test]
    fn unrecognized_file_is_malformed() {
        let file = write_temp(r#"{"hello": "world"}"#);
        assert_matches!(Workflow::from_file(file.path()), Err(CoreError::Malformed(_)));
    }

    #[test]
    fn load_both_into_empty_workflow() {
        let api_file = write_temp(&api_json().to_string());
        let gui_file = write_temp(&gui_json().to_string());

        let mut wf = Workflow::new(None, None);
        wf.load_api_json(api_file.path()).unwrap();
        wf.load_gui_json(gui_file.path()).unwrap();

        assert_eq!(wf.api_json().unwrap().get("1").unwrap().class_type, "KSampler");
        assert_eq!(wf.gui_json().unwrap().nodes.len(), 2);
    }

    #[test]
    fn missing_file_is_io_error() {
        let mut wf = Workflow::default();
        assert_matches!(wf.load_api_json("non_existent_file.json"), Err(CoreError::Io(_)));
        assert_matches!(wf.load_gui_json("non_existent_file.json"), Err(CoreError::Io(_)));
    }

    #[test]
    fn invalid_json_is_json_error() {
        let file = write_temp("invalid json content {");
        let mut wf = Workflow::default();
        assert_matches!(wf.load_api_json(file.path()), Err(CoreError::Json(_)));
        assert_matches!(wf.load_gui_json(file.path()), Err(CoreError::Json(_)));
    }

    #[test]
    fn image_with_both_chunks_populates_both_graphs() {
        let api = api_json().to_string();
        let gui = gui_json().to_string();
        let bytes = png_with_text(&[("prompt", api.as_str()), ("workflow", gui.as_str())]);
        let wf = Workflow::from_image_bytes(&bytes).unwrap();
        assert_eq!(wf.api_json().unwrap().to_value().unwrap(), api_json());
        assert_eq!(wf.gui_json().unwrap().to_value().unwrap(), gui_json());
    }

    #[test]
    fn image_with_metadata_after_pixels_loads() {
        let api = api_json().to_string();
        let bytes = png_with_trailing_text(&[("prompt", api.as_str())]);
        let wf = Workflow::from_image_bytes(&bytes).unwrap();
        assert_eq!(wf.api_json().unwrap().to_value().unwrap(), api_json());
        assert!(wf.gui_json().is_none());
    }

    #[test]
    fn image_without_metadata_is_malformed() {
        let bytes = png_with_text(&[("Software", "paint")]);
        let err = Workflow::from_image_bytes(&bytes).unwrap_err();
        assert_matches!(&err, CoreError::Malformed(_));
        assert!(err.to_string().contains("No workflow metadata found"));
    }

    #[test]
    fn saved_output_round_trips_workflow() {
        let wf = Workflow::from_json(api_json()).unwrap();
        let output = crate::media::MediaOutput {
            data: png_with_text(&[]),
            filename: "roundtrip.png".to_string(),
            subfolder: "output".to_string(),
            output_type: "output".to_string(),
            node: None,
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roundtrip.png");
        output.save(&path, Some(&wf)).unwrap();

        let loaded = Workflow::from_image(&path).unwrap();
        assert_eq!(loaded.api_json(), wf.api_json());
        assert!(loaded.gui_json().is_none());
    }
}
