//! Produced artifacts and execution results.

use std::ops::Index;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::image_metadata;
use crate::types::NodeId;
use crate::workflow::Workflow;

/// Identity of the node that produced an artifact.
///
/// Results outlive any borrow of the workflow, so this is a detached copy
/// of the node's identifying fields rather than a live view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub id: NodeId,
    pub class_type: String,
    pub title: Option<String>,
}

impl NodeInfo {
    /// Stand-in for an output node the workflow does not know about.
    pub fn placeholder(id: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            class_type: String::new(),
            title: None,
        }
    }
}

/// A single file produced by a finished job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaOutput {
    #[serde(skip)]
    pub data: Vec<u8>,
    pub filename: String,
    pub subfolder: String,
    /// Storage bucket reported by ComfyUI ("output", "temp", "input").
    #[serde(rename = "type")]
    pub output_type: String,
    pub node: Option<NodeInfo>,
}

impl MediaOutput {
    /// Write the artifact to `path`.
    ///
    /// PNG artifacts get the workflow's graphs embedded as `prompt` and
    /// `workflow` text chunks when a workflow is supplied, so the file can
    /// be reopened with [`Workflow::from_image`].
    pub fn save(&self, path: impl AsRef<Path>, workflow: Option<&Workflow>) -> Result<(), CoreError> {
        let path = path.as_ref();
        let chunks = match workflow {
            Some(w) if image_metadata::is_png(&self.data) => w.metadata_chunks()?,
            _ => Vec::new(),
        };

        if chunks.is_empty() {
            std::fs::write(path, &self.data)?;
        } else {
            let bytes = image_metadata::embed_text_chunks(&self.data, &chunks)?;
            std::fs::write(path, bytes)?;
        }

        tracing::debug!(path = %path.display(), filename = %self.filename, "Saved media output");
        Ok(())
    }
}

/// Ordered, index-addressable collection of artifacts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaCollection {
    items: Vec<MediaOutput>,
}

impl MediaCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, output: MediaOutput) {
        self.items.push(output);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&MediaOutput> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MediaOutput> {
        self.items.iter()
    }

    /// Artifacts whose `type` equals `output_type`, in original order.
    pub fn filter_by_type(&self, output_type: &str) -> MediaCollection {
        self.items
            .iter()
            .filter(|m| m.output_type == output_type)
            .cloned()
            .collect()
    }

    /// The single artifact produced by a node titled `title`.
    ///
    /// Artifacts without node information never match.
    pub fn find_by_title(&self, title: &str) -> Result<&MediaOutput, CoreError> {
        let matches: Vec<&MediaOutput> = self
            .items
            .iter()
            .filter(|m| {
                m.node
                    .as_ref()
                    .and_then(|n| n.title.as_deref())
                    .is_some_and(|t| t == title)
            })
            .collect();

        match matches.as_slice() {
            [] => Err(CoreError::NotFound(format!("output with title '{title}'"))),
            [only] => Ok(*only),
            _ => Err(CoreError::Ambiguous {
                what: format!("output with title '{title}'"),
                candidates: matches
                    .iter()
                    .filter_map(|m| m.node.as_ref().map(|n| n.id.clone()))
                    .collect(),
            }),
        }
    }
}

impl Index<usize> for MediaCollection {
    type Output = MediaOutput;

    fn index(&self, index: usize) -> &MediaOutput {
        &self.items[index]
    }
}

impl Extend<MediaOutput> for MediaCollection {
    fn extend<I: IntoIterator<Item = MediaOutput>>(&mut self, iter: I) {
        self.items.extend(iter);
    }
}

impl FromIterator<MediaOutput> for MediaCollection {
    fn from_iter<I: IntoIterator<Item = MediaOutput>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for MediaCollection {
    type Item = MediaOutput;
    type IntoIter = std::vec::IntoIter<MediaOutput>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a MediaCollection {
    type Item = &'a MediaOutput;
    type IntoIter = std::slice::Iter<'a, MediaOutput>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Lifecycle status of a submitted prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Success,
    Error,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ExecutionStatus::Success | ExecutionStatus::Error)
    }
}

/// Outcome of one submitted prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub prompt_id: String,
    pub status: ExecutionStatus,
    pub error_message: Option<String>,
    pub media: MediaCollection,
}

impl ExecutionResult {
    pub fn success(prompt_id: impl Into<String>, media: MediaCollection) -> Self {
        Self {
            prompt_id: prompt_id.into(),
            status: ExecutionStatus::Success,
            error_message: None,
            media,
        }
    }

    /// Terminal error result; carries no media.
    pub fn failed(prompt_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            prompt_id: prompt_id.into(),
            status: ExecutionStatus::Error,
            error_message: Some(message.into()),
            media: MediaCollection::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn output(filename: &str, output_type: &str, node: Option<NodeInfo>) -> MediaOutput {
        MediaOutput {
            data: filename.as_bytes().to_vec(),
            filename: filename.to_string(),
            subfolder: String::new(),
            output_type: output_type.to_string(),
            node,
        }
    }

    fn titled(id: &str, title: &str) -> Option<NodeInfo> {
        Some(NodeInfo {
            id: id.to_string(),
            class_type: "SaveImage".to_string(),
            title: Some(title.to_string()),
        })
    }

    fn collection() -> MediaCollection {
        [
            output("a.png", "output", titled("9", "Final")),
            output("b.png", "temp", titled("12", "Preview")),
            output("c.png", "output", titled("13", "Preview")),
            output("d.png", "output", None),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn indexing_and_length() {
        let media = collection();
        assert_eq!(media.len(), 4);
        assert_eq!(media[2].filename, "c.png");
        assert!(media.get(4).is_none());
    }

    #[test]
    fn push_and_extend_append_in_order() {
        let mut media = MediaCollection::new();
        assert!(media.is_empty());
        media.push(output("x.png", "output", None));
        media.extend(collection());
        assert_eq!(media.len(), 5);
        assert_eq!(media[0].filename, "x.png");
        assert_eq!(media[4].filename, "d.png");
    }

    #[test]
    fn filter_by_type_keeps_order() {
        let names: Vec<_> = collection()
            .filter_by_type("output")
            .iter()
            .map(|m| m.filename.clone())
            .collect();
        assert_eq!(names, vec!["a.png", "c.png", "d.png"]);
        assert!(collection().filter_by_type("input").is_empty());
    }

    #[test]
    fn find_by_title_unique() {
        let media = collection();
        assert_eq!(media.find_by_title("Final").unwrap().filename, "a.png");
    }

    #[test]
    fn find_by_title_ambiguous_lists_node_ids() {
        let media = collection();
        assert_matches!(
            media.find_by_title("Preview"),
            Err(CoreError::Ambiguous { candidates, .. }) if candidates == vec!["12", "13"]
        );
    }

    #[test]
    fn find_by_title_missing_is_not_found() {
        assert_matches!(collection().find_by_title("Nope"), Err(CoreError::NotFound(_)));
    }

    #[test]
    fn placeholder_node_has_empty_class_type() {
        let info = NodeInfo::placeholder("77");
        assert_eq!(info.id, "77");
        assert!(info.class_type.is_empty());
        assert!(info.title.is_none());
    }

    #[test]
    fn failed_result_has_no_media() {
        let result = ExecutionResult::failed("p1", "boom");
        assert_eq!(result.status, ExecutionStatus::Error);
        assert!(result.media.is_empty());
        assert_eq!(result.error_message.as_deref(), Some("boom"));
        assert!(!result.is_success());
        assert!(result.status.is_terminal());
    }

    #[test]
    fn save_without_workflow_writes_raw_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        collection()[0].save(&path, None).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"a.png");
    }
}
