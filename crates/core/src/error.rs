use crate::types::NodeId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A lookup matched zero nodes (or artifacts).
    #[error("Not found: {0}")]
    NotFound(String),

    /// A lookup that must be unique matched two or more nodes.
    #[error("Ambiguous lookup: {what} matches nodes [{}]", .candidates.join(", "))]
    Ambiguous {
        what: String,
        candidates: Vec<NodeId>,
    },

    /// Input did not contain a recognizable workflow graph.
    #[error("Malformed workflow: {0}")]
    Malformed(String),

    /// A lookup was issued without any criterion.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("PNG error: {0}")]
    Png(String),
}
