//! Workflow graph model for ComfyUI job graphs.
//!
//! Holds the execution ("API") and display ("GUI") representations of a
//! workflow, resolves nodes by id, title or class type, keeps positional
//! widget slots in the display graph aligned with named parameter edits,
//! and aggregates the media a finished job produced.

pub mod error;
pub mod graph;
pub mod image_metadata;
pub mod loader;
pub mod locator;
pub mod media;
pub mod node;
pub mod sync;
pub mod types;
pub mod workflow;

pub use error::CoreError;
pub use graph::{DisplayGraph, DisplayNode, ExecutionGraph, NodeMeta, NodeSpec};
pub use locator::NodeQuery;
pub use media::{ExecutionResult, ExecutionStatus, MediaCollection, MediaOutput, NodeInfo};
pub use node::{Node, NodeMut, Param, ParamMut};
pub use sync::WidgetSchema;
pub use types::NodeId;
pub use workflow::Workflow;
