//! Node resolution by id, class type or title.
//!
//! Title and class type are not unique in a workflow. Single-node lookups
//! by either therefore fail with [`CoreError::Ambiguous`] instead of
//! picking one of several matches.

use std::collections::HashSet;

use crate::error::CoreError;
use crate::graph::{ExecutionGraph, NodeSpec};
use crate::types::NodeId;

/// Criterion for resolving exactly one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeQuery<'a> {
    /// Exact execution-graph key.
    Id(&'a str),
    /// Matches `class_type`.
    ClassType(&'a str),
    /// Matches `_meta.title`.
    Title(&'a str),
}

impl NodeQuery<'_> {
    fn matches(&self, spec: &NodeSpec) -> bool {
        match self {
            NodeQuery::Id(_) => false,
            NodeQuery::ClassType(class_type) => spec.class_type == *class_type,
            NodeQuery::Title(title) => spec.title() == Some(*title),
        }
    }

    fn describe(&self) -> String {
        match self {
            NodeQuery::Id(id) => format!("node with id '{id}'"),
            NodeQuery::ClassType(class_type) => format!("node with class_type '{class_type}'"),
            NodeQuery::Title(title) => format!("node with title '{title}'"),
        }
    }
}

/// Resolve a query to the key of exactly one node.
///
/// The returned reference borrows the key stored in `graph`.
pub fn resolve<'g>(
    graph: &'g ExecutionGraph,
    query: NodeQuery<'_>,
) -> Result<&'g NodeId, CoreError> {
    if let NodeQuery::Id(id) = query {
        return graph
            .entry(id)
            .map(|(key, _)| key)
            .ok_or_else(|| CoreError::NotFound(query.describe()));
    }

    let matches: Vec<&NodeId> = graph
        .iter()
        .filter(|(_, spec)| query.matches(spec))
        .map(|(id, _)| id)
        .collect();

    match matches.as_slice() {
        [] => Err(CoreError::NotFound(query.describe())),
        [only] => Ok(*only),
        _ => Err(CoreError::Ambiguous {
            what: query.describe(),
            candidates: matches.into_iter().cloned().collect(),
        }),
    }
}

/// Ids of every node whose title equals `title` OR whose class type equals
/// `class_type`.
///
/// Each supplied criterion is matched independently and the results are
/// unioned, never intersected. At least one criterion is required.
pub fn union_resolve(
    graph: &ExecutionGraph,
    title: Option<&str>,
    class_type: Option<&str>,
) -> Result<HashSet<NodeId>, CoreError> {
    if title.is_none() && class_type.is_none() {
        return Err(CoreError::InvalidQuery(
            "Either 'title' or 'class_type' must be provided".to_string(),
        ));
    }

    let mut ids = HashSet::new();
    for query in [title.map(NodeQuery::Title), class_type.map(NodeQuery::ClassType)]
        .into_iter()
        .flatten()
    {
        ids.extend(
            graph
                .iter()
                .filter(|(_, spec)| query.matches(spec))
                .map(|(id, _)| id.clone()),
        );
    }
    Ok(ids)
}
