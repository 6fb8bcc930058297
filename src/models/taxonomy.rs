use std::fmt;

use serde::{Deserialize, Serialize};

/// Content-derived identifier of a taxonomy node.
///
/// Answers are keyed by this value, so it must stay stable across rebuilds of
/// the same taxonomy. See [`crate::taxonomy::identity`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One flat input record, exactly as the row source produced it.
///
/// `level` stays textual here; the tree builder is responsible for
/// rejecting values that are not positive integers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxonomyRow {
    pub level: String,
    pub topic: String,
    pub subtopic: String,
    pub question_label: String,
}

impl TaxonomyRow {
    pub fn new(
        level: impl Into<String>,
        topic: impl Into<String>,
        subtopic: impl Into<String>,
        question_label: impl Into<String>,
    ) -> Self {
        Self {
            level: level.into(),
            topic: topic.into(),
            subtopic: subtopic.into(),
            question_label: question_label.into(),
        }
    }
}

/// A question in the built tree.
///
/// A node's `level` is always one greater than its parent's, and `children`
/// keep the order in which their rows were read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxonomyNode {
    pub id: NodeId,
    pub level: u32,
    pub topic: String,
    pub subtopic: String,
    pub question_label: String,
    /// Identifier of `topic` as published by the topic summary.
    pub topic_id: String,
    /// Identifier of `(topic, subtopic)` as published by the topic summary.
    pub subtopic_id: String,
    pub children: Vec<TaxonomyNode>,
}

impl TaxonomyNode {
    /// Visit this node and all of its descendants in pre-order.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a TaxonomyNode)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }
}

/// A row the builder could not attach to any parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanedRow {
    /// Zero-based position of the row in the source.
    pub index: usize,
    pub level: u32,
    pub topic: String,
    pub subtopic: String,
    pub question_label: String,
}

/// An ordered sequence of root nodes, plus the rows that were dropped while
/// building it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Forest {
    pub roots: Vec<TaxonomyNode>,
    pub orphaned: Vec<OrphanedRow>,
}

impl Forest {
    /// Total number of nodes across all trees.
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        for root in &self.roots {
            root.walk(&mut |_| count += 1);
        }
        count
    }

    /// Roots whose topic and subtopic match the given ids. `None` matches
    /// anything.
    pub fn filter(&self, topic_id: Option<&str>, subtopic_id: Option<&str>) -> Vec<&TaxonomyNode> {
        self.roots
            .iter()
            .filter(|root| topic_id.map_or(true, |id| root.topic_id == id))
            .filter(|root| subtopic_id.map_or(true, |id| root.subtopic_id == id))
            .collect()
    }
}
