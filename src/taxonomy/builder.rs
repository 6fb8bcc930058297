//! Builds a nested forest from an ordered sequence of flat rows.
//!
//! Rows are read once, in order. A level-1 row starts a new root. Any deeper
//! row is attached to the most recently built node that sits exactly one
//! level above it under the same topic and subtopic. Nodes are never moved
//! once attached.
//!
//! Parent lookup is a reverse linear scan over every node built so far, so a
//! build is O(n²) in the worst case. Taxonomies are a few hundred rows; past
//! a few tens of thousands this wants an index keyed by
//! `(level, topic, subtopic)`.
//!
//! Levels are capped at [`MAX_LEVEL`]. Building, rendering and serializing a
//! tree all recurse once per level, so an unbounded chain would exhaust the
//! stack.

use crate::error::TaxonomyError;
use crate::models::{Forest, OrphanedRow, TaxonomyNode, TaxonomyRow};
use crate::taxonomy::identity;

/// Deepest level a row may declare.
pub const MAX_LEVEL: u32 = 64;

/// What to do with a row that has no matching parent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrphanPolicy {
    /// Leave the row out of the tree, log it and record it in
    /// [`Forest::orphaned`].
    #[default]
    Drop,
    /// Fail the whole build with [`TaxonomyError::OrphanedRow`].
    Reject,
}

impl OrphanPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Drop => "drop",
            Self::Reject => "reject",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "drop" => Some(Self::Drop),
            "reject" => Some(Self::Reject),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TreeBuilder {
    orphan_policy: OrphanPolicy,
}

/// A built node plus the arena positions of its children.
struct Slot {
    node: TaxonomyNode,
    children: Vec<usize>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_orphan_policy(orphan_policy: OrphanPolicy) -> Self {
        Self { orphan_policy }
    }

    pub fn orphan_policy(&self) -> OrphanPolicy {
        self.orphan_policy
    }

    /// Build a forest from `rows`.
    ///
    /// # Errors
    /// - [`TaxonomyError::EmptyInput`] when `rows` is empty.
    /// - [`TaxonomyError::MalformedRow`] when a level is not an integer in
    ///   `1..=MAX_LEVEL`.
    /// - [`TaxonomyError::OrphanedRow`] when a row has no parent and the
    ///   policy is [`OrphanPolicy::Reject`].
    pub fn build(&self, rows: &[TaxonomyRow]) -> Result<Forest, TaxonomyError> {
        if rows.is_empty() {
            return Err(TaxonomyError::EmptyInput);
        }

        let mut arena: Vec<Slot> = Vec::with_capacity(rows.len());
        let mut roots = Vec::new();
        let mut orphaned = Vec::new();

        for (index, row) in rows.iter().enumerate() {
            let level = parse_level(index, &row.level)?;

            if level == 1 {
                roots.push(arena.len());
                arena.push(new_slot(row, level));
                continue;
            }

            let parent = arena.iter().rposition(|slot| {
                slot.node.level == level - 1
                    && slot.node.topic == row.topic
                    && slot.node.subtopic == row.subtopic
            });

            match (parent, self.orphan_policy) {
                (Some(parent), _) => {
                    let position = arena.len();
                    arena[parent].children.push(position);
                    arena.push(new_slot(row, level));
                }
                (None, OrphanPolicy::Reject) => {
                    return Err(TaxonomyError::OrphanedRow { index, level });
                }
                (None, OrphanPolicy::Drop) => {
                    tracing::warn!(
                        index,
                        level,
                        topic = %row.topic,
                        subtopic = %row.subtopic,
                        "Dropping taxonomy row with no matching parent"
                    );
                    orphaned.push(OrphanedRow {
                        index,
                        level,
                        topic: row.topic.clone(),
                        subtopic: row.subtopic.clone(),
                        question_label: row.question_label.clone(),
                    });
                }
            }
        }

        let roots = roots
            .into_iter()
            .map(|position| materialize(&arena, position))
            .collect();

        Ok(Forest { roots, orphaned })
    }
}

/// Build a forest with the default [`OrphanPolicy::Drop`] policy.
pub fn build_forest(rows: &[TaxonomyRow]) -> Result<Forest, TaxonomyError> {
    TreeBuilder::new().build(rows)
}

/// Parse a textual level into an integer in `1..=MAX_LEVEL`.
pub fn parse_level(index: usize, raw: &str) -> Result<u32, TaxonomyError> {
    match raw.trim().parse::<u32>() {
        Ok(level) if (1..=MAX_LEVEL).contains(&level) => Ok(level),
        _ => Err(TaxonomyError::MalformedRow {
            index,
            value: raw.to_string(),
        }),
    }
}

fn new_slot(row: &TaxonomyRow, level: u32) -> Slot {
    Slot {
        node: TaxonomyNode {
            id: identity::node_id(&row.topic, &row.subtopic, &row.question_label),
            level,
            topic: row.topic.clone(),
            subtopic: row.subtopic.clone(),
            question_label: row.question_label.clone(),
            topic_id: identity::topic_id(&row.topic),
            subtopic_id: identity::subtopic_id(&row.topic, &row.subtopic),
            children: Vec::new(),
        },
        children: Vec::new(),
    }
}

fn materialize(arena: &[Slot], position: usize) -> TaxonomyNode {
    let slot = &arena[position];
    TaxonomyNode {
        children: slot
            .children
            .iter()
            .map(|&child| materialize(arena, child))
            .collect(),
        ..slot.node.clone()
    }
}
