//! Domain models for the taxonomy service.
//!
//! # Core Concepts
//!
//! ## Taxonomy
//!
//! - [`TaxonomyRow`]: One flat input record (level, topic, subtopic, question label).
//! - [`TaxonomyNode`]: A question in the built tree, identified by a content-derived [`NodeId`].
//! - [`Forest`]: The ordered root nodes built from one row sequence, plus any [`OrphanedRow`]s.
//! - [`TopicSummary`]: Distinct topics and their subtopics, used to navigate the forest.
//!
//! ## Answers
//!
//! - [`Answer`]: Free-text value recorded against a node id. Saving again overwrites.
//! - [`AnswerRecord`]: A stored answer with its last write time.

mod answer;
mod taxonomy;
mod topic;

pub use answer::*;
pub use taxonomy::*;
pub use topic::*;
