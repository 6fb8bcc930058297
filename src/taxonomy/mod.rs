//! Taxonomy tree construction.
//!
//! Data flows one way: a [`RowSource`] supplies rows, the [`TreeBuilder`]
//! nests them into a [`Forest`](crate::models::Forest) using
//! [`identity::node_id`] for node identities, and the [`TaxonomyCache`]
//! memoises the result per source key.

pub mod builder;
pub mod cache;
pub mod identity;
pub mod render;
pub mod source;
pub mod summary;

pub use builder::{build_forest, OrphanPolicy, TreeBuilder, MAX_LEVEL};
pub use cache::{Taxonomy, TaxonomyCache};
pub use render::render_tree;
pub use source::{read_csv, CsvFileSource, MemorySource, RowSource};
pub use summary::summarize;
