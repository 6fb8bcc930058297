//! ESG taxonomy questionnaire service.
//!
//! Turns a flat, leveled list of taxonomy rows into a nested question tree
//! with content-derived node identifiers, and stores free-text answers keyed
//! by those identifiers.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod taxonomy;

pub use error::TaxonomyError;
