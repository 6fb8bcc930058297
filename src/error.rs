use thiserror::Error;

/// Failures raised while reading or building a taxonomy.
///
/// Every variant carries owned text only, so the error is `Clone` and can be
/// shared between callers waiting on the same cache build.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaxonomyError {
    #[error("taxonomy source contains no rows")]
    EmptyInput,

    #[error("row {index} has malformed level `{value}`: expected a positive integer")]
    MalformedRow { index: usize, value: String },

    #[error("row {index} at level {level} has no matching parent")]
    OrphanedRow { index: usize, level: u32 },

    #[error("failed to read taxonomy source `{key}`: {message}")]
    SourceRead { key: String, message: String },
}

impl TaxonomyError {
    /// Stable machine-readable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyInput => "empty_input",
            Self::MalformedRow { .. } => "malformed_row",
            Self::OrphanedRow { .. } => "orphaned_row",
            Self::SourceRead { .. } => "source_read",
        }
    }
}
