//! Row sources: where taxonomy rows come from.

use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;

use crate::error::TaxonomyError;
use crate::models::TaxonomyRow;

/// Supplies the ordered rows for a source key (a file path, a content hash,
/// or anything else the implementation understands).
///
/// Reads are synchronous; the cache runs them on the blocking thread pool.
pub trait RowSource: Send + Sync {
    fn read_rows(&self, key: &str) -> Result<Vec<TaxonomyRow>, TaxonomyError>;
}

/// Reads rows from CSV files with a `level,topic,subtopic,questionLabel`
/// header. The source key is the file path, resolved against `base_dir`
/// when one is set.
#[derive(Debug, Clone, Default)]
pub struct CsvFileSource {
    base_dir: Option<PathBuf>,
}

impl CsvFileSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    fn resolve(&self, key: &str) -> PathBuf {
        match &self.base_dir {
            Some(dir) => dir.join(key),
            None => PathBuf::from(key),
        }
    }
}

impl RowSource for CsvFileSource {
    fn read_rows(&self, key: &str) -> Result<Vec<TaxonomyRow>, TaxonomyError> {
        let path = self.resolve(key);
        tracing::debug!(path = %path.display(), "Reading taxonomy CSV");
        let file = std::fs::File::open(&path).map_err(|e| source_error(key, e))?;
        read_csv(file, key)
    }
}

/// Parse taxonomy rows from CSV data.
///
/// Fields are trimmed, blank lines skipped, columns other than the four
/// taxonomy columns ignored, and stray double quotes removed from values.
pub fn read_csv(reader: impl Read, key: &str) -> Result<Vec<TaxonomyRow>, TaxonomyError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    reader
        .deserialize::<TaxonomyRow>()
        .map(|record| record.map(strip_quotes).map_err(|e| source_error(key, e)))
        .collect()
}

fn strip_quotes(row: TaxonomyRow) -> TaxonomyRow {
    TaxonomyRow {
        level: row.level.replace('"', ""),
        topic: row.topic.replace('"', ""),
        subtopic: row.subtopic.replace('"', ""),
        question_label: row.question_label.replace('"', ""),
    }
}

fn source_error(key: &str, e: impl std::fmt::Display) -> TaxonomyError {
    TaxonomyError::SourceRead {
        key: key.to_string(),
        message: e.to_string(),
    }
}

/// Rows held in memory, keyed by name. Unknown keys fail with
/// [`TaxonomyError::SourceRead`].
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    rows: HashMap<String, Vec<TaxonomyRow>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(mut self, key: impl Into<String>, rows: Vec<TaxonomyRow>) -> Self {
        self.rows.insert(key.into(), rows);
        self
    }
}

impl RowSource for MemorySource {
    fn read_rows(&self, key: &str) -> Result<Vec<TaxonomyRow>, TaxonomyError> {
        self.rows
            .get(key)
            .cloned()
            .ok_or_else(|| source_error(key, "no such source"))
    }
}
