//! Per-source memoisation of built taxonomies using moka.
//!
//! The first request for a source key reads the rows and builds the forest;
//! later requests share the same [`Taxonomy`]. Concurrent first requests for
//! one key are coalesced into a single read and build. Failed builds are not
//! cached, so the next request retries the read.
//!
//! Entries never expire on their own: sources are treated as immutable for
//! the life of the process. Use [`TaxonomyCache::invalidate`] when a source
//! is known to have changed.

use std::sync::Arc;

use moka::future::Cache;

use crate::error::TaxonomyError;
use crate::models::{Forest, TopicSummary};
use crate::taxonomy::builder::TreeBuilder;
use crate::taxonomy::source::RowSource;
use crate::taxonomy::summary::summarize;

/// Everything derived from one read of a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Taxonomy {
    pub forest: Forest,
    pub topics: Vec<TopicSummary>,
    pub row_count: usize,
}

#[derive(Clone)]
pub struct TaxonomyCache {
    inner: Cache<String, Arc<Taxonomy>>,
    source: Arc<dyn RowSource>,
    builder: TreeBuilder,
}

impl TaxonomyCache {
    pub fn new(source: Arc<dyn RowSource>) -> Self {
        Self::with_builder(source, TreeBuilder::new())
    }

    pub fn with_builder(source: Arc<dyn RowSource>, builder: TreeBuilder) -> Self {
        Self {
            inner: Cache::builder().build(),
            source,
            builder,
        }
    }

    /// Return the taxonomy for `key`, reading and building it on first use.
    ///
    /// # Errors
    /// Propagates the row source's [`TaxonomyError::SourceRead`] and the
    /// builder's errors unchanged. Nothing is cached on error.
    pub async fn get_or_build(&self, key: &str) -> Result<Arc<Taxonomy>, TaxonomyError> {
        let source = Arc::clone(&self.source);
        let builder = self.builder;
        let owned_key = key.to_string();

        self.inner
            .try_get_with(key.to_string(), async move {
                let read_key = owned_key.clone();
                let rows = tokio::task::spawn_blocking(move || source.read_rows(&read_key))
                    .await
                    .map_err(|e| TaxonomyError::SourceRead {
                        key: owned_key.clone(),
                        message: e.to_string(),
                    })??;

                let forest = builder.build(&rows)?;
                let topics = summarize(&rows);

                tracing::info!(
                    key = %owned_key,
                    rows = rows.len(),
                    nodes = forest.node_count(),
                    orphaned = forest.orphaned.len(),
                    "Built taxonomy"
                );

                Ok::<_, TaxonomyError>(Arc::new(Taxonomy {
                    forest,
                    topics,
                    row_count: rows.len(),
                }))
            })
            .await
            .map_err(|e: Arc<TaxonomyError>| {
                tracing::error!(key, error = %e, "Failed to build taxonomy");
                (*e).clone()
            })
    }

    /// The cached taxonomy for `key`, without building it.
    pub async fn get(&self, key: &str) -> Option<Arc<Taxonomy>> {
        self.inner.get(key).await
    }

    pub async fn invalidate(&self, key: &str) {
        self.inner.invalidate(key).await;
    }

    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }

    /// Approximate number of cached taxonomies.
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}
