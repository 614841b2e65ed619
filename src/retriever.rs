//! Top-k retrieval over the loaded vector index.
//!
//! The retriever owns the only read path into index internals: it embeds the
//! query with the same provider used at ingest time, runs the ANN search,
//! and materializes [`RetrievalHit`]s carrying the full chunk metadata.
//! Downstream components (similarity engine, prompt builder, hallucination
//! detector) consume hits and never look inside the index.

use std::path::Path;
use std::sync::Arc;

use crate::embedding::{embed_query, EmbeddingProvider};
use crate::error::{Error, Result};
use crate::index::VectorIndex;
use crate::models::RetrievalHit;

/// Read-only retrieval handle shared by all query paths.
pub struct Retriever {
    index: Option<Arc<VectorIndex>>,
    provider: Arc<dyn EmbeddingProvider>,
}

impl Retriever {
    /// Create a retriever with no index loaded. Every retrieval fails with
    /// [`Error::IndexNotReady`] until [`load`](Self::load) succeeds.
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            index: None,
            provider,
        }
    }

    /// Create a retriever over an already-loaded index.
    pub fn with_index(provider: Arc<dyn EmbeddingProvider>, index: Arc<VectorIndex>) -> Self {
        Self {
            index: Some(index),
            provider,
        }
    }

    /// Load the index from its directory.
    pub fn load(&mut self, dir: &Path) -> Result<()> {
        let index = VectorIndex::load(dir)?;
        self.index = Some(Arc::new(index));
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.index.is_some()
    }

    /// Number of chunks in the loaded index, if any.
    pub fn corpus_size(&self) -> usize {
        self.index.as_ref().map(|i| i.len()).unwrap_or(0)
    }

    /// Retrieve the top-k chunks for a query, with distances.
    pub async fn retrieve_with_scores(&self, query: &str, k: usize) -> Result<Vec<RetrievalHit>> {
        let index = self.index.as_ref().ok_or(Error::IndexNotReady)?;

        let query_vector = embed_query(self.provider.as_ref(), query).await?;
        let scored = index.search(&query_vector, k);

        Ok(scored
            .into_iter()
            .filter_map(|(idx, distance)| {
                index.record(idx).map(|record| RetrievalHit {
                    record: record.clone(),
                    distance,
                    query: query.to_string(),
                })
            })
            .collect())
    }

    /// Retrieve the top-k chunks for a query. Convenience wrapper over
    /// [`retrieve_with_scores`](Self::retrieve_with_scores).
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievalHit>> {
        self.retrieve_with_scores(query, k).await
    }
}
