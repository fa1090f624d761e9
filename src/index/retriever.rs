//! Retrieval seam between the orchestrator and the index.
//!
//! The orchestrator depends on this trait, not on the index's storage
//! details, so tests (and future backends) can substitute their own
//! retrieval capability.

use std::sync::Arc;

use async_trait::async_trait;

use super::sqlite::{ScoredRecord, SqliteIndex};
use crate::core::errors::PipelineError;
use crate::llm::LlmProvider;

#[async_trait]
pub trait Retriever: Send + Sync {
    /// Returns the `k` records most similar to `question`, nearest-first.
    async fn retrieve(&self, question: &str, k: usize)
        -> Result<Vec<ScoredRecord>, PipelineError>;
}

/// Retriever backed by the SQLite embedding index. Holds the same provider
/// and embedding model the index was built with.
pub struct IndexRetriever {
    index: Arc<SqliteIndex>,
    provider: Arc<dyn LlmProvider>,
    embedding_model: String,
}

impl IndexRetriever {
    pub fn new(
        index: Arc<SqliteIndex>,
        provider: Arc<dyn LlmProvider>,
        embedding_model: String,
    ) -> Self {
        Self {
            index,
            provider,
            embedding_model,
        }
    }
}

#[async_trait]
impl Retriever for IndexRetriever {
    async fn retrieve(
        &self,
        question: &str,
        k: usize,
    ) -> Result<Vec<ScoredRecord>, PipelineError> {
        self.index
            .search(self.provider.as_ref(), &self.embedding_model, question, k)
            .await
    }
}
