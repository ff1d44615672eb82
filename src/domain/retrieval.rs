use anyhow::Result;
use async_trait::async_trait;

use crate::domain::document::{DocumentChunk, ScoredChunk};

/// Maps text to a fixed-dimensional vector.
#[cfg_attr(test, mockall::automock)]
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;

    fn embed_query(&self, text: &str) -> Result<Vec<f32>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VectorRepository: Send + Sync {
    /// Returns at most `limit` chunks, most similar first.
    async fn search(&self, query_vector: Vec<f32>, limit: usize) -> Result<Vec<ScoredChunk>>;
}

/// Turns a question into the ranked chunks it should be answered from.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str) -> Result<Vec<DocumentChunk>>;
}
