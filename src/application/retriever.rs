use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::{debug, info};
use std::sync::Arc;

use crate::domain::{DocumentChunk, Embedder, Retriever, VectorRepository};

/// Default number of chunks retrieved per question.
pub const DEFAULT_TOP_K: usize = 3;

// Embeds the question and runs a k-NN search against the persisted index
pub struct VectorRetriever {
    embedder: Arc<dyn Embedder>,
    repository: Arc<dyn VectorRepository>,
    top_k: usize,
}

impl VectorRetriever {
    pub fn new(embedder: Arc<dyn Embedder>, repository: Arc<dyn VectorRepository>, top_k: usize) -> Result<Self> {
        if top_k == 0 {
            return Err(anyhow!("top_k must be greater than zero"));
        }
        Ok(Self { embedder, repository, top_k })
    }
}

#[async_trait]
impl Retriever for VectorRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<DocumentChunk>> {
        info!("Retrieving top {} chunks for query: '{}'", self.top_k, query);

        let query_vector = self.embedder.embed_query(query)?;
        let mut hits = self.repository.search(query_vector, self.top_k).await?;

        // A repository may hand back more than it was asked for
        hits.truncate(self.top_k);
        for (rank, hit) in hits.iter().enumerate() {
            debug!("#{} score={:.4} source={}", rank + 1, hit.score, hit.chunk.source());
        }

        Ok(hits.into_iter().map(|hit| hit.chunk).collect())
    }
}
