use anyhow::{anyhow, Result};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::path::PathBuf;

use crate::domain::Embedder;

/// Embedding dimension of [`EmbeddingModel::AllMiniLML6V2`].
pub const MINILM_DIMENSION: usize = 384;

/// A struct responsible for generating text embeddings using a pre-initialized model.
pub struct EmbeddingGenerator {
    model: TextEmbedding,
    dimension: usize,
}

impl EmbeddingGenerator {
    /// Creates a new EmbeddingGenerator, initializing the specified embedding model.
    ///
    /// # Arguments
    ///
    /// * `model_name` - The embedding model to use. Must match the model the index was built with.
    /// * `cache_dir` - The cache directory for the model files (None for the fastembed default).
    ///
    /// Model files are downloaded on first use, so this blocks; call it off the async runtime.
    pub fn new(model_name: EmbeddingModel, cache_dir: Option<PathBuf>) -> Result<Self> {
        let dimension = TextEmbedding::list_supported_models()
            .iter()
            .find(|info| info.model == model_name)
            .map(|info| info.dim)
            .ok_or_else(|| anyhow!("Unsupported embedding model: {:?}", model_name))?;

        let mut opts = InitOptions::new(model_name);
        if let Some(dir) = cache_dir {
            opts = opts.with_cache_dir(dir);
        }
        let model = TextEmbedding::try_new(opts).map_err(|e| anyhow!("Failed to initialize embedding model: {}", e))?;
        Ok(EmbeddingGenerator { model, dimension })
    }

    /// Generates embeddings for a batch of texts.
    pub fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.model
            .embed(texts.to_vec(), None)
            .map_err(|e| anyhow!("Embedding failed: {}", e))
    }
}

impl Embedder for EmbeddingGenerator {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.generate_embeddings(&[text])?
            .pop()
            .ok_or_else(|| anyhow!("Failed to generate embedding for query: {}", text))
    }
}
