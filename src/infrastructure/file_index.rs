use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::{info, warn};
use std::path::Path;

use super::file_system::read_index_records;
use crate::domain::{DocumentChunk, ScoredChunk, VectorRepository};

/// A persisted index held fully in memory and searched exhaustively by cosine
/// similarity. Equal scores keep the order in which the chunks appear in the
/// index file.
#[derive(Debug)]
pub struct FileVectorIndex {
    entries: Vec<(DocumentChunk, Vec<f32>)>,
    dimension: usize,
}

impl FileVectorIndex {
    /// Loads an index file. A missing or malformed file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading vector index from {:?}", path);
        let records = read_index_records(path)?;
        let entries: Vec<(DocumentChunk, Vec<f32>)> = records.into_iter().map(|r| r.into_parts()).collect();
        let index = Self::from_entries(entries)?;
        if index.is_empty() {
            warn!("Vector index at {:?} contains no chunks; every question will go unanswered", path);
        }
        info!("Loaded {} chunks ({} dims) from {:?}", index.len(), index.dimension, path);
        Ok(index)
    }

    pub fn from_entries(entries: Vec<(DocumentChunk, Vec<f32>)>) -> Result<Self> {
        let dimension = entries.first().map_or(0, |(_, v)| v.len());
        for (i, (chunk, vector)) in entries.iter().enumerate() {
            if vector.is_empty() {
                return Err(anyhow!("Chunk #{} ({}) has an empty vector", i + 1, chunk.source()));
            }
            if vector.len() != dimension {
                return Err(anyhow!(
                    "Chunk #{} ({}) has {} dimensions, expected {}",
                    i + 1,
                    chunk.source(),
                    vector.len(),
                    dimension
                ));
            }
        }
        Ok(Self { entries, dimension })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Vector dimension of the stored chunks, 0 for an empty index.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn nearest(&self, query_vector: &[f32], limit: usize) -> Result<Vec<ScoredChunk>> {
        if self.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        if query_vector.len() != self.dimension {
            return Err(anyhow!(
                "Query vector dimension ({}) does not match index dimension ({})",
                query_vector.len(),
                self.dimension
            ));
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, (_, vector))| (i, cosine_similarity(query_vector, vector)))
            .collect();
        // Stable sort: ties keep file order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(limit);

        Ok(scored
            .into_iter()
            .map(|(i, score)| ScoredChunk {
                chunk: self.entries[i].0.clone(),
                score,
            })
            .collect())
    }
}

#[async_trait]
impl VectorRepository for FileVectorIndex {
    async fn search(&self, query_vector: Vec<f32>, limit: usize) -> Result<Vec<ScoredChunk>> {
        self.nearest(&query_vector, limit)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
