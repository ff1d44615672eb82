pub mod document;
pub mod generation;
pub mod retrieval;

// Re-export the types every layer passes around
pub use document::{AnswerResult, Category, ChunkMetadata, DocumentChunk, ParseCategoryError, ScoredChunk};
pub use generation::{AnswerGenerator, GenerationError};
pub use retrieval::{Embedder, Retriever, VectorRepository};
