pub mod docker;
pub mod embedding;
pub mod file_index;
pub mod file_system;
pub mod ollama;
pub mod vector_db;

// Re-export key types for easier access from initialization and tests
pub use embedding::EmbeddingGenerator;
pub use file_index::FileVectorIndex;
pub use ollama::{OllamaGenerator, OllamaSettings};
pub use vector_db::QdrantIndex;

// Re-export EmbeddingModel directly from the dependency
pub use fastembed::EmbeddingModel;
