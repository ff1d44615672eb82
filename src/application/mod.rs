pub mod category_filter;
pub mod prompt;
pub mod rag_pipeline;
pub mod retriever;

pub use category_filter::filter_by_category;
pub use prompt::{PromptAssembler, MAX_CHUNK_CHARS};
pub use rag_pipeline::RagPipeline;
pub use retriever::{VectorRetriever, DEFAULT_TOP_K};
