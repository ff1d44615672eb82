pub mod application;
pub mod config;
/// Declare modules and make them public
pub mod domain;
pub mod infrastructure;
pub mod initialization;
pub mod server;

/// Re-export necessary items for the binaries and tests
pub use application::RagPipeline;
pub use config::{load_config, AppConfig};
pub use domain::{AnswerResult, Category, DocumentChunk};
pub use initialization::{assemble_pipeline, initialize_pipeline};
pub use server::FundReportHandler;
