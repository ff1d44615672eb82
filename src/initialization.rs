use crate::application::{PromptAssembler, RagPipeline, VectorRetriever};
use crate::config::{AppConfig, DeploymentMode, IndexBackend, QdrantConfig};
use crate::domain::{AnswerGenerator, Embedder, VectorRepository};
use crate::infrastructure::docker::{ensure_qdrant_via_docker, QdrantContainer};
use crate::infrastructure::file_system::download_if_not_exists;
use crate::infrastructure::vector_db::qdrant_client;
use crate::infrastructure::{EmbeddingGenerator, EmbeddingModel, FileVectorIndex, OllamaGenerator, QdrantIndex};

use anyhow::{anyhow, Context, Result};
use log;
use std::sync::Arc;

const QDRANT_HTTP_PORT: u16 = 6333;
const QDRANT_GRPC_PORT: u16 = 6334;

/// Builds the answering pipeline. Every failure here is fatal for the process.
///
/// Loads the embedding model, opens the configured index and sets up the
/// language model client unless the deployment runs in demo mode.
pub async fn initialize_pipeline(config: &AppConfig) -> Result<RagPipeline> {
    let cache_dir = config.embedding.cache_dir.clone();
    log::info!("Loading embedding model (cache: {:?})...", cache_dir);
    let embedder = tokio::task::spawn_blocking(move || EmbeddingGenerator::new(EmbeddingModel::AllMiniLML6V2, cache_dir))
        .await
        .context("Embedding model initialization panicked")?
        .context("Failed to create EmbeddingGenerator")?;

    assemble_pipeline(config, Arc::new(embedder)).await
}

/// Everything after the embedder: index, generator and prompt settings.
pub async fn assemble_pipeline(config: &AppConfig, embedder: Arc<dyn Embedder>) -> Result<RagPipeline> {
    let (repository, index_dimension) = open_repository(config).await?;
    check_dimensions(embedder.dimension(), index_dimension)?;
    let retriever = VectorRetriever::new(embedder, repository, config.retrieval.top_k)?;
    let generator = build_generator(config)?;
    let assembler = PromptAssembler::new(config.retrieval.max_chunk_chars);

    log::info!(
        "Pipeline ready: top_k={}, max_chunk_chars={}, generator={}",
        config.retrieval.top_k,
        assembler.max_chunk_chars(),
        if generator.is_some() { "ollama" } else { "none (demo)" }
    );
    Ok(RagPipeline::new(Arc::new(retriever), generator, assembler))
}

// Returns the repository and the dimension of its stored vectors (0 for an empty file index)
async fn open_repository(config: &AppConfig) -> Result<(Arc<dyn VectorRepository>, usize)> {
    match config.index.backend {
        IndexBackend::File => {
            let path = config.index.path.clone();
            if let Some(url) = config.index.download_url.clone() {
                let dest = path.clone();
                tokio::task::spawn_blocking(move || download_if_not_exists(&url, &dest))
                    .await
                    .context("Index download task panicked")??;
            }
            let index = tokio::task::spawn_blocking(move || FileVectorIndex::load(&path))
                .await
                .context("Index loading task panicked")?
                .with_context(|| format!("Failed to load vector index from {:?}", config.index.path))?;
            let dimension = index.dimension();
            Ok((Arc::new(index), dimension))
        }
        IndexBackend::Qdrant => {
            let index = open_qdrant(&config.qdrant).await?;
            let dimension = index.vector_size();
            Ok((Arc::new(index), dimension))
        }
    }
}

async fn open_qdrant(qdrant: &QdrantConfig) -> Result<QdrantIndex> {
    if qdrant.manage_container {
        ensure_qdrant_via_docker(QdrantContainer {
            name: qdrant.container_name.clone(),
            http_port: QDRANT_HTTP_PORT,
            grpc_port: grpc_port_of(&qdrant.url)?,
        })
        .await
        .context("Failed to start the local Qdrant container")?;
    }

    log::info!("Connecting to Qdrant at {}", qdrant.url);
    let client = qdrant_client::Qdrant::from_url(&qdrant.url)
        .build()
        .with_context(|| format!("Failed to build Qdrant client for {}", qdrant.url))?;
    let index = QdrantIndex::new(Box::new(client), qdrant.collection.clone(), qdrant.vector_size)?;
    index.ensure_collection_exists().await?;
    Ok(index)
}

fn check_dimensions(embedder_dimension: usize, index_dimension: usize) -> Result<()> {
    if index_dimension == 0 {
        return Ok(());
    }
    if embedder_dimension != index_dimension {
        return Err(anyhow!(
            "Embedding model produces {}-dimensional vectors but the index stores {}-dimensional vectors; \
             rebuild the index with the same model",
            embedder_dimension,
            index_dimension
        ));
    }
    Ok(())
}

fn grpc_port_of(url: &str) -> Result<u16> {
    let parsed = reqwest::Url::parse(url).map_err(|e| anyhow!("Invalid qdrant.url '{}': {}", url, e))?;
    Ok(parsed.port().unwrap_or(QDRANT_GRPC_PORT))
}

fn build_generator(config: &AppConfig) -> Result<Option<Arc<dyn AnswerGenerator>>> {
    match config.generator.mode {
        DeploymentMode::Demo => {
            log::warn!("Demo mode: no language model configured, questions will not be answered");
            Ok(None)
        }
        DeploymentMode::Local => {
            let generator = OllamaGenerator::new(config.generator.ollama_settings())?;
            Ok(Some(Arc::new(generator)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::retrieval::MockEmbedder;
    use crate::domain::Category;
    use std::io::Write;
    use tempfile::tempdir;

    fn fixed_embedder() -> Arc<dyn Embedder> {
        let mut embedder = MockEmbedder::new();
        embedder.expect_dimension().return_const(2usize);
        embedder.expect_embed_query().returning(|_| Ok(vec![1.0, 0.0]));
        Arc::new(embedder)
    }

    fn config_with_index(path: std::path::PathBuf) -> AppConfig {
        let mut config = AppConfig::default();
        config.index.path = path;
        config
    }

    #[tokio::test]
    async fn test_missing_index_is_fatal() {
        let dir = tempdir().unwrap();
        let config = config_with_index(dir.path().join("missing.jsonl"));
        let result = assemble_pipeline(&config, fixed_embedder()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_demo_mode_has_no_generator() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("index.jsonl");
        let mut file = std::fs::File::create(&path)?;
        writeln!(
            file,
            r#"{{"content": "Islamic fund", "metadata": {{"source": "a.pdf"}}, "vector": [1.0, 0.0]}}"#
        )?;

        let mut config = config_with_index(path);
        config.generator.mode = DeploymentMode::Demo;
        let pipeline = assemble_pipeline(&config, fixed_embedder()).await?;
        assert!(!pipeline.has_generator());

        let result = pipeline.answer("What is the NAV?", Category::All).await;
        assert!(result.sources.is_empty());

        config.generator.mode = DeploymentMode::Local;
        assert!(assemble_pipeline(&config, fixed_embedder()).await?.has_generator());
        Ok(())
    }

    #[tokio::test]
    async fn test_index_from_another_model_is_fatal() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("index.jsonl");
        std::fs::write(
            &path,
            r#"{"content": "Islamic fund", "metadata": {"source": "a.pdf"}, "vector": [1.0, 0.0]}"#,
        )?;

        let mut embedder = MockEmbedder::new();
        embedder.expect_dimension().return_const(3usize);
        embedder.expect_embed_query().never();

        let err = assemble_pipeline(&config_with_index(path), Arc::new(embedder))
            .await
            .err()
            .expect("dimension mismatch must fail startup");
        assert!(err.to_string().contains("3-dimensional"), "unexpected error: {}", err);
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_index_skips_dimension_check() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("empty.jsonl");
        std::fs::write(&path, "")?;

        let mut embedder = MockEmbedder::new();
        embedder.expect_dimension().return_const(384usize);
        assert!(assemble_pipeline(&config_with_index(path), Arc::new(embedder)).await.is_ok());
        Ok(())
    }

    #[test]
    fn test_check_dimensions() {
        assert!(check_dimensions(384, 384).is_ok());
        assert!(check_dimensions(384, 0).is_ok());
        assert!(check_dimensions(384, 768).is_err());
    }

    #[test]
    fn test_grpc_port_of() {
        assert_eq!(grpc_port_of("http://localhost:6334").unwrap(), 6334);
        assert_eq!(grpc_port_of("http://qdrant:7334").unwrap(), 7334);
        assert_eq!(grpc_port_of("http://qdrant").unwrap(), QDRANT_GRPC_PORT);
        assert!(grpc_port_of("not a url").is_err());
    }
}
