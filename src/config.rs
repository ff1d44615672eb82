use anyhow::{anyhow, Context, Result};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::application::{DEFAULT_TOP_K, MAX_CHUNK_CHARS};
use crate::infrastructure::OllamaSettings;

const DEFAULT_CONFIG_FILE: &str = "fmr_config.toml";
const CONFIG_PATH_ENV: &str = "FMR_CONFIG_PATH";
// Set by Hugging Face Spaces, where no Ollama server is reachable
const HOSTED_DEMO_ENV: &str = "SPACE_ID";
const EXPLICIT_MODE_ENV: &str = "FMR_GENERATOR__MODE";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "fmr", "fmr-assistant")
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    #[default]
    File,
    Qdrant,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct IndexConfig {
    #[serde(default)]
    pub backend: IndexBackend,
    /// JSON Lines index, gzip-compressed when the name ends in `.gz`.
    pub path: PathBuf,
    /// Fetched into `path` when the file is missing.
    #[serde(default)]
    pub download_url: Option<String>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: IndexBackend::File,
            path: PathBuf::from("embeddings/fmr_index.jsonl.gz"),
            download_url: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct QdrantConfig {
    pub url: String,
    pub collection: String,
    pub vector_size: u64,
    /// Start a local `qdrant/qdrant` container through Docker when needed.
    #[serde(default)]
    pub manage_container: bool,
    pub container_name: String,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
            collection: "fmr_reports".to_string(),
            vector_size: 384,
            manage_container: false,
            container_name: "fmr-qdrant".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub max_chunk_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            max_chunk_chars: MAX_CHUNK_CHARS,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            cache_dir: project_dirs().map(|dirs| dirs.cache_dir().join("models")),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    /// Answers are generated by a reachable Ollama server.
    #[default]
    Local,
    /// No generator; non-greeting questions get the demo notice.
    Demo,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct GeneratorConfig {
    #[serde(default)]
    pub mode: DeploymentMode,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        let ollama = OllamaSettings::default();
        Self {
            mode: DeploymentMode::Local,
            base_url: ollama.base_url,
            model: ollama.model,
            temperature: ollama.temperature,
            timeout_secs: ollama.timeout.as_secs(),
            max_retries: ollama.max_retries,
            retry_backoff_ms: ollama.retry_backoff.as_millis() as u64,
        }
    }
}

impl GeneratorConfig {
    pub fn ollama_settings(&self) -> OllamaSettings {
        OllamaSettings {
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            timeout: Duration::from_secs(self.timeout_secs),
            max_retries: self.max_retries,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub qdrant: QdrantConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
}

pub fn load_config() -> Result<AppConfig> {
    // Support FMR_CONFIG_PATH env var for config file path
    let config_path_env = std::env::var(CONFIG_PATH_ENV).ok();
    let config_path = config_path_env
        .clone()
        .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());

    if let Some(ref env_path) = config_path_env {
        if !std::path::Path::new(env_path).exists() {
            return Err(anyhow!("Config file not found at {}: {}", CONFIG_PATH_ENV, env_path));
        }
        log::info!("{} is set: {}", CONFIG_PATH_ENV, env_path);
    } else {
        log::info!("{} not set, falling back to default: {}", CONFIG_PATH_ENV, config_path);
    }

    let mut figment = Figment::new()
        .merge(Serialized::defaults(AppConfig::default()))
        .merge(Toml::file(&config_path));

    if std::env::var_os(HOSTED_DEMO_ENV).is_some() && std::env::var_os(EXPLICIT_MODE_ENV).is_none() {
        log::info!("{} detected, running in demo mode", HOSTED_DEMO_ENV);
        figment = figment.merge(Serialized::default("generator.mode", DeploymentMode::Demo));
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("FMR_").split("__"))
        .extract()
        .context("Failed to extract AppConfig")?;
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.index.backend == IndexBackend::File && config.index.path.as_os_str().is_empty() {
        return Err(anyhow!("Configured index.path cannot be empty"));
    }
    if config.index.backend == IndexBackend::Qdrant && config.qdrant.collection.trim().is_empty() {
        return Err(anyhow!("qdrant.collection cannot be empty when the qdrant backend is selected"));
    }
    if config.retrieval.top_k == 0 {
        return Err(anyhow!("retrieval.top_k must be at least 1"));
    }
    if config.retrieval.max_chunk_chars == 0 || config.retrieval.max_chunk_chars > MAX_CHUNK_CHARS {
        return Err(anyhow!(
            "retrieval.max_chunk_chars must be between 1 and {}, got {}",
            MAX_CHUNK_CHARS,
            config.retrieval.max_chunk_chars
        ));
    }
    if config.generator.timeout_secs == 0 {
        return Err(anyhow!("generator.timeout_secs must be greater than zero"));
    }
    if config.generator.temperature < 0.0 {
        return Err(anyhow!("generator.temperature cannot be negative"));
    }
    if config.generator.model.trim().is_empty() {
        return Err(anyhow!("generator.model cannot be empty"));
    }
    Ok(())
}
