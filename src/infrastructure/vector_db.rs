use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log;
use std::collections::HashMap;

// Use the re-exported module path for Qdrant internally
pub use qdrant_client; // Re-export the entire module
use self::qdrant_client::qdrant::value::Kind as QdrantValueKind;
use self::qdrant_client::qdrant::{
    vectors_config, with_payload_selector, with_vectors_selector, GetCollectionInfoResponse, SearchPoints,
    Value as QdrantValue, WithPayloadSelector, WithVectorsSelector,
};
use self::qdrant_client::Qdrant;

use crate::domain::{ChunkMetadata, DocumentChunk, ScoredChunk, VectorRepository};

mod payload {
    use crate::domain::ChunkMetadata;
    use serde::Deserialize;

    // Payload layout written by the indexing job (LangChain-compatible field names accepted)
    #[derive(Deserialize, Debug, Clone)]
    pub struct ChunkPayload {
        #[serde(alias = "page_content")]
        pub content: String,
        #[serde(default)]
        pub metadata: Option<ChunkMetadata>,
        #[serde(default)]
        pub source: Option<String>,
    }
}
use self::payload::ChunkPayload;

/// A report index stored in an existing Qdrant collection. Read-only.
pub struct QdrantIndex {
    client: Box<Qdrant>,
    collection_name: String,
    vector_size: u64,
}

impl QdrantIndex {
    /// Creates a new QdrantIndex instance.
    ///
    /// # Arguments
    ///
    /// * `client` - An initialized Qdrant client.
    /// * `collection_name` - The collection holding the report chunks.
    /// * `vector_size` - The dimension of the stored vectors.
    pub fn new(client: Box<Qdrant>, collection_name: String, vector_size: u64) -> Result<Self> {
        if collection_name.is_empty() {
            return Err(anyhow!("Collection name cannot be empty"));
        }
        if vector_size == 0 {
            return Err(anyhow!("Vector size must be greater than zero"));
        }
        Ok(Self {
            client,
            collection_name,
            vector_size,
        })
    }

    pub fn vector_size(&self) -> usize {
        self.vector_size as usize
    }

    /// Fails when the collection does not exist or stores vectors of another
    /// size than configured; startup treats both as fatal.
    pub async fn ensure_collection_exists(&self) -> Result<()> {
        log::info!("Checking that collection '{}' exists...", self.collection_name);
        let response = match self.client.collection_info(&self.collection_name).await {
            Ok(response) => response,
            Err(e) => {
                log::error!("Collection '{}' is not available: {}", self.collection_name, e);
                return Err(anyhow!(
                    "Qdrant collection '{}' is not available (build the index first): {}",
                    self.collection_name,
                    e
                ));
            }
        };

        match collection_vector_size(&response) {
            Some(size) if size != self.vector_size => Err(anyhow!(
                "Qdrant collection '{}' stores {}-dimensional vectors, but vector_size is configured as {}",
                self.collection_name,
                size,
                self.vector_size
            )),
            Some(_) => {
                log::info!("Collection '{}' found ({} dims).", self.collection_name, self.vector_size);
                Ok(())
            }
            None => {
                log::warn!(
                    "Collection '{}' found, but its vector size could not be read; assuming {}",
                    self.collection_name,
                    self.vector_size
                );
                Ok(())
            }
        }
    }

    async fn search_impl(&self, query_vector: Vec<f32>, limit: usize) -> Result<Vec<ScoredChunk>> {
        if query_vector.len() as u64 != self.vector_size {
            return Err(anyhow!(
                "Query vector dimension ({}) does not match collection dimension ({})",
                query_vector.len(),
                self.vector_size
            ));
        }

        log::debug!("Searching in collection '{}' with limit {}...", self.collection_name, limit);

        let search_request = SearchPoints {
            collection_name: self.collection_name.clone(),
            vector: query_vector,
            limit: limit as u64,
            with_payload: Some(WithPayloadSelector {
                selector_options: Some(with_payload_selector::SelectorOptions::Enable(true)),
            }),
            with_vectors: Some(WithVectorsSelector {
                selector_options: Some(with_vectors_selector::SelectorOptions::Enable(false)),
            }),
            ..Default::default()
        };

        let response = self.client.search_points(search_request).await.map_err(|e| {
            log::error!("Qdrant search failed in collection '{}': {}", self.collection_name, e);
            anyhow!("Qdrant search failed: {}", e)
        })?;
        log::debug!("Qdrant returned {} points.", response.result.len());

        // Qdrant already orders points by descending score
        let hits = response
            .result
            .into_iter()
            .filter_map(|scored_point| {
                if scored_point.payload.is_empty() {
                    log::warn!("Search result point {:?} has no payload, skipping.", scored_point.id);
                    return None;
                }
                let json_value = qdrant_payload_to_serde_value(scored_point.payload);
                match serde_json::from_value::<ChunkPayload>(json_value) {
                    Ok(payload) => Some(ScoredChunk {
                        chunk: payload_to_chunk(payload),
                        score: scored_point.score,
                    }),
                    Err(e) => {
                        log::error!("Failed to deserialize payload of point {:?}: {}", scored_point.id, e);
                        None
                    }
                }
            })
            .collect();
        Ok(hits)
    }
}

// Size of the collection's single unnamed vector; None for named-vector layouts
fn collection_vector_size(response: &GetCollectionInfoResponse) -> Option<u64> {
    let params = response.result.as_ref()?.config.as_ref()?.params.as_ref()?;
    match params.vectors_config.as_ref()?.config.as_ref()? {
        vectors_config::Config::Params(vector_params) => Some(vector_params.size),
        vectors_config::Config::ParamsMap(_) => None,
    }
}

fn payload_to_chunk(payload: ChunkPayload) -> DocumentChunk {
    let mut metadata: ChunkMetadata = payload.metadata.unwrap_or_default();
    if metadata.source.is_none() {
        metadata.source = payload.source;
    }
    DocumentChunk {
        content: payload.content,
        metadata,
    }
}

// Converts a Qdrant payload map back into JSON
fn qdrant_payload_to_serde_value(payload_map: HashMap<String, QdrantValue>) -> serde_json::Value {
    serde_json::Value::Object(
        payload_map
            .into_iter()
            .map(|(key, value)| (key, qdrant_value_to_serde(value)))
            .collect(),
    )
}

fn qdrant_value_to_serde(value: QdrantValue) -> serde_json::Value {
    match value.kind {
        Some(QdrantValueKind::NullValue(_)) | None => serde_json::Value::Null,
        Some(QdrantValueKind::BoolValue(b)) => serde_json::Value::Bool(b),
        Some(QdrantValueKind::DoubleValue(d)) => serde_json::Number::from_f64(d)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Some(QdrantValueKind::IntegerValue(i)) => serde_json::Value::Number(i.into()),
        Some(QdrantValueKind::StringValue(s)) => serde_json::Value::String(s),
        Some(QdrantValueKind::ListValue(list)) => {
            serde_json::Value::Array(list.values.into_iter().map(qdrant_value_to_serde).collect())
        }
        Some(QdrantValueKind::StructValue(s)) => qdrant_payload_to_serde_value(s.fields),
    }
}

#[async_trait]
impl VectorRepository for QdrantIndex {
    async fn search(&self, query_vector: Vec<f32>, limit: usize) -> Result<Vec<ScoredChunk>> {
        self.search_impl(query_vector, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::vector_db::qdrant_client::qdrant::{
        CollectionConfig, CollectionInfo, CollectionParams, ListValue, Struct, VectorParams, VectorParamsMap,
        VectorsConfig,
    };
    use serde_json::json;

    fn qdrant_string(s: &str) -> QdrantValue {
        QdrantValue {
            kind: Some(QdrantValueKind::StringValue(s.to_string())),
        }
    }

    #[test]
    fn test_payload_conversion_handles_nested_values() {
        let tags = QdrantValue {
            kind: Some(QdrantValueKind::ListValue(ListValue {
                values: vec![
                    qdrant_string("equity"),
                    QdrantValue { kind: Some(QdrantValueKind::BoolValue(true)) },
                ],
            })),
        };
        let metadata = QdrantValue {
            kind: Some(QdrantValueKind::StructValue(Struct {
                fields: HashMap::from([
                    ("source".to_string(), qdrant_string("fmr_dec25.pdf")),
                    ("page".to_string(), QdrantValue { kind: Some(QdrantValueKind::IntegerValue(3)) }),
                    ("tags".to_string(), tags),
                ]),
            })),
        };
        let payload = HashMap::from([
            ("page_content".to_string(), qdrant_string("Fund returned 12%")),
            ("metadata".to_string(), metadata),
        ]);

        let value = qdrant_payload_to_serde_value(payload);
        assert_eq!(value["page_content"], json!("Fund returned 12%"));
        assert_eq!(value["metadata"]["page"], json!(3));
        assert_eq!(value["metadata"]["tags"], json!(["equity", true]));

        let chunk = payload_to_chunk(serde_json::from_value(value).unwrap());
        assert_eq!(chunk.content, "Fund returned 12%");
        assert_eq!(chunk.source(), "fmr_dec25.pdf");
        assert_eq!(chunk.metadata.page, Some(json!(3)));
    }

    #[test]
    fn test_page_label_payload_is_kept() {
        let metadata = QdrantValue {
            kind: Some(QdrantValueKind::StructValue(Struct {
                fields: HashMap::from([
                    ("source".to_string(), qdrant_string("fmr_dec25.pdf")),
                    ("page".to_string(), qdrant_string("iv")),
                ]),
            })),
        };
        let payload = HashMap::from([
            ("content".to_string(), qdrant_string("Conventional fund summary")),
            ("metadata".to_string(), metadata),
        ]);

        let chunk = payload_to_chunk(serde_json::from_value(qdrant_payload_to_serde_value(payload)).unwrap());
        assert_eq!(chunk.source(), "fmr_dec25.pdf");
        assert_eq!(chunk.metadata.page, Some(json!("iv")));
    }

    #[test]
    fn test_top_level_source_is_used_when_metadata_lacks_one() {
        let payload = HashMap::from([
            ("content".to_string(), qdrant_string("Islamic income fund")),
            ("source".to_string(), qdrant_string("islamic.pdf")),
        ]);
        let chunk = payload_to_chunk(serde_json::from_value(qdrant_payload_to_serde_value(payload)).unwrap());
        assert_eq!(chunk.source(), "islamic.pdf");
    }

    fn info_with(config: Option<vectors_config::Config>) -> GetCollectionInfoResponse {
        GetCollectionInfoResponse {
            result: Some(CollectionInfo {
                config: Some(CollectionConfig {
                    params: Some(CollectionParams {
                        vectors_config: Some(VectorsConfig { config }),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_collection_vector_size() {
        let single = info_with(Some(vectors_config::Config::Params(VectorParams {
            size: 768,
            ..Default::default()
        })));
        assert_eq!(collection_vector_size(&single), Some(768));

        let named = info_with(Some(vectors_config::Config::ParamsMap(VectorParamsMap::default())));
        assert_eq!(collection_vector_size(&named), None);
        assert_eq!(collection_vector_size(&GetCollectionInfoResponse::default()), None);
    }

    #[tokio::test]
    async fn test_new_rejects_invalid_params() {
        let client = Qdrant::from_url("http://localhost:6334").build().expect("client builds without connecting");
        assert!(QdrantIndex::new(Box::new(client.clone()), String::new(), 384).is_err());
        assert!(QdrantIndex::new(Box::new(client), "fmr_reports".to_string(), 0).is_err());
    }
}
