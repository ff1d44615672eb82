use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Citation used for chunks indexed without a `source` entry.
pub const UNKNOWN_SOURCE: &str = "Unknown source";

// Metadata attached to a chunk at indexing time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(default)]
    pub source: Option<String>, // Originating report, usually the PDF file name
    /// Page number or label as written by the indexer; not interpreted.
    #[serde(default)]
    pub page: Option<serde_json::Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// A retrievable unit of report text. Read-only once indexed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub content: String,
    #[serde(default)]
    pub metadata: ChunkMetadata,
}

impl DocumentChunk {
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: ChunkMetadata {
                source: Some(source.into()),
                ..Default::default()
            },
        }
    }

    /// The identifier this chunk is cited under.
    pub fn source(&self) -> &str {
        self.metadata.source.as_deref().unwrap_or(UNKNOWN_SOURCE)
    }
}

// A chunk together with its similarity to the query vector
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,
    pub score: f32,
}

/// Fund type a question can be restricted to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    All,
    Islamic,
    Conventional,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::All, Category::Islamic, Category::Conventional];

    pub fn name(&self) -> &'static str {
        match self {
            Category::All => "All",
            Category::Islamic => "Islamic",
            Category::Conventional => "Conventional",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown fund category '{0}' (expected one of: All, Islamic, Conventional)")]
pub struct ParseCategoryError(pub String);

impl FromStr for Category {
    type Err = ParseCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Category::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ParseCategoryError(s.to_string()))
    }
}

/// Final outcome of one question.
///
/// `sources` behaves as a set: no identifier appears twice, and the order is
/// the order in which the cited chunks were placed in the prompt. An empty
/// `sources` list means the answer was not grounded in report content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub answer: String,
    pub sources: Vec<String>,
}

impl AnswerResult {
    /// An answer that cites nothing (greeting, demo, not-mentioned, failure).
    pub fn ungrounded(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            sources: Vec::new(),
        }
    }

    pub fn is_grounded(&self) -> bool {
        !self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse_is_case_insensitive() {
        assert_eq!("islamic".parse::<Category>(), Ok(Category::Islamic));
        assert_eq!(" CONVENTIONAL ".parse::<Category>(), Ok(Category::Conventional));
        assert_eq!("All".parse::<Category>(), Ok(Category::All));
    }

    #[test]
    fn test_category_parse_rejects_unknown() {
        let err = "equity".parse::<Category>().unwrap_err();
        assert_eq!(err, ParseCategoryError("equity".to_string()));
        assert!(err.to_string().contains("equity"));
    }

    #[test]
    fn test_chunk_source_falls_back_to_unknown() {
        let chunk = DocumentChunk {
            content: "NAV per unit".to_string(),
            metadata: ChunkMetadata::default(),
        };
        assert_eq!(chunk.source(), UNKNOWN_SOURCE);
        assert_eq!(DocumentChunk::new("x", "fmr_dec_2025.pdf").source(), "fmr_dec_2025.pdf");
    }

    #[test]
    fn test_chunk_metadata_keeps_extra_fields() {
        let chunk: DocumentChunk = serde_json::from_value(serde_json::json!({
            "content": "Fund size PKR 10bn",
            "metadata": { "source": "a.pdf", "page": 4, "fund": "NBP Islamic Savings" }
        }))
        .unwrap();
        assert_eq!(chunk.metadata.page, Some(serde_json::json!(4)));
        assert_eq!(chunk.metadata.extra.get("fund"), Some(&serde_json::json!("NBP Islamic Savings")));
    }

    #[test]
    fn test_page_labels_of_any_shape_are_accepted() {
        for page in [serde_json::json!("iv"), serde_json::json!("3"), serde_json::json!(-1)] {
            let chunk: DocumentChunk = serde_json::from_value(serde_json::json!({
                "content": "Fund size PKR 10bn",
                "metadata": { "source": "a.pdf", "page": page.clone() }
            }))
            .unwrap();
            assert_eq!(chunk.metadata.page, Some(page));
            assert_eq!(chunk.source(), "a.pdf");
        }
    }
}
