use crate::domain::{Category, DocumentChunk};

/// Narrows retrieved chunks to those mentioning the requested fund type.
///
/// Matching is lexical: a chunk is kept when its content contains the category
/// name, ignoring case. Report pages name their fund type in their own text, so
/// this stands in for a structured category field. It can over-match (a
/// Conventional page comparing itself to an Islamic fund) and that is accepted.
pub fn filter_by_category(chunks: Vec<DocumentChunk>, category: Category) -> Vec<DocumentChunk> {
    let needle = match category {
        Category::All => return chunks,
        Category::Islamic | Category::Conventional => category.name().to_lowercase(),
    };

    chunks
        .into_iter()
        .filter(|chunk| chunk.content.to_lowercase().contains(&needle))
        .collect()
}
