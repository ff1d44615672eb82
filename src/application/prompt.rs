use crate::domain::DocumentChunk;

/// Upper bound on the characters of any single chunk placed in a prompt.
pub const MAX_CHUNK_CHARS: usize = 900;

const PREAMBLE: &str = "You are a financial assistant.\n\
Answer ONLY using the context from Fund Manager Reports below.\n\
If the answer is not present, say it is not mentioned in the reports.";

/// Builds the single prompt sent to the language model.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    max_chunk_chars: usize,
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self {
            max_chunk_chars: MAX_CHUNK_CHARS,
        }
    }
}

impl PromptAssembler {
    /// Values above [`MAX_CHUNK_CHARS`] are clamped to it.
    pub fn new(max_chunk_chars: usize) -> Self {
        Self {
            max_chunk_chars: max_chunk_chars.min(MAX_CHUNK_CHARS),
        }
    }

    pub fn max_chunk_chars(&self) -> usize {
        self.max_chunk_chars
    }

    pub fn assemble(&self, question: &str, chunks: &[DocumentChunk]) -> String {
        let context = chunks
            .iter()
            .map(|chunk| truncate_chars(&chunk.content, self.max_chunk_chars))
            .collect::<Vec<_>>()
            .join("\n\n");

        format!("{PREAMBLE}\n\nContext:\n{context}\n\nQuestion:\n{question}\n\nAnswer:")
    }
}

// Hard cut after `max` characters, on a char boundary
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
