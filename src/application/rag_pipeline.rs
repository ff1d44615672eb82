use log::{debug, error, info, warn};
use std::sync::Arc;

use crate::application::category_filter::filter_by_category;
use crate::application::prompt::PromptAssembler;
use crate::domain::{AnswerGenerator, AnswerResult, Category, DocumentChunk, Retriever};

const GREETINGS: [&str; 5] = ["hello", "hi", "hey", "assalam o alaikum", "salam"];

pub const GREETING_MESSAGE: &str = "Hello! 👋\n\n\
You can ask me about:\n\
- Islamic or Conventional fund performance\n\
- December 2025 Fund Manager Reports\n\
- Fund comparisons and summaries";

pub const DEMO_MODE_MESSAGE: &str = "⚠️ This is a demo deployment without a language model.\n\n\
Full AI-powered answers are available when running the assistant locally \
with a free open-source LLM (Ollama + Mistral).";

pub const NOT_MENTIONED_MESSAGE: &str = "This information is not mentioned in the Fund Manager Reports.";

pub const GENERATION_FAILED_MESSAGE: &str = "⚠️ The assistant could not complete the answer. \
The language model could not produce an answer; please try again in a moment.";

pub const RETRIEVAL_FAILED_MESSAGE: &str = "⚠️ The assistant could not complete the answer. \
The report index could not be searched; please try again in a moment.";

/// Answers one question at a time from the indexed Fund Manager Reports.
///
/// Built once at startup and shared behind an `Arc`; nothing here is mutated
/// while a question is being answered.
pub struct RagPipeline {
    retriever: Arc<dyn Retriever>,
    generator: Option<Arc<dyn AnswerGenerator>>,
    assembler: PromptAssembler,
}

impl RagPipeline {
    /// `generator` is `None` for demo deployments without a language model.
    pub fn new(
        retriever: Arc<dyn Retriever>,
        generator: Option<Arc<dyn AnswerGenerator>>,
        assembler: PromptAssembler,
    ) -> Self {
        Self {
            retriever,
            generator,
            assembler,
        }
    }

    pub fn has_generator(&self) -> bool {
        self.generator.is_some()
    }

    /// Produces exactly one answer for `question`; failures become a message.
    pub async fn answer(&self, question: &str, category: Category) -> AnswerResult {
        info!("Answering question (category: {}): '{}'", category, question);

        if is_greeting(question) {
            debug!("Greeting detected, skipping retrieval");
            return AnswerResult::ungrounded(GREETING_MESSAGE);
        }

        let Some(generator) = &self.generator else {
            debug!("No language model configured, answering in demo mode");
            return AnswerResult::ungrounded(DEMO_MODE_MESSAGE);
        };

        let retrieved = match self.retriever.retrieve(question).await {
            Ok(chunks) => chunks,
            Err(e) => {
                error!("Retrieval failed: {:#}", e);
                return AnswerResult::ungrounded(RETRIEVAL_FAILED_MESSAGE);
            }
        };
        let retrieved_count = retrieved.len();

        let chunks = filter_by_category(retrieved, category);
        debug!(
            "{} of {} retrieved chunks kept for category {}",
            chunks.len(),
            retrieved_count,
            category
        );

        if chunks.is_empty() {
            info!("No report content matched the question");
            return AnswerResult::ungrounded(NOT_MENTIONED_MESSAGE);
        }

        let prompt = self.assembler.assemble(question, &chunks);
        debug!("Assembled prompt of {} chars from {} chunks", prompt.chars().count(), chunks.len());

        match generator.generate(&prompt).await {
            Ok(text) => AnswerResult {
                answer: text.trim().to_string(),
                sources: collect_sources(&chunks),
            },
            Err(e) => {
                warn!("Answer generation failed: {}", e);
                AnswerResult::ungrounded(GENERATION_FAILED_MESSAGE)
            }
        }
    }
}

fn is_greeting(question: &str) -> bool {
    let normalized = question.trim().to_lowercase();
    GREETINGS.contains(&normalized.as_str())
}

// Distinct sources, in the order their chunks appear in the prompt
fn collect_sources(chunks: &[DocumentChunk]) -> Vec<String> {
    let mut sources: Vec<String> = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let source = chunk.source();
        if !sources.iter().any(|s| s == source) {
            sources.push(source.to_string());
        }
    }
    sources
}
