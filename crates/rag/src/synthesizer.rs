//! Answer synthesis over retrieved chunks.
//!
//! The hosted model sits behind the [`AnswerBackend`] seam. The production
//! backend builds a fixed prompt from the retrieved chunks, calls the model
//! with low randomness, and appends source citations. Model failures degrade
//! to an apologetic answer string; they never surface as errors.

use async_trait::async_trait;
use rig::agent::Agent;
use rig::client::completion::CompletionClient;
use rig::completion::Prompt;
use rig::providers::gemini;
use tracing::warn;

use crate::vector_store::ScoredChunk;

const GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Keep generation close to the retrieved text.
const TEMPERATURE: f64 = 0.3;

/// How many retrieved chunks are cited under the answer.
const MAX_CITED_SOURCES: usize = 3;

/// How much of a cited chunk is shown.
const SOURCE_EXCERPT_CHARS: usize = 100;

const PREAMBLE: &str = "\
You are an AI assistant that helps users understand documents. Use the provided \
context to answer the question.

Instructions:
- Provide accurate and helpful answers based on the context
- If the context contains image descriptions, incorporate them naturally
- If you cannot find relevant information in the context, say so clearly
- Be concise but comprehensive
- If the context mentions tables or structured data, explain it clearly";

// Environment variables
pub static GEMINI_API_KEY: std::sync::LazyLock<String> =
    std::sync::LazyLock::new(|| std::env::var("GEMINI_API_KEY").unwrap_or_default());

/// Interface to the hosted answer model.
#[async_trait]
pub trait AnswerBackend: Send + Sync {
    /// Answer `question` from `retrieved`. Implementations degrade internal
    /// failures to a user-presentable string.
    async fn answer(&self, question: &str, retrieved: &[ScoredChunk]) -> String;
}

pub struct LlmSynthesizer {
    agent: Agent<gemini::completion::CompletionModel>,
}

impl LlmSynthesizer {
    pub fn new(api_key: &str) -> Self {
        let client = gemini::Client::new(api_key);
        let agent = client
            .agent(GEMINI_MODEL)
            .preamble(PREAMBLE)
            .temperature(TEMPERATURE)
            .build();

        Self { agent }
    }

    /// Build from `GEMINI_API_KEY`. A missing key is not fatal here: the
    /// server starts, and each synthesis call fails into the degraded path.
    pub fn from_env() -> Self {
        if GEMINI_API_KEY.is_empty() {
            warn!("GEMINI_API_KEY is not set, answer synthesis will fail per request");
        }
        Self::new(&GEMINI_API_KEY)
    }
}

#[async_trait]
impl AnswerBackend for LlmSynthesizer {
    async fn answer(&self, question: &str, retrieved: &[ScoredChunk]) -> String {
        let prompt = build_prompt(question, retrieved);

        match self.agent.prompt(prompt).await {
            Ok(mut answer) => {
                answer.push_str(&format_sources(retrieved));
                answer
            }
            Err(e) => {
                warn!(error = %e, "answer synthesis failed, returning degraded answer");
                format!(
                    "I apologize, but I encountered an error while processing your question: {e}"
                )
            }
        }
    }
}

/// Fixed prompt: retrieved chunk contents in rank order, then the question.
fn build_prompt(question: &str, retrieved: &[ScoredChunk]) -> String {
    let mut context = String::new();
    for (i, scored) in retrieved.iter().enumerate() {
        context.push_str(&format!("[{}] {}\n\n", i + 1, scored.chunk.content));
    }

    format!("Context:\n{context}Question: {question}")
}

/// Citation block appended to successful answers: up to the top three
/// retrieved chunks, each shown as ordinal, kind, and a short excerpt.
fn format_sources(retrieved: &[ScoredChunk]) -> String {
    if retrieved.is_empty() {
        return String::new();
    }

    let mut sources = String::from("\n\nSources:");
    for (i, scored) in retrieved.iter().take(MAX_CITED_SOURCES).enumerate() {
        let excerpt: String = scored.chunk.content.chars().take(SOURCE_EXCERPT_CHARS).collect();
        sources.push_str(&format!("\n{}. {}: {}...", i + 1, scored.chunk.kind, excerpt));
    }

    sources
}
