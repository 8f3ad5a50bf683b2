//! Answer synthesis contract and citation guard.
//!
//! The language model itself is a collaborator behind [`ChatModel`]. This
//! module owns what surrounds the call: the fixed system prompt, how the
//! fused context is rendered into the user message, the empty-context
//! short circuit, and [`validate_answer`], which flags answers that carry
//! no `[source: ...]` citation.

use async_trait::async_trait;

use crate::error::Result;
use crate::rank::FusedChunk;

/// The canonical answer when the context does not support one.
pub const INSUFFICIENT_INFORMATION: &str = "Insufficient information in the provided sources.";

/// Substring every grounded answer must contain.
pub const CITATION_MARKER: &str = "[source:";

/// Appended to answers that lack [`CITATION_MARKER`].
pub const CITATION_WARNING: &str =
    "\n(Note: No explicit source citations detected – check retrieved chunks.)";

pub const SYSTEM_PROMPT: &str = "\
You are an expert in EU regulatory sustainability documents (CSRD, GEG, EU Taxonomy).
Answer ONLY using the provided context. Be precise, factual, and cite sources.
Use format: [source: filename, page: X]

If the context does not contain enough information, respond exactly:
\"Insufficient information in the provided sources.\"

Do NOT hallucinate, guess, or use external knowledge.
";

/// A system + user message pair for one chat completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Chat completion backend.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identifier, for logs.
    fn name(&self) -> &str;

    async fn complete(&self, prompt: &Prompt) -> Result<String>;
}

/// Render the fused context, each chunk under its citation tag.
pub fn format_context(context: &[FusedChunk]) -> String {
    context
        .iter()
        .map(|f| format!("{}\n{}", f.chunk.metadata.citation(), f.chunk.content.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn build_prompt(question: &str, context: &[FusedChunk]) -> Prompt {
    Prompt {
        system: SYSTEM_PROMPT.to_string(),
        user: format!(
            "Context:\n{}\n\nQuestion: {}",
            format_context(context),
            question
        ),
    }
}

/// Model output after the citation guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedAnswer {
    pub text: String,
    pub citation_missing: bool,
}

/// Append [`CITATION_WARNING`] when the answer cites nothing and is not
/// the insufficient-information fallback.
pub fn validate_answer(raw: &str) -> ValidatedAnswer {
    let cited = raw.contains(CITATION_MARKER);
    let fallback = raw.trim() == INSUFFICIENT_INFORMATION;
    if cited || fallback {
        return ValidatedAnswer {
            text: raw.to_string(),
            citation_missing: false,
        };
    }
    tracing::warn!("answer carries no source citation");
    ValidatedAnswer {
        text: format!("{raw}{CITATION_WARNING}"),
        citation_missing: true,
    }
}

/// Ask the model to answer from `context`, then run the citation guard.
///
/// An empty context never reaches the model: the answer is the
/// insufficient-information fallback.
pub async fn synthesize(
    llm: &dyn ChatModel,
    question: &str,
    context: &[FusedChunk],
) -> Result<ValidatedAnswer> {
    if context.is_empty() {
        tracing::info!("no context retrieved, skipping model call");
        return Ok(validate_answer(INSUFFICIENT_INFORMATION));
    }
    let prompt = build_prompt(question, context);
    tracing::debug!(model = llm.name(), chunks = context.len(), "requesting answer");
    let raw = llm.complete(&prompt).await?;
    Ok(validate_answer(&raw))
}
