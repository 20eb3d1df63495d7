//! Generation step: folds one transcript chunk into the notes document.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::provider::TextProvider;

/// Instructions for the first chunk, when no notes exist yet
const OPENING_PROMPT: &str = r#"You are an experienced academic note-taker. The text below is the opening part of a long lecture transcript.

Write detailed, well-structured study notes for it:
- Use clear headings, bolded key terms, and bulleted or numbered lists.
- Capture definitions, examples, rules and formulas, and format them so they stand out.
- Where the transcript is thin, add brief explanations from your own knowledge.
- Write only in plain, simple English, whatever the language of the transcript.
- More parts will follow, so do not write a summary or conclusion.

Reply with the notes only.

---
Transcript part:
"#;

/// Instructions for every later chunk
const CONTINUATION_PROMPT: &str = r#"You are an experienced academic note-taker building one set of study notes from a long lecture transcript that arrives in parts. Below are the notes written so far, followed by the next part of the transcript.

Return the complete, updated notes:
- Work the new material into the existing structure: extend sections, add sub-points, definitions and examples where they belong, and add new sections only for new topics.
- Keep everything from the existing notes unless the new part corrects it.
- Where the transcript is thin, add brief explanations from your own knowledge.
- Write only in plain, simple English, whatever the language of the transcript.
- More parts may follow, so do not write a summary or conclusion.

Reply with the full notes only, not just the changes.
"#;

/// Build the prompt for one step.
pub fn build_prompt(prior_document: &str, is_first_chunk: bool, chunk: &str) -> String {
    if is_first_chunk {
        format!("{}{}", OPENING_PROMPT, chunk)
    } else {
        format!(
            "{}\n---\nNotes so far:\n{}\n---\nNew transcript part:\n{}",
            CONTINUATION_PROMPT, prior_document, chunk
        )
    }
}

/// Produces an updated notes document from the previous one and a new chunk
#[derive(Clone)]
pub struct NoteGenerator {
    provider: Arc<dyn TextProvider>,
}

impl NoteGenerator {
    pub fn new(provider: Arc<dyn TextProvider>) -> Self {
        Self { provider }
    }

    /// Run one generation step.
    ///
    /// Returns the provider's full response as the new document. Any provider
    /// failure, including an empty response, becomes [`Error::Capability`].
    /// Failures are never retried here.
    pub async fn generate(
        &self,
        prior_document: &str,
        is_first_chunk: bool,
        chunk: &str,
    ) -> Result<String> {
        let prompt = build_prompt(prior_document, is_first_chunk, chunk);

        let response = self.provider.complete(&prompt).await.map_err(|e| {
            Error::capability(format!(
                "{} ({}): {:#}",
                self.provider.provider_name(),
                self.provider.model_id(),
                e
            ))
        })?;

        if response.trim().is_empty() {
            return Err(Error::capability(format!(
                "{} returned an empty document",
                self.provider.provider_name()
            )));
        }

        Ok(response)
    }
}

impl std::fmt::Debug for NoteGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoteGenerator")
            .field("provider", &self.provider.provider_name())
            .field("model", &self.provider.model_id())
            .finish()
    }
}
