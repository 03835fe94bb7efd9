// Generation module
// Prompt assembly and the hosted language model that answers it

pub mod gemini;
pub mod prompt;


use itertools::Itertools;
use thiserror::Error;
use tracing::debug;

pub use gemini::GeminiClient;
pub use prompt::PromptTemplate;

use crate::retrieval::RetrievedChunk;

#[derive(Error, Debug)]
pub enum GenerationError {
    /// The API answered with a non-success status
    #[error("Error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl GenerationError {
    #[inline]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(_) | Self::InvalidRequest(_) => None,
        }
    }
}

/// A text-in, text-out completion backend
pub trait LanguageModel: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

impl<T: LanguageModel + ?Sized> LanguageModel for &T {
    #[inline]
    fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        (**self).generate(prompt)
    }
}

/// Space-join chunk contents in retrieval order
#[inline]
pub fn build_context(chunks: &[RetrievedChunk]) -> String {
    chunks.iter().map(|c| c.content.as_str()).join(" ")
}

/// Fills the prompt from retrieved chunks and asks the model
pub struct AnswerSynthesizer<'a, L: LanguageModel> {
    model: &'a L,
    template: &'a PromptTemplate,
}

impl<'a, L: LanguageModel> AnswerSynthesizer<'a, L> {
    #[inline]
    pub fn new(model: &'a L, template: &'a PromptTemplate) -> Self {
        Self { model, template }
    }

    /// The model's reply, returned verbatim
    #[inline]
    pub fn synthesize(
        &self,
        question: &str,
        chunks: &[RetrievedChunk],
    ) -> Result<String, GenerationError> {
        let context = build_context(chunks);
        let prompt = self.template.render(question, &context);
        debug!(
            "Synthesizing answer from {} chunks ({} prompt characters)",
            chunks.len(),
            prompt.chars().count()
        );
        self.model.generate(&prompt)
    }
}
