// Embeddings module
// Text chunking plus the embedding backends used to vectorise chunks and queries

pub mod chunking;
pub mod ollama;

pub use chunking::{ChunkingConfig, TextChunk, chunk_text};
pub use ollama::OllamaClient;

use crate::Result;

/// A model that turns text into fixed-size vectors
///
/// Documents and queries go through separate methods so that backends with
/// asymmetric encoders can tell them apart. Both must use the same model.
pub trait Embedder: Send + Sync {
    /// Identifier stored next to every vector this embedder produces
    fn model_name(&self) -> &str;

    /// Embed many texts, returning one vector per input in the same order
    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single search query
    fn embed_query(&self, text: &str) -> Result<Vec<f32>>;
}

impl<T: Embedder + ?Sized> Embedder for &T {
    #[inline]
    fn model_name(&self) -> &str {
        (**self).model_name()
    }

    #[inline]
    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        (**self).embed_documents(texts)
    }

    #[inline]
    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        (**self).embed_query(text)
    }
}
