// Retrieval module
// Embeds a question and looks up the nearest stored chunks


use tracing::debug;

use crate::Result;
use crate::database::{SearchResult, VectorStore};
use crate::embeddings::Embedder;

/// A stored chunk returned for a query, best match first
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub id: String,
    pub content: String,
    pub source: String,
    pub chunk_index: u32,
    pub distance: f32,
    /// `1 / (1 + distance)`, so 1.0 is an exact match
    pub similarity_score: f32,
}

impl From<SearchResult> for RetrievedChunk {
    #[inline]
    fn from(result: SearchResult) -> Self {
        Self {
            id: result.id,
            content: result.metadata.content,
            source: result.metadata.source,
            chunk_index: result.metadata.chunk_index,
            distance: result.distance,
            similarity_score: similarity_from_distance(result.distance),
        }
    }
}

#[inline]
pub fn similarity_from_distance(distance: f32) -> f32 {
    1.0 / (1.0 + distance.max(0.0))
}

pub struct Retriever<'a, E: Embedder> {
    embedder: &'a E,
    store: &'a VectorStore,
}

impl<'a, E: Embedder> Retriever<'a, E> {
    #[inline]
    pub fn new(embedder: &'a E, store: &'a VectorStore) -> Self {
        Self { embedder, store }
    }

    /// Return up to `k` chunks nearest to `question`
    ///
    /// Only entries embedded by the same model as the query are candidates.
    /// An empty collection is not an error.
    #[inline]
    pub async fn retrieve(&self, question: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed_query(question)?;
        let results = self
            .store
            .search(&query_vector, k, self.embedder.model_name())
            .await?;

        debug!("Retrieved {} chunks (k = {})", results.len(), k);
        Ok(results.into_iter().map(RetrievedChunk::from).collect())
    }
}
