// Indexer module
// Turns the chunks of one document into stored, searchable entries


use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::database::{ChunkMetadata, IndexEntry, VectorStore};
use crate::embeddings::{Embedder, TextChunk};
use crate::{QaError, Result};

/// Embeds chunks and writes them to the vector store
pub struct Indexer<'a, E: Embedder> {
    embedder: &'a E,
    store: &'a VectorStore,
}

/// What a single indexing call stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexReport {
    pub source: String,
    /// Identifiers of the new entries, in chunk order
    pub ids: Vec<String>,
    pub chunk_count: usize,
    /// Vector width, or 0 when nothing was stored
    pub dimension: usize,
}

impl IndexReport {
    fn empty(source: &str) -> Self {
        Self {
            source: source.to_string(),
            ids: Vec::new(),
            chunk_count: 0,
            dimension: 0,
        }
    }
}

impl<'a, E: Embedder> Indexer<'a, E> {
    #[inline]
    pub fn new(embedder: &'a E, store: &'a VectorStore) -> Self {
        Self { embedder, store }
    }

    /// Embed every chunk, then store them all in one write
    ///
    /// Nothing is written if embedding fails or returns the wrong number of
    /// vectors.
    #[inline]
    pub async fn index_chunks(&self, source: &str, chunks: &[TextChunk]) -> Result<IndexReport> {
        if chunks.is_empty() {
            debug!("No chunks to index for {}", source);
            return Ok(IndexReport::empty(source));
        }

        let entries = self.embed_chunks(source, chunks)?;
        self.store_entries(source, entries).await
    }

    /// Swap whatever is stored for `source` with freshly embedded chunks
    ///
    /// The swap is a single commit, so a failed write keeps the old entries.
    #[inline]
    pub async fn replace_chunks(&self, source: &str, chunks: &[TextChunk]) -> Result<IndexReport> {
        let entries = if chunks.is_empty() {
            Vec::new()
        } else {
            self.embed_chunks(source, chunks)?
        };

        let dimension = entries.first().map_or(0, IndexEntry::dimension);
        self.store.replace_source(source, &entries).await?;

        info!(
            "Replaced {} with {} chunks ({} dimensions, model {})",
            source,
            entries.len(),
            dimension,
            self.embedder.model_name()
        );

        Ok(IndexReport {
            source: source.to_string(),
            chunk_count: entries.len(),
            ids: entries.into_iter().map(|e| e.id).collect(),
            dimension,
        })
    }

    /// Build one entry per chunk, each with a fresh UUIDv4
    #[inline]
    pub fn embed_chunks(&self, source: &str, chunks: &[TextChunk]) -> Result<Vec<IndexEntry>> {
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = self.embedder.embed_documents(&texts)?;

        if vectors.len() != chunks.len() {
            return Err(QaError::Embedding(format!(
                "Expected {} embeddings for {}, got {}",
                chunks.len(),
                source,
                vectors.len()
            )));
        }

        let model = self.embedder.model_name();
        let created_at = Utc::now().to_rfc3339();

        chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| {
                let chunk_index = u32::try_from(chunk.chunk_index).map_err(|_| {
                    QaError::InvalidInput(format!(
                        "Chunk index {} of {} is too large",
                        chunk.chunk_index, source
                    ))
                })?;

                Ok(IndexEntry {
                    id: Uuid::new_v4().to_string(),
                    vector,
                    metadata: ChunkMetadata {
                        content: chunk.content.clone(),
                        source: source.to_string(),
                        chunk_index,
                        embedding_model: model.to_string(),
                        created_at: created_at.clone(),
                    },
                })
            })
            .collect()
    }

    async fn store_entries(&self, source: &str, entries: Vec<IndexEntry>) -> Result<IndexReport> {
        let dimension = entries.first().map_or(0, IndexEntry::dimension);
        self.store.add_entries(&entries).await?;

        info!(
            "Indexed {} chunks from {} ({} dimensions, model {})",
            entries.len(),
            source,
            dimension,
            self.embedder.model_name()
        );

        Ok(IndexReport {
            source: source.to_string(),
            chunk_count: entries.len(),
            ids: entries.into_iter().map(|e| e.id).collect(),
            dimension,
        })
    }
}
