// LanceDB vector database module
// Handles vector storage and similarity search for embeddings


pub mod vector_store;

use serde::{Deserialize, Serialize};

/// One indexed chunk: a row in the collection table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    /// UUIDv4 assigned when the chunk was indexed
    pub id: String,
    /// The embedding of `metadata.content`
    pub vector: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// Everything stored alongside a vector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// The chunk text
    pub content: String,
    /// Name of the document the chunk came from
    pub source: String,
    /// Position of the chunk within its document
    pub chunk_index: u32,
    /// Model that produced the vector
    pub embedding_model: String,
    /// RFC 3339 timestamp
    pub created_at: String,
}

impl IndexEntry {
    #[inline]
    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}

/// Quote a value for use inside a LanceDB filter expression
#[inline]
pub fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
