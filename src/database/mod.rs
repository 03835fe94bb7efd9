// Database module
// LanceDB holds the vectors together with the chunk text and its metadata

pub mod lancedb;

pub use self::lancedb::vector_store::{SearchResult, VectorStore};
pub use self::lancedb::{ChunkMetadata, IndexEntry};
