
use super::{ChunkMetadata, IndexEntry, sql_literal};
use crate::{QaError, Result, config::Config};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection, Table,
    query::{ExecutableQuery, QueryBase, Select},
};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Vector database store using LanceDB for similarity search
///
/// Each collection is one table. The table is created by the first write,
/// with its vector width taken from that batch.
pub struct VectorStore {
    connection: Connection,
    table_name: String,
}

/// Search result from vector similarity search
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub id: String,
    pub metadata: ChunkMetadata,
    /// Squared L2 distance to the query vector
    pub distance: f32,
}

impl VectorStore {
    /// Connect to the database under `persist_dir`, creating the directory if needed
    #[inline]
    pub async fn open(persist_dir: &Path, collection: &str) -> Result<Self> {
        std::fs::create_dir_all(persist_dir).map_err(|e| {
            QaError::Database(format!(
                "Failed to create vector database directory {}: {}",
                persist_dir.display(),
                e
            ))
        })?;

        let uri = format!("file://{}", persist_dir.display());
        debug!("Connecting to LanceDB at {}", uri);

        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| QaError::Database(format!("Failed to connect to LanceDB: {}", e)))?;

        info!(
            "Vector store ready at {} (collection '{}')",
            persist_dir.display(),
            collection
        );

        Ok(Self {
            connection,
            table_name: collection.to_string(),
        })
    }

    /// Open the store named by the configured persist directory and collection
    #[inline]
    pub async fn from_config(config: &Config) -> Result<Self> {
        let persist_dir = config.ensure_persist_dir()?;
        Self::open(persist_dir, &config.retrieval.collection).await
    }

    #[inline]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Whether anything has been written to this collection yet
    #[inline]
    pub async fn table_exists(&self) -> Result<bool> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| QaError::Database(format!("Failed to list tables: {}", e)))?;

        Ok(table_names.contains(&self.table_name))
    }

    /// Vector width of the collection, or `None` before the first write
    #[inline]
    pub async fn vector_dimension(&self) -> Result<Option<usize>> {
        let Some(table) = self.open_existing().await? else {
            return Ok(None);
        };

        let schema = table
            .schema()
            .await
            .map_err(|e| QaError::Database(format!("Failed to get table schema: {}", e)))?;

        let dimension = schema
            .field_with_name("vector")
            .ok()
            .and_then(|field| match field.data_type() {
                DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
                _ => None,
            })
            .ok_or_else(|| {
                QaError::Database("Could not find vector column or determine dimension".to_string())
            })?;

        Ok(Some(dimension))
    }

    /// Write all entries as a single batch
    ///
    /// Fails without writing if the entries disagree on vector width, or if
    /// the collection already holds vectors of another width.
    #[inline]
    pub async fn add_entries(&self, entries: &[IndexEntry]) -> Result<usize> {
        let Some(dimension) = self.check_dimensions(entries).await? else {
            debug!("No entries to store");
            return Ok(0);
        };

        let batch = create_record_batch(entries, dimension)?;
        let schema = batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(batch)), schema);

        if let Some(table) = self.open_existing().await? {
            table
                .add(reader)
                .execute()
                .await
                .map_err(|e| QaError::Database(format!("Failed to insert entries: {}", e)))?;
        } else {
            self.create_table(reader, dimension).await?;
        }

        info!(
            "Stored {} entries in collection '{}'",
            entries.len(),
            self.table_name
        );
        Ok(entries.len())
    }

    /// Swap every entry of `source` for `entries` in one commit
    ///
    /// Either the old entries are all replaced or the collection is left as
    /// it was.
    #[inline]
    pub async fn replace_source(&self, source: &str, entries: &[IndexEntry]) -> Result<usize> {
        let Some(dimension) = self.check_dimensions(entries).await? else {
            self.delete_source(source).await?;
            return Ok(0);
        };

        let batch = create_record_batch(entries, dimension)?;
        let schema = batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(batch)), schema);

        let Some(table) = self.open_existing().await? else {
            self.create_table(reader, dimension).await?;
            return Ok(entries.len());
        };

        let mut merge = table.merge_insert(&["id"]);
        merge
            .when_not_matched_insert_all()
            .when_not_matched_by_source_delete(Some(format!("source = {}", sql_literal(source))));
        merge
            .execute(Box::new(reader))
            .await
            .map_err(|e| QaError::Database(format!("Failed to replace entries: {}", e)))?;

        info!(
            "Replaced entries for source {} with {} new entries",
            source,
            entries.len()
        );
        Ok(entries.len())
    }

    /// Common vector width of `entries`, or `None` for an empty batch
    async fn check_dimensions(&self, entries: &[IndexEntry]) -> Result<Option<usize>> {
        let Some(first) = entries.first() else {
            return Ok(None);
        };

        let dimension = first.dimension();
        if dimension == 0 {
            return Err(QaError::Database("Cannot store empty vectors".to_string()));
        }
        if let Some(bad) = entries.iter().find(|e| e.dimension() != dimension) {
            return Err(QaError::Database(format!(
                "embedding dimension mismatch within batch: expected {}, got {}",
                dimension,
                bad.dimension()
            )));
        }

        if let Some(existing) = self.vector_dimension().await? {
            if existing != dimension {
                return Err(QaError::Database(format!(
                    "embedding dimension mismatch: collection '{}' stores {} dimensions, got {}",
                    self.table_name, existing, dimension
                )));
            }
        }

        Ok(Some(dimension))
    }

    async fn create_table<R>(&self, reader: R, dimension: usize) -> Result<()>
    where
        R: arrow::record_batch::RecordBatchReader + Send + 'static,
    {
        info!(
            "Creating collection '{}' with {} dimensions",
            self.table_name, dimension
        );
        self.connection
            .create_table(&self.table_name, reader)
            .execute()
            .await
            .map_err(|e| QaError::Database(format!("Failed to create table: {}", e)))?;
        Ok(())
    }

    /// Find the `limit` entries nearest to `query_vector` produced by `model`
    ///
    /// A collection that has never been written to yields no results.
    #[inline]
    pub async fn search(
        &self,
        query_vector: &[f32],
        limit: usize,
        model: &str,
    ) -> Result<Vec<SearchResult>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let Some(table) = self.open_existing().await? else {
            debug!("Collection '{}' does not exist yet", self.table_name);
            return Ok(Vec::new());
        };

        debug!("Searching for similar vectors with limit: {}", limit);

        let mut results = table
            .vector_search(query_vector)
            .map_err(|e| QaError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .only_if(format!("embedding_model = {}", sql_literal(model)))
            .limit(limit)
            .execute()
            .await
            .map_err(|e| QaError::Database(format!("Failed to execute search: {}", e)))?;

        let mut search_results = Vec::new();
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| QaError::Database(format!("Failed to read result stream: {}", e)))?
        {
            search_results.extend(parse_search_batch(&batch)?);
        }

        debug!("Found {} search results", search_results.len());
        Ok(search_results)
    }

    /// Total number of entries in the collection
    #[inline]
    pub async fn count(&self) -> Result<usize> {
        let Some(table) = self.open_existing().await? else {
            return Ok(0);
        };

        table
            .count_rows(None)
            .await
            .map_err(|e| QaError::Database(format!("Failed to count rows: {}", e)))
    }

    /// Remove every entry that came from `source`
    #[inline]
    pub async fn delete_source(&self, source: &str) -> Result<()> {
        let Some(table) = self.open_existing().await? else {
            return Ok(());
        };

        debug!("Deleting entries for source: {}", source);
        table
            .delete(&format!("source = {}", sql_literal(source)))
            .await
            .map_err(|e| QaError::Database(format!("Failed to delete entries: {}", e)))?;

        info!("Deleted entries for source: {}", source);
        Ok(())
    }

    /// Distinct document names present in the collection, sorted
    #[inline]
    pub async fn list_sources(&self) -> Result<Vec<String>> {
        let Some(table) = self.open_existing().await? else {
            return Ok(Vec::new());
        };

        let rows = table
            .count_rows(None)
            .await
            .map_err(|e| QaError::Database(format!("Failed to count rows: {}", e)))?;
        if rows == 0 {
            return Ok(Vec::new());
        }

        let mut stream = table
            .query()
            .select(Select::columns(&["source"]))
            .limit(rows)
            .execute()
            .await
            .map_err(|e| QaError::Database(format!("Failed to query sources: {}", e)))?;

        let mut sources = BTreeSet::new();
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| QaError::Database(format!("Failed to read result stream: {}", e)))?
        {
            let column = string_column(&batch, "source")?;
            for row in 0..batch.num_rows() {
                sources.insert(column.value(row).to_string());
            }
        }

        Ok(sources.into_iter().collect())
    }

    /// Compact data files left behind by appends and deletes
    #[inline]
    pub async fn optimize(&self) -> Result<()> {
        let Some(table) = self.open_existing().await? else {
            return Ok(());
        };

        table
            .optimize(lancedb::table::OptimizeAction::All)
            .await
            .map_err(|e| QaError::Database(format!("Failed to optimize table: {}", e)))?;

        info!("Vector database optimization completed");
        Ok(())
    }

    async fn open_existing(&self) -> Result<Option<Table>> {
        if !self.table_exists().await? {
            return Ok(None);
        }

        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map(Some)
            .map_err(|e| QaError::Database(format!("Failed to open table: {}", e)))
    }
}

fn create_schema(dimension: i32) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, false)),
                dimension,
            ),
            false,
        ),
        Field::new("content", DataType::Utf8, false),
        Field::new("source", DataType::Utf8, false),
        Field::new("chunk_index", DataType::UInt32, false),
        Field::new("embedding_model", DataType::Utf8, false),
        Field::new("created_at", DataType::Utf8, false),
    ]))
}

fn create_record_batch(entries: &[IndexEntry], dimension: usize) -> Result<RecordBatch> {
    let width = i32::try_from(dimension)
        .map_err(|_| QaError::Database(format!("Vector dimension {} is too large", dimension)))?;

    let flat_values: Vec<f32> = entries
        .iter()
        .flat_map(|e| e.vector.iter().copied())
        .collect();
    let field = Arc::new(Field::new("item", DataType::Float32, false));
    let vector_array =
        FixedSizeListArray::try_new(field, width, Arc::new(Float32Array::from(flat_values)), None)
            .map_err(|e| QaError::Database(format!("Failed to create vector array: {}", e)))?;

    let strings = |f: fn(&IndexEntry) -> &str| -> Arc<dyn Array> {
        Arc::new(StringArray::from(entries.iter().map(f).collect::<Vec<_>>()))
    };

    let arrays: Vec<Arc<dyn Array>> = vec![
        strings(|e| e.id.as_str()),
        Arc::new(vector_array),
        strings(|e| e.metadata.content.as_str()),
        strings(|e| e.metadata.source.as_str()),
        Arc::new(UInt32Array::from(
            entries
                .iter()
                .map(|e| e.metadata.chunk_index)
                .collect::<Vec<_>>(),
        )),
        strings(|e| e.metadata.embedding_model.as_str()),
        strings(|e| e.metadata.created_at.as_str()),
    ];

    RecordBatch::try_new(create_schema(width), arrays)
        .map_err(|e| QaError::Database(format!("Failed to create record batch: {}", e)))
}

fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<SearchResult>> {
    let ids = string_column(batch, "id")?;
    let contents = string_column(batch, "content")?;
    let sources = string_column(batch, "source")?;
    let models = string_column(batch, "embedding_model")?;
    let created_ats = string_column(batch, "created_at")?;
    let chunk_indices = batch
        .column_by_name("chunk_index")
        .and_then(|col| col.as_any().downcast_ref::<UInt32Array>())
        .ok_or_else(|| QaError::Database("Missing or invalid chunk_index column".to_string()))?;
    let distances = batch
        .column_by_name("_distance")
        .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

    let results = (0..batch.num_rows())
        .map(|row| SearchResult {
            id: ids.value(row).to_string(),
            metadata: ChunkMetadata {
                content: contents.value(row).to_string(),
                source: sources.value(row).to_string(),
                chunk_index: chunk_indices.value(row),
                embedding_model: models.value(row).to_string(),
                created_at: created_ats.value(row).to_string(),
            },
            distance: distances
                .filter(|d| !d.is_null(row))
                .map_or(0.0, |d| d.value(row)),
        })
        .collect();

    Ok(results)
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|col| col.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| QaError::Database(format!("Missing or invalid {} column", name)))
}
