// Session module
// Caller-owned conversation state plus the engine that runs the pipeline

#[cfg(test)]
mod tests;

use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::database::VectorStore;
use crate::embeddings::{ChunkingConfig, Embedder, OllamaClient, chunk_text};
use crate::extraction::PdfExtractor;
use crate::generation::{AnswerSynthesizer, GeminiClient, LanguageModel, PromptTemplate};
use crate::indexer::{IndexReport, Indexer};
use crate::retrieval::{RetrievedChunk, Retriever};
use crate::{QaError, Result};

/// One answered question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub question: String,
    pub answer: String,
}

/// Documents ingested and questions answered so far
///
/// Lives only as long as the caller keeps it; nothing here is persisted.
#[derive(Debug, Clone, Default)]
pub struct Session {
    processed: BTreeSet<String>,
    history: Vec<ChatTurn>,
}

impl Session {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session that already knows about these documents
    #[inline]
    pub fn with_processed<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            processed: names.into_iter().map(Into::into).collect(),
            history: Vec::new(),
        }
    }

    #[inline]
    pub fn processed(&self) -> &BTreeSet<String> {
        &self.processed
    }

    #[inline]
    pub fn is_processed(&self, name: &str) -> bool {
        self.processed.contains(name)
    }

    /// Answered questions, oldest first
    #[inline]
    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestOptions {
    /// Re-index a document even if a document of the same name was ingested
    pub replace: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Indexed(IndexReport),
    /// A document with this name was already ingested
    Skipped { name: String },
}

/// A generated answer and the chunks it was grounded on
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<RetrievedChunk>,
}

/// The full pipeline: extract, chunk, index, retrieve and generate
pub struct QaEngine<E: Embedder, L: LanguageModel> {
    embedder: E,
    model: L,
    store: VectorStore,
    extractor: PdfExtractor,
    chunking: ChunkingConfig,
    template: PromptTemplate,
    top_k: usize,
}

impl QaEngine<OllamaClient, GeminiClient> {
    /// Wire up Ollama, Gemini and the vector store from configuration
    ///
    /// Fails before touching the network or the store if the API key is missing.
    #[inline]
    pub async fn from_config(config: &Config) -> Result<Self> {
        let model = GeminiClient::from_config(config)?;
        let template = PromptTemplate::new(config.gemini.prompt_template.clone())?;
        let embedder = OllamaClient::from_config(config)?;
        let store = VectorStore::from_config(config).await?;

        Ok(Self::new(embedder, model, store)
            .with_chunking(config.chunking.clone())
            .with_template(template)
            .with_top_k(config.retrieval.top_k))
    }
}

impl<E: Embedder, L: LanguageModel> QaEngine<E, L> {
    #[inline]
    pub fn new(embedder: E, model: L, store: VectorStore) -> Self {
        Self {
            embedder,
            model,
            store,
            extractor: PdfExtractor::new(),
            chunking: ChunkingConfig::default(),
            template: PromptTemplate::default(),
            top_k: crate::config::settings::DEFAULT_TOP_K,
        }
    }

    #[inline]
    pub fn with_chunking(mut self, chunking: ChunkingConfig) -> Self {
        self.chunking = chunking;
        self
    }

    #[inline]
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    #[inline]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    #[inline]
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    #[inline]
    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    #[inline]
    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// A session seeded with every document already in the store
    #[inline]
    pub async fn resume_session(&self) -> Result<Session> {
        Ok(Session::with_processed(self.indexed_sources().await?))
    }

    /// Extract a PDF and ingest its text under the file name
    #[inline]
    pub async fn ingest_pdf(
        &self,
        session: &mut Session,
        path: &Path,
        options: IngestOptions,
    ) -> Result<IngestOutcome> {
        let name = document_name(path);
        if session.is_processed(&name) && !options.replace {
            info!("Skipping {}: already processed", name);
            return Ok(IngestOutcome::Skipped { name });
        }

        let text = self.extractor.extract_text(path)?;
        self.ingest_text(session, &name, &text, options).await
    }

    /// Chunk, embed and store `text` as the document `name`
    ///
    /// `session` only records the document once it is stored.
    #[inline]
    pub async fn ingest_text(
        &self,
        session: &mut Session,
        name: &str,
        text: &str,
        options: IngestOptions,
    ) -> Result<IngestOutcome> {
        if session.is_processed(name) && !options.replace {
            info!("Skipping {}: already processed", name);
            return Ok(IngestOutcome::Skipped {
                name: name.to_string(),
            });
        }

        let chunks = chunk_text(text, &self.chunking);
        if chunks.is_empty() {
            warn!("{} contains no extractable text", name);
        }

        let indexer = Indexer::new(&self.embedder, &self.store);
        let report = if options.replace {
            indexer.replace_chunks(name, &chunks).await?
        } else {
            indexer.index_chunks(name, &chunks).await?
        };

        session.processed.insert(name.to_string());
        Ok(IngestOutcome::Indexed(report))
    }

    /// Retrieve the nearest `k` chunks for `question`
    #[inline]
    pub async fn retrieve(&self, question: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        Retriever::new(&self.embedder, &self.store)
            .retrieve(question, k)
            .await
    }

    /// Answer `question` from the indexed documents
    ///
    /// The turn is added to the session history only when an answer comes back.
    #[inline]
    pub async fn ask(&self, session: &mut Session, question: &str) -> Result<Answer> {
        if question.trim().is_empty() {
            return Err(QaError::InvalidInput("Question cannot be empty".to_string()));
        }

        let sources = self.retrieve(question, self.top_k).await?;
        if sources.is_empty() {
            debug!("No indexed chunks matched; answering from empty context");
        }

        let text = AnswerSynthesizer::new(&self.model, &self.template).synthesize(question, &sources)?;

        session.history.push(ChatTurn {
            question: question.to_string(),
            answer: text.clone(),
        });

        Ok(Answer { text, sources })
    }

    #[inline]
    pub async fn document_count(&self) -> Result<usize> {
        self.store.count().await
    }

    #[inline]
    pub async fn indexed_sources(&self) -> Result<Vec<String>> {
        self.store.list_sources().await
    }
}

/// File name used as the document's source label
#[inline]
pub fn document_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}
