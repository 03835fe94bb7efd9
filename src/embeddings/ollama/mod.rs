
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::QaError;
use crate::config::{Config, OllamaConfig};
use crate::embeddings::Embedder;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Blocking client for the Ollama embedding API
///
/// Requests are sent once; a failed call is reported to the caller as-is.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    model: String,
    batch_size: u32,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
    pub digest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

impl OllamaClient {
    #[inline]
    pub fn new(ollama: &OllamaConfig) -> Result<Self> {
        let base_url = ollama
            .ollama_url()
            .context("Failed to generate Ollama URL from config")?;

        Ok(Self {
            base_url,
            model: ollama.model.clone(),
            batch_size: ollama.batch_size.max(1),
            agent: build_agent(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)),
        })
    }

    #[inline]
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.ollama)
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    #[inline]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Test connection to Ollama server and verify model availability
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        debug!("Performing health check for Ollama at {}", self.base_url);

        self.ping().context("Server ping failed")?;
        self.validate_model().context("Model validation failed")?;

        info!(
            "Health check passed for Ollama server at {} with model {}",
            self.base_url, self.model
        );
        Ok(())
    }

    /// Ping the Ollama server to check if it's responsive
    #[inline]
    pub fn ping(&self) -> Result<()> {
        let url = self.endpoint("/api/tags")?;
        debug!("Pinging Ollama server at {}", url);

        self.get(&url).context("Failed to ping Ollama server")?;

        debug!("Server ping successful");
        Ok(())
    }

    /// Validate that the configured model is available
    ///
    /// A model configured without a tag matches the `:latest` variant.
    #[inline]
    pub fn validate_model(&self) -> Result<()> {
        let models = self.list_models().context("Failed to list models")?;

        let wanted = self.model.as_str();
        let found = models.iter().any(|m| {
            m.name == wanted || m.name.strip_suffix(":latest").is_some_and(|n| n == wanted)
        });

        if found {
            debug!("Model {} is available", self.model);
            Ok(())
        } else {
            let available: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
            warn!(
                "Model {} not found. Available models: {:?}",
                self.model, available
            );
            Err(anyhow::anyhow!(
                "Model '{}' is not available. Available models: {:?}",
                self.model,
                available
            ))
        }
    }

    /// List all models installed on the server
    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self.endpoint("/api/tags")?;
        debug!("Fetching available models from {}", url);

        let body = self.get(&url).context("Failed to fetch models")?;
        let response: ModelsResponse =
            serde_json::from_str(&body).context("Failed to parse models response")?;

        debug!("Found {} models", response.models.len());
        Ok(response.models)
    }

    /// Embed texts in batches of `batch_size`, preserving input order
    #[inline]
    pub fn generate_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            "Generating embeddings for {} texts with model {}",
            texts.len(),
            self.model
        );

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size as usize) {
            let embedded = self
                .embed_batch(batch)
                .with_context(|| format!("Failed to process batch of {} texts", batch.len()))?;
            vectors.extend(embedded);
        }

        debug!("Generated {} embeddings total", vectors.len());
        Ok(vectors)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = self.endpoint("/api/embed")?;
        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };
        let request_json =
            serde_json::to_string(&request).context("Failed to serialize embedding request")?;

        let body = self
            .agent
            .post(url.as_str())
            .header("Content-Type", "application/json")
            .send(&request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| describe_error(&e))
            .context("Failed to generate embeddings")?;

        let response: EmbedResponse =
            serde_json::from_str(&body).context("Failed to parse embedding response")?;

        if response.embeddings.len() != texts.len() {
            return Err(anyhow::anyhow!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.embeddings.len()
            ));
        }

        Ok(response.embeddings)
    }

    fn get(&self, url: &Url) -> Result<String> {
        self.agent
            .get(url.as_str())
            .call()
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| describe_error(&e))
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("Failed to build URL for {path}"))
    }
}

impl Embedder for OllamaClient {
    #[inline]
    fn model_name(&self) -> &str {
        &self.model
    }

    #[inline]
    fn embed_documents(&self, texts: &[String]) -> crate::Result<Vec<Vec<f32>>> {
        self.generate_embeddings(texts)
            .map_err(|e| QaError::Embedding(format!("{e:#}")))
    }

    #[inline]
    fn embed_query(&self, text: &str) -> crate::Result<Vec<f32>> {
        let mut vectors = self
            .generate_embeddings(&[text.to_string()])
            .map_err(|e| QaError::Embedding(format!("{e:#}")))?;
        vectors
            .pop()
            .ok_or_else(|| QaError::Embedding("Ollama returned no embedding".to_string()))
    }
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

fn describe_error(error: &ureq::Error) -> anyhow::Error {
    match error {
        ureq::Error::StatusCode(status) => anyhow::anyhow!("Ollama returned HTTP {status}"),
        ureq::Error::ConnectionFailed | ureq::Error::HostNotFound => {
            anyhow::anyhow!("Could not connect to Ollama: {error}")
        }
        ureq::Error::Timeout(_) => anyhow::anyhow!("Request to Ollama timed out: {error}"),
        _ => anyhow::anyhow!("Request error: {error}"),
    }
}
