
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::{GenerationError, LanguageModel};
use crate::config::{ApiKey, Config, ConfigError};

/// Blocking client for the Gemini `generateContent` REST endpoint
///
/// Each prompt is sent exactly once. The API key travels as a query
/// parameter and is kept out of logs and error messages.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    url: Url,
    model: String,
    api_key: ApiKey,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: [RequestContent<'a>; 1],
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: [RequestPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GeminiClient {
    /// Build a client for `{endpoint}/{model}:generateContent`
    ///
    /// Fails with `MissingApiKey` when no key is given, before any request
    /// can be made. Without a timeout the HTTP client default applies.
    #[inline]
    pub fn new(
        endpoint: &str,
        model: &str,
        api_key: Option<&ApiKey>,
        timeout: Option<Duration>,
    ) -> Result<Self, ConfigError> {
        let api_key = api_key
            .filter(|key| !key.expose().trim().is_empty())
            .cloned()
            .ok_or(ConfigError::MissingApiKey)?;

        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model.to_string()));
        }

        let raw = format!(
            "{}/{}:generateContent",
            endpoint.trim_end_matches('/'),
            model
        );
        let url = Url::parse(&raw).map_err(|_| ConfigError::InvalidUrl(raw.clone()))?;

        let mut builder = ureq::Agent::config_builder().http_status_as_error(false);
        if let Some(timeout) = timeout {
            builder = builder.timeout_global(Some(timeout));
        }

        Ok(Self {
            url,
            model: model.to_string(),
            api_key,
            agent: builder.build().into(),
        })
    }

    #[inline]
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Self::new(
            &config.gemini.endpoint,
            &config.gemini.model,
            config.api_key.as_ref(),
            config.gemini.timeout_secs.map(Duration::from_secs),
        )
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Request URL without the key
    #[inline]
    pub fn url(&self) -> &Url {
        &self.url
    }

    fn redact(&self, message: &str) -> String {
        message.replace(self.api_key.expose(), "****")
    }
}

impl LanguageModel for GeminiClient {
    #[inline]
    fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let request = GenerateRequest {
            contents: [RequestContent {
                parts: [RequestPart { text: prompt }],
            }],
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| GenerationError::InvalidRequest(e.to_string()))?;

        let mut url = self.url.clone();
        url.query_pairs_mut()
            .append_pair("key", self.api_key.expose());

        debug!(
            "Sending {} character prompt to {}",
            prompt.chars().count(),
            self.url
        );

        let mut response = self
            .agent
            .post(url.as_str())
            .header("Content-Type", "application/json")
            .send(&body)
            .map_err(|e| GenerationError::Transport(self.redact(&e.to_string())))?;

        let status = response.status().as_u16();
        let bytes = response
            .body_mut()
            .read_to_vec()
            .map_err(|e| GenerationError::Transport(self.redact(&e.to_string())))?;

        if !(200..300).contains(&status) {
            warn!("Gemini returned HTTP {}", status);
            return Err(GenerationError::Status {
                status,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        Ok(extract_answer(&bytes))
    }
}

/// First candidate's first text part, or an empty string for any other shape
fn extract_answer(body: &[u8]) -> String {
    let parsed: GenerateResponse = match serde_json::from_slice(body) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Could not parse Gemini response: {}", e);
            return String::new();
        }
    };

    let text = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text);

    text.unwrap_or_else(|| {
        warn!("Gemini response contained no answer text");
        String::new()
    })
}
