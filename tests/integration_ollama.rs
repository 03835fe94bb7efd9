#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Integration tests that require a local Ollama instance
// Run with: cargo test --test integration_ollama -- --ignored

use pdf_qa::config::OllamaConfig;
use pdf_qa::embeddings::{ChunkingConfig, Embedder, OllamaClient, chunk_text};
use std::env;
use std::time::Duration;
use tracing::{debug, info};

const TEST_MODEL: &str = "nomic-embed-text:latest";

fn create_integration_test_client() -> OllamaClient {
    let mut ollama = OllamaConfig {
        batch_size: 4,
        ..OllamaConfig::default()
    };
    if let Ok(host) = env::var("OLLAMA_HOST") {
        ollama.host = host;
    }
    if let Some(port) = env::var("OLLAMA_PORT").ok().and_then(|p| p.parse().ok()) {
        ollama.port = port;
    }
    ollama.model = env::var("OLLAMA_MODEL").unwrap_or_else(|_| TEST_MODEL.to_string());

    OllamaClient::new(&ollama)
        .expect("Failed to create Ollama client")
        .with_timeout(Duration::from_secs(60))
}

fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init()
        .ok();
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    dot / (norm_a * norm_b)
}

#[test]
#[ignore = "requires a running Ollama server"]
fn real_ollama_health_check() {
    init_test_tracing();

    let client = create_integration_test_client();

    let result = client.health_check();
    assert!(result.is_ok(), "Health check should succeed: {result:?}");
}

#[test]
#[ignore = "requires a running Ollama server"]
fn real_ollama_list_models() {
    init_test_tracing();

    let client = create_integration_test_client();

    let models = client.list_models().expect("model listing should succeed");
    assert!(!models.is_empty(), "Should have at least one model available");

    for model in &models {
        debug!("Available model: {} (size: {:?})", model.name, model.size);
    }
}

#[test]
#[ignore = "requires a running Ollama server"]
fn real_ollama_document_embeddings_share_a_width() {
    init_test_tracing();

    let client = create_integration_test_client();

    let text = "The Nile flows north through eleven countries. ".repeat(40);
    let texts: Vec<String> = chunk_text(&text, &ChunkingConfig::default())
        .into_iter()
        .map(|c| c.content)
        .collect();

    let vectors = client
        .embed_documents(&texts)
        .expect("embedding should succeed");

    assert_eq!(vectors.len(), texts.len());
    let width = vectors[0].len();
    assert!(width >= 100, "unexpectedly narrow embeddings: {width}");
    assert!(vectors.iter().all(|v| v.len() == width));

    info!("Embedded {} chunks with {} dimensions", vectors.len(), width);
}

#[test]
#[ignore = "requires a running Ollama server"]
fn real_ollama_query_is_closer_to_related_text() {
    init_test_tracing();

    let client = create_integration_test_client();

    let documents = vec![
        "The Nile is the longest river in Africa.".to_string(),
        "SQL indexes speed up lookups on large tables.".to_string(),
    ];
    let vectors = client
        .embed_documents(&documents)
        .expect("embedding should succeed");
    let query = client
        .embed_query("Which river runs through Egypt?")
        .expect("query embedding should succeed");

    assert!(cosine(&query, &vectors[0]) > cosine(&query, &vectors[1]));
}

#[test]
#[ignore = "requires a running Ollama server"]
fn real_ollama_empty_input() {
    init_test_tracing();

    let client = create_integration_test_client();

    let vectors = client
        .embed_documents(&[])
        .expect("empty batch should be handled");
    assert!(vectors.is_empty());
}
