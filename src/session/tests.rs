use super::*;
use crate::test_util::{FakeEmbedder, FakeLanguageModel, sample_pdf};
use std::path::PathBuf;
use tempfile::TempDir;

const SOLAR: &str = "Solar panels convert sunlight into electricity using photovoltaic cells. \
    The efficiency of modern panels is around twenty percent.";
const RIVERS: &str = "The Nile is the longest river in Africa. \
    The Amazon carries more water than any other river.";

async fn engine_with(
    model: FakeLanguageModel,
) -> (QaEngine<FakeEmbedder, FakeLanguageModel>, TempDir) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = VectorStore::open(temp_dir.path(), "documents")
        .await
        .expect("should create vector store");
    let engine = QaEngine::new(FakeEmbedder::new(), model, store);
    (engine, temp_dir)
}

#[test]
fn document_name_is_the_file_name() {
    assert_eq!(document_name(Path::new("/tmp/reports/q3.pdf")), "q3.pdf");
    assert_eq!(document_name(Path::new("notes.pdf")), "notes.pdf");
    assert_eq!(document_name(&PathBuf::from("/")), "/");
}

#[test]
fn new_session_is_empty() {
    let session = Session::new();
    assert!(session.processed().is_empty());
    assert!(session.history().is_empty());

    let resumed = Session::with_processed(["a.pdf", "b.pdf"]);
    assert!(resumed.is_processed("a.pdf"));
    assert!(!resumed.is_processed("c.pdf"));
}

#[tokio::test]
async fn ingest_then_ask_uses_retrieved_context() {
    let (engine, _temp_dir) = engine_with(FakeLanguageModel::answering("About 20%.")).await;
    let mut session = Session::new();

    let outcome = engine
        .ingest_text(&mut session, "solar.pdf", SOLAR, IngestOptions::default())
        .await
        .expect("ingest should succeed");
    let IngestOutcome::Indexed(report) = outcome else {
        panic!("expected the document to be indexed");
    };
    assert_eq!(report.chunk_count, 1);
    assert!(session.is_processed("solar.pdf"));

    let answer = engine
        .ask(&mut session, "How efficient are solar panels?")
        .await
        .expect("ask should succeed");

    assert_eq!(answer.text, "About 20%.");
    assert_eq!(answer.sources.len(), 1);
    assert_eq!(answer.sources[0].source, "solar.pdf");

    assert_eq!(
        session.history(),
        &[ChatTurn {
            question: "How efficient are solar panels?".to_string(),
            answer: "About 20%.".to_string(),
        }]
    );

    let prompts = engine.model.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("How efficient are solar panels?"));
    assert!(prompts[0].contains("photovoltaic cells"));
}

#[tokio::test]
async fn ask_on_empty_store_still_answers() {
    let (engine, _temp_dir) = engine_with(FakeLanguageModel::answering("No documents.")).await;
    let mut session = Session::new();

    let answer = engine
        .ask(&mut session, "Is anything indexed?")
        .await
        .expect("empty store is not fatal");

    assert_eq!(answer.text, "No documents.");
    assert!(answer.sources.is_empty());
    assert_eq!(session.history().len(), 1);
}

#[tokio::test]
async fn top_k_limits_sources() {
    let (engine, _temp_dir) = engine_with(FakeLanguageModel::answering("ok")).await;
    let engine = engine
        .with_top_k(2)
        .with_chunking(ChunkingConfig {
            chunk_size: 60,
            chunk_overlap: 0,
            ..ChunkingConfig::default()
        });
    let mut session = Session::new();

    engine
        .ingest_text(&mut session, "rivers.pdf", RIVERS, IngestOptions::default())
        .await
        .expect("ingest should succeed");
    engine
        .ingest_text(&mut session, "solar.pdf", SOLAR, IngestOptions::default())
        .await
        .expect("ingest should succeed");
    assert!(engine.document_count().await.expect("should count") > 2);

    let answer = engine
        .ask(&mut session, "Which river is the longest?")
        .await
        .expect("ask should succeed");

    assert_eq!(engine.top_k(), 2);
    assert_eq!(answer.sources.len(), 2);
    assert_eq!(answer.sources[0].source, "rivers.pdf");
}

#[tokio::test]
async fn generation_failure_leaves_history_untouched() {
    let (engine, _temp_dir) =
        engine_with(FakeLanguageModel::failing(429, "quota exceeded")).await;
    let mut session = Session::new();
    engine
        .ingest_text(&mut session, "solar.pdf", SOLAR, IngestOptions::default())
        .await
        .expect("ingest should succeed");

    let error = engine
        .ask(&mut session, "How efficient are solar panels?")
        .await
        .expect_err("429 should surface");

    assert!(matches!(error, QaError::Generation(_)));
    assert!(error.to_string().contains("429"), "got: {error}");
    assert!(session.history().is_empty());
}

#[tokio::test]
async fn blank_question_is_rejected() {
    let (engine, _temp_dir) = engine_with(FakeLanguageModel::answering("unused")).await;
    let mut session = Session::new();

    let error = engine
        .ask(&mut session, "   \n")
        .await
        .expect_err("blank question should fail");

    assert!(matches!(error, QaError::InvalidInput(_)));
    assert!(engine.model.prompts().is_empty());
    assert_eq!(engine.embedder().calls(), 0);
}

#[tokio::test]
async fn same_name_is_skipped() {
    let (engine, _temp_dir) = engine_with(FakeLanguageModel::answering("ok")).await;
    let mut session = Session::new();

    engine
        .ingest_text(&mut session, "doc.pdf", SOLAR, IngestOptions::default())
        .await
        .expect("ingest should succeed");
    let outcome = engine
        .ingest_text(&mut session, "doc.pdf", RIVERS, IngestOptions::default())
        .await
        .expect("second ingest should succeed");

    assert_eq!(
        outcome,
        IngestOutcome::Skipped {
            name: "doc.pdf".to_string()
        }
    );
    assert_eq!(engine.document_count().await.expect("should count"), 1);
}

#[tokio::test]
async fn replace_swaps_document_content() {
    let (engine, _temp_dir) = engine_with(FakeLanguageModel::answering("ok")).await;
    let mut session = Session::new();

    engine
        .ingest_text(&mut session, "doc.pdf", SOLAR, IngestOptions::default())
        .await
        .expect("ingest should succeed");
    engine
        .ingest_text(&mut session, "doc.pdf", RIVERS, IngestOptions { replace: true })
        .await
        .expect("replace should succeed");

    assert_eq!(engine.document_count().await.expect("should count"), 1);
    let chunks = engine
        .retrieve("river", 5)
        .await
        .expect("retrieval should succeed");
    assert_eq!(chunks.len(), 1);
    assert!(chunks[0].content.contains("Nile"));
}

#[tokio::test]
async fn failed_ingest_does_not_mark_processed() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = VectorStore::open(temp_dir.path(), "documents")
        .await
        .expect("should create vector store");
    let engine = QaEngine::new(
        FakeEmbedder::failing(),
        FakeLanguageModel::answering("unused"),
        store,
    );
    let mut session = Session::new();

    let error = engine
        .ingest_text(&mut session, "doc.pdf", SOLAR, IngestOptions::default())
        .await
        .expect_err("embedding failure should abort");

    assert!(matches!(error, QaError::Embedding(_)));
    assert!(!session.is_processed("doc.pdf"));
}

#[tokio::test]
async fn unreadable_pdf_is_an_extraction_error() {
    let (engine, temp_dir) = engine_with(FakeLanguageModel::answering("unused")).await;
    let mut session = Session::new();
    let path = temp_dir.path().join("broken.pdf");
    std::fs::write(&path, b"not a pdf").expect("should write file");

    let error = engine
        .ingest_pdf(&mut session, &path, IngestOptions::default())
        .await
        .expect_err("garbage should fail");

    assert!(matches!(error, QaError::Extraction(_)));
    assert!(session.processed().is_empty());
}

#[tokio::test]
async fn resumed_session_knows_stored_documents() {
    let (engine, _temp_dir) = engine_with(FakeLanguageModel::answering("ok")).await;
    let mut session = Session::new();
    engine
        .ingest_text(&mut session, "solar.pdf", SOLAR, IngestOptions::default())
        .await
        .expect("ingest should succeed");

    let resumed = engine.resume_session().await.expect("should resume");

    assert!(resumed.is_processed("solar.pdf"));
    assert!(resumed.history().is_empty());
    assert_eq!(
        engine.indexed_sources().await.expect("should list"),
        vec!["solar.pdf"]
    );
}

#[tokio::test]
async fn pdf_is_extracted_indexed_and_answerable() {
    let (engine, temp_dir) = engine_with(FakeLanguageModel::answering("The Nile.")).await;
    let mut session = Session::new();
    let path = temp_dir.path().join("rivers.pdf");
    std::fs::write(
        &path,
        sample_pdf(&["The Nile is the longest river in Africa.", "It flows north."]),
    )
    .expect("should write file");

    let outcome = engine
        .ingest_pdf(&mut session, &path, IngestOptions::default())
        .await
        .expect("valid PDF should ingest");

    let IngestOutcome::Indexed(report) = outcome else {
        panic!("expected the document to be indexed");
    };
    assert_eq!(report.source, "rivers.pdf");
    assert_eq!(report.chunk_count, 1);
    assert!(session.is_processed("rivers.pdf"));

    let answer = engine
        .ask(&mut session, "Which river is the longest?")
        .await
        .expect("ask should succeed");
    assert_eq!(answer.sources.len(), 1);
    assert_eq!(
        answer.sources[0].content,
        "The Nile is the longest river in Africa. It flows north."
    );

    let again = engine
        .ingest_pdf(&mut session, &path, IngestOptions::default())
        .await
        .expect("second ingest should be skipped");
    assert_eq!(
        again,
        IngestOutcome::Skipped {
            name: "rivers.pdf".to_string()
        }
    );
}
