
use anyhow::{Context, Result};
use console::style;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing::{error, info};

use crate::config::Config;
use crate::embeddings::{Embedder, OllamaClient};
use crate::generation::{GeminiClient, LanguageModel};
use crate::session::{Answer, IngestOptions, IngestOutcome, QaEngine, Session, document_name};

/// Characters of each source chunk shown under an answer
pub const SOURCE_PREVIEW_CHARS: usize = 200;

/// A line typed at the chat prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Quit,
    History,
    Docs,
    Add(PathBuf),
    Ask(String),
}

/// Interpret one line of chat input
///
/// Lines starting with `:` are commands; an empty line ends the chat.
#[inline]
pub fn parse_chat_line(line: &str) -> std::result::Result<ChatCommand, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(ChatCommand::Quit);
    }

    let Some(command) = line.strip_prefix(':') else {
        return Ok(ChatCommand::Ask(line.to_string()));
    };

    let (name, argument) = command
        .split_once(char::is_whitespace)
        .map_or((command, ""), |(n, a)| (n, a.trim()));

    match name {
        "q" | "quit" | "exit" => Ok(ChatCommand::Quit),
        "history" => Ok(ChatCommand::History),
        "docs" => Ok(ChatCommand::Docs),
        "add" if argument.is_empty() => Err("Usage: :add <path to PDF>".to_string()),
        "add" => Ok(ChatCommand::Add(PathBuf::from(argument))),
        other => Err(format!(
            "Unknown command ':{other}'. Try :add, :history, :docs or :quit"
        )),
    }
}

/// First `max_chars` characters of `content`, with `...` appended
#[inline]
pub fn source_preview(content: &str, max_chars: usize) -> String {
    let preview: String = content.chars().take(max_chars).collect();
    format!("{preview}...")
}

/// Ingest PDFs into the configured collection, continuing past failures
#[inline]
pub async fn ingest_files(config: &Config, paths: &[PathBuf], replace: bool) -> Result<()> {
    let engine = QaEngine::from_config(config)
        .await
        .context("Failed to initialize pipeline")?;
    let mut session = engine.resume_session().await?;

    let failures = ingest_into(&engine, &mut session, paths, replace).await;

    println!(
        "{} documents in collection, {} chunks total",
        session.processed().len(),
        engine.document_count().await?
    );

    if failures > 0 {
        anyhow::bail!("{failures} of {} files failed to ingest", paths.len());
    }
    Ok(())
}

/// Answer one question and print its sources
#[inline]
pub async fn ask_question(config: &Config, question: &str, top_k: Option<usize>) -> Result<()> {
    let mut engine = QaEngine::from_config(config)
        .await
        .context("Failed to initialize pipeline")?;
    if let Some(k) = top_k {
        anyhow::ensure!(k > 0, "--top-k must be at least 1");
        engine = engine.with_top_k(k);
    }

    let mut session = Session::new();
    let answer = engine.ask(&mut session, question).await?;
    print_answer(&answer);
    Ok(())
}

/// Interactive question loop over the collection
#[inline]
pub async fn run_chat(config: &Config, paths: &[PathBuf]) -> Result<()> {
    let engine = QaEngine::from_config(config)
        .await
        .context("Failed to initialize pipeline")?;
    let mut session = engine.resume_session().await?;

    if !paths.is_empty() {
        ingest_into(&engine, &mut session, paths, false).await;
    }

    eprintln!("{}", style("📄 PDF Question Answering").bold().cyan());
    eprintln!(
        "{} documents available. Commands: {}, {}, {}, {}",
        session.processed().len(),
        style(":add <pdf>").cyan(),
        style(":history").cyan(),
        style(":docs").cyan(),
        style(":quit").cyan()
    );

    loop {
        let line: String = Input::new()
            .with_prompt("Enter your question")
            .allow_empty(true)
            .interact_text()?;

        match parse_chat_line(&line) {
            Ok(ChatCommand::Quit) => break,
            Ok(ChatCommand::History) => print_history(&session),
            Ok(ChatCommand::Docs) => print_documents(&session),
            Ok(ChatCommand::Add(path)) => {
                ingest_into(&engine, &mut session, &[path], false).await;
            }
            Ok(ChatCommand::Ask(question)) => match engine.ask(&mut session, &question).await {
                Ok(answer) => print_answer(&answer),
                Err(e) => {
                    error!("Question failed: {}", e);
                    eprintln!("{} {}", style("Error processing question:").red(), e);
                }
            },
            Err(message) => eprintln!("{}", style(message).yellow()),
        }
    }

    Ok(())
}

/// Report connectivity and collection statistics
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    println!("📊 PDF QA Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🔑 Gemini:");
    println!(
        "   {} API key: {}",
        if config.api_key.is_some() { "✅" } else { "❌" },
        if config.api_key.is_some() { "set" } else { "missing" }
    );
    println!("   📋 Model: {}", config.gemini.model);

    println!("🤖 Ollama Status:");
    match OllamaClient::from_config(config) {
        Ok(client) => match client.health_check() {
            Ok(()) => {
                println!(
                    "   ✅ Ollama: Connected ({}:{})",
                    config.ollama.host, config.ollama.port
                );
                println!("   📋 Model: {}", client.model_name());
            }
            Err(e) => println!("   ⚠️  Ollama: Unhealthy - {:#}", e),
        },
        Err(e) => println!("   ❌ Ollama: Invalid configuration - {:#}", e),
    }

    println!("🔍 Vector Database Status:");
    println!("   📁 Location: {}", config.persist_dir.display());
    match crate::database::VectorStore::from_config(config).await {
        Ok(store) => {
            println!("   ✅ LanceDB: Connected");
            println!("   🗂️  Collection: {}", store.table_name());
            println!("   🧩 Chunks: {}", store.count().await?);
            let sources = store.list_sources().await?;
            if sources.is_empty() {
                println!("   📚 Documents: none yet. Use 'pdf-qa ingest <pdf>' to add one.");
            } else {
                println!("   📚 Documents ({}):", sources.len());
                for source in &sources {
                    println!("      - {}", source);
                }
            }
        }
        Err(e) => println!("   ❌ LanceDB: Failed to open - {}", e),
    }

    Ok(())
}

/// Ingest each path, printing progress; returns how many failed
async fn ingest_into<E: Embedder, L: LanguageModel>(
    engine: &QaEngine<E, L>,
    session: &mut Session,
    paths: &[PathBuf],
    replace: bool,
) -> usize {
    let bar = progress_bar(paths.len());
    let options = IngestOptions { replace };
    let mut failures = 0;

    for path in paths {
        let name = document_name(path);
        bar.set_message(format!("{name}: extracting and indexing"));
        match engine.ingest_pdf(session, path, options).await {
            Ok(IngestOutcome::Indexed(report)) => {
                bar.println(format!(
                    "{} {} ({} chunks)",
                    style("✓ Processed").green(),
                    name,
                    report.chunk_count
                ));
            }
            Ok(IngestOutcome::Skipped { .. }) => {
                bar.println(format!(
                    "{} {} (use --replace to re-index)",
                    style("• Already processed").dim(),
                    name
                ));
            }
            Err(e) => {
                failures += 1;
                error!("Failed to ingest {}: {}", path.display(), e);
                bar.println(format!("{} {}: {}", style("✗ Failed").red(), name, e));
            }
        }
        bar.inc(1);
    }

    bar.finish_and_clear();
    info!(
        "Ingested {} of {} files",
        paths.len() - failures,
        paths.len()
    );
    failures
}

fn progress_bar(len: usize) -> ProgressBar {
    if !console::user_attended_stderr() {
        return ProgressBar::hidden();
    }

    let style = ProgressStyle::with_template("{spinner} [{pos}/{len}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    let bar = ProgressBar::new(len as u64).with_style(style);
    bar.enable_steady_tick(std::time::Duration::from_millis(120));
    bar
}

fn print_answer(answer: &Answer) {
    println!();
    println!("{}", style("Answer:").bold().green());
    println!("{}", answer.text);

    if !answer.sources.is_empty() {
        println!();
        println!("{}", style("Sources:").bold().yellow());
        for (i, chunk) in answer.sources.iter().enumerate() {
            println!(
                "Source {}: {}",
                i + 1,
                source_preview(&chunk.content, SOURCE_PREVIEW_CHARS)
            );
        }
    }
    println!();
}

fn print_history(session: &Session) {
    if session.history().is_empty() {
        eprintln!("No questions asked yet.");
        return;
    }

    for turn in session.history().iter().rev() {
        println!("{} {}", style("Q:").bold().cyan(), turn.question);
        println!("{} {}", style("A:").bold().green(), turn.answer);
        println!("{}", style("-".repeat(40)).dim());
    }
}

fn print_documents(session: &Session) {
    if session.processed().is_empty() {
        eprintln!("No documents processed yet. Use :add <pdf>.");
        return;
    }

    println!("{}", style("Processed documents:").bold());
    for name in session.processed() {
        println!("  - {}", name);
    }
}
