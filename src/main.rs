use clap::{Parser, Subcommand};
use console::style;
use pdf_qa::commands::{ask_question, ingest_files, run_chat, show_status};
use pdf_qa::config::{Config, load_dotenv, run_interactive_config, show_config};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error, warn};

#[derive(Parser)]
#[command(name = "pdf-qa")]
#[command(about = "Ask questions about your PDF documents using retrieval-augmented generation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama, chunking, retrieval and Gemini settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Extract, chunk and index one or more PDF files
    Ingest {
        /// PDF files to ingest
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Re-index files whose name is already in the collection
        #[arg(long)]
        replace: bool,
    },
    /// Answer a single question from the indexed documents
    Ask {
        /// The question to answer
        question: String,
        /// Number of chunks to retrieve
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },
    /// Start an interactive question session, optionally ingesting PDFs first
    Chat {
        /// PDF files to ingest before the first question
        files: Vec<PathBuf>,
    },
    /// Show connectivity and collection statistics
    Status,
}

impl Commands {
    /// Status only reports on the key, so it runs without one
    fn needs_api_key(&self) -> bool {
        !matches!(self, Self::Config { .. } | Self::Status)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Before the subscriber, so RUST_LOG may come from .env
    let dotenv = load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match dotenv {
        Ok(Some(path)) => debug!("Loaded environment from {}", path.display()),
        Ok(None) => {}
        Err(e) => warn!("Failed to load .env file: {}", e),
    }

    let cli = Cli::parse();

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("{} {:#}", style("Error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands) -> anyhow::Result<()> {
    if let Commands::Config { show } = command {
        return if show {
            show_config()
        } else {
            run_interactive_config()
        };
    }

    let config = Config::load()?;
    if command.needs_api_key() {
        config.require_api_key()?;
    }

    match command {
        Commands::Config { .. } => Ok(()),
        Commands::Ingest { files, replace } => ingest_files(&config, &files, replace).await,
        Commands::Ask { question, top_k } => ask_question(&config, &question, top_k).await,
        Commands::Chat { files } => run_chat(&config, &files).await,
        Commands::Status => show_status(&config).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn ingest_command_with_files() {
        let cli = Cli::try_parse_from(["pdf-qa", "ingest", "a.pdf", "b.pdf", "--replace"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Ingest { files, replace } = parsed.command {
                assert_eq!(files, vec![PathBuf::from("a.pdf"), PathBuf::from("b.pdf")]);
                assert!(replace);
            } else {
                panic!("expected ingest command");
            }
        }
    }

    #[test]
    fn ingest_requires_a_file() {
        let cli = Cli::try_parse_from(["pdf-qa", "ingest"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        }
    }

    #[test]
    fn ask_command_with_top_k() {
        let cli = Cli::try_parse_from(["pdf-qa", "ask", "What is this about?", "-k", "5"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Ask { question, top_k } = parsed.command {
                assert_eq!(question, "What is this about?");
                assert_eq!(top_k, Some(5));
            } else {
                panic!("expected ask command");
            }
        }
    }

    #[test]
    fn chat_without_files() {
        let cli = Cli::try_parse_from(["pdf-qa", "chat"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert!(matches!(parsed.command, Commands::Chat { files } if files.is_empty()));
        }
    }

    #[test]
    fn config_show_flag() {
        let cli = Cli::try_parse_from(["pdf-qa", "config", "--show"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert!(matches!(parsed.command, Commands::Config { show: true }));
        }
    }

    #[test]
    fn status_command() {
        let cli = Cli::try_parse_from(["pdf-qa", "status"]);
        assert!(matches!(cli.map(|c| c.command), Ok(Commands::Status)));
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["pdf-qa", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["pdf-qa", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }

    #[test]
    fn status_runs_without_api_key() {
        assert!(!Commands::Status.needs_api_key());
        assert!(!Commands::Config { show: true }.needs_api_key());
        assert!(
            Commands::Ask {
                question: "q".to_string(),
                top_k: None,
            }
            .needs_api_key()
        );
        assert!(Commands::Chat { files: Vec::new() }.needs_api_key());
        assert!(
            Commands::Ingest {
                files: vec![PathBuf::from("a.pdf")],
                replace: false,
            }
            .needs_api_key()
        );
    }
}
