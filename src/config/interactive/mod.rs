
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};

use super::{Config, ConfigError, GeminiConfig, OllamaConfig};
use crate::embeddings::chunking::ChunkingConfig;

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🔧 PDF QA Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config()?;

    eprintln!("{}", style("Ollama Configuration").bold().yellow());
    eprintln!("Configure your local Ollama instance for embedding generation.");
    eprintln!();

    configure_ollama(&mut config.ollama)?;

    eprintln!();
    eprintln!("{}", style("Chunking & Retrieval").bold().yellow());
    configure_chunking(&mut config.chunking)?;
    configure_retrieval(&mut config)?;

    eprintln!();
    eprintln!("{}", style("Gemini Configuration").bold().yellow());
    eprintln!(
        "The API key is read from the {} environment variable and is never saved.",
        style(super::ENV_API_KEY).cyan()
    );
    configure_gemini(&mut config.gemini)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    if test_ollama_connection(&config.ollama)? {
        eprintln!("{}", style("✓ Ollama connection successful!").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Could not connect to Ollama").yellow()
        );
        eprintln!("You can continue, but make sure Ollama is running before ingesting.");
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Ollama Settings:").bold().yellow());
    eprintln!("  Host: {}", style(&config.ollama.host).cyan());
    eprintln!("  Port: {}", style(config.ollama.port).cyan());
    eprintln!("  Model: {}", style(&config.ollama.model).cyan());
    eprintln!("  Batch Size: {}", style(config.ollama.batch_size).cyan());
    match config.ollama_url() {
        Ok(url) => eprintln!("  Ollama URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  Ollama URL: {} ({})", style("Invalid").red(), e),
    }

    eprintln!();
    eprintln!("{}", style("Chunking & Retrieval:").bold().yellow());
    eprintln!("  Chunk Size: {}", style(config.chunking.chunk_size).cyan());
    eprintln!(
        "  Chunk Overlap: {}",
        style(config.chunking.chunk_overlap).cyan()
    );
    eprintln!("  Top K: {}", style(config.retrieval.top_k).cyan());
    eprintln!(
        "  Collection: {}",
        style(&config.retrieval.collection).cyan()
    );
    eprintln!(
        "  Vector Store: {}",
        style(config.persist_dir.display()).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Gemini Settings:").bold().yellow());
    eprintln!("  Model: {}", style(&config.gemini.model).cyan());
    eprintln!("  Endpoint: {}", style(&config.gemini.endpoint).cyan());
    match config.gemini.timeout_secs {
        Some(secs) => eprintln!("  Timeout: {}", style(format!("{secs}s")).cyan()),
        None => eprintln!("  Timeout: {}", style("client default").dim()),
    }
    if config.api_key.is_some() {
        eprintln!("  API Key: {}", style("set").green());
    } else {
        eprintln!("  API Key: {}", style("missing").red());
    }

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config() -> Result<Config> {
    match Config::load() {
        Ok(config) => {
            eprintln!("{}", style("Found existing configuration.").green());
            Ok(config)
        }
        Err(_) => {
            eprintln!(
                "{}",
                style("No existing configuration found. Using defaults.").yellow()
            );
            Ok(Config {
                base_dir: Config::config_dir()?,
                ..Config::default()
            })
        }
    }
}

fn configure_ollama(ollama: &mut OllamaConfig) -> Result<()> {
    let protocols = &["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == ollama.protocol)
        .unwrap_or(0);

    let protocol_index = Select::new()
        .with_prompt("Ollama protocol")
        .default(default_index)
        .items(protocols)
        .interact()?;

    let protocol = protocols[protocol_index].to_string();

    let host: String = Input::new()
        .with_prompt("Ollama host")
        .default(ollama.host.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = OllamaConfig {
                protocol: protocol.clone(),
                host: input.clone(),
                ..OllamaConfig::default()
            };
            temp_config.validate()
        })
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("Ollama port")
        .default(ollama.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let model: String = Input::new()
        .with_prompt("Embedding model")
        .default(ollama.model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let batch_size: u32 = Input::new()
        .with_prompt("Batch size for embedding generation")
        .default(ollama.batch_size)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if *input == 0 {
                Err("Batch size must be greater than 0")
            } else if *input > 1000 {
                Err("Batch size must be 1000 or less")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    ollama.set_protocol(protocol)?;
    ollama.set_host(host)?;
    ollama.set_port(port)?;
    ollama.set_model(model)?;
    ollama.set_batch_size(batch_size)?;

    Ok(())
}

fn configure_chunking(chunking: &mut ChunkingConfig) -> Result<()> {
    let chunk_size: usize = Input::new()
        .with_prompt("Chunk size (characters)")
        .default(chunking.chunk_size)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if (1..=8192).contains(input) {
                Ok(())
            } else {
                Err("Chunk size must be between 1 and 8192")
            }
        })
        .interact_text()?;

    let chunk_overlap: usize = Input::new()
        .with_prompt("Chunk overlap (characters)")
        .default(chunking.chunk_overlap.min(chunk_size - 1))
        .validate_with(|input: &usize| -> Result<(), &str> {
            if *input < chunk_size {
                Ok(())
            } else {
                Err("Overlap must be smaller than the chunk size")
            }
        })
        .interact_text()?;

    chunking.chunk_size = chunk_size;
    chunking.chunk_overlap = chunk_overlap;
    Ok(())
}

fn configure_retrieval(config: &mut Config) -> Result<()> {
    let top_k: usize = Input::new()
        .with_prompt("Chunks retrieved per question")
        .default(config.retrieval.top_k)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if (1..=100).contains(input) {
                Ok(())
            } else {
                Err("Must be between 1 and 100")
            }
        })
        .interact_text()?;

    config.retrieval.top_k = top_k;
    Ok(())
}

fn configure_gemini(gemini: &mut GeminiConfig) -> Result<()> {
    let model: String = Input::new()
        .with_prompt("Gemini model")
        .default(gemini.model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    gemini.set_model(model)?;
    Ok(())
}

fn test_ollama_connection(ollama: &OllamaConfig) -> Result<bool> {
    let url = format!(
        "{}://{}:{}/api/version",
        ollama.protocol, ollama.host, ollama.port
    );

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    match agent.get(&url).call() {
        Ok(_) => Ok(true),
        Err(ureq::Error::StatusCode(code)) if (400..500).contains(&code) => Ok(true),
        Err(_) => Ok(false),
    }
}
