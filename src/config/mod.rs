// Configuration management module
// TOML settings file plus the environment variables the pipeline depends on

use std::path::{Path, PathBuf};

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    ApiKey, Config, ConfigError, ENV_API_KEY, ENV_PERSIST_DIR, GeminiConfig, OllamaConfig,
    RetrievalConfig,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<PathBuf, ConfigError> {
    Config::config_dir()
}

/// Load a `.env` file from the working directory, if any
///
/// Returns the file that was loaded, or `None` when there is none. Runs
/// before logging is set up, so the caller reports the outcome. Variables
/// already present in the process environment take precedence.
#[inline]
pub fn load_dotenv() -> Result<Option<PathBuf>, dotenvy::Error> {
    match dotenvy::dotenv() {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Load a specific `.env` file; a missing file is not an error
#[inline]
pub fn load_dotenv_from<P: AsRef<Path>>(path: P) -> Result<bool, dotenvy::Error> {
    match dotenvy::from_path(path.as_ref()) {
        Ok(()) => Ok(true),
        Err(e) if e.not_found() => Ok(false),
        Err(e) => Err(e),
    }
}
