use clap::Parser;
use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub agent_url: Option<String>,
    pub agent_api_key: Option<String>,
    pub transcription_model_id: String,
    pub history_dir: PathBuf,
    pub checkpoint_every: usize,
    pub agent_description_path: Option<PathBuf>,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let agent_url = non_empty_var("AGENT_URL");
        let agent_api_key = non_empty_var("AGENT_API_KEY");

        let transcription_model_id = non_empty_var("TRANSCRIPTION_MODEL_ID").unwrap_or_else(|| {
            scholar_core::session::DEFAULT_TRANSCRIPTION_MODEL_ID.to_string()
        });

        let history_dir = std::env::var("HISTORY_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./conversation_history"));

        let checkpoint_every = match std::env::var("CHECKPOINT_EVERY") {
            Ok(raw) => parse_checkpoint_every(&raw).map_err(|reason| {
                ConfigError::InvalidValue("CHECKPOINT_EVERY".to_string(), reason)
            })?,
            Err(_) => scholar_core::history::DEFAULT_CHECKPOINT_EVERY,
        };

        let agent_description_path = non_empty_var("AGENT_DESCRIPTION_PATH").map(PathBuf::from);

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            agent_url,
            agent_api_key,
            transcription_model_id,
            history_dir,
            checkpoint_every,
            agent_description_path,
            log_level,
        })
    }

    /// Applies command-line overrides on top of the environment.
    pub fn apply(mut self, cli: &Cli) -> Self {
        if let Some(dir) = &cli.history_dir {
            self.history_dir = dir.clone();
        }
        if let Some(every) = cli.checkpoint_every {
            self.checkpoint_every = every;
        }
        if let Some(url) = &cli.agent_url {
            self.agent_url = Some(url.clone());
        }
        if cli.mock {
            self.agent_url = None;
        }
        self
    }
}

/// Command-line flags. Each one overrides its environment variable.
#[derive(Parser, Debug, Default)]
#[command(name = "agent", about = "Line-oriented tutoring agent over stdin/stdout")]
pub struct Cli {
    /// Directory holding conversation history snapshots
    #[arg(long)]
    pub history_dir: Option<PathBuf>,

    /// Write a history snapshot every N turns
    #[arg(long, value_parser = parse_checkpoint_every)]
    pub checkpoint_every: Option<usize>,

    /// Endpoint of the HTTP agent
    #[arg(long)]
    pub agent_url: Option<String>,

    /// Use the offline mock agent even when an endpoint is configured
    #[arg(long)]
    pub mock: bool,
}

fn parse_checkpoint_every(raw: &str) -> Result<usize, String> {
    match raw.trim().parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(format!("'{}' is not a positive integer: {}", raw, e)),
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}
