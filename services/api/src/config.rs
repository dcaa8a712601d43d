//! Service configuration, read once from the environment at startup.
//!
//! | Variable | Default |
//! |---|---|
//! | `BIND_ADDRESS` | `0.0.0.0:3000` |
//! | `DATABASE_URL` | required |
//! | `COMPLETION_PROVIDER` | `openai` (`openai`, `gemini` or `stub`) |
//! | `OPENAI_API_KEY` / `GEMINI_API_KEY` | required for the matching provider |
//! | `CHAT_MODEL` | `gpt-4o` |
//! | `RUST_LOG` | `INFO` |
//! | `PROMPTS_PATH` | `./prompts` |
//! | `COMPLETION_TIMEOUT_SECS` | `20` |

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

impl ConfigError {
    fn invalid(var: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue(var.to_string(), reason.into())
    }
}

/// Defines the supported backends for the Completion Service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Provider {
    OpenAI,
    Gemini,
    /// Offline mode: no completions, every caller takes its fallback path.
    Stub,
}

impl Provider {
    /// The variable holding this provider's API key, if it needs one.
    fn key_var(&self) -> Option<&'static str> {
        match self {
            Provider::OpenAI => Some("OPENAI_API_KEY"),
            Provider::Gemini => Some("GEMINI_API_KEY"),
            Provider::Stub => None,
        }
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAI),
            "gemini" => Ok(Provider::Gemini),
            "stub" => Ok(Provider::Stub),
            other => Err(format!("'{}' is not one of openai, gemini, stub", other)),
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub provider: Provider,
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub chat_model: String,
    pub log_level: Level,
    pub prompts_path: PathBuf,
    pub completion_timeout: Duration,
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_timeout(raw: &str) -> Result<Duration, ConfigError> {
    match raw.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::invalid(
            "COMPLETION_TIMEOUT_SECS",
            format!("'{}' is not a positive number of seconds", raw),
        )),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address = var_or("BIND_ADDRESS", "0.0.0.0:3000")
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::invalid("BIND_ADDRESS", e.to_string()))?;

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let provider = var_or("COMPLETION_PROVIDER", "openai")
            .parse::<Provider>()
            .map_err(|reason| ConfigError::invalid("COMPLETION_PROVIDER", reason))?;

        let openai_api_key = env::var("OPENAI_API_KEY").ok();
        let gemini_api_key = env::var("GEMINI_API_KEY").ok();
        if let Some(key_var) = provider.key_var() {
            let key = match provider {
                Provider::Gemini => &gemini_api_key,
                _ => &openai_api_key,
            };
            if key.is_none() {
                return Err(ConfigError::MissingVar(format!(
                    "{} must be set for the {:?} provider",
                    key_var, provider
                )));
            }
        }

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::invalid(
                "RUST_LOG",
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            database_url,
            provider,
            openai_api_key,
            gemini_api_key,
            chat_model: var_or("CHAT_MODEL", "gpt-4o"),
            log_level,
            prompts_path: PathBuf::from(var_or("PROMPTS_PATH", "./prompts")),
            completion_timeout: parse_timeout(&var_or("COMPLETION_TIMEOUT_SECS", "20"))?,
        })
    }
}
