//! Configuration types.

use std::path::PathBuf;

use crate::error::ConfigError;

/// Instructions prepended to every coaching prompt.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a helpful life coach who understands people's underlying values and desires. \
You can recognize emotions in their words and recommend proactive actions to help them \
become the most effective person they can be in all areas of their lives.

When responding, first acknowledge the emotions and values you detect in their message, \
then provide thoughtful guidance and specific actionable steps they can take.";

/// Filename of the bundled model artifact.
pub const MODEL_ARTIFACT: &str = "Llama-3.2-1B-Instruct-Q4_K_M.gguf";

/// Application configuration.
#[derive(Debug, Clone)]
pub struct CoachConfig {
    /// libSQL database file.
    pub db_path: PathBuf,
    /// Bundled model artifact handed to the inference engine.
    pub model_path: PathBuf,
    /// Questionnaire definition. `None` uses the bundled catalog.
    pub questions_path: Option<PathBuf>,
    /// Base URL of the locally hosted inference server.
    pub engine_url: String,
    /// Maximum tokens generated per turn.
    pub max_tokens: u32,
    /// Port for the HTTP/WebSocket presentation boundary.
    pub http_port: u16,
    /// System instructions for the prompt composer.
    pub system_prompt: String,
    /// Directory for rolling log files. `None` logs to stderr only.
    pub log_dir: Option<PathBuf>,
}

impl Default for CoachConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/coach.db"),
            model_path: PathBuf::from("./assets").join(MODEL_ARTIFACT),
            questions_path: None,
            engine_url: "http://127.0.0.1:8081".to_string(),
            max_tokens: 512,
            http_port: 8080,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            log_dir: None,
        }
    }
}

impl CoachConfig {
    /// Build configuration from `COACH_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            db_path: get("COACH_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            model_path: get("COACH_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),
            questions_path: get("COACH_QUESTIONS_PATH").map(PathBuf::from),
            engine_url: get("COACH_ENGINE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.engine_url),
            max_tokens: parse_or("COACH_MAX_TOKENS", get("COACH_MAX_TOKENS"), defaults.max_tokens)?,
            http_port: parse_or("COACH_HTTP_PORT", get("COACH_HTTP_PORT"), defaults.http_port)?,
            system_prompt: get("COACH_SYSTEM_PROMPT").unwrap_or(defaults.system_prompt),
            log_dir: get("COACH_LOG_DIR").map(PathBuf::from),
        })
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("{raw:?}: {e}"),
            }),
    }
}
