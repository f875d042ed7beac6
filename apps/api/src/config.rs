use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::document::InputMode;
use crate::render::GlyphPolicy;

const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
const MAX_LLM_ATTEMPTS: u32 = 10;
const DEFAULT_FONT_URL: &str =
    "https://github.com/dejavu-fonts/dejavu-fonts/raw/master/ttf/DejaVuSans.ttf";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Required environment variable '{0}' is not set")]
    Missing(&'static str),

    #[error("Environment variable '{key}' is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Application configuration loaded from environment variables.
/// Startup halts if `GOOGLE_API_KEY` is missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub google_api_key: String,
    pub gemini_model: String,
    pub gemini_endpoint: String,
    pub llm_timeout: Duration,
    pub llm_max_retries: u32,
    pub font_path: PathBuf,
    pub font_url: String,
    pub input_mode: InputMode,
    pub glyph_policy: GlyphPolicy,
    pub max_upload_bytes: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let google_api_key = lookup("GOOGLE_API_KEY")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("GOOGLE_API_KEY"))?;

        let input_mode = match lookup("RESUME_INPUT_MODE") {
            None => InputMode::Image,
            Some(raw) => raw.parse().map_err(|reason| ConfigError::Invalid {
                key: "RESUME_INPUT_MODE",
                reason,
            })?,
        };

        let glyph_policy = match lookup("PDF_GLYPH_POLICY") {
            None => GlyphPolicy::default(),
            Some(raw) => raw.parse().map_err(|reason| ConfigError::Invalid {
                key: "PDF_GLYPH_POLICY",
                reason,
            })?,
        };

        let llm_max_retries = parse_or(&lookup, "LLM_MAX_RETRIES", 3u32)?;
        if !(1..=MAX_LLM_ATTEMPTS).contains(&llm_max_retries) {
            return Err(ConfigError::Invalid {
                key: "LLM_MAX_RETRIES",
                reason: format!("must be between 1 and {MAX_LLM_ATTEMPTS}"),
            });
        }

        Ok(Config {
            google_api_key,
            gemini_model: lookup("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            gemini_endpoint: lookup("GEMINI_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            llm_timeout: Duration::from_secs(parse_or(&lookup, "LLM_TIMEOUT_SECS", 60u64)?),
            llm_max_retries,
            font_path: lookup("FONT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("DejaVuSans.ttf")),
            font_url: lookup("FONT_URL").unwrap_or_else(|| DEFAULT_FONT_URL.to_string()),
            input_mode,
            glyph_policy,
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", 10 * 1024 * 1024usize)?,
            port: parse_or(&lookup, "PORT", 8080u16)?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
    }
}
