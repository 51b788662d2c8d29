use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::fetch::DEFAULT_FETCH_TIMEOUT;
use crate::llm::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::summary::DEFAULT_SUMMARY_TIMEOUT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Clone)]
pub struct LlmSettings {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub site_url: Option<String>,
    pub site_name: Option<String>,
}

impl std::fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmSettings")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_addr: SocketAddr,
    /// `None` leaves summarization unconfigured; every link gets the fallback summary.
    pub llm: Option<LlmSettings>,
    pub fetch_timeout: Duration,
    pub summary_timeout: Duration,
    pub auth_tokens: String,
    pub log_format: LogFormat,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load environment variables from .env file if it exists
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let host = var("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = var("PORT").unwrap_or_else(|| "3000".to_string());
        let port = port
            .parse::<u16>()
            .map_err(|e| AppError::ConfigError(format!("Invalid port: {}", e)))?;
        let ip = IpAddr::from_str(&host)
            .map_err(|e| AppError::ConfigError(format!("Invalid host address: {}", e)))?;

        let llm = var("OPENROUTER_API_KEY").map(|api_key| LlmSettings {
            api_key,
            model: var("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: var("LLM_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            site_url: var("LLM_SITE_URL"),
            site_name: var("LLM_SITE_NAME"),
        });

        let fetch_timeout = parse_secs(var("FETCH_TIMEOUT_SECS"), "FETCH_TIMEOUT_SECS")?
            .unwrap_or(DEFAULT_FETCH_TIMEOUT);
        let summary_timeout = parse_secs(var("SUMMARY_TIMEOUT_SECS"), "SUMMARY_TIMEOUT_SECS")?
            .unwrap_or(DEFAULT_SUMMARY_TIMEOUT);

        let log_format = match var("LOG_FORMAT").as_deref() {
            Some(raw) if raw.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Config {
            server_addr: SocketAddr::new(ip, port),
            llm,
            fetch_timeout,
            summary_timeout,
            auth_tokens: var("AUTH_TOKENS").unwrap_or_default(),
            log_format,
        })
    }
}

fn parse_secs(raw: Option<String>, key: &str) -> Result<Option<Duration>> {
    match raw {
        None => Ok(None),
        Some(raw) => match raw.parse::<u64>() {
            Ok(0) => Err(AppError::ConfigError(format!("{} must be positive", key))),
            Ok(secs) => Ok(Some(Duration::from_secs(secs))),
            Err(e) => Err(AppError::ConfigError(format!("Invalid {}: {}", key, e))),
        },
    }
}
