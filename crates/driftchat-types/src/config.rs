//! Server configuration, loaded from `config.toml` in the data directory.

use serde::{Deserialize, Serialize};

/// Global server configuration.
///
/// Every field has a default so a missing or partial `config.toml` still
/// yields a working server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Upstream model identifier.
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of the OpenAI-compatible completion endpoint.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Maximum tokens to request per completion.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature for completions.
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Maximum seconds to wait for the next streamed chunk before treating
    /// the stream as failed (triggers the blocking fallback).
    #[serde(default = "default_stream_token_timeout_secs")]
    pub stream_token_timeout_secs: u64,

    /// Maximum seconds for one blocking completion call.
    #[serde(default = "default_complete_timeout_secs")]
    pub complete_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            stream_token_timeout_secs: default_stream_token_timeout_secs(),
            complete_timeout_secs: default_complete_timeout_secs(),
        }
    }
}

fn default_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

fn default_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f64 {
    0.7
}

fn default_stream_token_timeout_secs() -> u64 {
    30
}

fn default_complete_timeout_secs() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.model, "llama-3.3-70b-versatile");
        assert_eq!(config.max_tokens, 4096);
        assert_eq!(config.stream_token_timeout_secs, 30);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: ServerConfig = toml::from_str("model = \"mixtral-8x7b-32768\"").unwrap();
        assert_eq!(config.model, "mixtral-8x7b-32768");
        assert_eq!(config.base_url, "https://api.groq.com/openai/v1");
        assert!((config.temperature - 0.7).abs() < f64::EPSILON);
    }
}
