//! Configuration management for concierged.
//!
//! Loads settings from /etc/concierge/config.toml when present, then applies
//! environment overrides for secrets and deploy-specific values. Absence of
//! the challenge secret disables challenge verification entirely.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Config file path
pub const CONFIG_PATH: &str = "/etc/concierge/config.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Origins allowed to call the service. Empty list disables the check.
    #[serde(default)]
    pub allowed_origins: Vec<String>,

    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Chat requests allowed per window per client key.
    #[serde(default = "default_rate_max")]
    pub chat_rate_max: u32,

    #[serde(default = "default_rate_window")]
    pub chat_rate_window_secs: u64,

    /// Hard deadline for one chat request, tool rounds included.
    #[serde(default = "default_deadline")]
    pub chat_deadline_secs: u64,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub content: ContentConfig,

    #[serde(default)]
    pub challenge: ChallengeConfig,
}

/// Generative model endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model_name")]
    pub model: String,

    /// API key; absent means the backend is unauthenticated (local dev).
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_model_timeout")]
    pub timeout_secs: u64,
}

/// Searchable content store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    /// Absent endpoint disables dynamic content lookup.
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default = "default_content_timeout")]
    pub timeout_secs: u64,
}

/// Bot-challenge verification provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeConfig {
    #[serde(default = "default_challenge_endpoint")]
    pub endpoint: String,

    /// No secret means verification is disabled, not always-fail.
    #[serde(default)]
    pub secret: Option<String>,
}

fn default_bind_addr() -> String {
    "127.0.0.1:7870".to_string()
}

fn default_db_path() -> String {
    "/var/lib/concierge/concierge.db".to_string()
}

fn default_rate_max() -> u32 {
    8
}

fn default_rate_window() -> u64 {
    60
}

fn default_deadline() -> u64 {
    45
}

fn default_model_endpoint() -> String {
    "http://127.0.0.1:11434/v1/chat".to_string()
}

fn default_model_name() -> String {
    "qwen2.5:7b-instruct".to_string()
}

fn default_model_timeout() -> u64 {
    30
}

fn default_content_timeout() -> u64 {
    5
}

fn default_challenge_endpoint() -> String {
    "https://challenges.cloudflare.com/turnstile/v0/siteverify".to_string()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: default_model_endpoint(),
            model: default_model_name(),
            api_key: None,
            timeout_secs: default_model_timeout(),
        }
    }
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: default_content_timeout(),
        }
    }
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            endpoint: default_challenge_endpoint(),
            secret: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            allowed_origins: vec![],
            db_path: default_db_path(),
            chat_rate_max: default_rate_max(),
            chat_rate_window_secs: default_rate_window(),
            chat_deadline_secs: default_deadline(),
            model: ModelConfig::default(),
            content: ContentConfig::default(),
            challenge: ChallengeConfig::default(),
        }
    }
}

impl Config {
    /// Load from the config file, falling back to defaults, then apply
    /// environment overrides.
    pub fn load() -> Self {
        let mut config = Self::load_file(Path::new(CONFIG_PATH));
        config.apply_env();
        config
    }

    fn load_file(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("Invalid config at {}: {} - using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    fn apply_env(&mut self) {
        if let Ok(addr) = env::var("CONCIERGE_BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Ok(origins) = env::var("CONCIERGE_ALLOWED_ORIGINS") {
            self.allowed_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        if let Ok(path) = env::var("CONCIERGE_DB_PATH") {
            self.db_path = path;
        }
        if let Ok(endpoint) = env::var("CONCIERGE_MODEL_ENDPOINT") {
            self.model.endpoint = endpoint;
        }
        if let Ok(model) = env::var("CONCIERGE_MODEL_NAME") {
            self.model.model = model;
        }
        if let Ok(key) = env::var("CONCIERGE_MODEL_API_KEY") {
            self.model.api_key = Some(key);
        }
        if let Ok(endpoint) = env::var("CONCIERGE_CONTENT_ENDPOINT") {
            self.content.endpoint = Some(endpoint);
        }
        if let Ok(endpoint) = env::var("CONCIERGE_CHALLENGE_ENDPOINT") {
            self.challenge.endpoint = endpoint;
        }
        if let Ok(secret) = env::var("CONCIERGE_CHALLENGE_SECRET") {
            self.challenge.secret = Some(secret);
        }
    }

    /// Whether challenge verification is active.
    pub fn challenge_enabled(&self) -> bool {
        self.challenge.secret.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.allowed_origins.is_empty());
        assert!(!config.challenge_enabled());
        assert_eq!(config.model.timeout_secs, 30);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            allowed_origins = ["https://costaserena.example"]

            [model]
            model = "tiny"
            "#,
        )
        .unwrap();
        assert_eq!(config.allowed_origins.len(), 1);
        assert_eq!(config.model.model, "tiny");
        assert_eq!(config.model.timeout_secs, 30);
        assert_eq!(config.bind_addr, "127.0.0.1:7870");
    }

    #[test]
    fn test_challenge_enabled_with_secret() {
        let mut config = Config::default();
        config.challenge.secret = Some("sk".into());
        assert!(config.challenge_enabled());
    }
}
