//! # Settings
//!
//! Runtime configuration: credentials, model selection, per-source rate profiles
//! and the network timeout. Loaded from an optional JSON file, then overridden
//! from the environment.

use crate::models::{LlmProvider, ModelConfig};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Key for the Anthropic provider. Environment only: the provider client reads it from there.
    #[serde(skip)]
    pub anthropic_api_key: String,
    /// Key for the OpenAI(-compatible) provider. Environment only.
    #[serde(skip)]
    pub openai_api_key: String,
    /// Token for the case-law source. Missing token = every case-law call is unauthorized.
    #[serde(skip_serializing)]
    pub courtlistener_token: String,
    /// Completion model
    pub model: ModelConfig,
    /// Allowed browser origins for the HTTP surface
    pub cors_origins: Vec<String>,
    /// Fallback log filter when RUST_LOG is unset
    pub log_level: String,
    /// Per-call ceiling for every outbound network request
    pub request_timeout_secs: u64,
    /// Statute source steady rate (tokens per second)
    pub statute_rate_per_sec: f64,
    /// Statute source burst capacity
    pub statute_burst: u32,
    /// Case-law source steady rate (tokens per second)
    pub caselaw_rate_per_sec: f64,
    /// Case-law source burst capacity
    pub caselaw_burst: u32,
    /// Cap on hits returned by any single search call
    pub max_search_results: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            anthropic_api_key: String::new(),
            openai_api_key: String::new(),
            courtlistener_token: String::new(),
            model: ModelConfig::default(),
            cors_origins: vec!["http://localhost:5173".to_string()],
            log_level: "info".to_string(),
            request_timeout_secs: 30,
            statute_rate_per_sec: 0.67,
            statute_burst: 2,
            caselaw_rate_per_sec: 1.0,
            caselaw_burst: 3,
            max_search_results: 5,
        }
    }
}

impl Settings {
    /// Load settings: JSON file (if given), then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let settings = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                serde_json::from_str(&content)
                    .with_context(|| format!("Invalid config {}", path.display()))?
            }
            None => Settings::default(),
        };
        Ok(settings.with_env_overrides(|key| std::env::var(key).ok()))
    }

    /// Apply overrides from a key lookup (the process environment in production).
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("ANTHROPIC_API_KEY") {
            self.anthropic_api_key = v;
        }
        if let Some(v) = get("OPENAI_API_KEY") {
            self.openai_api_key = v;
        }
        if let Some(v) = get("COURTLISTENER_TOKEN") {
            self.courtlistener_token = v;
        }
        if let Some(provider) = get("CASEBRIEF_PROVIDER").and_then(|p| LlmProvider::parse(&p)) {
            if provider != self.model.provider {
                self.model = ModelConfig::with_provider(provider, provider.default_model());
            }
        }
        if let Some(v) = get("CASEBRIEF_MODEL") {
            self.model.model = v;
        }
        if let Some(v) = get("CASEBRIEF_BASE_URL") {
            if self.model.provider.supports_base_url() {
                self.model.base_url = Some(v);
            } else {
                tracing::warn!(
                    provider = self.model.provider.display_name(),
                    "CASEBRIEF_BASE_URL ignored for provider without base URL support"
                );
            }
        }
        if let Some(v) = get("CORS_ORIGINS") {
            self.cors_origins = v
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect();
        }
        if let Some(v) = get("LOG_LEVEL") {
            self.log_level = v.to_lowercase();
        }
        self
    }

    /// Key for the configured completion provider
    pub fn completion_api_key(&self) -> &str {
        match self.model.provider {
            LlmProvider::Anthropic => &self.anthropic_api_key,
            LlmProvider::OpenAI => &self.openai_api_key,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}
