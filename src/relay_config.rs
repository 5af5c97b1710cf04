use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo-1106";
pub const DEFAULT_MAX_TOKENS: u32 = 150;

/// Upstream settings for the completion relay.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RelayConfig {
    /// Full Chat Completions URL the relay posts to
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_endpoint() -> String {
    endpoint_for_base(DEFAULT_BASE_URL)
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

/// `<base>/chat/completions`, tolerating a trailing slash on the base.
pub fn endpoint_for_base(base: &str) -> String {
    format!("{}/chat/completions", base.trim().trim_end_matches('/'))
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl RelayConfig {
    /// Load relay configuration from a JSON file. Missing fields take their defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).with_context(|| {
            format!(
                "Failed to read relay config file: {}",
                path.as_ref().display()
            )
        })?;

        let config: RelayConfig =
            serde_json::from_str(&content).with_context(|| "Failed to parse relay config JSON")?;

        Ok(config)
    }

    /// Build from environment variables:
    /// - OPENAI_BASE_URL       -> endpoint base (default https://api.openai.com/v1)
    /// - CHATRELAY_MODEL       -> model id
    /// - CHATRELAY_MAX_TOKENS  -> max output tokens (u32; unparseable values ignored)
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(base) = get("OPENAI_BASE_URL").filter(|b| !b.trim().is_empty()) {
            config.endpoint = endpoint_for_base(&base);
        }
        if let Some(model) = get("CHATRELAY_MODEL") {
            let m = model.trim();
            if !m.is_empty() {
                config.model = m.to_string();
            }
        }
        if let Some(n) = get("CHATRELAY_MAX_TOKENS").and_then(|s| s.trim().parse::<u32>().ok()) {
            config.max_tokens = n;
        }

        config
    }
}
