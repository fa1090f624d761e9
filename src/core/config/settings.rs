use std::env;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::paths::AppPaths;
use crate::core::errors::PipelineError;

/// Typed application configuration, loaded once at startup from `config.yml`.
///
/// Every field has a serde default so a missing or partial file yields a
/// usable configuration. No part of the pipeline reads config after
/// construction; per-query overrides travel in the request itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of the Ollama server.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model id used for answer generation.
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    /// Model id used for embeddings. Must match the model the index was
    /// built with; vectors are only comparable within one model's space.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    /// Generation randomness in [0, 1], fixed at configuration time.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Default number of nearest records returned by similarity search.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Whether the web search capability is configured. When false the
    /// fallback path returns the deterministic offline result.
    #[serde(default = "default_enable_web")]
    pub enable_web: bool,
    /// Simulated network latency for the offline fallback, in seconds.
    #[serde(default = "default_simulated_delay")]
    pub simulated_delay_secs: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:11434".to_string()
}

fn default_chat_model() -> String {
    "gemma3:1b".to_string()
}

fn default_embedding_model() -> String {
    "qllama/bge-large-en-v1.5".to_string()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_top_k() -> usize {
    5
}

fn default_enable_web() -> bool {
    true
}

fn default_simulated_delay() -> u64 {
    3
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            retrieval: RetrievalConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            chat_model: default_chat_model(),
            embedding_model: default_embedding_model(),
            temperature: default_temperature(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enable_web: default_enable_web(),
            simulated_delay_secs: default_simulated_delay(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from the resolved config path.
    ///
    /// A missing file is not an error; defaults apply. A present but
    /// unparsable file is, so a typo does not silently reset settings.
    pub fn load(paths: &AppPaths) -> Result<Self, PipelineError> {
        let path = config_path(paths);
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(&path).map_err(PipelineError::data_source)?;
        serde_yaml::from_str(&raw).map_err(PipelineError::data_source)
    }
}

fn config_path(paths: &AppPaths) -> PathBuf {
    if let Ok(path) = env::var("KRISHI_CONFIG_PATH") {
        return PathBuf::from(path);
    }

    let user_config = paths.user_data_dir.join("config.yml");
    if user_config.exists() {
        return user_config;
    }

    paths.project_root.join("config.yml")
}
