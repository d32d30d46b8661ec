//! TOML configuration parsing and validation.
//!
//! The whole application is configured from one file (default
//! `./config/sim.toml`). See [`load_config`] for the validation rules.
//! The OpenAI API key is never stored in the file; it is read from
//! `OPENAI_API_KEY` when a client is built.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use similarity_core::prompt::{DEFAULT_INTRODUCTION, DEFAULT_TOKEN_BUDGET};
use similarity_core::search::RELATIONAL_TOP_N;
use similarity_core::Strategy;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub qdrant: Option<QdrantConfig>,
    #[serde(default)]
    pub elasticsearch: Option<ElasticsearchConfig>,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// `vector`, `relational`, or `hybrid`. Absent or unknown means no
    /// backend is selected and every retrieval returns nothing.
    #[serde(default)]
    pub strategy: Option<String>,
    #[serde(default)]
    pub enable_term_match: bool,
    #[serde(default = "default_top_n")]
    pub top_n: i64,
    #[serde(default = "default_token_budget")]
    pub token_budget: usize,
    #[serde(default = "default_scope")]
    pub scope: String,
    #[serde(default = "default_introduction")]
    pub introduction: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            strategy: None,
            enable_term_match: false,
            top_n: default_top_n(),
            token_budget: default_token_budget(),
            scope: default_scope(),
            introduction: default_introduction(),
        }
    }
}

impl RetrievalConfig {
    /// The selected backend, if the configured name is known.
    pub fn strategy(&self) -> Option<Strategy> {
        self.strategy.as_deref().and_then(Strategy::from_name)
    }
}

fn default_top_n() -> i64 {
    RELATIONAL_TOP_N
}
fn default_token_budget() -> usize {
    DEFAULT_TOKEN_BUDGET
}
fn default_scope() -> String {
    "default".to_string()
}
fn default_introduction() -> String {
    DEFAULT_INTRODUCTION.to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_openai_url")]
    pub base_url: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            timeout_secs: default_timeout_secs(),
            base_url: default_openai_url(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_openai_url() -> String {
    "https://api.openai.com/v1".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_openai_url")]
    pub base_url: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_chat_model(),
            temperature: 0.0,
            timeout_secs: default_generation_timeout_secs(),
            base_url: default_openai_url(),
        }
    }
}

fn default_chat_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_generation_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct QdrantConfig {
    #[serde(default = "default_qdrant_url")]
    pub url: String,
    pub collection: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_memmap_threshold")]
    pub memmap_threshold: u64,
    #[serde(default)]
    pub hnsw_on_disk: bool,
    #[serde(default = "default_hnsw_m")]
    pub hnsw_m: u64,
    #[serde(default = "default_hnsw_ef_construct")]
    pub hnsw_ef_construct: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_qdrant_url() -> String {
    "http://localhost:6333".to_string()
}
fn default_memmap_threshold() -> u64 {
    20000
}
fn default_hnsw_m() -> u64 {
    16
}
fn default_hnsw_ef_construct() -> u64 {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct ElasticsearchConfig {
    #[serde(default = "default_elastic_url")]
    pub url: String,
    pub index: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_elastic_url() -> String {
    "http://localhost:9200".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    let retrieval = &config.retrieval;

    if retrieval.top_n < 0 {
        bail!("retrieval.top_n must be >= 0");
    }
    if retrieval.token_budget == 0 {
        bail!("retrieval.token_budget must be > 0");
    }

    let strategy = retrieval.strategy();
    if let Some(name) = retrieval.strategy.as_deref() {
        if strategy.is_none() {
            tracing::warn!(
                strategy = name,
                "unknown retrieval.strategy; retrieval will return no fragments"
            );
        }
    }

    if retrieval.enable_term_match && strategy != Some(Strategy::Vector) {
        bail!("retrieval.enable_term_match requires retrieval.strategy = \"vector\"");
    }

    match strategy {
        Some(Strategy::Vector) if config.qdrant.is_none() => {
            bail!("retrieval.strategy = \"vector\" requires a [qdrant] section")
        }
        Some(Strategy::Hybrid) if config.elasticsearch.is_none() => {
            bail!("retrieval.strategy = \"hybrid\" requires an [elasticsearch] section")
        }
        _ => {}
    }

    if strategy.is_some() && !config.embedding.is_enabled() {
        bail!(
            "retrieval.strategy = \"{}\" requires an embedding provider",
            retrieval.strategy.as_deref().unwrap_or_default()
        );
    }

    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    if !(0.0..=2.0).contains(&config.generation.temperature) {
        bail!("generation.temperature must be in [0.0, 2.0]");
    }

    Ok(())
}
