use anyhow::{Context, Result};
use docqa_core::chunk::ChunkParams;
use docqa_core::retrieve::RetrievalParams;
use docqa_core::scoring::Scoring;
use serde::Deserialize;
use std::path::Path;

/// Engine configuration. Every section is optional.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub answer: AnswerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LimitsConfig {
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    #[serde(default = "default_ingest_timeout_secs")]
    pub ingest_timeout_secs: u64,
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: default_max_upload_bytes(),
            ingest_timeout_secs: default_ingest_timeout_secs(),
            query_timeout_secs: default_query_timeout_secs(),
        }
    }
}

/// 20 MiB, the upload form's limit.
fn default_max_upload_bytes() -> u64 {
    20 * 1024 * 1024
}
fn default_ingest_timeout_secs() -> u64 {
    30
}
fn default_query_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

impl ChunkingConfig {
    pub fn params(&self) -> ChunkParams {
        ChunkParams {
            max_chars: self.max_chars,
            overlap_chars: self.overlap_chars,
        }
    }
}

fn default_max_chars() -> usize {
    800
}
fn default_overlap_chars() -> usize {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default = "default_min_score")]
    pub min_score: f64,
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,
    #[serde(default = "default_dedup_overlap")]
    pub dedup_overlap: f64,
    #[serde(default = "default_scoring")]
    pub scoring: String,
    #[serde(default = "default_bm25_k1")]
    pub bm25_k1: f64,
    #[serde(default = "default_bm25_b")]
    pub bm25_b: f64,
    #[serde(default = "default_hash_dims")]
    pub hash_dims: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            min_score: default_min_score(),
            candidate_multiplier: default_candidate_multiplier(),
            dedup_overlap: default_dedup_overlap(),
            scoring: default_scoring(),
            bm25_k1: default_bm25_k1(),
            bm25_b: default_bm25_b(),
            hash_dims: default_hash_dims(),
        }
    }
}

impl RetrievalConfig {
    pub fn params(&self) -> RetrievalParams {
        RetrievalParams {
            k: self.k,
            min_score: self.min_score,
            candidate_multiplier: self.candidate_multiplier,
            dedup_overlap: self.dedup_overlap,
        }
    }

    /// The configured strategy. Unknown names are rejected by [`load_config`].
    pub fn scoring(&self) -> Result<Scoring> {
        match self.scoring.as_str() {
            "bm25" => Ok(Scoring::Bm25 {
                k1: self.bm25_k1,
                b: self.bm25_b,
            }),
            "term_overlap" => Ok(Scoring::TermOverlap),
            "hashed_cosine" => Ok(Scoring::HashedCosine {
                dims: self.hash_dims,
            }),
            other => anyhow::bail!(
                "Unknown retrieval scoring: '{}'. Must be bm25, term_overlap, or hashed_cosine.",
                other
            ),
        }
    }
}

fn default_k() -> usize {
    3
}
fn default_min_score() -> f64 {
    0.1
}
fn default_candidate_multiplier() -> usize {
    4
}
fn default_dedup_overlap() -> f64 {
    0.5
}
fn default_scoring() -> String {
    "bm25".to_string()
}
fn default_bm25_k1() -> f64 {
    1.2
}
fn default_bm25_b() -> f64 {
    0.75
}
fn default_hash_dims() -> usize {
    1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnswerConfig {
    #[serde(default = "default_max_sentences")]
    pub max_sentences: usize,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            max_sentences: default_max_sentences(),
        }
    }
}

fn default_max_sentences() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// `tracing` filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate a TOML configuration.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Limits
    if config.limits.max_upload_bytes == 0 {
        anyhow::bail!("limits.max_upload_bytes must be > 0");
    }
    if config.limits.ingest_timeout_secs == 0 || config.limits.query_timeout_secs == 0 {
        anyhow::bail!("limits timeouts must be > 0");
    }

    // Chunking
    if config.chunking.max_chars == 0 {
        anyhow::bail!("chunking.max_chars must be > 0");
    }
    if config.chunking.overlap_chars >= config.chunking.max_chars {
        anyhow::bail!("chunking.overlap_chars must be < chunking.max_chars");
    }

    // Retrieval
    let retrieval = &config.retrieval;
    if retrieval.k < 1 {
        anyhow::bail!("retrieval.k must be >= 1");
    }
    if retrieval.candidate_multiplier < 1 {
        anyhow::bail!("retrieval.candidate_multiplier must be >= 1");
    }
    if !(0.0..=1.0).contains(&retrieval.min_score) {
        anyhow::bail!("retrieval.min_score must be in [0.0, 1.0]");
    }
    if !(retrieval.dedup_overlap > 0.0 && retrieval.dedup_overlap <= 1.0) {
        anyhow::bail!("retrieval.dedup_overlap must be in (0.0, 1.0]");
    }
    match retrieval.scoring()? {
        Scoring::Bm25 { k1, b } => {
            if k1 < 0.0 || !(0.0..=1.0).contains(&b) {
                anyhow::bail!("retrieval.bm25_k1 must be >= 0 and retrieval.bm25_b in [0.0, 1.0]");
            }
        }
        Scoring::HashedCosine { dims } if dims == 0 => {
            anyhow::bail!("retrieval.hash_dims must be > 0");
        }
        _ => {}
    }

    if config.answer.max_sentences == 0 {
        anyhow::bail!("answer.max_sentences must be > 0");
    }

    Ok(())
}
