use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use askboard_core::dedup::DedupConfig;
use askboard_core::search::SearchParams;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub dedup: DedupSection,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub k: usize,
    /// 0 means auto: max(100, k * 20).
    #[serde(default)]
    pub num_candidates: usize,
    #[serde(default = "default_vector_weight")]
    pub vector_weight: f64,
    #[serde(default = "default_lexical_weight")]
    pub lexical_weight: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            num_candidates: 0,
            vector_weight: default_vector_weight(),
            lexical_weight: default_lexical_weight(),
        }
    }
}

fn default_k() -> usize {
    5
}
fn default_vector_weight() -> f64 {
    0.8
}
fn default_lexical_weight() -> f64 {
    0.2
}

#[derive(Debug, Deserialize, Clone)]
pub struct DedupSection {
    #[serde(default = "default_exact_threshold")]
    pub exact_threshold: f64,
    #[serde(default = "default_jaccard_threshold")]
    pub jaccard_threshold: f64,
    /// Bounded visibility poll after writes that change indexed text.
    #[serde(default = "default_index_wait_attempts")]
    pub index_wait_attempts: u32,
    #[serde(default = "default_index_wait_ms")]
    pub index_wait_ms: u64,
}

impl Default for DedupSection {
    fn default() -> Self {
        Self {
            exact_threshold: default_exact_threshold(),
            jaccard_threshold: default_jaccard_threshold(),
            index_wait_attempts: default_index_wait_attempts(),
            index_wait_ms: default_index_wait_ms(),
        }
    }
}

fn default_exact_threshold() -> f64 {
    0.9
}
fn default_jaccard_threshold() -> f64 {
    0.65
}
fn default_index_wait_attempts() -> u32 {
    10
}
fn default_index_wait_ms() -> u64 {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

impl Config {
    pub fn search_params(&self) -> SearchParams {
        SearchParams {
            k: self.retrieval.k,
            num_candidates: self.retrieval.num_candidates,
            vector_weight: self.retrieval.vector_weight,
            lexical_weight: self.retrieval.lexical_weight,
        }
    }

    pub fn dedup_config(&self) -> DedupConfig {
        DedupConfig {
            exact_threshold: self.dedup.exact_threshold,
            jaccard_threshold: self.dedup.jaccard_threshold,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.retrieval.k < 1 {
        anyhow::bail!("retrieval.k must be >= 1");
    }

    for (name, value) in [
        ("retrieval.vector_weight", config.retrieval.vector_weight),
        ("retrieval.lexical_weight", config.retrieval.lexical_weight),
        ("dedup.exact_threshold", config.dedup.exact_threshold),
        ("dedup.jaccard_threshold", config.dedup.jaccard_threshold),
    ] {
        if !(0.0..=1.0).contains(&value) {
            anyhow::bail!("{} must be in [0.0, 1.0]", name);
        }
    }

    let weight_sum = config.retrieval.vector_weight + config.retrieval.lexical_weight;
    if (weight_sum - 1.0).abs() > 1e-6 {
        anyhow::bail!(
            "retrieval weights must sum to 1.0 (got {} + {})",
            config.retrieval.vector_weight,
            config.retrieval.lexical_weight
        );
    }

    if config.dedup.index_wait_attempts == 0 {
        anyhow::bail!("dedup.index_wait_attempts must be >= 1");
    }

    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "hash" => {}
        "openai" => {
            if config.embedding.model.is_none() {
                anyhow::bail!("embedding.model must be specified for the openai provider");
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or hash.",
            other
        ),
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(body.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let f = write_config(
            r#"
[db]
path = "/tmp/askboard.sqlite"

[server]
bind = "127.0.0.1:7431"
"#,
        );
        let config = load_config(f.path()).unwrap();
        assert_eq!(config.embedding.provider, "disabled");
        assert_eq!(config.retrieval.k, 5);
        assert_eq!(config.dedup.exact_threshold, 0.9);
        assert_eq!(config.dedup.jaccard_threshold, 0.65);
        assert_eq!(config.search_params().effective_candidates(), 100);
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let f = write_config(
            r#"
[db]
path = "/tmp/askboard.sqlite"

[retrieval]
vector_weight = 0.9
lexical_weight = 0.2

[server]
bind = "127.0.0.1:7431"
"#,
        );
        let err = load_config(f.path()).unwrap_err();
        assert!(err.to_string().contains("sum to 1.0"));
    }

    #[test]
    fn test_enabled_provider_requires_dims() {
        let f = write_config(
            r#"
[db]
path = "/tmp/askboard.sqlite"

[embedding]
provider = "hash"

[server]
bind = "127.0.0.1:7431"
"#,
        );
        let err = load_config(f.path()).unwrap_err();
        assert!(err.to_string().contains("embedding.dims"));
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let f = write_config(
            r#"
[db]
path = "/tmp/askboard.sqlite"

[embedding]
provider = "cohere"
dims = 256

[server]
bind = "127.0.0.1:7431"
"#,
        );
        let err = load_config(f.path()).unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }
}
