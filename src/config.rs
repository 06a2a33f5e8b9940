//! Configuration loading and validation, matching the field set and ranges
//! of the original `ConfigData` struct.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, WftsError};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    pub base_urls: Vec<String>,
    pub index_path: String,

    #[serde(default = "default_workers_count")]
    pub workers_count: usize,
    #[serde(default = "default_max_depth")]
    pub max_depth_crawl: usize,
    #[serde(default)]
    pub only_same_domain: bool,
    #[serde(default = "default_ngram_count")]
    pub ngram_count: usize,
    #[serde(default = "default_max_typo")]
    pub max_typo: usize,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_tui_border_color")]
    pub tui_border_color: String,
    #[serde(default = "default_log_channel_size")]
    pub log_channel_size: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub reranker_url: Option<String>,
}

fn default_workers_count() -> usize {
    200
}
fn default_max_depth() -> usize {
    3
}
fn default_ngram_count() -> usize {
    3
}
fn default_max_typo() -> usize {
    2
}
fn default_chunk_size() -> usize {
    100
}
fn default_tui_border_color() -> String {
    "blue".to_string()
}
fn default_log_channel_size() -> usize {
    5000
}
fn default_queue_capacity() -> usize {
    10_000
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| WftsError::ConfigInvalid(format!("reading config: {e}")))?;
        let cfg: Config = toml::from_str(&text)
            .map_err(|e| WftsError::ConfigInvalid(format!("parsing config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let in_range = |name: &str, v: usize, lo: usize, hi: usize| -> Result<()> {
            if v < lo || v > hi {
                Err(WftsError::ConfigInvalid(format!(
                    "{name}={v} out of range [{lo},{hi}]"
                )))
            } else {
                Ok(())
            }
        };

        if self.base_urls.is_empty() || self.base_urls.len() > 100 {
            return Err(WftsError::ConfigInvalid(
                "base_urls must contain between 1 and 100 entries".to_string(),
            ));
        }
        if self.index_path.is_empty() {
            return Err(WftsError::ConfigInvalid("index_path is required".to_string()));
        }
        in_range("workers_count", self.workers_count, 50, 2000)?;
        in_range("max_depth_crawl", self.max_depth_crawl, 1, 10)?;
        in_range("ngram_count", self.ngram_count, 2, 5)?;
        in_range("max_typo", self.max_typo, 1, 4)?;
        in_range("chunk_size", self.chunk_size, 20, 500)?;
        in_range("log_channel_size", self.log_channel_size, 1000, 50_000)?;
        in_range("queue_capacity", self.queue_capacity, 100, 100_000)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_toml_fills_defaults() {
        let toml = r#"
            base_urls = ["https://example.com"]
            index_path = "/tmp/wfts-idx"
        "#;
        let cfg: Config = toml::from_str(toml).unwrap();
        assert_eq!(cfg.workers_count, 200);
        assert_eq!(cfg.max_depth_crawl, 3);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range() {
        let mut cfg_toml = r#"
            base_urls = ["https://example.com"]
            index_path = "/tmp/wfts-idx"
            max_depth_crawl = 99
        "#
        .to_string();
        let cfg: Config = toml::from_str(&cfg_toml).unwrap();
        assert!(cfg.validate().is_err());
        cfg_toml.clear();
    }

    #[test]
    fn rejects_empty_base_urls() {
        let toml = r#"
            base_urls = []
            index_path = "/tmp/wfts-idx"
        "#;
        let cfg: Config = toml::from_str(toml).unwrap();
        assert!(cfg.validate().is_err());
    }
}
