//! Tunable thresholds and tool settings, optionally loaded from a TOML file.
//!
//! Every value has a default, so an empty or partial file is valid.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Score constants and per-entity acceptance thresholds for fuzzy lookups.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    pub artist_threshold: f64,
    pub album_threshold: f64,
    pub song_threshold: f64,
    /// Candidate is exactly the query's main artist ("X feat. Y" vs "X")
    pub main_artist_exact_score: f64,
    /// Candidate shares the query's main artist but carries its own credits
    pub main_artist_score: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            artist_threshold: 0.8,
            album_threshold: 0.85,
            song_threshold: 0.85,
            main_artist_exact_score: 0.95,
            main_artist_score: 0.9,
        }
    }
}

/// Settings for the interactive dedup session.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Copy the database file before the first destructive action
    pub backup: bool,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self { backup: true }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub matching: MatchConfig,
    pub dedup: DedupConfig,
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse config")
    }

    /// Load a config file, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            None => Ok(Self::default()),
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                Self::from_toml_str(&text)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        assert_eq!(Config::from_toml_str("").unwrap(), Config::default());
        assert!(Config::default().dedup.backup);
    }

    #[test]
    fn test_partial_override() {
        let config = Config::from_toml_str(
            "[matching]\nsong_threshold = 0.9\n\n[dedup]\nbackup = false\n",
        )
        .unwrap();
        assert_eq!(config.matching.song_threshold, 0.9);
        assert_eq!(config.matching.artist_threshold, 0.8);
        assert!(!config.dedup.backup);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(Config::from_toml_str("[matching]\nsong_threshold = \"high\"").is_err());
    }

    #[test]
    fn test_load_dedup_only_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("find-duplicates.toml");
        std::fs::write(&path, "[dedup]\nbackup = false\n").unwrap();

        let config = Config::load(Some(path.as_path())).unwrap();
        assert!(!config.dedup.backup);
        assert_eq!(config.matching, MatchConfig::default());
    }

    #[test]
    fn test_load_without_path() {
        assert_eq!(Config::load(None).unwrap(), Config::default());
    }
}
