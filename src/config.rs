//! Configuration management for the consensus kernel daemon.
//!
//! Trims the teacher's `Config` (network/RPC/masternode-collateral/AI
//! sections) down to what a standalone consensus kernel needs: identity,
//! storage location, logging, and the kernel's own tunables. Keeps the
//! teacher's TOML-backed `load_or_create`/`save_to_file` pattern and
//! platform data-directory resolution via `dirs`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Platform-specific base data directory, mirroring the teacher's
/// `get_data_dir()` convention.
pub fn get_data_dir() -> PathBuf {
    if cfg!(windows) {
        dirs::config_dir().unwrap_or_else(|| PathBuf::from(".")).join("consensus-kernel")
    } else {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".consensus-kernel")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub node: NodeConfig,
    pub storage: StorageConfig,
    pub consensus: ConsensusConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub name: String,
    /// Fixed participation class this node claims in the lottery; must match
    /// what its registered reputation profile earns, it is not self-asserted
    /// trust.
    #[serde(default = "default_tier")]
    pub tier: String,
}

fn default_tier() -> String {
    "tier3".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
    #[serde(default = "default_cache_size_mb")]
    pub cache_size_mb: usize,
}

fn default_cache_size_mb() -> usize {
    256
}

/// Kernel tunables a node operator may reasonably want to override; the
/// bit-for-bit protocol constants in `constants.rs` are not configurable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusConfig {
    /// Sampled-verification segment count used for VDF and finality-proof
    /// checks; higher is more conservative, at a linear cost in CPU.
    #[serde(default = "default_vdf_sample_count")]
    pub vdf_sample_count: usize,
    /// Slot duration in milliseconds the lottery runs at.
    #[serde(default = "default_slot_duration_ms")]
    pub slot_duration_ms: u64,
}

fn default_vdf_sample_count() -> usize {
    5
}

fn default_slot_duration_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Config {
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self {
            node: NodeConfig {
                name: "consensus-kernel node".to_string(),
                tier: default_tier(),
            },
            storage: StorageConfig {
                data_dir: String::new(),
                cache_size_mb: default_cache_size_mb(),
            },
            consensus: ConsensusConfig {
                vdf_sample_count: default_vdf_sample_count(),
                slot_duration_ms: default_slot_duration_ms(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }

    pub fn load_from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &str) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Load `path`, or create it with defaults rooted at the platform data
    /// directory if it doesn't exist yet.
    pub fn load_or_create(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        if fs::metadata(path).is_ok() {
            let mut config = Self::load_from_file(path)?;
            if config.storage.data_dir.is_empty() {
                config.storage.data_dir = get_data_dir().to_string_lossy().to_string();
            }
            Ok(config)
        } else {
            let mut config = Config::default();
            let data_dir = get_data_dir();
            fs::create_dir_all(&data_dir)?;
            config.storage.data_dir = data_dir.to_string_lossy().to_string();
            config.save_to_file(path)?;
            Ok(config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrips_through_toml() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(deserialized.node.name, config.node.name);
        assert_eq!(deserialized.consensus.vdf_sample_count, config.consensus.vdf_sample_count);
    }

    #[test]
    fn missing_optional_fields_fall_back_to_defaults() {
        let minimal = r#"
            [node]
            name = "test-node"

            [storage]
            data_dir = "/tmp/data"

            [consensus]

            [logging]
            level = "debug"
            format = "json"
        "#;
        let config: Config = toml::from_str(minimal).unwrap();
        assert_eq!(config.node.tier, "tier3");
        assert_eq!(config.consensus.vdf_sample_count, 5);
        assert_eq!(config.consensus.slot_duration_ms, 30_000);
    }
}
