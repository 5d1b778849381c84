//! Global configuration types for vindex.
//!
//! `VindexConfig` represents the top-level `config.toml` that controls the
//! distance metric, batching, worker limits and query defaults.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::embedding::DistanceMetric;

/// What a query against a store with zero vectors returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyStorePolicy {
    /// Fail with `IndexError::EmptyStore`.
    #[default]
    Error,
    /// Return an empty result list.
    EmptyResult,
}

impl fmt::Display for EmptyStorePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmptyStorePolicy::Error => write!(f, "error"),
            EmptyStorePolicy::EmptyResult => write!(f, "empty_result"),
        }
    }
}

/// Top-level configuration.
///
/// Loaded from `~/.vindex/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VindexConfig {
    /// Distance metric for newly created stores.
    #[serde(default)]
    pub metric: DistanceMetric,

    #[serde(default)]
    pub empty_store_policy: EmptyStorePolicy,

    /// Number of results returned when a query does not ask for a count.
    #[serde(default = "default_k")]
    pub default_k: usize,

    /// Preferred inference batch size for the bundled embedders.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Upper bound on inference batches running at once during a build.
    #[serde(default = "default_max_concurrent_batches")]
    pub max_concurrent_batches: usize,

    /// Per-batch inference timeout. Zero disables the timeout.
    #[serde(default = "default_inference_timeout_secs")]
    pub inference_timeout_secs: u64,

    /// Capacity of the document event broadcast channel.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Where downloaded model weights are cached. Defaults to the
    /// embedding library's own cache directory.
    #[serde(default)]
    pub model_cache_dir: Option<PathBuf>,
}

fn default_k() -> usize {
    5
}

fn default_batch_size() -> usize {
    32
}

fn default_max_concurrent_batches() -> usize {
    2
}

fn default_inference_timeout_secs() -> u64 {
    300
}

fn default_event_channel_capacity() -> usize {
    1024
}

impl Default for VindexConfig {
    fn default() -> Self {
        Self {
            metric: DistanceMetric::default(),
            empty_store_policy: EmptyStorePolicy::default(),
            default_k: default_k(),
            batch_size: default_batch_size(),
            max_concurrent_batches: default_max_concurrent_batches(),
            inference_timeout_secs: default_inference_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
            model_cache_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default_values() {
        let config = VindexConfig::default();
        assert_eq!(config.metric, DistanceMetric::Cosine);
        assert_eq!(config.empty_store_policy, EmptyStorePolicy::Error);
        assert_eq!(config.default_k, 5);
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.max_concurrent_batches, 2);
        assert_eq!(config.inference_timeout_secs, 300);
        assert!(config.model_cache_dir.is_none());
    }

    #[test]
    fn test_config_deserialize_with_defaults() {
        let config: VindexConfig = toml::from_str("").unwrap();
        assert_eq!(config.default_k, 5);
        assert_eq!(config.event_channel_capacity, 1024);
    }

    #[test]
    fn test_config_deserialize_with_values() {
        let toml_str = r#"
metric = "l2"
empty_store_policy = "empty_result"
default_k = 10
batch_size = 8
max_concurrent_batches = 4
inference_timeout_secs = 0
model_cache_dir = "/tmp/models"
"#;
        let config: VindexConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.metric, DistanceMetric::L2);
        assert_eq!(config.empty_store_policy, EmptyStorePolicy::EmptyResult);
        assert_eq!(config.default_k, 10);
        assert_eq!(config.batch_size, 8);
        assert_eq!(config.max_concurrent_batches, 4);
        assert_eq!(config.inference_timeout_secs, 0);
        assert_eq!(config.model_cache_dir, Some(PathBuf::from("/tmp/models")));
    }

    #[test]
    fn test_empty_store_policy_display() {
        assert_eq!(EmptyStorePolicy::Error.to_string(), "error");
        assert_eq!(EmptyStorePolicy::EmptyResult.to_string(), "empty_result");
    }
}
