//! Configuration loader for vindex.
//!
//! Reads `config.toml` from the data directory (`~/.vindex/` by default) and
//! deserializes it into [`VindexConfig`]. Falls back to defaults when the
//! file is missing or malformed.

use std::path::Path;
use std::time::Duration;

use vindex_types::config::VindexConfig;

/// Smallest batch handed to a model in one inference call.
const MIN_BATCH_SIZE: usize = 1;

/// Smallest number of inference batches in flight during a build.
const MIN_CONCURRENT_BATCHES: usize = 1;

/// Load configuration from `{data_dir}/config.toml`.
///
/// - Missing file: returns [`VindexConfig::default()`].
/// - Unreadable or malformed file: logs a warning and returns the default.
pub async fn load_config(data_dir: &Path) -> VindexConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return VindexConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return VindexConfig::default();
        }
    };

    match toml::from_str::<VindexConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            VindexConfig::default()
        }
    }
}

/// Resolve `k` for a query: the explicit value if given, else the configured
/// default. Never below 1.
pub fn resolve_k(config: &VindexConfig, requested: Option<usize>) -> usize {
    requested.unwrap_or(config.default_k).max(1)
}

/// Resolve the inference batch size, with an optional per-run override.
pub fn resolve_batch_size(config: &VindexConfig, requested: Option<usize>) -> usize {
    requested.unwrap_or(config.batch_size).max(MIN_BATCH_SIZE)
}

pub fn resolve_concurrency(config: &VindexConfig, requested: Option<usize>) -> usize {
    requested
        .unwrap_or(config.max_concurrent_batches)
        .max(MIN_CONCURRENT_BATCHES)
}

/// Inference timeout, or `None` when disabled with `inference_timeout_secs = 0`.
pub fn resolve_inference_timeout(config: &VindexConfig) -> Option<Duration> {
    (config.inference_timeout_secs > 0).then(|| Duration::from_secs(config.inference_timeout_secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use vindex_types::config::EmptyStorePolicy;
    use vindex_types::embedding::DistanceMetric;

    #[tokio::test]
    async fn load_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).await;
        assert_eq!(config, VindexConfig::default());
    }

    #[tokio::test]
    async fn load_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
metric = "l2"
empty_store_policy = "empty_result"
default_k = 10
batch_size = 8
inference_timeout_secs = 0
"#,
        )
        .await
        .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config.metric, DistanceMetric::L2);
        assert_eq!(config.empty_store_policy, EmptyStorePolicy::EmptyResult);
        assert_eq!(config.default_k, 10);
        assert_eq!(config.batch_size, 8);
        assert_eq!(config.max_concurrent_batches, 2);
        assert!(resolve_inference_timeout(&config).is_none());
    }

    #[tokio::test]
    async fn load_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config, VindexConfig::default());
    }

    #[test]
    fn resolve_k_prefers_request_and_enforces_floor() {
        let config = VindexConfig::default();
        assert_eq!(resolve_k(&config, Some(3)), 3);
        assert_eq!(resolve_k(&config, None), 5);
        assert_eq!(resolve_k(&config, Some(0)), 1);
    }

    #[test]
    fn resolve_batch_and_concurrency_floors() {
        let config = VindexConfig {
            batch_size: 0,
            max_concurrent_batches: 0,
            ..VindexConfig::default()
        };
        assert_eq!(resolve_batch_size(&config, None), 1);
        assert_eq!(resolve_batch_size(&config, Some(16)), 16);
        assert_eq!(resolve_concurrency(&config, None), 1);
        assert_eq!(resolve_concurrency(&config, Some(4)), 4);
    }

    #[test]
    fn resolve_timeout_uses_seconds() {
        let config = VindexConfig::default();
        assert_eq!(
            resolve_inference_timeout(&config),
            Some(Duration::from_secs(300))
        );
    }
}
