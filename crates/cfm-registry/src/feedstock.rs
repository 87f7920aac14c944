//! Package name to feedstock lookups through the feedstock-outputs repository.

use cfm_dl::http::Http;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RegistryError, Result};

/// How the feedstock-outputs repository buckets its per-package files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardConfig {
    pub base_path: String,
    pub shard_level: usize,
    pub shard_fill: char,
}

/// `config.json` at the root of the feedstock-outputs repository.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedstockOutputsConfig {
    pub outputs_path: String,
    pub shard_level: usize,
    pub shard_fill: char,
}

impl From<FeedstockOutputsConfig> for ShardConfig {
    fn from(config: FeedstockOutputsConfig) -> Self {
        Self {
            base_path: config.outputs_path,
            shard_level: config.shard_level,
            shard_fill: config.shard_fill,
        }
    }
}

/// Path of a package's file, relative to the repository root.
///
/// The first `shard_level` alphanumeric characters of the lowercased name become directories,
/// padded with `shard_fill` for short names.
pub fn sharded_path(name: &str, config: &ShardConfig) -> String {
    let name = name.to_lowercase();
    let mut shards: Vec<String> = name
        .chars()
        .filter(|c| c.is_alphanumeric())
        .take(config.shard_level)
        .map(String::from)
        .collect();
    shards.resize(config.shard_level, config.shard_fill.to_string());

    let mut path = config.base_path.trim_end_matches('/').to_string();
    for shard in &shards {
        path.push('/');
        path.push_str(shard);
    }
    format!("{path}/{name}.json")
}

pub fn fetch_feedstock_outputs_config(base_url: &str) -> Result<FeedstockOutputsConfig> {
    Ok(Http::json(&format!("{base_url}/config.json"))?)
}

#[derive(Debug, Deserialize)]
struct PackageOutputs {
    feedstocks: Vec<String>,
}

/// Feedstocks (without the `-feedstock` suffix) allowed to publish `name`.
pub fn package_to_feedstock(base_url: &str, config: &ShardConfig, name: &str) -> Result<Vec<String>> {
    if name.is_empty() {
        return Err(RegistryError::InvalidArgument(
            "package name must not be empty".into(),
        ));
    }

    let url = format!("{base_url}/{}", sharded_path(name, config));
    debug!("looking up feedstocks of {name} at {url}");
    let outputs: PackageOutputs = Http::json(&url)?;
    Ok(outputs.feedstocks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_path: &str, shard_level: usize, shard_fill: char) -> ShardConfig {
        ShardConfig {
            base_path: base_path.into(),
            shard_level,
            shard_fill,
        }
    }

    #[test]
    fn test_sharded_path_skips_punctuation() {
        assert_eq!(
            sharded_path("Lib-LZMA!", &config("outputs", 3, 'z')),
            "outputs/l/i/b/lib-lzma!.json"
        );
        assert_eq!(
            sharded_path("_r-mutex", &config("outputs", 3, 'z')),
            "outputs/r/m/u/_r-mutex.json"
        );
    }

    #[test]
    fn test_sharded_path_pads_short_names() {
        assert_eq!(sharded_path("a1", &config("o", 3, 'z')), "o/a/1/z/a1.json");
        assert_eq!(sharded_path("--", &config("o", 2, 'z')), "o/z/z/--.json");
    }

    #[test]
    fn test_sharded_path_level_zero() {
        assert_eq!(sharded_path("numpy", &config("outputs", 0, 'z')), "outputs/numpy.json");
    }

    #[test]
    fn test_sharded_path_trailing_slash_in_base() {
        assert_eq!(sharded_path("a1", &config("o/", 3, 'z')), "o/a/1/z/a1.json");
        assert_eq!(sharded_path("numpy", &config("outputs/", 0, 'z')), "outputs/numpy.json");
    }

    #[test]
    fn test_outputs_config_into_shard_config() {
        let remote: FeedstockOutputsConfig = serde_json::from_str(
            r#"{"outputs_path": "outputs", "shard_level": 3, "shard_fill": "z", "extra": true}"#,
        )
        .unwrap();
        assert_eq!(ShardConfig::from(remote), config("outputs", 3, 'z'));
    }

    #[test]
    fn test_empty_name_rejected() {
        let err = package_to_feedstock(
            "http://127.0.0.1:9/never-contacted",
            &config("outputs", 3, 'z'),
            "",
        )
        .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidArgument(_)));
    }
}
