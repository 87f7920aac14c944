use std::collections::BTreeMap;

use cfm_registry::{feedstock, MetadataClient, ShardConfig};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::{
    error::CliResult,
    utils::{print_json, print_line},
};

pub fn show_feedstocks(client: &MetadataClient, names: &[String]) -> CliResult<()> {
    let mut feedstocks = BTreeMap::new();
    for name in names {
        feedstocks.insert(name.as_str(), client.package_to_feedstock(name)?);
    }
    print_json(&feedstocks)
}

/// Missing shard settings are taken from the published feedstock-outputs config, which is
/// only downloaded when needed.
pub fn show_shard_path(
    client: &MetadataClient,
    name: &str,
    level: Option<usize>,
    fill: Option<char>,
    base: Option<String>,
) -> CliResult<()> {
    let config = match (level, fill, base) {
        (Some(shard_level), Some(shard_fill), Some(base_path)) => ShardConfig {
            base_path,
            shard_level,
            shard_fill,
        },
        (level, fill, base) => {
            debug!("reading shard settings from the feedstock-outputs config");
            let remote = client.feedstock_outputs_config()?;
            ShardConfig {
                base_path: base.unwrap_or_else(|| remote.base_path.clone()),
                shard_level: level.unwrap_or(remote.shard_level),
                shard_fill: fill.unwrap_or(remote.shard_fill),
            }
        }
    };
    print_line(feedstock::sharded_path(name, &config))
}

#[derive(Serialize)]
struct ImportLookup<'a> {
    import: &'a str,
    top_level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    package: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    candidates: Option<Value>,
}

pub fn show_imports(
    client: &MetadataClient,
    names: &[String],
    all: bool,
    libcfgraph: bool,
) -> CliResult<()> {
    let mut lookups = Vec::with_capacity(names.len());
    for name in names {
        let lookup = if all || libcfgraph {
            let (pkgs, top_level) = if libcfgraph {
                client.get_libcfgraph_pkgs_for_import(name)?
            } else {
                client.get_pkgs_for_import(name)?
            };
            ImportLookup {
                import: name,
                top_level,
                package: None,
                candidates: Some(serde_json::to_value(pkgs)?),
            }
        } else {
            ImportLookup {
                import: name,
                top_level: cfm_registry::mapping::top_level_import(name).to_string(),
                package: Some(client.map_import_to_package(name)?),
                candidates: None,
            }
        };
        lookups.push(lookup);
    }
    print_json(&lookups)
}

pub fn show_pypi(client: &MetadataClient, names: &[String]) -> CliResult<()> {
    let mut mapped = BTreeMap::new();
    for name in names {
        mapped.insert(name.as_str(), client.map_pypi_to_conda(name)?);
    }
    print_json(&mapped)
}

pub fn show_hints(client: &MetadataClient) -> CliResult<()> {
    print_json(&*client.get_hints()?)
}
