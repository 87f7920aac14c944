//! Import name and PyPI name to conda package lookups.
//!
//! The tables come from the autotick bot's graph repository, or from libcfgraph for the older
//! import maps. Lookups are approximate: an import can be supplied by several packages.

use std::collections::{BTreeSet, HashMap};

use cfm_dl::http::Http;
use serde::Deserialize;
use sha1::{Digest, Sha1};
use tracing::debug;

use crate::{
    error::{RegistryError, Result},
    record::NameMappingEntry,
    yaml::parse_yaml_as,
};

/// Import name to the packages that may supply it.
pub type ImportMap = HashMap<String, BTreeSet<String>>;

/// PyPI name to its mapping row.
pub type PypiMapping = HashMap<String, NameMappingEntry>;

const DEFAULT_NUM_DIRS: usize = 5;

/// `import_to_pkg_maps_meta.json`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ImportMapsMeta {
    pub num_letters: usize,
    #[serde(default = "default_num_dirs")]
    pub num_dirs: usize,
}

fn default_num_dirs() -> usize {
    DEFAULT_NUM_DIRS
}

/// Reduces a dotted import to its top-level module and looks it up.
pub fn resolve_import<'a>(
    import_name: &str,
    table: &'a ImportMap,
) -> (Option<&'a BTreeSet<String>>, String) {
    let top_level = top_level_import(import_name);
    (table.get(top_level), top_level.to_string())
}

pub fn top_level_import(import_name: &str) -> &str {
    import_name
        .split_once('.')
        .map_or(import_name, |(head, _)| head)
}

/// Picks the most likely package supplying `import_name`.
///
/// A package named like the import wins, then the first candidate in `ranked`, and finally the
/// import name itself.
pub fn map_import_to_package(import_name: &str, table: &ImportMap, ranked: &[String]) -> String {
    let (candidates, import_name) = resolve_import(import_name, table);
    let Some(candidates) = candidates else {
        return import_name;
    };

    if candidates.contains(&import_name) {
        return import_name;
    }

    ranked
        .iter()
        .find(|name| candidates.contains(*name))
        .cloned()
        .unwrap_or(import_name)
}

/// Exact, case-sensitive lookup; unknown names map to themselves, lowercased.
pub fn map_pypi_to_conda(pypi_name: &str, table: &PypiMapping) -> String {
    table
        .get(pypi_name)
        .map(|entry| entry.conda_name.clone())
        .unwrap_or_else(|| pypi_name.to_lowercase())
}

/// Location of a file inside the bot's sharded graph layout.
///
/// `dir/file` becomes `dir/h0/h1/.../file`, the `h`s being leading hex digits of the SHA-1 of
/// `file`. Top-level files and `lazy_json/` are not sharded.
pub fn bot_sharded_path(file_path: &str, n_dirs: usize) -> String {
    let (top_dir, file_name) = file_path.rsplit_once('/').unwrap_or(("", file_path));
    if top_dir.is_empty() || top_dir == "lazy_json" {
        return file_name.to_string();
    }

    let digest = Sha1::digest(file_name.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    let mut parts = vec![top_dir.to_string()];
    parts.extend(hex.chars().take(n_dirs).map(String::from));
    parts.push(file_name.to_string());
    parts.join("/")
}

/// Name of the import map shard holding `import_name`.
pub fn import_shard(import_name: &str, num_letters: usize) -> String {
    let prefix: String = import_name.chars().take(num_letters).collect();
    prefix.to_lowercase()
}

pub fn bot_import_map_url(base_url: &str, shard: &str, meta: &ImportMapsMeta) -> String {
    let path = bot_sharded_path(&format!("import_to_pkg_maps/{shard}.json"), meta.num_dirs);
    format!("{base_url}/{path}")
}

pub fn libcfgraph_import_map_url(base_url: &str, shard: &str) -> String {
    format!("{base_url}/import_to_pkg_maps/{shard}.json")
}

pub fn fetch_bot_import_maps_meta(base_url: &str) -> Result<ImportMapsMeta> {
    Ok(Http::json(&format!(
        "{base_url}/import_to_pkg_maps/import_to_pkg_maps_meta.json"
    ))?)
}

pub fn fetch_libcfgraph_import_maps_meta(base_url: &str) -> Result<ImportMapsMeta> {
    Ok(Http::json(&format!("{base_url}/import_to_pkg_maps_meta.json"))?)
}

#[derive(Debug, Deserialize)]
struct Elements {
    elements: BTreeSet<String>,
}

/// Fetches one import map shard, stored as `{import: {"elements": [...]}}`.
pub fn fetch_import_map(url: &str) -> Result<ImportMap> {
    debug!("fetching import map {url}");
    let raw: HashMap<String, Elements> = Http::json(url)?;
    Ok(raw.into_iter().map(|(k, v)| (k, v.elements)).collect())
}

pub fn fetch_ranked_hubs_authorities(cf_graph_url: &str) -> Result<Vec<String>> {
    Ok(Http::json(&format!(
        "{cf_graph_url}/ranked_hubs_authorities.json"
    ))?)
}

pub fn fetch_grayskull_pypi_mapping(cf_graph_url: &str) -> Result<PypiMapping> {
    Ok(Http::json(&format!(
        "{cf_graph_url}/mappings/pypi/grayskull_pypi_mapping.json"
    ))?)
}

/// The hand-curated `name_mapping.yaml`.
pub fn fetch_pypi_name_mapping(cf_graph_url: &str) -> Result<Vec<NameMappingEntry>> {
    let url = format!("{cf_graph_url}/mappings/pypi/name_mapping.yaml");
    let text = Http::text(&url)?;
    parse_yaml_as(&text)
        .map_err(|err| RegistryError::FailedToFetchRemote(format!("{url}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: &[(&str, Vec<&str>)]) -> ImportMap {
        entries
            .iter()
            .map(|(import, pkgs)| {
                (
                    import.to_string(),
                    pkgs.iter().map(|p| p.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_self_match_beats_ranking() {
        let table = table(&[("scipy", vec!["scipy", "other-scipy-fork"])]);
        assert_eq!(map_import_to_package("scipy", &table, &[]), "scipy");

        let ranked = vec!["other-scipy-fork".to_string()];
        assert_eq!(map_import_to_package("scipy", &table, &ranked), "scipy");
    }

    #[test]
    fn test_first_ranked_candidate() {
        let table = table(&[("cv2", vec!["opencv", "libopencv"])]);
        let ranked = vec!["numpy".to_string(), "libopencv".into(), "opencv".into()];
        assert_eq!(map_import_to_package("cv2", &table, &ranked), "libopencv");
    }

    #[test]
    fn test_fallbacks_to_import_name() {
        let table = table(&[("cv2", vec!["opencv"])]);
        assert_eq!(map_import_to_package("cv2", &table, &[]), "cv2");
        assert_eq!(map_import_to_package("yaml.loader", &table, &[]), "yaml");
    }

    #[test]
    fn test_dotted_import_uses_top_level() {
        let table = table(&[("numpy", vec!["numpy"]), ("numpy.linalg", vec!["bogus"])]);
        let (pkgs, name) = resolve_import("numpy.linalg.lapack", &table);
        assert_eq!(name, "numpy");
        assert!(pkgs.unwrap().contains("numpy"));

        let (pkgs, name) = resolve_import("missing.mod", &table);
        assert!(pkgs.is_none());
        assert_eq!(name, "missing");
    }

    #[test]
    fn test_map_pypi_to_conda() {
        let mut table = PypiMapping::new();
        table.insert(
            "PyYAML".into(),
            NameMappingEntry {
                pypi_name: "PyYAML".into(),
                conda_name: "pyyaml".into(),
                import_name: "yaml".into(),
                mapping_source: "regro-bot".into(),
            },
        );
        assert_eq!(map_pypi_to_conda("PyYAML", &table), "pyyaml");
        assert_eq!(map_pypi_to_conda("pyyaml", &table), "pyyaml");
        assert_eq!(map_pypi_to_conda("Django", &table), "django");
    }

    #[test]
    fn test_bot_sharded_path() {
        // sha1("a.json") = d277c45cdc...
        assert_eq!(
            bot_sharded_path("import_to_pkg_maps/a.json", 5),
            "import_to_pkg_maps/d/2/7/7/c/a.json"
        );
        assert_eq!(bot_sharded_path("node_attrs.json", 5), "node_attrs.json");
        assert_eq!(bot_sharded_path("lazy_json/numpy.json", 5), "numpy.json");
    }

    #[test]
    fn test_import_shard() {
        assert_eq!(import_shard("PyQt5", 3), "pyq");
        assert_eq!(import_shard("os", 3), "os");
    }

    #[test]
    fn test_import_map_urls() {
        let meta = ImportMapsMeta {
            num_letters: 3,
            num_dirs: 0,
        };
        assert_eq!(
            bot_import_map_url("https://bot", "num", &meta),
            "https://bot/import_to_pkg_maps/num.json"
        );
        assert_eq!(
            libcfgraph_import_map_url("https://lcg", "num"),
            "https://lcg/import_to_pkg_maps/num.json"
        );
    }

    #[test]
    fn test_meta_defaults_num_dirs() {
        let meta: ImportMapsMeta = serde_json::from_str(r#"{"num_letters": 2}"#).unwrap();
        assert_eq!(meta.num_dirs, 5);
    }

    #[test]
    fn test_name_mapping_yaml() {
        let entries: Vec<NameMappingEntry> = parse_yaml_as(
            "- pypi_name: PyYAML\n  conda_name: pyyaml\n  import_name: yaml\n  mapping_source: other\n\
             - pypi_name: foo\n  conda_name: foo-py\n  import_name: null\n  mapping_source: other\n",
        )
        .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].conda_name, "foo-py");
        assert_eq!(entries[1].import_name, "");
    }
}
