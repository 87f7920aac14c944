//! Bulk conda-forge repodata: download, cache and enumerate artifacts.

use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use bzip2::read::BzDecoder;
use cfm_dl::download::{Download, OverwriteMode};
use cfm_utils::fs::safe_remove;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{ErrorContext, RegistryError, Result};

pub const SUBDIRS: [&str; 8] = [
    "linux-64",
    "linux-aarch64",
    "linux-ppc64le",
    "osx-64",
    "osx-arm64",
    "win-64",
    "win-arm64",
    "noarch",
];

pub const MAIN_LABEL: &str = "main";
pub const BROKEN_LABEL: &str = "broken";

const ARTIFACT_KEYS: [&str; 2] = ["packages", "packages.conda"];
const BROKEN_KEY: &str = "removed";

pub fn repodata_url(channel_alias: &str, subdir: &str, label: &str) -> String {
    if label == MAIN_LABEL {
        format!("{channel_alias}/conda-forge/{subdir}/repodata.json")
    } else {
        format!("{channel_alias}/conda-forge/label/{label}/{subdir}/repodata.json")
    }
}

/// `{subdir}.json` for the main label, `{subdir}.{label}.json` otherwise.
pub fn repodata_cache_file(cache_dir: &Path, subdir: &str, label: &str) -> PathBuf {
    if label == MAIN_LABEL {
        cache_dir.join(format!("{subdir}.json"))
    } else {
        cache_dir.join(format!("{subdir}.{label}.json"))
    }
}

/// Downloads `repodata.json.bz2` for each subdir into `cache_dir`, in parallel.
///
/// Files already cached are kept unless `force` is set. The returned paths follow the order of
/// `subdirs`.
pub fn fetch_repodata<S: AsRef<str> + Sync>(
    channel_alias: &str,
    subdirs: &[S],
    force: bool,
    cache_dir: &Path,
    label: &str,
) -> Result<Vec<PathBuf>> {
    if let Some(unknown) = subdirs
        .iter()
        .map(|s| s.as_ref())
        .find(|s| !SUBDIRS.contains(s))
    {
        return Err(RegistryError::InvalidArgument(format!(
            "unknown subdir `{unknown}`, expected one of {}",
            SUBDIRS.join(", ")
        )));
    }

    subdirs
        .par_iter()
        .map(|subdir| fetch_one(channel_alias, subdir.as_ref(), force, cache_dir, label))
        .collect()
}

fn fetch_one(
    channel_alias: &str,
    subdir: &str,
    force: bool,
    cache_dir: &Path,
    label: &str,
) -> Result<PathBuf> {
    let local = repodata_cache_file(cache_dir, subdir, label);
    if !force && local.is_file() {
        debug!("using cached {}", local.display());
        return Ok(local);
    }

    let url = format!("{}.bz2", repodata_url(channel_alias, subdir, label));
    let mut compressed = local.clone().into_os_string();
    compressed.push(".bz2");
    let compressed = PathBuf::from(compressed);

    info!("Downloading {url} to {}", local.display());
    Download::new(&url, &compressed)
        .overwrite(OverwriteMode::Force)
        .execute()?;

    decompress_bz2(&compressed, &local)?;
    safe_remove(&compressed)?;
    Ok(local)
}

fn decompress_bz2(src: &Path, dst: &Path) -> Result<()> {
    let input = File::open(src).with_context(|| format!("opening {}", src.display()))?;
    let output = File::create(dst).with_context(|| format!("creating {}", dst.display()))?;
    let mut decoder = BzDecoder::new(BufReader::new(input));
    let mut writer = BufWriter::new(output);
    io::copy(&mut decoder, &mut writer)
        .with_context(|| format!("decompressing {}", src.display()))?;
    writer
        .flush()
        .with_context(|| format!("writing {}", dst.display()))?;
    Ok(())
}

pub fn load_repodata(path: &Path) -> Result<Value> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|err| {
        RegistryError::FailedToFetchRemote(format!("invalid repodata {}: {err}", path.display()))
    })
}

/// Lists every artifact as `{subdir}/{filename}`, visiting files in sorted path order.
///
/// The subdir is taken from the file name up to its first `.`. With `include_broken`, artifacts
/// listed under `removed` are included.
pub fn list_artifacts<P: AsRef<Path>>(paths: &[P], include_broken: bool) -> Result<Vec<String>> {
    let mut paths: Vec<&Path> = paths.iter().map(|p| p.as_ref()).collect();
    paths.sort();

    let mut artifacts = Vec::new();
    for path in paths {
        let subdir = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.split('.').next())
            .unwrap_or_default()
            .to_string();
        let data = load_repodata(path)?;

        let keys = ARTIFACT_KEYS
            .iter()
            .chain(include_broken.then_some(&BROKEN_KEY));
        for key in keys {
            artifacts.extend(
                artifact_names(data.get(*key))
                    .into_iter()
                    .map(|name| format!("{subdir}/{name}")),
            );
        }
    }

    Ok(artifacts)
}

/// `packages` maps file names to records, `removed` is a plain list of file names.
fn artifact_names(value: Option<&Value>) -> Vec<&str> {
    match value {
        Some(Value::Object(map)) => map.keys().map(String::as_str).collect(),
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}
