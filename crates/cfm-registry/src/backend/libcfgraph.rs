//! The libcfgraph static metadata store.
//!
//! conda-forge no longer updates it, but the pre-computed records remain useful for old
//! artifacts.

use std::collections::HashSet;

use cfm_dl::http::Http;
use serde::Deserialize;
use tracing::{debug, info};

use crate::{artifact::ArtifactName, error::Result, record::ArtifactData};

#[derive(Debug, Deserialize)]
struct FileListingMeta {
    n_files: usize,
}

/// Every `artifacts/...json` path known to libcfgraph.
pub type LibcfgraphIndex = HashSet<String>;

/// Downloads the file listing, which is split over `n_files` JSON lists.
pub fn fetch_libcfgraph_index(base_url: &str) -> Result<LibcfgraphIndex> {
    let meta: FileListingMeta = Http::json(&format!("{base_url}/.file_listing_meta.json"))?;
    info!("downloading libcfgraph index ({} parts)", meta.n_files);

    let mut index = LibcfgraphIndex::new();
    for i in 0..meta.n_files {
        let part: Vec<String> = Http::json(&format!("{base_url}/.file_listing_{i}.json"))?;
        index.extend(part);
    }

    debug!("libcfgraph index holds {} artifacts", index.len());
    Ok(index)
}

/// `artifacts/{name}/{channel}/{subdir}/{stem}.json`
pub fn libcfgraph_path(channel: &str, subdir: &str, artifact: &ArtifactName) -> String {
    format!(
        "artifacts/{}/{channel}/{subdir}/{}.json",
        artifact.name,
        artifact.stem()
    )
}

/// Fetches the stored record for `artifact`, or `None` if the index does not list it.
pub fn get_libcfgraph_artifact_data(
    base_url: &str,
    index: &LibcfgraphIndex,
    channel: &str,
    subdir: &str,
    artifact: &str,
) -> Result<Option<ArtifactData>> {
    let artifact: ArtifactName = artifact.parse()?;
    let path = libcfgraph_path(channel, subdir, &artifact);
    if !index.contains(&path) {
        debug!("{path} is not in the libcfgraph index");
        return Ok(None);
    }

    let data: ArtifactData = Http::json(&format!("{base_url}/{path}"))?;
    Ok(Some(data))
}
