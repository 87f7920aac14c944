use cfm_registry::{backend::Backend, MetadataClient};
use cfm_utils::path::resolve_path;
use tracing::{debug, warn};

use crate::{error::CliResult, utils::print_json};

pub fn show_artifact_info(
    client: MetadataClient,
    channel: &str,
    subdir: &str,
    artifact: &str,
    backend: Option<&str>,
    skip_suffixes: Vec<String>,
) -> CliResult<()> {
    let backend = backend.map(str::parse::<Backend>).transpose()?;
    let client = if skip_suffixes.is_empty() {
        client
    } else {
        debug!("skipping files ending with {}", skip_suffixes.join(", "));
        client.with_skip_suffixes(skip_suffixes)
    };

    match client.get_artifact_info(channel, subdir, artifact, backend)? {
        Some(data) => print_json(&*data),
        None => {
            warn!("{artifact} was not found in {channel}/{subdir}");
            Ok(())
        }
    }
}

pub fn inspect_file(client: &MetadataClient, path: &str) -> CliResult<()> {
    let path = resolve_path(path)?;
    match client.artifact_info_from_path(&path)? {
        Some(data) => print_json(&data),
        None => {
            warn!("{} has no info/index.json", path.display());
            Ok(())
        }
    }
}
