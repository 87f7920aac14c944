use cfm_registry::MetadataClient;
use tracing::info;

use crate::{
    cli::RepodataAction,
    error::CliResult,
    utils::{print_json, print_line},
};

pub fn handle_repodata(client: &MetadataClient, action: RepodataAction) -> CliResult<()> {
    match action {
        RepodataAction::Fetch {
            subdirs,
            force,
            label,
        } => {
            let paths = client.fetch_repodata(&subdirs, force, &label)?;
            info!(
                "{} repodata file(s) in {}",
                paths.len(),
                client.repodata_cache_dir()?.display()
            );
            print_json(&paths)
        }
        RepodataAction::List {
            broken,
        } => {
            for artifact in client.list_artifacts(broken)? {
                print_line(artifact)?;
            }
            Ok(())
        }
        RepodataAction::Count {
            broken,
        } => print_line(client.n_artifacts(broken)?),
    }
}
