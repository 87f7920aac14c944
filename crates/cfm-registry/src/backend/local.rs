//! Artifact metadata from a package file on disk.

use std::{fs::File, io::BufReader, path::Path};

use bzip2::read::BzDecoder;
use cfm_utils::fs::read_file_signature;
use tracing::debug;

use super::streamed::read_conda_info;
use crate::{
    entry::{tar_entries, InfoEntry},
    error::{ErrorContext, RegistryError, Result},
    info::info_json_from_tar,
    record::ArtifactData,
};

const ZIP_MAGIC_BYTES: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];
const BZIP2_MAGIC_BYTES: [u8; 3] = [0x42, 0x5a, 0x68];

/// Reads the `info/` metadata of a local `.conda` or `.tar.bz2`.
///
/// The format is detected from the file's leading bytes, not its name.
pub fn artifact_info_from_path<P: AsRef<Path>, S: AsRef<str>>(
    path: P,
    skip_suffixes: &[S],
) -> Result<Option<ArtifactData>> {
    let path = path.as_ref();
    let label = path.display().to_string();
    let magic = read_file_signature::<4, _>(path)?;

    let file = File::open(path).with_context(|| format!("opening {label}"))?;
    let reader = BufReader::new(file);

    if magic == ZIP_MAGIC_BYTES {
        debug!("reading {label} as .conda");
        read_conda_info(reader, &label, skip_suffixes)
    } else if magic[..3] == BZIP2_MAGIC_BYTES {
        debug!("reading {label} as .tar.bz2");
        read_tar_bz2_info(reader, skip_suffixes)
    } else {
        Err(RegistryError::unsupported(
            label,
            "neither a zip (.conda) nor a bzip2 (.tar.bz2) file",
        ))
    }
}

/// Only members below `info/` are handed to the normalizer; the payload is skipped.
fn read_tar_bz2_info<R: std::io::Read, S: AsRef<str>>(
    reader: R,
    skip_suffixes: &[S],
) -> Result<Option<ArtifactData>> {
    let mut archive = tar::Archive::new(BzDecoder::new(reader));
    let entries = tar_entries(&mut archive)?.filter(|entry| match entry {
        Ok(entry) => InfoEntry::path(entry)
            .map(|path| path.trim_start_matches("./").starts_with("info/"))
            .unwrap_or(true),
        Err(_) => true,
    });
    let data = info_json_from_tar(entries, skip_suffixes)?;
    Ok(data)
}
