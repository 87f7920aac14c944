//! Artifact metadata from the conda-forge OCI mirror.

use std::io::Read;

use cfm_dl::oci::{OciClient, OciReference};
use flate2::read::GzDecoder;
use tracing::debug;

use super::not_found_as_none;
use crate::{
    artifact::ArtifactName,
    entry::tar_entries,
    error::Result,
    info::info_json_from_oci_layer,
    record::ArtifactData,
};

pub const INFO_LAYER_MEDIA_TYPE: &str = "application/vnd.conda.info.v1.tar+gzip";

/// Escapes a `version-build` string into a valid OCI tag.
pub fn oci_tag(version: &str, build: &str) -> String {
    format!("{version}-{build}")
        .replace('+', "__p__")
        .replace('!', "__e__")
        .replace('=', "__eq__")
}

/// Repository names may not start with `_`, so the mirror prefixes those with `zzz`.
pub fn oci_package_name(name: &str) -> String {
    if name.starts_with('_') {
        format!("zzz{name}")
    } else {
        name.to_string()
    }
}

pub fn oci_reference(
    registry: &str,
    channel: &str,
    subdir: &str,
    artifact: &ArtifactName,
) -> OciReference {
    let repository = format!(
        "{channel}/{subdir}/{}",
        oci_package_name(&artifact.name)
    );
    OciReference::new(
        registry,
        &repository,
        &oci_tag(&artifact.version, &artifact.build),
    )
}

/// Fetches the info layer of `artifact` from `registry`.
///
/// Returns `Ok(None)` when the mirror has no such package or tag.
pub fn get_oci_artifact_data<S: AsRef<str>>(
    registry: &str,
    channel: &str,
    subdir: &str,
    artifact: &str,
    skip_suffixes: &[S],
) -> Result<Option<ArtifactData>> {
    let artifact: ArtifactName = artifact.parse()?;
    let reference = oci_reference(registry, channel, subdir, &artifact);
    debug!("looking up {artifact} as {reference}");

    let what = reference.to_string();
    match not_found_as_none(&what, OciClient::open_layer(&reference, INFO_LAYER_MEDIA_TYPE))? {
        Some(layer) => read_info_layer(layer, skip_suffixes),
        None => Ok(None),
    }
}

/// Decodes a gzip-compressed info layer.
pub fn read_info_layer<R: Read, S: AsRef<str>>(
    reader: R,
    skip_suffixes: &[S],
) -> Result<Option<ArtifactData>> {
    let mut archive = tar::Archive::new(GzDecoder::new(reader));
    let data = info_json_from_oci_layer(tar_entries(&mut archive)?, skip_suffixes)?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::{write::GzEncoder, Compression};

    use super::*;
    use crate::info::DEFAULT_SKIP_SUFFIXES;

    #[test]
    fn test_tag_escaping() {
        assert_eq!(oci_tag("1.0+cpu", "h1234_0"), "1.0__p__cpu-h1234_0");
        assert_eq!(oci_tag("1!2.0", "py_0"), "1__e__2.0-py_0");
        assert_eq!(oci_tag("1.0", "a=b"), "1.0-a__eq__b");
    }

    #[test]
    fn test_underscore_names_get_prefix() {
        assert_eq!(oci_package_name("_libgcc_mutex"), "zzz_libgcc_mutex");
        assert_eq!(oci_package_name("libgcc"), "libgcc");
    }

    #[test]
    fn test_reference_for_artifact() {
        let artifact: ArtifactName = "_openmp_mutex-4.5-2_gnu.tar.bz2".parse().unwrap();
        let reference = oci_reference(
            "ghcr.io/channel-mirrors",
            "conda-forge",
            "linux-64",
            &artifact,
        );
        assert_eq!(
            reference.to_string(),
            "ghcr.io/channel-mirrors/conda-forge/linux-64/zzz_openmp_mutex:4.5-2_gnu"
        );
    }

    #[test]
    fn test_unsupported_artifact_fails_before_io() {
        let err = get_oci_artifact_data(
            "ghcr.io/channel-mirrors",
            "conda-forge",
            "noarch",
            "attrs-23.1.0.zip",
            &DEFAULT_SKIP_SUFFIXES,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            crate::error::RegistryError::UnsupportedArtifact { .. }
        ));
    }

    #[test]
    fn test_read_info_layer() {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, data) in [
            ("index.json", r#"{"name": "attrs", "version": "23.1.0"}"#),
            ("recipe/meta.yaml", "package:\n  name: attrs\n"),
            ("files", "a.py\nb.txt\n"),
        ] {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, data.as_bytes()).unwrap();
        }
        let tar = builder.into_inner().unwrap();

        let mut gz = GzEncoder::new(Vec::new(), Compression::default());
        gz.write_all(&tar).unwrap();
        let layer = gz.finish().unwrap();

        let data = read_info_layer(layer.as_slice(), &DEFAULT_SKIP_SUFFIXES)
            .unwrap()
            .unwrap();
        assert_eq!(data.name, "attrs");
        assert_eq!(data.rendered_recipe["package"]["name"], "attrs");
        assert_eq!(data.raw_recipe, "package:\n  name: attrs\n");
        assert_eq!(data.files, ["a.py"]);
    }
}
