//! Artifact metadata read straight out of a remote `.conda` through HTTP range requests.
//!
//! A `.conda` is a zip holding `info-*.tar.zst` next to the much larger `pkg-*.tar.zst`, so only
//! the central directory and the info member are ever transferred.

use std::io::{Read, Seek};

use cfm_dl::range::HttpRangeReader;
use tracing::debug;

use super::not_found_as_none;
use crate::{
    artifact::{ArtifactKind, ArtifactName},
    entry::tar_entries,
    error::{ErrorContext, RegistryError, Result},
    info::info_json_from_tar,
    record::ArtifactData,
};

/// Channels served from the default-channels host rather than the channel alias.
const DEFAULT_CHANNELS: [&str; 3] = ["pkgs/main", "pkgs/r", "pkgs/msys2"];

/// Resolves a channel name to its base URL. Absolute URLs are kept as they are.
pub fn channel_url(channel: &str, channel_alias: &str, default_channels_url: &str) -> String {
    let channel = channel.trim_end_matches('/');
    if channel.starts_with("http://") || channel.starts_with("https://") {
        channel.to_string()
    } else if DEFAULT_CHANNELS.contains(&channel) {
        format!("{}/{channel}", default_channels_url.trim_end_matches('/'))
    } else {
        format!("{}/{channel}", channel_alias.trim_end_matches('/'))
    }
}

/// Streams the `info` component of a remote `.conda`.
///
/// `.tar.bz2` artifacts cannot be read partially and are rejected before any request is made.
/// Returns `Ok(None)` when the artifact does not exist.
pub fn get_streamed_artifact_data<S: AsRef<str>>(
    channel_url: &str,
    subdir: &str,
    artifact: &str,
    skip_suffixes: &[S],
) -> Result<Option<ArtifactData>> {
    let name: ArtifactName = artifact.parse()?;
    if name.kind == ArtifactKind::TarBz2 {
        return Err(RegistryError::unsupported(
            artifact,
            "the streamed backend only reads `.conda` artifacts",
        ));
    }

    let url = format!("{channel_url}/{subdir}/{artifact}");
    debug!("streaming info component of {url}");

    let Some(reader) = not_found_as_none(&url, HttpRangeReader::open(&url))? else {
        return Ok(None);
    };
    let data = read_conda_info(reader, artifact, skip_suffixes)?;
    if let Some(ref data) = data {
        debug!("{} {} read from {url}", data.name, data.version);
    }
    Ok(data)
}

/// Reads the `info-*.tar.zst` member of a `.conda` archive.
///
/// The reader is consumed and released on every return path.
pub fn read_conda_info<R: Read + Seek, S: AsRef<str>>(
    reader: R,
    artifact: &str,
    skip_suffixes: &[S],
) -> Result<Option<ArtifactData>> {
    let mut zip =
        zip::ZipArchive::new(reader).map_err(|err| RegistryError::malformed(artifact, err))?;

    let member = zip
        .file_names()
        .find(|name| name.starts_with("info-") && name.ends_with(".tar.zst"))
        .map(String::from)
        .ok_or_else(|| RegistryError::malformed(artifact, "no `info-*.tar.zst` member"))?;

    let file = zip
        .by_name(&member)
        .map_err(|err| RegistryError::malformed(format!("{artifact}/{member}"), err))?;
    let decoder =
        zstd::Decoder::new(file).with_context(|| format!("decoding {artifact}/{member}"))?;

    let mut archive = tar::Archive::new(decoder);
    let data = info_json_from_tar(tar_entries(&mut archive)?, skip_suffixes)?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use zip::write::SimpleFileOptions;

    use super::*;
    use crate::info::DEFAULT_SKIP_SUFFIXES;

    fn info_tar_zst(members: &[(&str, &str)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, data) in members {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, data.as_bytes()).unwrap();
        }
        let tar = builder.into_inner().unwrap();
        zstd::encode_all(tar.as_slice(), 3).unwrap()
    }

    fn conda(zip_members: &[(&str, Vec<u8>)]) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, data) in zip_members {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn test_channel_url() {
        let alias = "https://conda.anaconda.org";
        let defaults = "https://repo.anaconda.com/";
        assert_eq!(
            channel_url("conda-forge", alias, defaults),
            "https://conda.anaconda.org/conda-forge"
        );
        assert_eq!(
            channel_url("pkgs/main", alias, defaults),
            "https://repo.anaconda.com/pkgs/main"
        );
        assert_eq!(
            channel_url("https://example.org/chan/", alias, defaults),
            "https://example.org/chan"
        );
    }

    #[test]
    fn test_tar_bz2_rejected_before_io() {
        let err = get_streamed_artifact_data(
            "http://127.0.0.1:9/never-contacted",
            "noarch",
            "attrs-23.1.0-pyhd8ed1ab_0.tar.bz2",
            &DEFAULT_SKIP_SUFFIXES,
        )
        .unwrap_err();
        assert!(matches!(err, RegistryError::UnsupportedArtifact { .. }));
    }

    #[test]
    fn test_read_conda_info() {
        let info = info_tar_zst(&[
            ("info/index.json", r#"{"name": "attrs", "version": "23.1.0"}"#),
            ("info/about.json", r#"{"home": "https://www.attrs.org"}"#),
            ("info/test/index.json", r#"{"name": "bogus"}"#),
        ]);
        let bytes = conda(&[
            ("metadata.json", br#"{"conda_pkg_format_version": 2}"#.to_vec()),
            ("pkg-attrs-23.1.0-pyhd8ed1ab_0.tar.zst", b"not read".to_vec()),
            ("info-attrs-23.1.0-pyhd8ed1ab_0.tar.zst", info),
        ]);

        let data = read_conda_info(Cursor::new(bytes), "attrs.conda", &DEFAULT_SKIP_SUFFIXES)
            .unwrap()
            .unwrap();
        assert_eq!(data.name, "attrs");
        assert_eq!(data.about["home"], "https://www.attrs.org");
    }

    #[test]
    fn test_missing_info_member_is_malformed() {
        let bytes = conda(&[("metadata.json", b"{}".to_vec())]);
        let err = read_conda_info(Cursor::new(bytes), "x.conda", &DEFAULT_SKIP_SUFFIXES)
            .unwrap_err();
        assert!(matches!(err, RegistryError::MalformedArtifact { .. }));
    }

    #[test]
    fn test_not_a_zip_is_malformed() {
        let err = read_conda_info(
            Cursor::new(b"definitely not a zip".to_vec()),
            "x.conda",
            &DEFAULT_SKIP_SUFFIXES,
        )
        .unwrap_err();
        assert!(matches!(err, RegistryError::MalformedArtifact { .. }));
    }
}
