//! Archive members as seen by the metadata normalizers.

use std::io::Read;

use crate::error::{ErrorContext, RegistryError, Result};

/// One member of a package's `info/` archive.
///
/// Content is only read when the normalizer asks for it.
pub trait InfoEntry {
    /// `/`-separated path of the member inside its archive.
    fn path(&self) -> Result<String>;

    /// Decoded UTF-8 content, or `None` when the member is not a regular file.
    fn read_text(&mut self) -> Result<Option<String>>;
}

impl<R: Read> InfoEntry for tar::Entry<'_, R> {
    fn path(&self) -> Result<String> {
        let path = tar::Entry::path(self).with_context(|| "reading tar member path".into())?;
        Ok(path
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"))
    }

    fn read_text(&mut self) -> Result<Option<String>> {
        if !self.header().entry_type().is_file() {
            return Ok(None);
        }

        let path = InfoEntry::path(self)?;
        let mut bytes = Vec::new();
        self.read_to_end(&mut bytes)
            .with_context(|| format!("reading {path}"))?;
        decode_utf8(&path, bytes).map(Some)
    }
}

/// An archive member already held in memory.
#[derive(Debug, Clone)]
pub struct MemoryEntry {
    path: String,
    data: Option<Vec<u8>>,
}

impl MemoryEntry {
    pub fn file(path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            data: Some(data.into()),
        }
    }

    pub fn dir(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            data: None,
        }
    }
}

impl InfoEntry for MemoryEntry {
    fn path(&self) -> Result<String> {
        Ok(self.path.clone())
    }

    fn read_text(&mut self) -> Result<Option<String>> {
        match &self.data {
            Some(bytes) => decode_utf8(&self.path, bytes.clone()).map(Some),
            None => Ok(None),
        }
    }
}

fn decode_utf8(path: &str, bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|err| RegistryError::malformed(path, err))
}

/// Adapts `tar::Archive::entries` to the normalizers' item type.
pub fn tar_entries<'a, R: Read>(
    archive: &'a mut tar::Archive<R>,
) -> Result<impl Iterator<Item = Result<tar::Entry<'a, R>>>> {
    let entries = archive
        .entries()
        .with_context(|| "listing tar members".into())?;
    Ok(entries.map(|entry| entry.with_context(|| "reading tar member".into())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tar_with(members: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, data) in members {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, *data).unwrap();
        }
        builder.into_inner().unwrap()
    }

    #[test]
    fn test_tar_entry_path_and_text() {
        let bytes = tar_with(&[
            ("info/index.json", b"{}".as_slice()),
            ("info/files", b"a\nb\n".as_slice()),
        ]);
        let mut archive = tar::Archive::new(bytes.as_slice());
        let mut seen = Vec::new();
        for entry in tar_entries(&mut archive).unwrap() {
            let mut entry = entry.unwrap();
            seen.push((
                InfoEntry::path(&entry).unwrap(),
                entry.read_text().unwrap().unwrap(),
            ));
        }
        assert_eq!(
            seen,
            [
                ("info/index.json".to_string(), "{}".to_string()),
                ("info/files".to_string(), "a\nb\n".to_string())
            ]
        );
    }

    #[test]
    fn test_tar_directory_has_no_text() {
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Directory);
        header.set_size(0);
        header.set_mode(0o755);
        header.set_cksum();
        builder
            .append_data(&mut header, "info/recipe/", std::io::empty())
            .unwrap();
        let bytes = builder.into_inner().unwrap();

        let mut archive = tar::Archive::new(bytes.as_slice());
        let mut entry = tar_entries(&mut archive).unwrap().next().unwrap().unwrap();
        assert!(entry.read_text().unwrap().is_none());
    }

    #[test]
    fn test_invalid_utf8_is_malformed() {
        let mut entry = MemoryEntry::file("info/about.json", vec![0xff, 0xfe]);
        assert!(matches!(
            entry.read_text(),
            Err(RegistryError::MalformedArtifact { path, .. }) if path == "info/about.json"
        ));
    }
}
