use std::{
    fs::{self, File},
    io::Read,
    path::Path,
};

use crate::error::{FileSystemError, FileSystemResult};

pub trait FileSystemProvider {
    /// Removes a file or a whole directory tree. A missing path is not an error.
    fn safe_remove<P: AsRef<Path>>(&self, path: P) -> FileSystemResult<()>;

    /// Creates `path` and its parents unless it already exists as a directory.
    ///
    /// # Errors
    ///
    /// * [`FileSystemError::Directory`] if the directory could not be created.
    /// * [`FileSystemError::NotADirectory`] if something other than a directory is in the way.
    fn ensure_dir_exists<P: AsRef<Path>>(&self, path: P) -> FileSystemResult<()>;
}

#[derive(Default, Clone)]
pub struct StandardFileSystemProvider;

impl FileSystemProvider for StandardFileSystemProvider {
    fn safe_remove<P: AsRef<Path>>(&self, path: P) -> FileSystemResult<()> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(());
        }

        let result = if path.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        };

        result.map_err(|source| FileSystemError::File {
            path: path.to_path_buf(),
            action: "remove",
            source,
        })
    }

    fn ensure_dir_exists<P: AsRef<Path>>(&self, path: P) -> FileSystemResult<()> {
        let path = path.as_ref();
        if path.is_dir() {
            return Ok(());
        }
        if path.exists() {
            return Err(FileSystemError::NotADirectory {
                path: path.to_path_buf(),
            });
        }

        fs::create_dir_all(path).map_err(|source| FileSystemError::Directory {
            path: path.to_path_buf(),
            action: "create",
            source,
        })
    }
}

pub fn ensure_dir_exists<P: AsRef<Path>>(path: P) -> FileSystemResult<()> {
    StandardFileSystemProvider.ensure_dir_exists(path)
}

pub fn safe_remove<P: AsRef<Path>>(path: P) -> FileSystemResult<()> {
    StandardFileSystemProvider.safe_remove(path)
}

/// Reads up to `N` leading bytes of a file for magic-number sniffing.
///
/// Shorter files yield a zero-padded buffer.
pub fn read_file_signature<const N: usize, P: AsRef<Path>>(
    path: P,
) -> FileSystemResult<[u8; N]> {
    let path = path.as_ref();
    let err = |source| FileSystemError::File {
        path: path.to_path_buf(),
        action: "read",
        source,
    };

    let file = File::open(path).map_err(err)?;
    let mut buf = [0u8; N];
    let mut filled = 0;
    let mut handle = file.take(N as u64);
    loop {
        let n = handle.read(&mut buf[filled..]).map_err(err)?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_safe_remove() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("linux-64.json");
        fs::write(&file, "{}").unwrap();
        safe_remove(&file).unwrap();
        assert!(!file.exists());

        let sub = dir.path().join("sub");
        fs::create_dir_all(sub.join("nested")).unwrap();
        safe_remove(&sub).unwrap();
        assert!(!sub.exists());

        safe_remove(dir.path().join("never-existed")).unwrap();
    }

    #[test]
    fn test_ensure_dir_exists() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        ensure_dir_exists(&nested).unwrap();
        assert!(nested.is_dir());
        ensure_dir_exists(&nested).unwrap();

        let file = dir.path().join("file");
        fs::write(&file, "x").unwrap();
        assert!(matches!(
            ensure_dir_exists(&file),
            Err(FileSystemError::NotADirectory { .. })
        ));
    }

    #[test]
    fn test_read_file_signature() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("pkg.conda");
        fs::write(&file, b"PK\x03\x04rest").unwrap();
        assert_eq!(read_file_signature::<4, _>(&file).unwrap(), *b"PK\x03\x04");

        let short = dir.path().join("short");
        fs::write(&short, b"BZ").unwrap();
        assert_eq!(read_file_signature::<4, _>(&short).unwrap(), *b"BZ\0\0");

        assert!(read_file_signature::<4, _>(dir.path().join("missing")).is_err());
    }
}
