use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use cfm_utils::bytes::format_bytes;
use tracing::{debug, info};

use crate::{error::Result, http::Http};

/// How to treat a destination file that already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwriteMode {
    Skip,
    Force,
}

/// A single-file download to a known path.
///
/// The body is written to a `.part` sibling first and renamed into place, so an interrupted
/// transfer never leaves a truncated file under the final name.
pub struct Download {
    url: String,
    output: PathBuf,
    overwrite: OverwriteMode,
}

impl Download {
    pub fn new(url: impl Into<String>, output: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            output: output.into(),
            overwrite: OverwriteMode::Skip,
        }
    }

    pub fn overwrite(mut self, mode: OverwriteMode) -> Self {
        self.overwrite = mode;
        self
    }

    pub fn execute(self) -> Result<PathBuf> {
        if self.output.is_file() && self.overwrite == OverwriteMode::Skip {
            debug!("{} already present, skipping download", self.output.display());
            return Ok(self.output);
        }

        if let Some(parent) = self.output.parent() {
            fs::create_dir_all(parent)?;
        }

        let part = part_path(&self.output);
        let written = match self.write_to(&part) {
            Ok(n) => n,
            Err(err) => {
                let _ = fs::remove_file(&part);
                return Err(err);
            }
        };
        fs::rename(&part, &self.output)?;

        info!(
            "downloaded {} ({})",
            self.output.display(),
            format_bytes(written, 2)
        );
        Ok(self.output)
    }

    fn write_to(&self, path: &Path) -> Result<u64> {
        let resp = Http::fetch(&self.url, None)?;
        let mut reader = resp.into_body().into_reader();
        let mut file = BufWriter::new(File::create(path)?);
        let written = io::copy(&mut reader, &mut file)?;
        file.flush()?;
        Ok(written)
    }
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}
