//! Linter hints published by the conda-forge pinning feedstock.

use std::collections::BTreeMap;

use cfm_dl::http::Http;
use serde::Deserialize;

use crate::error::{RegistryError, Result};

#[derive(Debug, Deserialize)]
struct HintsFile {
    hints: BTreeMap<String, String>,
}

/// Parses `hints.toml`, keeping only its `[hints]` table.
pub fn parse_hints(text: &str) -> Result<BTreeMap<String, String>> {
    let file: HintsFile = toml::from_str(text)
        .map_err(|err| RegistryError::FailedToFetchRemote(format!("invalid hints file: {err}")))?;
    Ok(file.hints)
}

pub fn get_hints(url: &str) -> Result<BTreeMap<String, String>> {
    parse_hints(&Http::text(url)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hints() {
        let hints = parse_hints(
            r#"
[hints]
setuptools_scm = "Use `setuptools-scm` instead."
matplotlib = "Depend on `matplotlib-base` unless you need the Qt backend."

[other]
ignored = 1
"#,
        )
        .unwrap();
        assert_eq!(hints.len(), 2);
        assert!(hints["matplotlib"].starts_with("Depend on"));
    }

    #[test]
    fn test_missing_hints_table() {
        assert!(matches!(
            parse_hints("[other]\na = 'b'\n"),
            Err(RegistryError::FailedToFetchRemote(_))
        ));
    }
}
