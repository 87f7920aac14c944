//! Sources of artifact metadata.
//!
//! Every backend yields the same [`ArtifactData`](crate::record::ArtifactData); they only differ
//! in where the `info/` content comes from.

use std::{fmt, str::FromStr};

use cfm_config::config::VALID_BACKENDS;
use cfm_dl::error::DownloadError;
use tracing::debug;

use crate::error::{RegistryError, Result};

pub mod libcfgraph;
pub mod local;
pub mod oci;
pub mod streamed;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Backend {
    /// Pre-computed JSON records in the libcfgraph repository.
    Libcfgraph,
    /// The info layer of the OCI mirror on ghcr.io.
    #[default]
    Oci,
    /// The `info` component of a `.conda` read through HTTP range requests.
    Streamed,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Libcfgraph => "libcfgraph",
            Backend::Oci => "oci",
            Backend::Streamed => "streamed",
        }
    }
}

impl FromStr for Backend {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "libcfgraph" => Ok(Backend::Libcfgraph),
            "oci" => Ok(Backend::Oci),
            "streamed" => Ok(Backend::Streamed),
            _ => Err(RegistryError::UnknownBackend {
                backend: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All backend names accepted by [`Backend::from_str`].
pub fn valid_backends() -> &'static [&'static str] {
    &VALID_BACKENDS
}

/// Turns "the remote does not have it" into `Ok(None)`.
///
/// Anonymous registry pulls of a missing repository answer 401/403 rather than 404.
pub(crate) fn not_found_as_none<T>(
    what: &str,
    res: std::result::Result<T, DownloadError>,
) -> Result<Option<T>> {
    match res {
        Ok(value) => Ok(Some(value)),
        Err(err) if matches!(err.status(), Some(401 | 403 | 404)) => {
            debug!("{what} not found: {err}");
            Ok(None)
        }
        Err(err @ DownloadError::LayerNotFound { .. }) => {
            debug!("{what} not found: {err}");
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_from_str() {
        assert_eq!("oci".parse::<Backend>().unwrap(), Backend::Oci);
        assert_eq!("Streamed".parse::<Backend>().unwrap(), Backend::Streamed);
        assert_eq!("libcfgraph".parse::<Backend>().unwrap(), Backend::Libcfgraph);

        let err = "ftp".parse::<Backend>().unwrap_err();
        assert!(matches!(err, RegistryError::UnknownBackend { ref backend } if backend == "ftp"));
    }

    #[test]
    fn test_valid_backends_round_trip() {
        for name in valid_backends() {
            assert_eq!(name.parse::<Backend>().unwrap().as_str(), *name);
        }
        assert_eq!(Backend::default(), Backend::Oci);
    }

    #[test]
    fn test_not_found_as_none() {
        let missing: std::result::Result<(), _> = Err(DownloadError::HttpError {
            status: 404,
            url: "https://example.org/x".into(),
        });
        assert!(not_found_as_none("x", missing).unwrap().is_none());

        let layer: std::result::Result<(), _> = Err(DownloadError::LayerNotFound {
            media_type: "m".into(),
            reference: "r".into(),
        });
        assert!(not_found_as_none("x", layer).unwrap().is_none());

        let server: std::result::Result<(), _> = Err(DownloadError::HttpError {
            status: 500,
            url: "https://example.org/x".into(),
        });
        assert!(matches!(
            not_found_as_none("x", server),
            Err(RegistryError::Download(_))
        ));

        assert_eq!(not_found_as_none("x", Ok(3)).unwrap(), Some(3));
    }
}
