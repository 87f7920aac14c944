//! Error types for the registry crate.

use cfm_config::error::ConfigError;
use cfm_dl::error::DownloadError;
use cfm_utils::error::{FileSystemError, UtilsError};
use miette::Diagnostic;
use thiserror::Error;

/// Everything that can go wrong while looking up conda-forge metadata.
///
/// A package that simply does not exist is not an error: lookups return `Ok(None)` for that.
#[derive(Error, Diagnostic, Debug)]
pub enum RegistryError {
    #[error("Error while {action}: {source}")]
    #[diagnostic(code(cfm_registry::io))]
    IoError {
        action: String,
        source: std::io::Error,
    },

    #[error("Malformed artifact metadata in `{path}`: {reason}")]
    #[diagnostic(
        code(cfm_registry::malformed_artifact),
        help("The artifact itself is broken; report it to the feedstock maintainers")
    )]
    MalformedArtifact { path: String, reason: String },

    #[error("Unsupported artifact `{artifact}`: {reason}")]
    #[diagnostic(
        code(cfm_registry::unsupported_artifact),
        help("Artifacts must be named `<name>-<version>-<build>.conda` or `.tar.bz2`")
    )]
    UnsupportedArtifact { artifact: String, reason: String },

    #[error("Unknown backend `{backend}`")]
    #[diagnostic(
        code(cfm_registry::unknown_backend),
        help("Valid backends are: oci, streamed, libcfgraph")
    )]
    UnknownBackend { backend: String },

    #[error("Invalid argument: {0}")]
    #[diagnostic(code(cfm_registry::invalid_argument))]
    InvalidArgument(String),

    #[error(transparent)]
    #[diagnostic(
        code(cfm_registry::download),
        help("Check your network connection and the configured URLs")
    )]
    Download(#[from] DownloadError),

    #[error("Failed to fetch from remote source: {0}")]
    #[diagnostic(
        code(cfm_registry::fetch_remote),
        help("The remote data may have changed shape; check the URL in a browser")
    )]
    FailedToFetchRemote(String),

    #[error(transparent)]
    #[diagnostic(code(cfm_registry::config))]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(code(cfm_registry::utils))]
    Utils(#[from] UtilsError),
}

impl From<FileSystemError> for RegistryError {
    fn from(err: FileSystemError) -> Self {
        Self::Utils(UtilsError::FileSystem(err))
    }
}

impl RegistryError {
    pub(crate) fn malformed(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::MalformedArtifact {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn unsupported(artifact: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedArtifact {
            artifact: artifact.into(),
            reason: reason.into(),
        }
    }
}

/// A specialized Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Attaches a description of the failed action to an I/O error.
pub trait ErrorContext<T> {
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|source| RegistryError::IoError {
            action: context(),
            source,
        })
    }
}
