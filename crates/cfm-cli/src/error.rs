use cfm_config::error::ConfigError;
use cfm_dl::error::DownloadError;
use cfm_registry::RegistryError;
use cfm_utils::error::{PathError, UtilsError};
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum CliError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    #[diagnostic(code(cfm::utils))]
    Utils(#[from] UtilsError),

    #[error("Error while {action}")]
    #[diagnostic(code(cfm::io))]
    IoError {
        action: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize output: {0}")]
    #[diagnostic(code(cfm::json))]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    #[diagnostic(code(cfm::invalid_argument))]
    InvalidArgument(String),
}

impl From<PathError> for CliError {
    fn from(err: PathError) -> Self {
        CliError::Utils(err.into())
    }
}

pub type CliResult<T> = std::result::Result<T, CliError>;

pub trait ErrorContext<T> {
    fn with_context<C>(self, context: C) -> CliResult<T>
    where
        C: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn with_context<C>(self, context: C) -> CliResult<T>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|source| CliError::IoError {
            action: context(),
            source,
        })
    }
}
