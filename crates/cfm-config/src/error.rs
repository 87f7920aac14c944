use cfm_utils::error::{DurationError, FileSystemError, PathError, UtilsError};
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("TOML serialization error: {0}")]
    #[diagnostic(
        code(cfm_config::toml_serialize),
        help("Check your configuration structure for invalid values")
    )]
    TomlSerError(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    #[diagnostic(
        code(cfm_config::toml_deserialize),
        help("Check your config.toml syntax and structure")
    )]
    TomlDeError(#[from] toml::de::Error),

    #[error("Configuration file already exists at {0}")]
    #[diagnostic(
        code(cfm_config::already_exists),
        help("Remove the existing config file or point CFM_CONFIG somewhere else")
    )]
    ConfigAlreadyExists(String),

    #[error("Unknown backend `{0}`")]
    #[diagnostic(
        code(cfm_config::invalid_backend),
        help("Valid backends are: oci, streamed, libcfgraph")
    )]
    InvalidBackend(String),

    #[error("skip_file_suffixes must not contain empty entries")]
    #[diagnostic(
        code(cfm_config::empty_suffix),
        help("Remove the empty string from skip_file_suffixes")
    )]
    EmptySkipSuffix,

    #[error("cache_capacity must be greater than zero")]
    #[diagnostic(code(cfm_config::zero_capacity))]
    ZeroCacheCapacity,

    #[error("Invalid cache_ttl `{value}`: {source}")]
    #[diagnostic(
        code(cfm_config::invalid_ttl),
        help("Use a duration like `1h30m`, or `never` / `always`")
    )]
    InvalidCacheTtl {
        value: String,
        source: DurationError,
    },

    #[error("IO error: {0}")]
    #[diagnostic(code(cfm_config::io))]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    #[diagnostic(code(cfm_config::utils))]
    Utils(#[from] UtilsError),

    #[error("Failed to parse TOML: {0}")]
    #[diagnostic(code(cfm_config::toml))]
    Toml(#[from] toml_edit::TomlError),

    #[error("Encountered unexpected TOML item: {0}")]
    #[diagnostic(code(cfm_config::unexpected_toml_item))]
    UnexpectedTomlItem(String),
}

impl From<PathError> for ConfigError {
    fn from(err: PathError) -> Self {
        Self::Utils(UtilsError::Path(err))
    }
}

impl From<FileSystemError> for ConfigError {
    fn from(err: FileSystemError) -> Self {
        Self::Utils(UtilsError::FileSystem(err))
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
