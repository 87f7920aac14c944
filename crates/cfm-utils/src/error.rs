use std::{error::Error, fmt, path::PathBuf};

#[derive(Debug)]
pub enum PathError {
    CurrentDir { source: std::io::Error },

    Empty,

    MissingEnvVar { var: String, input: String },

    UnclosedVariable { input: String },
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathError::Empty => write!(f, "Path is empty"),
            PathError::CurrentDir { source } => {
                write!(f, "Failed to get current directory: {source}")
            }
            PathError::UnclosedVariable { input } => {
                write!(f, "Unclosed variable expression starting at `{input}`")
            }
            PathError::MissingEnvVar { var, input } => {
                write!(f, "Environment variable `{var}` not set in `{input}`")
            }
        }
    }
}

impl Error for PathError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PathError::CurrentDir { source } => Some(source),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum FileSystemError {
    File {
        path: PathBuf,
        action: &'static str,
        source: std::io::Error,
    },

    Directory {
        path: PathBuf,
        action: &'static str,
        source: std::io::Error,
    },

    NotADirectory {
        path: PathBuf,
    },
}

impl fmt::Display for FileSystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileSystemError::File {
                path,
                action,
                source,
            } => write!(f, "Failed to {action} file `{}`: {source}", path.display()),
            FileSystemError::Directory {
                path,
                action,
                source,
            } => write!(
                f,
                "Failed to {action} directory `{}`: {source}",
                path.display()
            ),
            FileSystemError::NotADirectory { path } => {
                write!(f, "`{}` is not a directory", path.display())
            }
        }
    }
}

impl Error for FileSystemError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            FileSystemError::File { source, .. } | FileSystemError::Directory { source, .. } => {
                Some(source)
            }
            FileSystemError::NotADirectory { .. } => None,
        }
    }
}

/// Returned when a cache TTL like `1h30m` cannot be understood.
#[derive(Debug, PartialEq, Eq)]
pub enum DurationError {
    MissingNumber { input: String },

    UnknownUnit { input: String, unit: char },

    MissingUnit { input: String },

    Overflow { input: String },
}

impl fmt::Display for DurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DurationError::MissingNumber { input } => {
                write!(f, "Expected a number in duration `{input}`")
            }
            DurationError::UnknownUnit { input, unit } => {
                write!(f, "Unknown unit `{unit}` in duration `{input}`")
            }
            DurationError::MissingUnit { input } => {
                write!(f, "Duration `{input}` ends without a unit")
            }
            DurationError::Overflow { input } => write!(f, "Duration `{input}` is too large"),
        }
    }
}

impl Error for DurationError {}

#[derive(Debug)]
pub enum UtilsError {
    Path(PathError),
    FileSystem(FileSystemError),
    Duration(DurationError),
}

impl fmt::Display for UtilsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UtilsError::Path(err) => write!(f, "{err}"),
            UtilsError::FileSystem(err) => write!(f, "{err}"),
            UtilsError::Duration(err) => write!(f, "{err}"),
        }
    }
}

impl Error for UtilsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            UtilsError::Path(err) => Some(err),
            UtilsError::FileSystem(err) => Some(err),
            UtilsError::Duration(err) => Some(err),
        }
    }
}

impl From<PathError> for UtilsError {
    fn from(err: PathError) -> Self {
        UtilsError::Path(err)
    }
}

impl From<FileSystemError> for UtilsError {
    fn from(err: FileSystemError) -> Self {
        UtilsError::FileSystem(err)
    }
}

impl From<DurationError> for UtilsError {
    fn from(err: DurationError) -> Self {
        UtilsError::Duration(err)
    }
}

pub type DurationResult<T> = std::result::Result<T, DurationError>;
pub type FileSystemResult<T> = std::result::Result<T, FileSystemError>;
pub type PathResult<T> = std::result::Result<T, PathError>;

pub type UtilsResult<T> = std::result::Result<T, UtilsError>;
