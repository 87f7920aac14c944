use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum DownloadError {
    #[error("Invalid URL: {url}")]
    #[diagnostic(code(cfm_dl::invalid_url))]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error(transparent)]
    #[diagnostic(
        code(cfm_dl::network),
        help("Check your internet connection or try again later")
    )]
    Network(#[from] Box<ureq::Error>),

    #[error("HTTP {status}: {url}")]
    #[diagnostic(code(cfm_dl::http_error))]
    HttpError { status: u16, url: String },

    #[error(transparent)]
    #[diagnostic(code(cfm_dl::io))]
    Io(#[from] std::io::Error),

    #[error("Invalid response from {url}: {reason}")]
    #[diagnostic(code(cfm_dl::invalid_response))]
    InvalidResponse { url: String, reason: String },

    #[error("No layer with media type {media_type} in {reference}")]
    #[diagnostic(
        code(cfm_dl::layer_not_found),
        help("The mirror may not have processed this artifact yet")
    )]
    LayerNotFound {
        media_type: String,
        reference: String,
    },

    #[error("Server does not support range requests: {url}")]
    #[diagnostic(
        code(cfm_dl::range_unsupported),
        help("Use a backend that downloads whole artifacts instead")
    )]
    RangeNotSupported { url: String },

    #[error("Invalid header `{header}`")]
    #[diagnostic(
        code(cfm_dl::invalid_header),
        help("Headers must look like `Name: value`")
    )]
    InvalidHeader { header: String },
}

impl DownloadError {
    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpError { status, .. } => Some(*status),
            Self::Network(err) => match err.as_ref() {
                ureq::Error::StatusCode(code) => Some(*code),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

impl From<ureq::Error> for DownloadError {
    fn from(e: ureq::Error) -> Self {
        Self::Network(Box::new(e))
    }
}

pub type Result<T> = std::result::Result<T, DownloadError>;
