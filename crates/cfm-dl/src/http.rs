use std::io::Read;

use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use ureq::{
    http::{header::RANGE, Response},
    Body,
};

use crate::{
    error::{DownloadError, Result},
    http_client::SHARED_AGENT,
};

pub struct Http;

impl Http {
    /// Issues a GET, optionally for the inclusive byte range `start..=end`.
    ///
    /// Any status outside 2xx becomes [`DownloadError::HttpError`].
    pub fn fetch(url: &str, range: Option<(u64, u64)>) -> Result<Response<Body>> {
        let mut req = SHARED_AGENT.get(url);
        if let Some((start, end)) = range {
            req = req.header(RANGE, &format!("bytes={start}-{end}"));
        }

        trace!(url, ?range, "GET");
        ensure_success(req.call()?, url)
    }

    pub fn head(url: &str) -> Result<Response<Body>> {
        trace!(url, "HEAD");
        ensure_success(SHARED_AGENT.head(url).call()?, url)
    }

    pub fn bytes(url: &str) -> Result<Vec<u8>> {
        let resp = Self::fetch(url, None)?;
        let mut buf = Vec::new();
        resp.into_body().into_reader().read_to_end(&mut buf)?;
        debug!(url, bytes = buf.len(), "fetched");
        Ok(buf)
    }

    pub fn text(url: &str) -> Result<String> {
        let bytes = Self::bytes(url)?;
        String::from_utf8(bytes).map_err(|err| DownloadError::InvalidResponse {
            url: url.into(),
            reason: err.to_string(),
        })
    }

    pub fn json<T: DeserializeOwned>(url: &str) -> Result<T> {
        let bytes = Self::bytes(url)?;
        serde_json::from_slice(&bytes).map_err(|err| DownloadError::InvalidResponse {
            url: url.into(),
            reason: err.to_string(),
        })
    }
}

pub(crate) fn ensure_success(resp: Response<Body>, url: &str) -> Result<Response<Body>> {
    if resp.status().is_success() {
        Ok(resp)
    } else {
        Err(DownloadError::HttpError {
            status: resp.status().as_u16(),
            url: url.into(),
        })
    }
}
