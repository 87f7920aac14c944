use std::{collections::HashMap, fmt};

use serde::Deserialize;
use tracing::debug;
use ureq::{
    http::header::{ACCEPT, AUTHORIZATION},
    BodyReader,
};

use crate::{
    error::{DownloadError, Result},
    http::ensure_success,
    http_client::SHARED_AGENT,
};

const MANIFEST_ACCEPT: &str = "application/vnd.oci.image.manifest.v1+json, \
    application/vnd.docker.distribution.manifest.v2+json";

/// Anonymous bearer token accepted by ghcr.io for public images.
const ANONYMOUS_TOKEN: &str = "Bearer QQ==";

/// `registry/repository:tag`, e.g. `ghcr.io` + `channel-mirrors/conda-forge/noarch/attrs` + `23.1.0-pyhd8ed1ab_0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OciReference {
    pub registry: String,
    pub repository: String,
    pub tag: String,
}

impl OciReference {
    /// Splits a registry location such as `ghcr.io/channel-mirrors` into host and path prefix and
    /// appends `repository` to the prefix.
    pub fn new(registry: &str, repository: &str, tag: &str) -> Self {
        let registry = registry
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/');
        let (host, prefix) = registry.split_once('/').unwrap_or((registry, ""));
        let repository = repository.trim_matches('/');
        let repository = if prefix.is_empty() {
            repository.to_string()
        } else {
            format!("{prefix}/{repository}")
        };

        Self {
            registry: host.to_string(),
            repository,
            tag: tag.to_string(),
        }
    }

    fn api(&self) -> String {
        format!("https://{}/v2/{}", self.registry, self.repository)
    }

    pub fn manifest_url(&self) -> String {
        format!("{}/manifests/{}", self.api(), self.tag)
    }

    pub fn blob_url(&self, digest: &str) -> String {
        format!("{}/blobs/{}", self.api(), digest)
    }
}

impl fmt::Display for OciReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.registry, self.repository, self.tag)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OciManifest {
    #[serde(rename = "mediaType", default)]
    pub media_type: Option<String>,
    pub layers: Vec<OciLayer>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OciLayer {
    #[serde(rename = "mediaType")]
    pub media_type: String,
    pub digest: String,
    pub size: u64,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
}

impl OciManifest {
    pub fn layer(&self, media_type: &str) -> Option<&OciLayer> {
        self.layers.iter().find(|l| l.media_type == media_type)
    }
}

pub struct OciClient;

impl OciClient {
    pub fn fetch_manifest(reference: &OciReference) -> Result<OciManifest> {
        let url = reference.manifest_url();
        debug!("fetching manifest {}", reference);

        let resp = SHARED_AGENT
            .get(&url)
            .header(ACCEPT, MANIFEST_ACCEPT)
            .header(AUTHORIZATION, ANONYMOUS_TOKEN)
            .call()?;
        let mut resp = ensure_success(resp, &url)?;

        resp.body_mut()
            .read_json()
            .map_err(|err| DownloadError::InvalidResponse {
                url,
                reason: err.to_string(),
            })
    }

    /// Opens a streaming reader over a blob of `reference`'s repository.
    pub fn open_blob(reference: &OciReference, digest: &str) -> Result<BodyReader<'static>> {
        let url = reference.blob_url(digest);
        debug!("streaming blob {digest} of {}", reference);

        let resp = SHARED_AGENT
            .get(&url)
            .header(AUTHORIZATION, ANONYMOUS_TOKEN)
            .call()?;
        Ok(ensure_success(resp, &url)?.into_body().into_reader())
    }

    /// Fetches the manifest and opens the first layer with `media_type`.
    pub fn open_layer(reference: &OciReference, media_type: &str) -> Result<BodyReader<'static>> {
        let manifest = Self::fetch_manifest(reference)?;
        let layer = manifest
            .layer(media_type)
            .ok_or_else(|| DownloadError::LayerNotFound {
                media_type: media_type.into(),
                reference: reference.to_string(),
            })?;
        Self::open_blob(reference, &layer.digest)
    }
}
