use std::{
    sync::{LazyLock, PoisonError, RwLock},
    time::Duration,
};

use ureq::{
    http::{self, HeaderMap, HeaderName, HeaderValue, Uri},
    typestate::WithoutBody,
    Agent, Proxy, RequestBuilder,
};

use crate::error::{DownloadError, Result};

pub const DEFAULT_USER_AGENT: &str = concat!("cfm/", env!("CARGO_PKG_VERSION"));

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub user_agent: Option<String>,
    pub headers: Option<HeaderMap>,
    pub proxy: Option<Proxy>,
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: Some(DEFAULT_USER_AGENT.into()),
            proxy: None,
            headers: None,
            timeout: None,
        }
    }
}

impl ClientConfig {
    /// Builds an `Agent` from this configuration.
    ///
    /// Non-2xx statuses come back as ordinary responses so callers can tell a 404 apart from a
    /// transport failure.
    pub fn build(&self) -> Agent {
        let mut config = Agent::config_builder()
            .proxy(self.proxy.clone())
            .timeout_global(self.timeout)
            .http_status_as_error(false);

        if let Some(user_agent) = &self.user_agent {
            config = config.user_agent(user_agent);
        }

        config.build().into()
    }
}

struct SharedClient {
    agent: Agent,
    config: ClientConfig,
}

static SHARED_CLIENT_STATE: LazyLock<RwLock<SharedClient>> = LazyLock::new(|| {
    let config = ClientConfig::default();
    RwLock::new(SharedClient {
        agent: config.build(),
        config,
    })
});

/// Handle to the process-wide HTTP agent.
#[derive(Clone, Default)]
pub struct SharedAgent;

impl SharedAgent {
    pub fn new() -> Self {
        Self
    }

    pub fn head<T>(&self, uri: T) -> RequestBuilder<WithoutBody>
    where
        Uri: TryFrom<T>,
        <Uri as TryFrom<T>>::Error: Into<http::Error>,
    {
        let state = SHARED_CLIENT_STATE
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        apply_headers(state.agent.head(uri), &state.config.headers)
    }

    pub fn get<T>(&self, uri: T) -> RequestBuilder<WithoutBody>
    where
        Uri: TryFrom<T>,
        <Uri as TryFrom<T>>::Error: Into<http::Error>,
    {
        let state = SHARED_CLIENT_STATE
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        apply_headers(state.agent.get(uri), &state.config.headers)
    }
}

fn apply_headers<B>(mut req: RequestBuilder<B>, headers: &Option<HeaderMap>) -> RequestBuilder<B> {
    if let Some(headers) = headers {
        for (key, value) in headers.iter() {
            req = req.header(key, value);
        }
    }
    req
}

pub static SHARED_AGENT: LazyLock<SharedAgent> = LazyLock::new(SharedAgent::new);

/// Rebuilds the shared agent after `updater` has adjusted its configuration.
///
/// ```
/// use cfm_dl::http_client::configure_http_client;
///
/// configure_http_client(|cfg| {
///     cfg.user_agent = Some("my-linter/1.0".to_string());
/// });
/// ```
pub fn configure_http_client<F>(updater: F)
where
    F: FnOnce(&mut ClientConfig),
{
    let mut state = SHARED_CLIENT_STATE
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    let mut config = state.config.clone();
    updater(&mut config);
    state.agent = config.build();
    state.config = config;
}

/// Parses `Name: value` pairs as given on the command line.
pub fn parse_headers<S: AsRef<str>>(raw: &[S]) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for header in raw {
        let header = header.as_ref();
        let invalid = || DownloadError::InvalidHeader {
            header: header.into(),
        };

        let (name, value) = header.split_once(':').ok_or_else(invalid)?;
        let name = HeaderName::from_bytes(name.trim().as_bytes()).map_err(|_| invalid())?;
        let value = HeaderValue::from_str(value.trim()).map_err(|_| invalid())?;
        headers.append(name, value);
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert!(config.user_agent.as_deref().unwrap().starts_with("cfm/"));
        assert!(config.proxy.is_none());
        assert!(config.headers.is_none());
        assert!(config.timeout.is_none());
    }

    #[test]
    fn test_configure_http_client_keeps_agent_usable() {
        configure_http_client(|cfg| {
            cfg.timeout = Some(Duration::from_secs(30));
        });
        let _ = SHARED_AGENT.get("https://conda.anaconda.org/conda-forge");
    }

    #[test]
    fn test_parse_headers() {
        let headers = parse_headers(&["Authorization: Bearer abc", "X-Trace:  1 "]).unwrap();
        assert_eq!(headers.get("authorization").unwrap(), "Bearer abc");
        assert_eq!(headers.get("x-trace").unwrap(), "1");
    }

    #[test]
    fn test_parse_headers_rejects_garbage() {
        assert!(matches!(
            parse_headers(&["no-colon-here"]),
            Err(DownloadError::InvalidHeader { .. })
        ));
        assert!(matches!(
            parse_headers(&["bad name: x"]),
            Err(DownloadError::InvalidHeader { .. })
        ));
    }
}
