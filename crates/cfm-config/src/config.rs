use std::{
    fs,
    path::{Path, PathBuf},
    sync::{LazyLock, PoisonError, RwLock},
    time::Duration,
};

use cfm_utils::{
    fs::ensure_dir_exists,
    path::{resolve_path, xdg_cache_home, xdg_config_home},
    time::parse_duration,
};
use documented::{Documented, DocumentedFields};
use serde::{Deserialize, Serialize};
use toml_edit::DocumentMut;
use tracing::{debug, info};

use crate::{
    annotations::annotate_toml_table,
    error::{ConfigError, Result},
};

pub const VALID_BACKENDS: [&str; 3] = ["oci", "streamed", "libcfgraph"];

pub const DEFAULT_BACKEND: &str = "oci";
pub const DEFAULT_OCI_REGISTRY: &str = "ghcr.io/channel-mirrors";
pub const DEFAULT_CHANNEL_ALIAS: &str = "https://conda.anaconda.org";
pub const DEFAULT_CHANNELS_URL: &str = "https://repo.anaconda.com";
pub const DEFAULT_LIBCFGRAPH_URL: &str = "https://raw.githubusercontent.com/regro/libcfgraph/master";
pub const DEFAULT_AUTOTICK_BOT_URL: &str = "https://github.com/regro/cf-graph-countyfair/raw/master";
pub const DEFAULT_CF_GRAPH_URL: &str =
    "https://raw.githubusercontent.com/regro/cf-graph-countyfair/master";
pub const DEFAULT_FEEDSTOCK_OUTPUTS_URL: &str =
    "https://raw.githubusercontent.com/conda-forge/feedstock-outputs/main";
pub const DEFAULT_HINTS_URL: &str = "https://raw.githubusercontent.com/conda-forge/conda-forge-pinning-feedstock/main/recipe/linter_hints/hints.toml";
pub const DEFAULT_CACHE_TTL: &str = "1h";
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

pub fn default_skip_file_suffixes() -> Vec<String> {
    vec![".pyc".into(), ".txt".into()]
}

/// Settings for the conda-forge metadata client
#[derive(Clone, Debug, Default, Deserialize, Serialize, Documented, DocumentedFields)]
pub struct Config {
    /// Default artifact backend: "oci", "streamed" or "libcfgraph".
    /// Default: "oci"
    pub backend: Option<String>,

    /// OCI registry (host and path prefix) mirroring conda channels.
    /// Default: "ghcr.io/channel-mirrors"
    pub oci_registry: Option<String>,

    /// Base URL used to turn a channel name into a channel URL.
    /// Default: "https://conda.anaconda.org"
    pub channel_alias: Option<String>,

    /// Base URL for the pkgs/main, pkgs/r and pkgs/msys2 channels.
    /// Default: "https://repo.anaconda.com"
    pub default_channels_url: Option<String>,

    /// Raw URL of the libcfgraph repository.
    pub libcfgraph_url: Option<String>,

    /// URL serving the autotick bot's import maps.
    pub autotick_bot_url: Option<String>,

    /// Raw URL of cf-graph-countyfair, used for rankings and PyPI mappings.
    pub cf_graph_url: Option<String>,

    /// Raw URL of the feedstock-outputs repository.
    pub feedstock_outputs_url: Option<String>,

    /// URL of the linter hints TOML file.
    pub hints_url: Option<String>,

    /// Entries of the `files` manifest ending with any of these (case-insensitive) are dropped.
    /// Default: [".pyc", ".txt"]
    pub skip_file_suffixes: Option<Vec<String>>,

    /// Directory for downloaded repodata.
    /// Default: $XDG_CACHE_HOME/cfm
    pub cache_path: Option<String>,

    /// How long fetched lookups stay cached, e.g. "1h30m". "never" keeps them until
    /// invalidated, "always" refetches every time.
    /// Default: "1h"
    pub cache_ttl: Option<String>,

    /// Maximum number of entries held by each in-memory cache.
    /// Default: 1024
    pub cache_capacity: Option<usize>,
}

pub static CONFIG: LazyLock<RwLock<Option<Config>>> = LazyLock::new(|| RwLock::new(None));

pub static CONFIG_PATH: LazyLock<RwLock<PathBuf>> = LazyLock::new(|| {
    RwLock::new(match std::env::var("CFM_CONFIG") {
        Ok(path) => PathBuf::from(path),
        Err(_) => xdg_config_home().join("cfm").join("config.toml"),
    })
});

pub fn config_path() -> PathBuf {
    CONFIG_PATH
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

pub fn set_config_path(path: PathBuf) {
    *CONFIG_PATH.write().unwrap_or_else(PoisonError::into_inner) = path;
}

/// Loads the configuration file into the process-wide slot.
pub fn init() -> Result<()> {
    let config = Config::new()?;
    *CONFIG.write().unwrap_or_else(PoisonError::into_inner) = Some(config);
    Ok(())
}

/// Returns the loaded configuration, or the defaults if [`init`] was never called.
pub fn get_config() -> Config {
    let mut guard = CONFIG.write().unwrap_or_else(PoisonError::into_inner);
    guard.get_or_insert_with(Config::default_config).clone()
}

impl Config {
    pub fn default_config() -> Self {
        Self {
            backend: Some(DEFAULT_BACKEND.into()),
            oci_registry: Some(DEFAULT_OCI_REGISTRY.into()),
            channel_alias: Some(DEFAULT_CHANNEL_ALIAS.into()),
            default_channels_url: Some(DEFAULT_CHANNELS_URL.into()),
            libcfgraph_url: Some(DEFAULT_LIBCFGRAPH_URL.into()),
            autotick_bot_url: Some(DEFAULT_AUTOTICK_BOT_URL.into()),
            cf_graph_url: Some(DEFAULT_CF_GRAPH_URL.into()),
            feedstock_outputs_url: Some(DEFAULT_FEEDSTOCK_OUTPUTS_URL.into()),
            hints_url: Some(DEFAULT_HINTS_URL.into()),
            skip_file_suffixes: Some(default_skip_file_suffixes()),
            cache_path: None,
            cache_ttl: Some(DEFAULT_CACHE_TTL.into()),
            cache_capacity: Some(DEFAULT_CACHE_CAPACITY),
        }
    }

    /// Reads the file at [`config_path`]. A missing file yields the defaults.
    pub fn new() -> Result<Self> {
        Self::from_path(config_path())
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut config = match fs::read_to_string(path) {
            Ok(content) => {
                debug!("loading configuration from {}", path.display());
                toml::from_str(&content)?
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("no configuration at {}, using defaults", path.display());
                Self::default_config()
            }
            Err(err) => return Err(ConfigError::IoError(err)),
        };

        config.resolve()?;
        Ok(config)
    }

    /// Fills unset fields with defaults and validates the rest.
    pub fn resolve(&mut self) -> Result<()> {
        let backend = self.backend.get_or_insert_with(|| DEFAULT_BACKEND.into());
        *backend = backend.trim().to_lowercase();
        if !VALID_BACKENDS.contains(&backend.as_str()) {
            return Err(ConfigError::InvalidBackend(backend.clone()));
        }

        for (slot, default) in [
            (&mut self.oci_registry, DEFAULT_OCI_REGISTRY),
            (&mut self.channel_alias, DEFAULT_CHANNEL_ALIAS),
            (&mut self.default_channels_url, DEFAULT_CHANNELS_URL),
            (&mut self.libcfgraph_url, DEFAULT_LIBCFGRAPH_URL),
            (&mut self.autotick_bot_url, DEFAULT_AUTOTICK_BOT_URL),
            (&mut self.cf_graph_url, DEFAULT_CF_GRAPH_URL),
            (&mut self.feedstock_outputs_url, DEFAULT_FEEDSTOCK_OUTPUTS_URL),
            (&mut self.hints_url, DEFAULT_HINTS_URL),
        ] {
            let url = slot.get_or_insert_with(|| default.into());
            let trimmed = url.trim_end_matches('/').len();
            url.truncate(trimmed);
        }

        let suffixes = self
            .skip_file_suffixes
            .get_or_insert_with(default_skip_file_suffixes);
        if suffixes.iter().any(|s| s.is_empty()) {
            return Err(ConfigError::EmptySkipSuffix);
        }

        if *self.cache_capacity.get_or_insert(DEFAULT_CACHE_CAPACITY) == 0 {
            return Err(ConfigError::ZeroCacheCapacity);
        }

        self.cache_ttl.get_or_insert_with(|| DEFAULT_CACHE_TTL.into());
        self.get_cache_ttl()?;

        Ok(())
    }

    pub fn backend(&self) -> &str {
        self.backend.as_deref().unwrap_or(DEFAULT_BACKEND)
    }

    pub fn oci_registry(&self) -> &str {
        self.oci_registry.as_deref().unwrap_or(DEFAULT_OCI_REGISTRY)
    }

    pub fn channel_alias(&self) -> &str {
        self.channel_alias.as_deref().unwrap_or(DEFAULT_CHANNEL_ALIAS)
    }

    pub fn default_channels_url(&self) -> &str {
        self.default_channels_url
            .as_deref()
            .unwrap_or(DEFAULT_CHANNELS_URL)
    }

    pub fn libcfgraph_url(&self) -> &str {
        self.libcfgraph_url
            .as_deref()
            .unwrap_or(DEFAULT_LIBCFGRAPH_URL)
    }

    pub fn autotick_bot_url(&self) -> &str {
        self.autotick_bot_url
            .as_deref()
            .unwrap_or(DEFAULT_AUTOTICK_BOT_URL)
    }

    pub fn cf_graph_url(&self) -> &str {
        self.cf_graph_url.as_deref().unwrap_or(DEFAULT_CF_GRAPH_URL)
    }

    pub fn feedstock_outputs_url(&self) -> &str {
        self.feedstock_outputs_url
            .as_deref()
            .unwrap_or(DEFAULT_FEEDSTOCK_OUTPUTS_URL)
    }

    pub fn hints_url(&self) -> &str {
        self.hints_url.as_deref().unwrap_or(DEFAULT_HINTS_URL)
    }

    pub fn skip_file_suffixes(&self) -> Vec<String> {
        self.skip_file_suffixes
            .clone()
            .unwrap_or_else(default_skip_file_suffixes)
    }

    pub fn cache_capacity(&self) -> usize {
        self.cache_capacity.unwrap_or(DEFAULT_CACHE_CAPACITY)
    }

    /// `CFM_CACHE` wins over `cache_path`, which wins over `$XDG_CACHE_HOME/cfm`.
    pub fn get_cache_path(&self) -> Result<PathBuf> {
        if let Ok(env_path) = std::env::var("CFM_CACHE") {
            return Ok(resolve_path(&env_path)?);
        }
        if let Some(cache_path) = &self.cache_path {
            return Ok(resolve_path(cache_path)?);
        }
        Ok(xdg_cache_home().join("cfm"))
    }

    pub fn get_cache_ttl(&self) -> Result<Duration> {
        match self.cache_ttl.as_deref().unwrap_or(DEFAULT_CACHE_TTL) {
            "always" => Ok(Duration::ZERO),
            "never" => Ok(Duration::MAX),
            value => parse_duration(value).map_err(|source| ConfigError::InvalidCacheTtl {
                value: value.into(),
                source,
            }),
        }
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn to_annotated_document(&self) -> Result<DocumentMut> {
        let mut doc = self.to_toml_string()?.parse::<DocumentMut>()?;
        annotate_toml_table::<Config>(doc.as_table_mut(), true)?;
        Ok(doc)
    }
}

/// Writes a documented default `config.toml` to [`config_path`] and returns its location.
pub fn generate_default_config() -> Result<PathBuf> {
    let path = config_path();
    if path.exists() {
        return Err(ConfigError::ConfigAlreadyExists(path.display().to_string()));
    }

    let doc = Config::default_config().to_annotated_document()?;
    if let Some(parent) = path.parent() {
        ensure_dir_exists(parent)?;
    }
    fs::write(&path, doc.to_string())?;
    info!("Default configuration written to {}", path.display());

    Ok(path)
}
