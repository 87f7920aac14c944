//! A configured entry point to every lookup, memoizing remote data per lookup family.

use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
    sync::Arc,
};

use cfm_config::config::{get_config, Config};
use serde_json::Value;
use tracing::{debug, info};

use crate::{
    artifact::ArtifactName,
    backend::{
        libcfgraph::{fetch_libcfgraph_index, get_libcfgraph_artifact_data, LibcfgraphIndex},
        local::artifact_info_from_path,
        oci::get_oci_artifact_data,
        streamed::{channel_url, get_streamed_artifact_data},
        Backend,
    },
    cache::TtlCache,
    error::{RegistryError, Result},
    feedstock::{self, fetch_feedstock_outputs_config, ShardConfig},
    hints,
    mapping::{
        self, bot_import_map_url, fetch_bot_import_maps_meta, fetch_grayskull_pypi_mapping,
        fetch_import_map, fetch_libcfgraph_import_maps_meta, fetch_pypi_name_mapping,
        fetch_ranked_hubs_authorities, import_shard, libcfgraph_import_map_url, top_level_import,
        ImportMap, ImportMapsMeta, PypiMapping,
    },
    record::{ArtifactData, NameMappingEntry},
    repodata::{self, BROKEN_LABEL, MAIN_LABEL, SUBDIRS},
};

/// `(backend, channel, subdir, artifact)`
type ArtifactKey = (Backend, String, String, String);

/// Source of an import-to-package map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ImportMapSource {
    Bot,
    Libcfgraph,
}

/// Looks up conda-forge metadata using the URLs and cache settings of a [`Config`].
///
/// Remote tables are cached in memory for the configured TTL. An artifact that was not found is
/// cached too, so a later publish is only seen once the entry expires or is invalidated.
pub struct MetadataClient {
    config: Config,
    skip_suffixes: Vec<String>,
    artifacts: TtlCache<ArtifactKey, Option<Arc<ArtifactData>>>,
    libcfgraph_index: TtlCache<(), LibcfgraphIndex>,
    import_maps_meta: TtlCache<ImportMapSource, ImportMapsMeta>,
    import_maps: TtlCache<String, ImportMap>,
    ranked_hubs: TtlCache<(), Vec<String>>,
    grayskull_mapping: TtlCache<(), PypiMapping>,
    name_mapping: TtlCache<(), Vec<NameMappingEntry>>,
    feedstock_config: TtlCache<(), ShardConfig>,
    feedstocks: TtlCache<String, Vec<String>>,
    hints: TtlCache<(), BTreeMap<String, String>>,
}

impl MetadataClient {
    /// Builds a client from the process-wide configuration.
    pub fn new() -> Result<Self> {
        Self::from_config(get_config())
    }

    pub fn from_config(config: Config) -> Result<Self> {
        let ttl = config.get_cache_ttl()?;
        let capacity = config.cache_capacity();
        debug!(capacity, ttl = ?ttl, "creating metadata client");

        Ok(Self {
            skip_suffixes: config.skip_file_suffixes(),
            config,
            artifacts: TtlCache::new(capacity, ttl),
            libcfgraph_index: TtlCache::new(1, ttl),
            import_maps_meta: TtlCache::new(2, ttl),
            import_maps: TtlCache::new(capacity, ttl),
            ranked_hubs: TtlCache::new(1, ttl),
            grayskull_mapping: TtlCache::new(1, ttl),
            name_mapping: TtlCache::new(1, ttl),
            feedstock_config: TtlCache::new(1, ttl),
            feedstocks: TtlCache::new(capacity, ttl),
            hints: TtlCache::new(1, ttl),
        })
    }

    /// Overrides the configured `files` suffix filter.
    pub fn with_skip_suffixes(mut self, suffixes: Vec<String>) -> Self {
        self.skip_suffixes = suffixes;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn default_backend(&self) -> Result<Backend> {
        self.config.backend().parse()
    }

    /// Metadata of `artifact` in `channel`/`subdir`, or `None` if the backend does not have it.
    ///
    /// `backend` defaults to the configured one.
    pub fn get_artifact_info(
        &self,
        channel: &str,
        subdir: &str,
        artifact: &str,
        backend: Option<Backend>,
    ) -> Result<Option<Arc<ArtifactData>>> {
        let backend = match backend {
            Some(backend) => backend,
            None => self.default_backend()?,
        };
        artifact.parse::<ArtifactName>()?;

        let key = (backend, channel.into(), subdir.into(), artifact.into());
        let cached = self.artifacts.get_or_try_insert_with(key, || {
            info!("fetching {channel}/{subdir}/{artifact} from {backend}");
            let data = match backend {
                Backend::Oci => get_oci_artifact_data(
                    self.config.oci_registry(),
                    channel,
                    subdir,
                    artifact,
                    &self.skip_suffixes,
                )?,
                Backend::Streamed => get_streamed_artifact_data(
                    &channel_url(
                        channel,
                        self.config.channel_alias(),
                        self.config.default_channels_url(),
                    ),
                    subdir,
                    artifact,
                    &self.skip_suffixes,
                )?,
                Backend::Libcfgraph => get_libcfgraph_artifact_data(
                    self.config.libcfgraph_url(),
                    &*self.libcfgraph_index()?,
                    channel,
                    subdir,
                    artifact,
                )?,
            };
            Ok::<_, RegistryError>(data.map(Arc::new))
        })?;

        Ok((*cached).clone())
    }

    /// Forgets a memoized artifact lookup. Returns whether one was cached.
    pub fn invalidate_artifact(
        &self,
        backend: Backend,
        channel: &str,
        subdir: &str,
        artifact: &str,
    ) -> bool {
        self.artifacts
            .invalidate(&(backend, channel.into(), subdir.into(), artifact.into()))
    }

    /// Reads a package file on disk. Nothing is cached.
    pub fn artifact_info_from_path<P: AsRef<Path>>(&self, path: P) -> Result<Option<ArtifactData>> {
        artifact_info_from_path(path, &self.skip_suffixes)
    }

    pub fn libcfgraph_index(&self) -> Result<Arc<LibcfgraphIndex>> {
        self.libcfgraph_index.get_or_try_insert_with((), || {
            fetch_libcfgraph_index(self.config.libcfgraph_url())
        })
    }

    fn import_maps_meta(&self, source: ImportMapSource) -> Result<Arc<ImportMapsMeta>> {
        self.import_maps_meta
            .get_or_try_insert_with(source, || match source {
                ImportMapSource::Bot => fetch_bot_import_maps_meta(self.config.autotick_bot_url()),
                ImportMapSource::Libcfgraph => {
                    fetch_libcfgraph_import_maps_meta(self.config.libcfgraph_url())
                }
            })
    }

    fn import_map(&self, source: ImportMapSource, import_name: &str) -> Result<Arc<ImportMap>> {
        let meta = self.import_maps_meta(source)?;
        let shard = import_shard(import_name, meta.num_letters);
        let url = match source {
            ImportMapSource::Bot => {
                bot_import_map_url(self.config.autotick_bot_url(), &shard, &meta)
            }
            ImportMapSource::Libcfgraph => {
                libcfgraph_import_map_url(self.config.libcfgraph_url(), &shard)
            }
        };
        self.import_maps
            .get_or_try_insert_with(url.clone(), || fetch_import_map(&url))
    }

    fn pkgs_for_import(
        &self,
        source: ImportMapSource,
        import_name: &str,
    ) -> Result<(Option<BTreeSet<String>>, String)> {
        let top_level = top_level_import(import_name);
        let table = self.import_map(source, top_level)?;
        let (pkgs, name) = mapping::resolve_import(import_name, &table);
        Ok((pkgs.cloned(), name))
    }

    /// Packages that may supply `import_name`, and the top-level import that was looked up.
    pub fn get_pkgs_for_import(
        &self,
        import_name: &str,
    ) -> Result<(Option<BTreeSet<String>>, String)> {
        self.pkgs_for_import(ImportMapSource::Bot, import_name)
    }

    /// Same as [`MetadataClient::get_pkgs_for_import`], from the frozen libcfgraph maps.
    pub fn get_libcfgraph_pkgs_for_import(
        &self,
        import_name: &str,
    ) -> Result<(Option<BTreeSet<String>>, String)> {
        self.pkgs_for_import(ImportMapSource::Libcfgraph, import_name)
    }

    pub fn ranked_hubs_authorities(&self) -> Result<Arc<Vec<String>>> {
        self.ranked_hubs.get_or_try_insert_with((), || {
            fetch_ranked_hubs_authorities(self.config.cf_graph_url())
        })
    }

    /// The most likely package supplying `import_name`.
    ///
    /// The ranking is only downloaded when the import map alone cannot decide.
    pub fn map_import_to_package(&self, import_name: &str) -> Result<String> {
        let top_level = top_level_import(import_name);
        let table = self.import_map(ImportMapSource::Bot, top_level)?;

        let needs_ranking = matches!(
            table.get(top_level),
            Some(pkgs) if !pkgs.contains(top_level)
        );
        let ranked = if needs_ranking {
            self.ranked_hubs_authorities()?
        } else {
            Arc::default()
        };

        Ok(mapping::map_import_to_package(import_name, &table, &ranked))
    }

    pub fn get_grayskull_pypi_mapping(&self) -> Result<Arc<PypiMapping>> {
        self.grayskull_mapping.get_or_try_insert_with((), || {
            fetch_grayskull_pypi_mapping(self.config.cf_graph_url())
        })
    }

    pub fn get_pypi_name_mapping(&self) -> Result<Arc<Vec<NameMappingEntry>>> {
        self.name_mapping
            .get_or_try_insert_with((), || fetch_pypi_name_mapping(self.config.cf_graph_url()))
    }

    pub fn map_pypi_to_conda(&self, pypi_name: &str) -> Result<String> {
        let table = self.get_grayskull_pypi_mapping()?;
        Ok(mapping::map_pypi_to_conda(pypi_name, &table))
    }

    pub fn feedstock_outputs_config(&self) -> Result<Arc<ShardConfig>> {
        self.feedstock_config.get_or_try_insert_with((), || {
            fetch_feedstock_outputs_config(self.config.feedstock_outputs_url()).map(Into::into)
        })
    }

    /// Path of `name`'s file in the feedstock-outputs repository.
    pub fn sharded_path(&self, name: &str) -> Result<String> {
        Ok(feedstock::sharded_path(name, &*self.feedstock_outputs_config()?))
    }

    /// Feedstocks allowed to publish `name`.
    pub fn package_to_feedstock(&self, name: &str) -> Result<Vec<String>> {
        let config = self.feedstock_outputs_config()?;
        let feedstocks = self.feedstocks.get_or_try_insert_with(name.to_string(), || {
            feedstock::package_to_feedstock(self.config.feedstock_outputs_url(), &config, name)
        })?;
        Ok((*feedstocks).clone())
    }

    pub fn get_hints(&self) -> Result<Arc<BTreeMap<String, String>>> {
        self.hints
            .get_or_try_insert_with((), || hints::get_hints(self.config.hints_url()))
    }

    pub fn repodata_cache_dir(&self) -> Result<PathBuf> {
        Ok(self.config.get_cache_path()?.join("repodata"))
    }

    /// Downloads repodata for `subdirs` (all known subdirs when empty) into the cache directory.
    pub fn fetch_repodata(
        &self,
        subdirs: &[String],
        force: bool,
        label: &str,
    ) -> Result<Vec<PathBuf>> {
        let cache_dir = self.repodata_cache_dir()?;
        if subdirs.is_empty() {
            repodata::fetch_repodata(self.config.channel_alias(), &SUBDIRS, force, &cache_dir, label)
        } else {
            repodata::fetch_repodata(self.config.channel_alias(), subdirs, force, &cache_dir, label)
        }
    }

    /// The decoded main-label repodata of one subdir.
    pub fn repodata(&self, subdir: &str) -> Result<Value> {
        let paths = self.fetch_repodata(&[subdir.to_string()], false, MAIN_LABEL)?;
        let mut values = paths
            .iter()
            .map(|path| repodata::load_repodata(path))
            .collect::<Result<Vec<_>>>()?;
        Ok(values.pop().unwrap_or_default())
    }

    /// Every artifact across all subdirs as `{subdir}/{filename}`, including the `broken` label
    /// when asked.
    pub fn list_artifacts(&self, include_broken: bool) -> Result<Vec<String>> {
        let mut paths = self.fetch_repodata(&[], false, MAIN_LABEL)?;
        if include_broken {
            paths.extend(self.fetch_repodata(&[], false, BROKEN_LABEL)?);
        }
        repodata::list_artifacts(&paths, include_broken)
    }

    pub fn n_artifacts(&self, include_broken: bool) -> Result<usize> {
        Ok(self.list_artifacts(include_broken)?.len())
    }

    /// Drops every memoized lookup.
    pub fn clear_caches(&self) {
        self.artifacts.clear();
        self.libcfgraph_index.clear();
        self.import_maps_meta.clear();
        self.import_maps.clear();
        self.ranked_hubs.clear();
        self.grayskull_mapping.clear();
        self.name_mapping.clear();
        self.feedstock_config.clear();
        self.feedstocks.clear();
        self.hints.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    fn offline_config() -> Config {
        let mut config = Config::default_config();
        for url in [
            &mut config.oci_registry,
            &mut config.channel_alias,
            &mut config.default_channels_url,
            &mut config.libcfgraph_url,
            &mut config.autotick_bot_url,
            &mut config.cf_graph_url,
            &mut config.feedstock_outputs_url,
            &mut config.hints_url,
        ] {
            *url = Some("http://127.0.0.1:9".into());
        }
        config
    }

    #[test]
    fn test_unsupported_artifact_rejected_for_every_backend() {
        let client = MetadataClient::from_config(offline_config()).unwrap();
        for backend in [Backend::Oci, Backend::Streamed, Backend::Libcfgraph] {
            let err = client
                .get_artifact_info("conda-forge", "noarch", "attrs-1.0-0.whl", Some(backend))
                .unwrap_err();
            assert!(matches!(err, RegistryError::UnsupportedArtifact { .. }));
        }

        let err = client
            .get_artifact_info(
                "conda-forge",
                "noarch",
                "attrs-1.0-0.tar.bz2",
                Some(Backend::Streamed),
            )
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnsupportedArtifact { .. }));
    }

    #[test]
    fn test_unknown_configured_backend() {
        let mut config = offline_config();
        config.backend = Some("ftp".into());
        let client = MetadataClient::from_config(config).unwrap();
        assert!(matches!(
            client.get_artifact_info("conda-forge", "noarch", "a-1-0.conda", None),
            Err(RegistryError::UnknownBackend { .. })
        ));
    }

    #[test]
    fn test_artifact_lookups_are_memoized() {
        let client = MetadataClient::from_config(offline_config()).unwrap();
        let key = (
            Backend::Oci,
            "conda-forge".to_string(),
            "noarch".to_string(),
            "attrs-23.1.0-pyhd8ed1ab_0.conda".to_string(),
        );
        let data = ArtifactData {
            name: "attrs".into(),
            ..Default::default()
        };
        client.artifacts.insert(key.clone(), Some(Arc::new(data)));

        let found = client
            .get_artifact_info(&key.1, &key.2, &key.3, Some(Backend::Oci))
            .unwrap()
            .unwrap();
        assert_eq!(found.name, "attrs");

        client.artifacts.insert(
            (Backend::Oci, key.1.clone(), key.2.clone(), "gone-1-0.conda".into()),
            None,
        );
        assert!(client
            .get_artifact_info(&key.1, &key.2, "gone-1-0.conda", Some(Backend::Oci))
            .unwrap()
            .is_none());

        assert!(client.invalidate_artifact(Backend::Oci, &key.1, &key.2, &key.3));
        client.clear_caches();
        assert!(client.artifacts.is_empty());
    }

    #[test]
    fn test_map_import_without_ranking() {
        let client = MetadataClient::from_config(offline_config()).unwrap();
        client.import_maps_meta.insert(
            ImportMapSource::Bot,
            ImportMapsMeta {
                num_letters: 2,
                num_dirs: 0,
            },
        );
        let url = bot_import_map_url("http://127.0.0.1:9", "sc", &ImportMapsMeta {
            num_letters: 2,
            num_dirs: 0,
        });
        let mut table = ImportMap::new();
        table.insert(
            "scipy".into(),
            ["scipy".to_string(), "scipy-fork".to_string()].into(),
        );
        client.import_maps.insert(url, table);

        assert_eq!(client.map_import_to_package("scipy.linalg").unwrap(), "scipy");
        let (pkgs, name) = client.get_pkgs_for_import("scipy.sparse").unwrap();
        assert_eq!(name, "scipy");
        assert_eq!(pkgs.unwrap().len(), 2);
    }

    #[test]
    fn test_feedstock_lookup_with_cached_config() {
        let client = MetadataClient::from_config(offline_config()).unwrap();
        client.feedstock_config.insert(
            (),
            ShardConfig {
                base_path: "outputs".into(),
                shard_level: 3,
                shard_fill: 'z',
            },
        );
        assert_eq!(client.sharded_path("numpy").unwrap(), "outputs/n/u/m/numpy.json");

        client
            .feedstocks
            .insert("numpy".into(), vec!["numpy".to_string()]);
        assert_eq!(client.package_to_feedstock("numpy").unwrap(), ["numpy"]);
    }

    #[test]
    fn test_local_artifact_uses_skip_suffixes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plain.txt");
        fs::write(&path, "nope").unwrap();

        let client = MetadataClient::from_config(offline_config())
            .unwrap()
            .with_skip_suffixes(vec![".so".into()]);
        assert!(client.artifact_info_from_path(&path).is_err());
    }
}
