//! conda-forge artifact metadata and name lookups.
//!
//! The heart of the crate is the pair of normalizers in [`info`], which turn the members of a
//! package's `info/` directory into an [`ArtifactData`] record. The [`backend`] modules feed them
//! from the OCI mirror, from a `.conda` streamed over HTTP range requests, from a local file, or
//! bypass them entirely for the pre-computed libcfgraph store.
//!
//! Alongside sit the feedstock-outputs sharding scheme, import and PyPI name mappings, linter
//! hints and bulk repodata helpers. [`MetadataClient`] ties them to a configuration and caches
//! what it fetches.
//!
//! # Example
//!
//! ```no_run
//! use cfm_registry::{backend::Backend, MetadataClient};
//!
//! fn show() -> cfm_registry::Result<()> {
//!     let client = MetadataClient::new()?;
//!     if let Some(data) = client.get_artifact_info(
//!         "conda-forge",
//!         "noarch",
//!         "attrs-23.1.0-pyh71513ae_1.conda",
//!         Some(Backend::Oci),
//!     )? {
//!         println!("{} {}", data.name, data.version);
//!     }
//!     Ok(())
//! }
//! ```

pub mod artifact;
pub mod backend;
pub mod cache;
pub mod client;
pub mod entry;
pub mod error;
pub mod feedstock;
pub mod hints;
pub mod info;
pub mod mapping;
pub mod record;
pub mod repodata;
pub mod yaml;

pub use artifact::{ArtifactKind, ArtifactName};
pub use client::MetadataClient;
pub use entry::{InfoEntry, MemoryEntry};
pub use error::{ErrorContext, RegistryError, Result};
pub use feedstock::{sharded_path, ShardConfig};
pub use info::{info_json_from_oci_layer, info_json_from_tar, DEFAULT_SKIP_SUFFIXES};
pub use mapping::{map_import_to_package, map_pypi_to_conda, resolve_import};
pub use record::{ArtifactData, NameMappingEntry, METADATA_VERSION};
