//! Records exchanged with callers.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A JSON object as decoded from `index.json`, `about.json` or a YAML document.
pub type JsonObject = Map<String, Value>;

pub const METADATA_VERSION: u32 = 1;

/// Build metadata of a single artifact, gathered from its `info/` directory.
///
/// Field names form the serialized shape shared with the other conda-forge tooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactData {
    pub metadata_version: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub index: JsonObject,
    #[serde(default, deserialize_with = "null_as_default")]
    pub about: JsonObject,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rendered_recipe: JsonObject,
    /// The recipe as authored, possibly containing Jinja. Empty when unknown.
    #[serde(default, deserialize_with = "null_as_default")]
    pub raw_recipe: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub conda_build_config: JsonObject,
    #[serde(default, deserialize_with = "null_as_default")]
    pub files: Vec<String>,
}

impl Default for ArtifactData {
    fn default() -> Self {
        Self {
            metadata_version: METADATA_VERSION,
            name: String::new(),
            version: String::new(),
            index: JsonObject::new(),
            about: JsonObject::new(),
            rendered_recipe: JsonObject::new(),
            raw_recipe: String::new(),
            conda_build_config: JsonObject::new(),
            files: Vec::new(),
        }
    }
}

impl ArtifactData {
    /// Returns `None` unless an index with a package name was found.
    pub(crate) fn into_found(self) -> Option<Self> {
        (!self.name.is_empty()).then_some(self)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One row of the PyPI to conda name mapping tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameMappingEntry {
    pub pypi_name: String,
    pub conda_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub import_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub mapping_source: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_record_shape() {
        let value = serde_json::to_value(ArtifactData::default()).unwrap();
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(
            keys,
            [
                "metadata_version",
                "name",
                "version",
                "index",
                "about",
                "rendered_recipe",
                "raw_recipe",
                "conda_build_config",
                "files"
            ]
        );
        assert_eq!(value["metadata_version"], 1);
    }

    #[test]
    fn test_nullable_fields_decode_to_defaults() {
        let data: ArtifactData = serde_json::from_str(
            r#"{
                "metadata_version": 1,
                "name": "attrs",
                "version": "23.1.0",
                "index": {"name": "attrs"},
                "about": null,
                "rendered_recipe": null,
                "raw_recipe": null,
                "conda_build_config": {},
                "files": null
            }"#,
        )
        .unwrap();

        assert_eq!(data.raw_recipe, "");
        assert!(data.about.is_empty());
        assert!(data.files.is_empty());
        assert_eq!(data.index["name"], "attrs");
    }

    #[test]
    fn test_into_found_requires_name() {
        assert!(ArtifactData::default().into_found().is_none());
        let data = ArtifactData {
            name: "zlib".into(),
            ..Default::default()
        };
        assert!(data.into_found().is_some());
    }
}
