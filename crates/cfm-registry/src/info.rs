//! Normalizers turning the members of a package's `info/` directory into an [`ArtifactData`].
//!
//! Two flavours exist. [`info_json_from_tar`] dispatches on member basenames in a single
//! forward pass and works for any archive layout. [`info_json_from_oci_layer`] reads the info
//! layer published by the OCI mirror, whose layout is fixed, and resolves fields by exact path.

use std::collections::HashMap;

use serde_json::Value;
use tracing::trace;

use crate::{
    entry::InfoEntry,
    error::{RegistryError, Result},
    record::{ArtifactData, JsonObject},
    yaml::parse_yaml,
};

/// File suffixes dropped from `files` unless the caller says otherwise.
pub const DEFAULT_SKIP_SUFFIXES: [&str; 2] = [".pyc", ".txt"];

const TEMPLATE_MARKERS: [&str; 2] = ["{{", "{%"];

/// Directories whose content may shadow top-level metadata by basename.
const EXCLUDED_DIRS: [&str; 2] = ["test", "licenses"];

/// Builds an [`ArtifactData`] from the members of an `info/` archive.
///
/// Members are matched by basename, so anything under `test/` or `licenses/` is skipped. A
/// leading `info` segment is optional. A `meta.yaml` that looks like a Jinja template becomes
/// `raw_recipe` unless a `meta.yaml.template` already supplied it, otherwise it is parsed into
/// `rendered_recipe`.
///
/// Returns `Ok(None)` when no `index.json` named the package.
///
/// # Errors
///
/// [`RegistryError::MalformedArtifact`] when a recognised member fails to decode. Errors
/// yielded by `entries` are returned as-is.
pub fn info_json_from_tar<I, E, S>(entries: I, skip_suffixes: &[S]) -> Result<Option<ArtifactData>>
where
    I: IntoIterator<Item = Result<E>>,
    E: InfoEntry,
    S: AsRef<str>,
{
    let mut data = ArtifactData::default();

    for entry in entries {
        let mut entry = entry?;
        let path = entry.path()?;
        let segments = normalized_segments(&path);

        let (Some(first), Some(basename)) = (segments.first(), segments.last()) else {
            continue;
        };
        if EXCLUDED_DIRS.contains(first) {
            trace!(path = %path, "skipping excluded member");
            continue;
        }

        match *basename {
            "index.json" => {
                let index = json_object(&path, &read_or(&mut entry, "{}")?)?;
                set_index(&mut data, index);
            }
            "about.json" => {
                data.about = json_object(&path, &read_or(&mut entry, "{}")?)?;
            }
            "conda_build_config.yaml" => {
                data.conda_build_config = yaml_object(&path, &read_or(&mut entry, "{}")?)?;
            }
            "files" => {
                data.files = filter_files(&read_or(&mut entry, "")?, skip_suffixes);
            }
            "meta.yaml.template" => {
                data.raw_recipe = read_or(&mut entry, "")?;
            }
            "meta.yaml" => {
                let text = read_or(&mut entry, "{}")?;
                if is_template(&text) && data.raw_recipe.is_empty() {
                    data.raw_recipe = text;
                } else {
                    data.rendered_recipe = yaml_object(&path, &text)?;
                }
            }
            _ => {}
        }
    }

    Ok(data.into_found())
}

const OCI_INDEX: &str = "index.json";
const OCI_ABOUT: &str = "about.json";
const OCI_FILES: &str = "files";
const OCI_RENDERED_RECIPE: [&str; 2] = ["recipe/meta.yaml", "meta.yaml"];
const OCI_RAW_RECIPE: [&str; 3] = ["recipe/meta.yaml.template", "recipe/meta.yaml", "meta.yaml"];
const OCI_BUILD_CONFIG: &str = "recipe/conda_build_config.yaml";

/// Builds an [`ArtifactData`] from the entries of an OCI mirror info layer.
///
/// Paths are relative to `info/`. Each field is read from the first of its candidate paths that
/// exists with content: the rendered recipe from `recipe/meta.yaml` then `meta.yaml`, the raw
/// recipe from `recipe/meta.yaml.template`, `recipe/meta.yaml` then `meta.yaml`.
pub fn info_json_from_oci_layer<I, E, S>(
    entries: I,
    skip_suffixes: &[S],
) -> Result<Option<ArtifactData>>
where
    I: IntoIterator<Item = Result<E>>,
    E: InfoEntry,
    S: AsRef<str>,
{
    let wanted: Vec<&str> = [OCI_INDEX, OCI_ABOUT, OCI_FILES, OCI_BUILD_CONFIG]
        .into_iter()
        .chain(OCI_RAW_RECIPE)
        .collect();

    let mut members = HashMap::new();
    for entry in entries {
        let mut entry = entry?;
        let path = normalized_segments(&entry.path()?).join("/");
        if !wanted.contains(&path.as_str()) {
            continue;
        }
        match entry.read_text()? {
            Some(text) if !text.is_empty() => {
                members.insert(path, text);
            }
            _ => {}
        }
    }

    let first_of = |paths: &[&'static str]| {
        paths
            .iter()
            .find_map(|p| members.get(*p).map(|text| (*p, text.as_str())))
    };

    let mut data = ArtifactData::default();
    if let Some((path, text)) = first_of(&[OCI_INDEX]) {
        set_index(&mut data, json_object(path, text)?);
    }
    if let Some((path, text)) = first_of(&[OCI_ABOUT]) {
        data.about = json_object(path, text)?;
    }
    if let Some((path, text)) = first_of(&OCI_RENDERED_RECIPE) {
        data.rendered_recipe = yaml_object(path, text)?;
    }
    if let Some((_, text)) = first_of(&OCI_RAW_RECIPE) {
        data.raw_recipe = text.to_string();
    }
    if let Some((path, text)) = first_of(&[OCI_BUILD_CONFIG]) {
        data.conda_build_config = yaml_object(path, text)?;
    }
    if let Some((_, text)) = first_of(&[OCI_FILES]) {
        data.files = filter_files(text, skip_suffixes);
    }

    Ok(data.into_found())
}

/// Splits a member path, dropping empty and `.` segments and an optional leading `info`.
fn normalized_segments(path: &str) -> Vec<&str> {
    let mut segments: Vec<&str> = path
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();
    if segments.len() > 1 && segments[0] == "info" {
        segments.remove(0);
    }
    segments
}

/// Reads a member's text; empty or unreadable members yield `default`.
fn read_or<E: InfoEntry>(entry: &mut E, default: &str) -> Result<String> {
    Ok(entry
        .read_text()?
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| default.to_string()))
}

fn is_template(text: &str) -> bool {
    TEMPLATE_MARKERS.iter().any(|m| text.contains(m))
}

fn set_index(data: &mut ArtifactData, index: JsonObject) {
    let field = |key: &str| {
        index
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    data.name = field("name");
    data.version = field("version");
    data.index = index;
}

fn json_object(path: &str, text: &str) -> Result<JsonObject> {
    match serde_json::from_str(text).map_err(|err| RegistryError::malformed(path, err))? {
        Value::Object(map) => Ok(map),
        other => Err(RegistryError::malformed(
            path,
            format!("expected a JSON object, found {}", kind(&other)),
        )),
    }
}

/// A null document (e.g. only comments) decodes to an empty object.
fn yaml_object(path: &str, text: &str) -> Result<JsonObject> {
    match parse_yaml(text).map_err(|err| RegistryError::malformed(path, err))? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(JsonObject::new()),
        other => Err(RegistryError::malformed(
            path,
            format!("expected a YAML mapping, found {}", kind(&other)),
        )),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Splits `text` into lines, dropping those ending (case-insensitively) in any of `suffixes`.
pub fn filter_files<S: AsRef<str>>(text: &str, suffixes: &[S]) -> Vec<String> {
    let suffixes: Vec<String> = suffixes
        .iter()
        .map(|s| s.as_ref().to_lowercase())
        .collect();
    text.lines()
        .filter(|line| {
            let line = line.to_lowercase();
            !suffixes.iter().any(|s| line.ends_with(s.as_str()))
        })
        .map(String::from)
        .collect()
}
