//! Forgiving YAML loading for recipes and build configs found in the wild.
//!
//! Duplicate mapping keys are accepted and the last occurrence wins. Non-string keys are
//! stringified the way a JSON encoder would, custom tags are dropped in favour of the tagged
//! value, and `<<` merge keys are applied.

use std::fmt;

use serde::{
    de::{self, DeserializeOwned, EnumAccess, MapAccess, SeqAccess, VariantAccess, Visitor},
    Deserialize, Deserializer,
};
use serde_json::{Map, Number, Value};

const MERGE_KEY: &str = "<<";

struct Lenient(Value);

impl<'de> Deserialize<'de> for Lenient {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(LenientVisitor).map(Lenient)
    }
}

struct LenientVisitor;

impl<'de> Visitor<'de> for LenientVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("any YAML value")
    }

    fn visit_bool<E>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_i128<E>(self, v: i128) -> Result<Value, E> {
        Ok(i64::try_from(v)
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(v.to_string())))
    }

    fn visit_u128<E>(self, v: u128) -> Result<Value, E> {
        Ok(u64::try_from(v)
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(v.to_string())))
    }

    fn visit_f64<E>(self, v: f64) -> Result<Value, E> {
        Ok(Number::from_f64(v)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(v.to_string())))
    }

    fn visit_str<E>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_owned()))
    }

    fn visit_string<E>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_unit<E>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        Lenient::deserialize(deserializer).map(|l| l.0)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(Lenient(item)) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::Array(items))
    }

    fn visit_map<A>(self, mut map: A) -> Result<Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut out = Map::new();
        let mut merges = Vec::new();

        while let Some(Lenient(key)) = map.next_key()? {
            let Lenient(value) = map.next_value()?;
            let key = key_to_string(key);
            if key == MERGE_KEY {
                merges.push(value);
            } else {
                out.insert(key, value);
            }
        }

        for merged in merges {
            let sources = match merged {
                Value::Array(items) => items,
                other => vec![other],
            };
            for source in sources {
                if let Value::Object(fields) = source {
                    for (k, v) in fields {
                        out.entry(k).or_insert(v);
                    }
                }
            }
        }

        Ok(Value::Object(out))
    }

    fn visit_enum<A>(self, data: A) -> Result<Value, A::Error>
    where
        A: EnumAccess<'de>,
    {
        // `!tag value`: keep the value, forget the tag.
        let (_tag, variant): (String, _) = data.variant()?;
        variant.newtype_variant::<Lenient>().map(|l| l.0)
    }
}

fn key_to_string(key: Value) -> String {
    match key {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Parses one YAML document into a JSON value.
///
/// A document holding nothing but comments or whitespace is `null`.
pub fn parse_yaml(text: &str) -> Result<Value, serde_yaml::Error> {
    if is_blank(text) {
        return Ok(Value::Null);
    }
    Lenient::deserialize(serde_yaml::Deserializer::from_str(text)).map(|l| l.0)
}

fn is_blank(text: &str) -> bool {
    text.lines().map(str::trim).all(|line| {
        line.is_empty() || line.starts_with('#') || line == "---" || line == "..."
    })
}

/// Parses YAML leniently, then maps the result onto `T`.
pub fn parse_yaml_as<T: DeserializeOwned>(text: &str) -> Result<T, serde_yaml::Error> {
    let value = parse_yaml(text)?;
    serde_json::from_value(value).map_err(de::Error::custom)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_duplicate_keys_last_wins() {
        let value = parse_yaml("python:\n  - 3.9\nc_compiler: gcc\npython:\n  - 3.11\n").unwrap();
        assert_eq!(value, json!({"python": [3.11], "c_compiler": "gcc"}));
        let keys: Vec<_> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["python", "c_compiler"]);
    }

    #[test]
    fn test_nested_duplicates() {
        let value = parse_yaml("build:\n  number: 0\n  number: 3\n").unwrap();
        assert_eq!(value, json!({"build": {"number": 3}}));
    }

    #[test]
    fn test_non_string_keys_are_stringified() {
        let value = parse_yaml("1: one\ntrue: yes\n~: nothing\n").unwrap();
        assert_eq!(value, json!({"1": "one", "true": "yes", "null": "nothing"}));
    }

    #[test]
    fn test_tags_are_dropped() {
        let value = parse_yaml("source: !custom\n  url: https://example.org\n").unwrap();
        assert_eq!(value, json!({"source": {"url": "https://example.org"}}));
    }

    #[test]
    fn test_merge_keys() {
        let value = parse_yaml(
            "base: &base\n  a: 1\n  b: 2\nderived:\n  <<: *base\n  b: 3\n",
        )
        .unwrap();
        assert_eq!(value["derived"], json!({"b": 3, "a": 1}));
    }

    #[test]
    fn test_empty_document_is_null() {
        assert_eq!(parse_yaml("# only a comment\n").unwrap(), Value::Null);
    }

    #[test]
    fn test_malformed_yaml_is_an_error() {
        assert!(parse_yaml("key: [1, 2\n").is_err());
        assert!(parse_yaml("a: 1\n---\nb: 2\n").is_err());
    }

    #[test]
    fn test_parse_yaml_as() {
        #[derive(Deserialize)]
        struct Row {
            pypi_name: String,
        }
        let rows: Vec<Row> = parse_yaml_as("- pypi_name: a\n- pypi_name: b\n").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].pypi_name, "b");
    }
}
