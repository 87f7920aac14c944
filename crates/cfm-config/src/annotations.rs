use std::any::type_name;

use documented::{Documented, DocumentedFields};
use toml_edit::{Decor, Item, RawString, Table};
use tracing::warn;

use crate::error::{ConfigError, Result};

/// Prepends `docs` to `decor` as `#` comment lines, keeping any comments already there.
pub fn append_docs_as_toml_comments(decor: &mut Decor, docs: &str) {
    let comments: String = docs
        .lines()
        .map(|l| {
            if l.is_empty() {
                "#\n".into()
            } else {
                format!("# {l}\n")
            }
        })
        .collect();

    let existing = decor
        .prefix()
        .and_then(RawString::as_str)
        .unwrap_or_default();

    let prefix = if existing.is_empty() || existing.ends_with("\n\n") {
        format!("{existing}{comments}")
    } else if existing.ends_with('\n') {
        format!("{existing}#\n{comments}")
    } else {
        format!("{existing}\n{comments}")
    };
    decor.set_prefix(prefix);
}

/// Writes the field docs of `T` above the matching keys of `table`.
///
/// Non-root tables also get the struct-level docs of `T`. Keys without field docs are logged
/// and left untouched.
pub fn annotate_toml_table<T>(table: &mut Table, is_root: bool) -> Result<()>
where
    T: Documented + DocumentedFields,
{
    if !is_root {
        append_docs_as_toml_comments(table.decor_mut(), T::DOCS);
    }

    for (mut key, item) in table.iter_mut() {
        let name = key.get().to_string();
        let Ok(docs) = T::get_field_docs(&name) else {
            warn!(
                "Field '{}' has no documentation on '{}'",
                name,
                type_name::<T>()
            );
            continue;
        };

        match item {
            Item::None => return Err(ConfigError::UnexpectedTomlItem(name)),
            Item::Value(_) => append_docs_as_toml_comments(key.leaf_decor_mut(), docs),
            Item::Table(sub) => append_docs_as_toml_comments(sub.decor_mut(), docs),
            Item::ArrayOfTables(array) => {
                if let Some(first) = array.iter_mut().next() {
                    append_docs_as_toml_comments(first.decor_mut(), docs);
                }
            }
        }
    }

    Ok(())
}
