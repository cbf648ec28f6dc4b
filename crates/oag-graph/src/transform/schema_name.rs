//! Renaming schema components through a `{{name}}` template.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::error::TransformError;
use crate::naming::render_name;
use crate::pointer::{encode_segment, normalize_pointer, value_at_mut};
use crate::transform::read_write::{schemas_path, schemas_pointer};

/// Old name -> new name for every schema the template renames.
///
/// A rename is skipped when the new name is already a schema or was claimed
/// by an earlier rename.
pub fn plan_renames(
    template: &str,
    names: &[String],
) -> Result<IndexMap<String, String>, TransformError> {
    let existing: HashSet<&str> = names.iter().map(String::as_str).collect();
    let mut claimed: HashSet<String> = HashSet::new();
    let mut renames = IndexMap::new();

    for name in names {
        let renamed = render_name(template, name)?;
        if renamed == *name {
            claimed.insert(renamed);
            continue;
        }
        if existing.contains(renamed.as_str()) || claimed.contains(&renamed) {
            log::debug!("keeping schema {name}: {renamed} is already taken");
            claimed.insert(name.clone());
            continue;
        }
        claimed.insert(renamed.clone());
        renames.insert(name.clone(), renamed);
    }
    Ok(renames)
}

/// Point every `$ref` found in `renames` at its new target.
pub fn rewrite_refs(node: &mut Value, renames: &IndexMap<String, String>) {
    match node {
        Value::Array(items) => {
            for item in items {
                rewrite_refs(item, renames);
            }
        }
        Value::Object(map) => {
            for (key, value) in map.iter_mut() {
                match value {
                    Value::String(target) if key == "$ref" => {
                        if let Some(renamed) = renames.get(&normalize_pointer(target)) {
                            *target = renamed.clone();
                        }
                    }
                    _ => rewrite_refs(value, renames),
                }
            }
        }
        _ => {}
    }
}

/// Rename every schema component through `template` and rewrite references
/// to them. Schemas keep their position in the collection. Returns the number
/// of renamed schemas.
pub fn schema_name_transform(template: &str, spec: &mut Value) -> Result<usize, TransformError> {
    let Some(pointer) = schemas_pointer(spec) else {
        return Ok(0);
    };
    let path = schemas_path(pointer);
    let Some(Value::Object(schemas)) = value_at_mut(spec, &path) else {
        return Ok(0);
    };
    let names: Vec<String> = schemas.keys().cloned().collect();
    let renames = plan_renames(template, &names)?;
    if renames.is_empty() {
        return Ok(0);
    }

    let mut renamed = Map::new();
    for (name, schema) in std::mem::take(schemas) {
        let name = renames.get(&name).cloned().unwrap_or(name);
        renamed.insert(name, schema);
    }
    *schemas = renamed;

    let pointers: IndexMap<String, String> = renames
        .iter()
        .map(|(old, new)| {
            (
                format!("{pointer}/{}", encode_segment(old)),
                format!("{pointer}/{}", encode_segment(new)),
            )
        })
        .collect();
    rewrite_refs(spec, &pointers);

    log::info!("renamed {} schema(s) with {template}", renames.len());
    Ok(renames.len())
}
