//! Read-side projection of stored properties into a JSON document.

use docstack_model::{Entity, RequestContext, Scope};
use docstack_types::{Key, Property, meta};
use serde_json::{Map, Value as Json};
use tracing::debug;

pub(crate) const ID: &str = "id";

/// Builds the output document for `properties`.
///
/// Hidden fields and fields the caller may not read are left out
/// entirely. A caller without the entity's `read` permission sees only
/// `id` and `meta`. Dotted names become nested objects and multi-valued
/// properties collect into arrays in stored order. `id` and `meta` come
/// last and can't be shadowed by field data.
pub(crate) fn project(
    entity: &Entity,
    ctx: &dyn RequestContext,
    key: Option<&Key>,
    properties: &[Property],
) -> Map<String, Json> {
    let mut doc = Map::new();
    let mut meta_doc = Map::new();
    let readable = entity.permits(ctx, Scope::Read);
    if !readable {
        debug!(entity = %entity.name(), "Caller may not read entity, projecting id and meta only");
    }

    for prop in properties {
        if prop.is_meta() {
            let path: Vec<&str> = prop.name.split('.').skip(1).collect();
            insert(&mut meta_doc, &path, prop);
            continue;
        }
        if !readable || prop.root() == ID {
            continue;
        }
        if let Some(field) = entity.field(&prop.name) {
            if field.is_hidden() || field.check_access(ctx, Scope::Read).is_err() {
                continue;
            }
        }
        let path: Vec<&str> = prop.name.split('.').collect();
        insert(&mut doc, &path, prop);
    }

    if let Some(key) = key {
        doc.insert(ID.to_string(), Json::String(key.encode()));
    }
    doc.insert(meta::ROOT.to_string(), Json::Object(meta_doc));
    doc
}

fn insert(doc: &mut Map<String, Json>, path: &[&str], prop: &Property) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };

    let mut node = doc;
    for segment in parents {
        let entry = node
            .entry(segment.to_string())
            .or_insert_with(|| Json::Object(Map::new()));
        match entry {
            Json::Object(child) => node = child,
            _ => {
                debug!(property = %prop.name, "Skipping property nested under a scalar");
                return;
            }
        }
    }

    let value = prop.value.to_json();
    if prop.multiple {
        match node
            .entry(last.to_string())
            .or_insert_with(|| Json::Array(Vec::new()))
        {
            Json::Array(items) => items.push(value),
            _ => debug!(property = %prop.name, "Skipping value for a non-array slot"),
        }
    } else {
        node.insert(last.to_string(), value);
    }
}
