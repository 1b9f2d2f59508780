//! Key-path navigation over a JSON tree.
//!
//! Paths are slash-separated (`dailyChallenges/u1/c1`). Writes create
//! intermediate objects as needed; removals prune parents left empty, so
//! an emptied scope reads back as absent. Writing `Null` removes the
//! path, matching remote-tree semantics.

use serde_json::{Map, Value};

use crate::error::StoreError;

pub(crate) fn split_path(path: &str) -> Result<Vec<&str>, StoreError> {
    if path.is_empty() {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    let segments: Vec<&str> = path.split('/').collect();
    if segments.iter().any(|segment| segment.is_empty()) {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(segments)
}

pub(crate) fn get<'a>(root: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    let mut node = root;
    for segment in segments {
        node = node.as_object()?.get(*segment)?;
    }
    Some(node)
}

pub(crate) fn set(root: &mut Value, segments: &[&str], value: Value) {
    if value.is_null() {
        remove(root, segments);
        return;
    }
    let (last, parents) = match segments.split_last() {
        Some(split) => split,
        None => return,
    };
    let mut node = root;
    for segment in parents {
        node = ensure_object(node)
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    ensure_object(node).insert(last.to_string(), value);
}

/// Removes the node at `segments`, pruning parents left empty.
/// Returns true when the node existed.
pub(crate) fn remove(root: &mut Value, segments: &[&str]) -> bool {
    let (first, rest) = match segments.split_first() {
        Some(split) => split,
        None => return false,
    };
    let map = match root.as_object_mut() {
        Some(map) => map,
        None => return false,
    };
    if rest.is_empty() {
        return map.remove(*first).is_some();
    }
    let (removed, child_empty) = match map.get_mut(*first) {
        Some(child) => {
            let removed = remove(child, rest);
            let empty = child.as_object().is_some_and(Map::is_empty);
            (removed, empty)
        }
        None => return false,
    };
    if removed && child_empty {
        map.remove(*first);
    }
    removed
}

fn ensure_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}
