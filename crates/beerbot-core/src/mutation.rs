//! Sub-document mutations over JSON documents.
//!
//! Paths are dot-separated object keys (`address.city`). Arrays are only
//! addressed as a whole, by `ArrayAppend`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Mutation {
    /// Set `path`, creating intermediate objects.
    Upsert { path: String, value: Value },
    /// Set `path`; fails if it already exists.
    Insert { path: String, value: Value },
    /// Set `path`; fails if it does not exist.
    Replace { path: String, value: Value },
    Remove { path: String },
    /// Push onto the array at `path`, creating an empty array if missing.
    ArrayAppend { path: String, value: Value },
    /// Add `delta` to the integer at `path`; a missing value counts as 0.
    Counter { path: String, delta: i64 },
}

impl Mutation {
    pub fn path(&self) -> &str {
        match self {
            Mutation::Upsert { path, .. }
            | Mutation::Insert { path, .. }
            | Mutation::Replace { path, .. }
            | Mutation::Remove { path }
            | Mutation::ArrayAppend { path, .. }
            | Mutation::Counter { path, .. } => path,
        }
    }
}

/// Apply `mutations` in order. On error the document may be partially
/// modified; callers apply to a copy.
pub fn apply_all(doc: &mut Value, mutations: &[Mutation]) -> Result<()> {
    for m in mutations {
        apply(doc, m)?;
    }
    Ok(())
}

pub fn apply(doc: &mut Value, mutation: &Mutation) -> Result<()> {
    let path = mutation.path();
    let (parents, leaf) = split_path(path)?;
    let create = matches!(mutation, Mutation::Upsert { .. } | Mutation::ArrayAppend { .. } | Mutation::Counter { .. } | Mutation::Insert { .. });
    let parent = walk(doc, path, &parents, create)?;

    match mutation {
        Mutation::Upsert { value, .. } => {
            parent.insert(leaf.to_string(), value.clone());
        }
        Mutation::Insert { value, .. } => {
            if parent.contains_key(leaf) {
                return Err(invalid(path, "path already exists"));
            }
            parent.insert(leaf.to_string(), value.clone());
        }
        Mutation::Replace { value, .. } => match parent.get_mut(leaf) {
            Some(slot) => *slot = value.clone(),
            None => return Err(invalid(path, "path does not exist")),
        },
        Mutation::Remove { .. } => {
            if parent.remove(leaf).is_none() {
                return Err(invalid(path, "path does not exist"));
            }
        }
        Mutation::ArrayAppend { value, .. } => {
            match parent.entry(leaf.to_string()).or_insert_with(|| Value::Array(Vec::new())) {
                Value::Array(items) => items.push(value.clone()),
                _ => return Err(invalid(path, "not an array")),
            }
        }
        Mutation::Counter { delta, .. } => {
            let slot = parent.entry(leaf.to_string()).or_insert(Value::from(0));
            let current = slot.as_i64().ok_or_else(|| invalid(path, "not an integer"))?;
            let next = current.checked_add(*delta).ok_or_else(|| invalid(path, "counter overflow"))?;
            *slot = Value::from(next);
        }
    }
    Ok(())
}

fn split_path(path: &str) -> Result<(Vec<&str>, &str)> {
    let mut parts: Vec<&str> = path.split('.').collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(invalid(path, "empty path segment"));
    }
    let leaf = parts.pop().ok_or_else(|| invalid(path, "empty path"))?;
    Ok((parts, leaf))
}

fn walk<'a>(doc: &'a mut Value, path: &str, parents: &[&str], create: bool) -> Result<&'a mut Map<String, Value>> {
    let mut node = doc;
    for key in parents {
        let map = node.as_object_mut().ok_or_else(|| invalid(path, "not an object"))?;
        node = if create {
            map.entry((*key).to_string()).or_insert_with(|| Value::Object(Map::new()))
        } else {
            map.get_mut(*key).ok_or_else(|| invalid(path, "path does not exist"))?
        };
    }
    node.as_object_mut().ok_or_else(|| invalid(path, "not an object"))
}

fn invalid(path: &str, reason: &str) -> Error {
    Error::InvalidPath { path: path.to_string(), reason: reason.to_string() }
}
