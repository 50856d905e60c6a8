//! Flattening a nested value into `(path, leaf)` pairs and back.
//!
//! Translation tools work on flat lists of strings; these two functions get
//! a document's data there and back without losing its shape.

use crate::error::ExtricateError;
use crate::types::{Path, Segment, Table, Value};

type Result<T> = std::result::Result<T, ExtricateError>;

fn flatten_into(value: &Value, path: &mut Path, out: &mut Vec<(Path, Value)>) {
    match value {
        Value::Sequence(items) if !items.is_empty() => {
            for (idx, item) in items.iter().enumerate() {
                path.push(Segment::Index(idx));
                flatten_into(item, path, out);
                path.pop();
            }
        },
        Value::Table(table) if !table.is_empty() => {
            for (key, item) in table {
                path.push(Segment::Key(key.clone()));
                flatten_into(item, path, out);
                path.pop();
            }
        },
        leaf => out.push((path.clone(), leaf.clone())),
    }
}

/// Every leaf of `value` with its path, depth first in source order.
/// Empty containers count as leaves so they survive [`unflatten`].
pub fn flatten(value: &Value) -> Vec<(Path, Value)> {
    let mut out = Vec::new();
    flatten_into(value, &mut Path::root(), &mut out);
    out
}

fn empty_for(segment: &Segment) -> Value {
    match segment {
        Segment::Key(_) => Value::Table(Table::new()),
        Segment::Index(_) => Value::Sequence(Vec::new()),
    }
}

/// The entry of `node` at `segment`, created with `fill` if missing.
/// Also reports whether it was created.
fn child<'a, F>(node: &'a mut Value, segment: &Segment, at: &Path, fill: F) -> Result<(&'a mut Value, bool)>
    where F: FnOnce() -> Value
{
    match (node, segment) {
        (Value::Table(table), Segment::Key(key)) => {
            let created = !table.contains_key(key);
            Ok((table.entry(key.clone()).or_insert_with(fill), created))
        },
        (Value::Sequence(items), Segment::Index(idx)) => {
            let idx = *idx;
            if idx > items.len() {
                return Err(ExtricateError::IndexGap { path: at.clone(), index: idx + 1 });
            }
            let created = idx == items.len();
            if created {
                items.push(fill());
            }
            Ok((&mut items[idx], created))
        },
        _ => Err(ExtricateError::ShapeConflict { path: at.clone() }),
    }
}

/// Rebuild a value from `(path, leaf)` pairs as produced by [`flatten`].
///
/// Sequence positions must arrive in order without gaps. A path that is
/// given twice, or that passes through a leaf, is a
/// [`ShapeConflict`](ExtricateError::ShapeConflict). No entries at all give
/// an empty table.
pub fn unflatten<I>(entries: I) -> Result<Value>
    where I: IntoIterator<Item = (Path, Value)>
{
    let mut root: Option<Value> = None;

    for (path, leaf) in entries {
        let segments = path.segments();
        let (last, parents) = match segments.split_last() {
            Some(split) => split,
            None => {
                if root.is_some() {
                    return Err(ExtricateError::ShapeConflict { path });
                }
                root = Some(leaf);
                continue;
            },
        };

        let first = segments.first().unwrap_or(last);
        let mut node = root.get_or_insert_with(|| empty_for(first));
        let mut at = Path::root();
        for (depth, segment) in parents.iter().enumerate() {
            let next = segments.get(depth + 1).unwrap_or(last);
            let (slot, _) = child(node, segment, &at, || empty_for(next))?;
            at.push(segment.clone());
            if !slot.is_container() {
                return Err(ExtricateError::ShapeConflict { path: at });
            }
            node = slot;
        }

        let (slot, created) = child(node, last, &at, || Value::Nil)?;
        if !created {
            return Err(ExtricateError::ShapeConflict { path });
        }
        *slot = leaf;
    }

    Ok(root.unwrap_or_else(|| Value::Table(Table::new())))
}
