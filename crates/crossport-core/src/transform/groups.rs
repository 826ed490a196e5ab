//! Composite field kinds: repeating groups, variant groups, fixed groups
//!
//! The origin's flat storage addresses nested repeated data as separately
//! keyed entries rather than a literal nested structure: the row count lives
//! under the group's own joined key, row data under `prefix_i_subname`.
//! Rows are reconstructed by reading those flat keys through the growing
//! path accumulator, which every recursion threads in place (push, recurse,
//! pop) so sibling rows address the correct keys.

use serde_json::{Map, Value};

use crate::types::{FieldDeclaration, FieldPath, RecordFieldMap, ResolutionContext};

use super::{FieldPosition, FieldTransformer};

/// Variant-group rows carry the variant name under this key.
pub const VARIANT_TAG: &str = "acf_fc_layout";

/// Repeating group: `count` rows over a fixed sub-field set. An absent or
/// zero counter transforms to `null`, "no rows", distinct from an
/// empty-but-present list.
pub(super) fn repeater(
    t: &FieldTransformer,
    decl: &FieldDeclaration,
    flat: &RecordFieldMap,
    path: &mut FieldPath,
    ctx: &ResolutionContext,
) -> Value {
    let count = match row_count(flat, path) {
        Some(n) if n > 0 => n,
        _ => return Value::Null,
    };

    let mut rows = Vec::with_capacity(count);
    for index in 0..count {
        path.push(index.to_string());
        let row = transform_row(t, &decl.sub_fields, flat, path, ctx);
        path.pop();
        rows.push(Value::Object(row));
    }
    Value::Array(rows)
}

/// Variant group ("flexible content"): `count` rows, each tagged with the
/// variant name selecting its sub-field set. Variant names come from the
/// group's own value, an ordered list of names; a row with no declared
/// variant is skipped rather than failing the walk.
pub(super) fn flexible(
    t: &FieldTransformer,
    value: &Value,
    decl: &FieldDeclaration,
    flat: &RecordFieldMap,
    path: &mut FieldPath,
    ctx: &ResolutionContext,
) -> Value {
    let count = match row_count(flat, path) {
        Some(n) if n > 0 => n,
        _ => return Value::Null,
    };
    let names = variant_names(value);

    let mut rows = Vec::with_capacity(count);
    for index in 0..count {
        let Some(variant) = names.get(index) else {
            continue;
        };
        let Some(sub_fields) = decl.layout(variant) else {
            continue;
        };
        path.push(index.to_string());
        let mut row = transform_row(t, sub_fields, flat, path, ctx);
        path.pop();
        row.insert(VARIANT_TAG.to_string(), Value::String(variant.clone()));
        rows.push(Value::Object(row));
    }
    Value::Array(rows)
}

/// Fixed group: a single row, no counter, sub-fields addressed directly at
/// `prefix_subname`.
pub(super) fn group(
    t: &FieldTransformer,
    decl: &FieldDeclaration,
    flat: &RecordFieldMap,
    path: &mut FieldPath,
    ctx: &ResolutionContext,
) -> Value {
    Value::Object(transform_row(t, &decl.sub_fields, flat, path, ctx))
}

fn transform_row(
    t: &FieldTransformer,
    sub_fields: &[FieldDeclaration],
    flat: &RecordFieldMap,
    path: &mut FieldPath,
    ctx: &ResolutionContext,
) -> Map<String, Value> {
    let mut row = Map::new();
    for sub in sub_fields {
        path.push(sub.name.clone());
        let raw = flat.get(&path.flat_key()).cloned().unwrap_or(Value::Null);
        let transformed = t.transform(&raw, sub, flat, path, ctx, FieldPosition::Subfield);
        path.pop();
        row.insert(sub.name.clone(), transformed);
    }
    row
}

/// Read the sibling counter entry at the accumulator's joined key.
///
/// The counter is an integer, or the group's value list itself, whose
/// length is the count. A missing counter is a structural mismatch and
/// reads as "no rows".
fn row_count(flat: &RecordFieldMap, path: &FieldPath) -> Option<usize> {
    match flat.get(&path.flat_key())? {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::Array(items) => Some(items.len()),
        Value::String(s) => {
            let trimmed = s.trim();
            if let Ok(n) = trimmed.parse::<usize>() {
                return Some(n);
            }
            match serde_json::from_str::<Value>(trimmed) {
                Ok(Value::Array(items)) => Some(items.len()),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Ordered variant names from the group's own value.
fn variant_names(value: &Value) -> Vec<String> {
    let names_of = |items: &[Value]| {
        items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect::<Vec<_>>()
    };
    match value {
        Value::Array(items) => names_of(items),
        Value::String(s) => match serde_json::from_str::<Value>(s.trim()) {
            Ok(Value::Array(items)) => names_of(&items),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}
