//! Field-value transformation
//!
//! Dispatches one field's raw value by its declared kind and produces the
//! destination-ready value. Leaf kinds re-resolve identifiers through the
//! resolver and fold misses into kind-specific sentinels; composite kinds
//! recurse through the row logic in [`groups`]. The destination's update API
//! is strict about empty values, so the sentinel policy matters:
//!
//! - `Scalar`: empty string becomes the explicit absent marker (`null`).
//! - `Link`: empty input becomes `{"title":"","url":""}`, never `null`.
//! - `Media`: unresolved scalar input becomes `[]` at the top level but `0`
//!   in a composite leaf, which cannot store an absent value.
//! - `Entity`/`Taxonomy`: nothing resolved becomes `0`, a deliberately
//!   falsy sentinel that satisfies destination-side required-field checks
//!   without supplying real data.
//! - `User`: nothing resolved becomes the empty list.
//!
//! Copyright (c) 2025 Crossport Team
//! Licensed under the Apache-2.0 license

mod groups;

use serde_json::{json, Value};

use crate::registry::RegistryHandle;
use crate::resolver::Resolver;
use crate::types::{FieldDeclaration, FieldKind, FieldPath, RecordFieldMap, ResolutionContext};

/// Where a value sits relative to its record: composite leaves trade the
/// absent marker for `0` because the destination composite-field API cannot
/// store an absent leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPosition {
    TopLevel,
    Subfield,
}

/// Per-run transformer over one record's flat field map.
pub struct FieldTransformer<'a> {
    registry: &'a RegistryHandle,
    resolver: &'a Resolver,
}

impl<'a> FieldTransformer<'a> {
    pub fn new(registry: &'a RegistryHandle, resolver: &'a Resolver) -> Self {
        Self { registry, resolver }
    }

    pub fn registry(&self) -> &RegistryHandle {
        self.registry
    }

    /// Transform one field's raw value into its destination-ready form.
    ///
    /// `flat` is the record's flat field map, consulted by composite kinds
    /// for row counts and row data; `path` is the growing accumulator whose
    /// joined form addresses those flat keys. The accumulator must already
    /// end with this field's own flat-key segment when called.
    pub fn transform(
        &self,
        value: &Value,
        decl: &FieldDeclaration,
        flat: &RecordFieldMap,
        path: &mut FieldPath,
        ctx: &ResolutionContext,
        position: FieldPosition,
    ) -> Value {
        match decl.kind {
            FieldKind::Scalar => scalar(value),
            FieldKind::Link => link(value),
            FieldKind::Media => self.media(value, ctx, position),
            FieldKind::Entity => self.entity(value, ctx),
            FieldKind::Taxonomy => self.taxonomy(value, decl, ctx),
            FieldKind::User => self.user(value, ctx),
            FieldKind::Repeater => groups::repeater(self, decl, flat, path, ctx),
            FieldKind::Flexible => groups::flexible(self, value, decl, flat, path, ctx),
            FieldKind::Group => groups::group(self, decl, flat, path, ctx),
            FieldKind::Opaque => value.clone(),
        }
    }

    fn media(&self, value: &Value, ctx: &ResolutionContext, position: FieldPosition) -> Value {
        let input = IdInput::decode(value);
        if input.scalar {
            match input
                .ids
                .first()
                .and_then(|&id| self.resolver.resolve_media(id, &ctx.destination))
            {
                Some(id) => json!(id),
                // The composite-field API cannot store an absent leaf.
                None => match position {
                    FieldPosition::Subfield => json!(0),
                    FieldPosition::TopLevel => json!([]),
                },
            }
        } else {
            let resolved: Vec<u64> = input
                .ids
                .iter()
                .filter_map(|&id| self.resolver.resolve_media(id, &ctx.destination))
                .collect();
            json!(resolved)
        }
    }

    fn entity(&self, value: &Value, ctx: &ResolutionContext) -> Value {
        let input = IdInput::decode(value);
        let resolved: Vec<u64> = input
            .ids
            .iter()
            .filter_map(|&id| self.resolver.resolve_entity(id, &ctx.destination))
            .collect();
        sentinel_or_ids(resolved, input.scalar, json!(0))
    }

    fn taxonomy(&self, value: &Value, decl: &FieldDeclaration, ctx: &ResolutionContext) -> Value {
        let input = IdInput::decode(value);
        let taxonomy = decl.taxonomy.as_deref().unwrap_or("category");
        let resolved = self
            .resolver
            .resolve_terms(&input.ids, taxonomy, &ctx.destination);
        sentinel_or_ids(resolved, input.scalar, json!(0))
    }

    fn user(&self, value: &Value, ctx: &ResolutionContext) -> Value {
        let input = IdInput::decode(value);
        let resolved = self.resolver.resolve_users(&input.ids, &ctx.destination);
        sentinel_or_ids(resolved, input.scalar, json!([]))
    }
}

/// Empty string normalizes to the explicit absent marker; everything else
/// passes through.
fn scalar(value: &Value) -> Value {
    match value {
        Value::String(s) if s.is_empty() => Value::Null,
        other => other.clone(),
    }
}

/// Empty input normalizes to an empty-but-present link object; the
/// destination API cannot accept a null link.
fn link(value: &Value) -> Value {
    let empty = match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    };
    if empty {
        json!({ "title": "", "url": "" })
    } else {
        value.clone()
    }
}

fn sentinel_or_ids(resolved: Vec<u64>, scalar: bool, sentinel: Value) -> Value {
    if resolved.is_empty() {
        sentinel
    } else if scalar {
        json!(resolved[0])
    } else {
        json!(resolved)
    }
}

/// A reference value normalized to an id list, remembering whether the
/// origin stored it as a single id or a list. Origin values arrive either
/// as numbers, as lists, or as JSON re-encoded into a string.
pub(crate) struct IdInput {
    pub ids: Vec<u64>,
    pub scalar: bool,
}

impl IdInput {
    pub fn decode(value: &Value) -> Self {
        match value {
            Value::Number(n) => Self {
                ids: n.as_u64().into_iter().collect(),
                scalar: true,
            },
            Value::Array(items) => Self {
                ids: items.iter().filter_map(id_of).collect(),
                scalar: false,
            },
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Self {
                        ids: Vec::new(),
                        scalar: true,
                    };
                }
                if let Ok(decoded) = serde_json::from_str::<Value>(trimmed) {
                    match decoded {
                        Value::Array(items) => {
                            return Self {
                                ids: items.iter().filter_map(id_of).collect(),
                                scalar: false,
                            }
                        }
                        Value::Number(n) => {
                            return Self {
                                ids: n.as_u64().into_iter().collect(),
                                scalar: true,
                            }
                        }
                        _ => {}
                    }
                }
                Self {
                    ids: trimmed.parse::<u64>().ok().into_iter().collect(),
                    scalar: true,
                }
            }
            _ => Self {
                ids: Vec::new(),
                scalar: true,
            },
        }
    }
}

fn id_of(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
