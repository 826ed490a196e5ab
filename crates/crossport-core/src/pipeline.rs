//! Record transformation entry points and delivery-pipeline hooks
//!
//! The enclosing delivery pipeline invokes registered record filters in
//! priority order right before a record is published to the destination.
//! This module provides that registration surface ([`FilterChain`]) and the
//! [`Crossposter`], which hooks field-tree transformation at priority 25 and
//! block-content transformation at priority 30 — fields first, so the flat
//! section has settled before the body is rewritten — and exposes one
//! direct entry point per record kind.
//!
//! Copyright (c) 2025 Crossport Team
//! Licensed under the Apache-2.0 license

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use crate::blocks::{BlockProcessor, MANAGED_BLOCK_PREFIX};
use crate::registry::{FieldRegistry, RegistryHandle};
use crate::resolver::Resolver;
use crate::transform::FieldTransformer;
use crate::types::{DestinationInstance, ObjectKind, RecordFieldMap, ResolutionContext};
use crate::walker;

/// Priority of the field-tree transformation hook.
pub const FIELDS_PRIORITY: i32 = 25;

/// Priority of the block-content transformation hook.
pub const BLOCKS_PRIORITY: i32 = 30;

/// A record filter: takes the record being prepared and, when the hook was
/// registered with arity 2, the destination descriptor.
pub type RecordFilter = Arc<dyn Fn(Value, Option<&DestinationInstance>) -> Value + Send + Sync>;

struct Hook {
    priority: i32,
    accepted_args: usize,
    callback: RecordFilter,
}

/// Priority-ordered chain of record filters. Registration order is kept for
/// equal priorities.
#[derive(Default)]
pub struct FilterChain {
    hooks: Vec<Hook>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a filter at a priority with a declared callback arity.
    /// Callbacks registered with arity 1 receive the record only.
    pub fn add_filter(&mut self, priority: i32, accepted_args: usize, callback: RecordFilter) {
        self.hooks.push(Hook {
            priority,
            accepted_args,
            callback,
        });
        self.hooks.sort_by_key(|hook| hook.priority);
    }

    /// Run the record through every filter, lowest priority first.
    pub fn apply(&self, record: Value, destination: &DestinationInstance) -> Value {
        let mut record = record;
        for hook in &self.hooks {
            let dest = (hook.accepted_args >= 2).then_some(destination);
            record = (hook.callback)(record, dest);
        }
        record
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

/// The transformation core: field registry plus resolver, applied to whole
/// records on their way to a destination instance.
pub struct Crossposter {
    registry: Arc<dyn FieldRegistry>,
    resolver: Resolver,
    managed_prefix: String,
}

impl Crossposter {
    pub fn new(registry: Arc<dyn FieldRegistry>, resolver: Resolver) -> Self {
        Self {
            registry,
            resolver,
            managed_prefix: MANAGED_BLOCK_PREFIX.to_string(),
        }
    }

    /// Override the managed block namespace prefix.
    pub fn with_managed_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.managed_prefix = prefix.into();
        self
    }

    /// Hook both transformation passes into a delivery chain for one record
    /// kind: fields at priority 25, blocks at priority 30, arity 2 each.
    pub fn register(self: Arc<Self>, chain: &mut FilterChain, kind: ObjectKind) {
        let core = Arc::clone(&self);
        chain.add_filter(
            FIELDS_PRIORITY,
            2,
            Arc::new(move |record, dest| match dest {
                Some(dest) => core.process_fields(record, dest, kind),
                None => record,
            }),
        );
        let core = self;
        chain.add_filter(
            BLOCKS_PRIORITY,
            2,
            Arc::new(move |record, dest| match dest {
                Some(dest) => core.process_blocks(record, dest, kind),
                None => record,
            }),
        );
    }

    /// Transform a generic content object.
    pub fn transform_post(&self, record: Value, destination: &DestinationInstance) -> Value {
        let record = self.process_fields(record, destination, ObjectKind::Post);
        self.process_blocks(record, destination, ObjectKind::Post)
    }

    /// Transform a catalog item.
    pub fn transform_catalog_item(
        &self,
        record: Value,
        destination: &DestinationInstance,
    ) -> Value {
        let record = self.process_fields(record, destination, ObjectKind::CatalogItem);
        self.process_blocks(record, destination, ObjectKind::CatalogItem)
    }

    /// Transform a taxonomy term. Terms carry no content body.
    pub fn transform_term(&self, record: Value, destination: &DestinationInstance) -> Value {
        self.process_fields(record, destination, ObjectKind::Term)
    }

    /// Field-tree pass: walk the record's flat field section and reassemble
    /// matched fields under the transformed section. Records without a flat
    /// section or without an id pass through untouched.
    pub fn process_fields(
        &self,
        record: Value,
        destination: &DestinationInstance,
        kind: ObjectKind,
    ) -> Value {
        let Value::Object(mut map) = record else {
            return record;
        };
        let Some(object_id) = map.get("id").and_then(Value::as_u64).filter(|&id| id != 0) else {
            return Value::Object(map);
        };

        let ctx = ResolutionContext::new(destination.clone(), object_id, kind);
        let handle = RegistryHandle::new(self.registry.clone());
        let transformer = FieldTransformer::new(&handle, &self.resolver);

        match kind {
            ObjectKind::Post | ObjectKind::Term => {
                let Some(flat) = map.get("meta").and_then(Value::as_object).cloned() else {
                    return Value::Object(map);
                };
                let outcome = walker::walk(&transformer, &flat, &ctx);
                if outcome.transformed.is_empty() {
                    return Value::Object(map);
                }
                debug!(fields = outcome.transformed.len(), "reassembled field map");

                let mut flat = flat;
                for key in &outcome.consumed {
                    flat.remove(key);
                }
                map.insert("meta".to_string(), Value::Object(flat));

                let mut acf = map
                    .get("acf")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default();
                for (key, value) in outcome.transformed {
                    acf.insert(key, value);
                }
                map.insert("acf".to_string(), Value::Object(acf));
            }
            ObjectKind::CatalogItem => {
                let Some(entries) = map.get("meta_data").and_then(Value::as_array).cloned() else {
                    return Value::Object(map);
                };
                let mut flat = RecordFieldMap::new();
                for entry in &entries {
                    if let (Some(key), Some(value)) = (
                        entry.get("key").and_then(Value::as_str),
                        entry.get("value"),
                    ) {
                        flat.insert(key.to_string(), value.clone());
                    }
                }
                let outcome = walker::walk(&transformer, &flat, &ctx);
                if outcome.transformed.is_empty() {
                    return Value::Object(map);
                }

                let rebuilt: Vec<Value> = entries
                    .into_iter()
                    .filter_map(|entry| {
                        let Some(key) = entry.get("key").and_then(Value::as_str) else {
                            return Some(entry);
                        };
                        if let Some(transformed) = outcome.transformed.get(key) {
                            let mut entry = entry
                                .as_object()
                                .cloned()
                                .unwrap_or_else(Map::new);
                            entry.insert("value".to_string(), transformed.clone());
                            return Some(Value::Object(entry));
                        }
                        // Pointer entries of matched fields are dropped.
                        let consumed = outcome.consumed.iter().any(|c| c == key);
                        (!consumed).then_some(entry)
                    })
                    .collect();
                map.insert("meta_data".to_string(), Value::Array(rebuilt));
            }
        }
        Value::Object(map)
    }

    /// Block-content pass: rewrite the record's body through the block
    /// processor. Records without a body, and record kinds without one,
    /// pass through untouched.
    pub fn process_blocks(
        &self,
        record: Value,
        destination: &DestinationInstance,
        kind: ObjectKind,
    ) -> Value {
        let content_key = match kind {
            ObjectKind::Post => "content",
            ObjectKind::CatalogItem => "description",
            ObjectKind::Term => return record,
        };
        let Value::Object(mut map) = record else {
            return record;
        };
        let Some(content) = map.get(content_key).and_then(Value::as_str) else {
            return Value::Object(map);
        };

        let object_id = map.get("id").and_then(Value::as_u64).unwrap_or(0);
        let ctx = ResolutionContext::new(destination.clone(), object_id, kind);
        let handle = RegistryHandle::new(self.registry.clone());
        let transformer = FieldTransformer::new(&handle, &self.resolver);
        let processor =
            BlockProcessor::new(&transformer).with_managed_prefix(self.managed_prefix.clone());

        let processed = processor.process(content, &ctx);
        map.insert(content_key.to_string(), Value::String(processed));
        Value::Object(map)
    }
}
