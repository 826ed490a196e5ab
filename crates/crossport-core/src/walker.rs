//! Field-tree walking over a record's flat field map
//!
//! For every flat entry that is not a declaration pointer, the walker
//! recovers the paired opaque identifier from the per-object metadata store,
//! resolves the field declaration, and hands the value to the transformer
//! with a fresh path accumulator seeded with the flat key. Matched entries
//! are reassembled under the transformed map; unmatched entries are left
//! alone, which is how non-managed custom fields pass through untouched.
//!
//! Copyright (c) 2025 Crossport Team
//! Licensed under the Apache-2.0 license

use tracing::debug;

use crate::transform::{FieldPosition, FieldTransformer};
use crate::types::{FieldPath, RecordFieldMap, ResolutionContext, TransformedFieldMap};

/// Reserved prefix marking a flat key as a declaration pointer.
pub const POINTER_PREFIX: char = '_';

/// Result of one walk: the transformed map plus the flat keys it consumed
/// (value keys and their pointer keys), which the caller strips from the
/// record's flat section.
#[derive(Debug, Default)]
pub struct WalkOutcome {
    pub transformed: TransformedFieldMap,
    pub consumed: Vec<String>,
}

/// Walk one record's flat field map and produce its transformed form.
pub fn walk(
    transformer: &FieldTransformer<'_>,
    flat: &RecordFieldMap,
    ctx: &ResolutionContext,
) -> WalkOutcome {
    let mut outcome = WalkOutcome::default();

    for (key, value) in flat {
        if key.starts_with(POINTER_PREFIX) {
            continue;
        }
        let Some(pointer) = transformer
            .registry()
            .declaration_pointer(ctx.source_object_id, key)
        else {
            continue;
        };
        let Some(decl) = transformer.registry().field_declaration(&pointer) else {
            continue;
        };
        debug!(field = %key, kind = ?decl.kind, "transforming field");

        let mut path = FieldPath::seeded(key);
        let transformed =
            transformer.transform(value, &decl, flat, &mut path, ctx, FieldPosition::TopLevel);

        outcome.transformed.insert(key.clone(), transformed);
        outcome.consumed.push(key.clone());
        outcome.consumed.push(format!("{}{}", POINTER_PREFIX, key));
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{InMemoryRegistry, RegistryHandle};
    use crate::resolver::{
        MediaBridge, RemoteCollection, RemoteIndex, RemoteMatch, Resolver, StaticKeySource,
        TableIdentityMap,
    };
    use crate::types::{DestinationInstance, FieldDeclaration, FieldKind, ObjectKind};
    use serde_json::json;
    use std::sync::Arc;
    use url::Url;

    struct NoMedia;
    impl MediaBridge for NoMedia {
        fn crosspost(&self, _id: u64, _d: &DestinationInstance) -> Option<u64> {
            None
        }
    }

    struct NoRemote;
    impl RemoteIndex for NoRemote {
        fn find(
            &self,
            _d: &DestinationInstance,
            _c: &RemoteCollection,
            _k: &[String],
        ) -> Vec<RemoteMatch> {
            Vec::new()
        }
    }

    fn resolver() -> Resolver {
        Resolver::builder()
            .identity_map(Arc::new(TableIdentityMap::new()))
            .media_bridge(Arc::new(NoMedia))
            .key_source(Arc::new(StaticKeySource::new()))
            .remote_index(Arc::new(NoRemote))
            .build()
            .unwrap()
    }

    fn ctx() -> ResolutionContext {
        ResolutionContext::new(
            DestinationInstance::new("dest-1", Url::parse("https://dest.example/").unwrap()),
            42,
            ObjectKind::Post,
        )
    }

    #[test]
    fn test_matched_fields_are_transformed_and_consumed() {
        // Scenario A: an empty managed scalar becomes the absent marker.
        let registry = InMemoryRegistry::new()
            .with_declaration(FieldDeclaration::leaf("field_123", "price", FieldKind::Scalar))
            .with_pointer(42, "price", "field_123");
        let handle = RegistryHandle::new(Arc::new(registry));
        let resolver = resolver();
        let transformer = FieldTransformer::new(&handle, &resolver);

        let flat: RecordFieldMap = json!({ "price": "", "_price": "field_123" })
            .as_object()
            .unwrap()
            .clone();

        let outcome = walk(&transformer, &flat, &ctx());
        assert_eq!(outcome.transformed, json!({ "price": null }).as_object().unwrap().clone());
        assert_eq!(outcome.consumed, vec!["price".to_string(), "_price".to_string()]);
    }

    #[test]
    fn test_unmatched_fields_pass_through() {
        let handle = RegistryHandle::new(Arc::new(InMemoryRegistry::new()));
        let resolver = resolver();
        let transformer = FieldTransformer::new(&handle, &resolver);

        let flat: RecordFieldMap = json!({ "seo_score": "88", "_edit_lock": "x" })
            .as_object()
            .unwrap()
            .clone();

        let outcome = walk(&transformer, &flat, &ctx());
        assert!(outcome.transformed.is_empty());
        assert!(outcome.consumed.is_empty());
    }

    #[test]
    fn test_pointer_keys_are_never_walked() {
        // A declaration pointer never produces its own transformed entry,
        // even when the registry would resolve its base name.
        let registry = InMemoryRegistry::new()
            .with_declaration(FieldDeclaration::leaf("field_1", "title", FieldKind::Scalar))
            .with_pointer(42, "title", "field_1")
            .with_pointer(42, "_title", "field_1");
        let handle = RegistryHandle::new(Arc::new(registry));
        let resolver = resolver();
        let transformer = FieldTransformer::new(&handle, &resolver);

        let flat: RecordFieldMap = json!({ "title": "Hi", "_title": "field_1" })
            .as_object()
            .unwrap()
            .clone();

        let outcome = walk(&transformer, &flat, &ctx());
        assert_eq!(outcome.transformed.len(), 1);
        assert!(outcome.transformed.contains_key("title"));
    }
}
