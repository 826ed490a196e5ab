//! Identifier resolution across instances
//!
//! Maps source-side entity identifiers (attachments, content objects,
//! taxonomy terms, users) to their destination-side counterparts. Media and
//! generic entities resolve through persisted local mappings maintained by
//! external collaborators; terms and users carry no local mapping and are
//! matched by stable natural key (term slug, user handle) through a remote
//! read query against the destination. A miss is never an error: callers
//! fold `None` and empty batches into the field kind's empty policy.
//!
//! Copyright (c) 2025 Crossport Team
//! Licensed under the Apache-2.0 license

pub mod remote;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::types::DestinationInstance;

pub use remote::{HttpRemoteIndex, RemoteIndexConfig};

/// Natural-key batches are capped at this many keys per remote call.
pub const NATURAL_KEY_PAGE_SIZE: usize = 20;

/// Identifier spaces covered by the persisted local mapping table.
///
/// Media mappings are normally reached through [`MediaBridge`], which
/// maintains the table as it transfers files; the variant exists for direct
/// table reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MappingKind {
    Media,
    Entity,
}

/// Persisted source-id → destination-id mapping, maintained by an external
/// collaborator. This core only reads it.
pub trait IdentityMap: Send + Sync {
    fn lookup(
        &self,
        kind: MappingKind,
        source_id: u64,
        destination: &DestinationInstance,
    ) -> Option<u64>;
}

/// Media transfer collaborator, invoked once per media reference. Returns
/// the destination-side attachment id when the reference exists (or was
/// just transferred) there.
pub trait MediaBridge: Send + Sync {
    fn crosspost(&self, source_media_id: u64, destination: &DestinationInstance) -> Option<u64>;
}

/// Subtype-specific resolver for catalog items, which keep their own
/// identifier-mapping table. `governs` is the runtime subtype check deciding
/// whether a referenced id belongs to the catalog space.
pub trait CatalogBridge: Send + Sync {
    fn governs(&self, source_id: u64) -> bool;

    fn crosspost(&self, source_id: u64, destination: &DestinationInstance) -> Option<u64>;
}

/// Origin-side natural keys for entities that resolve without a local
/// mapping.
pub trait KeySource: Send + Sync {
    fn term_slug(&self, term_id: u64) -> Option<String>;

    fn user_handle(&self, user_id: u64) -> Option<String>;
}

/// Destination collections searchable by natural key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCollection {
    Terms { taxonomy: String },
    Users,
}

/// One destination-side match for a natural-key query.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct RemoteMatch {
    pub id: u64,
    pub slug: String,
}

/// Exact natural-key search against the destination instance. A transport
/// failure returns the empty list, identical to "no matches".
pub trait RemoteIndex: Send + Sync {
    fn find(
        &self,
        destination: &DestinationInstance,
        collection: &RemoteCollection,
        keys: &[String],
    ) -> Vec<RemoteMatch>;
}

/// Bundle of the collaborator handles every resolution path needs.
///
/// Cheap to clone; all collaborators sit behind `Arc`.
#[derive(Clone)]
pub struct Resolver {
    identity: Arc<dyn IdentityMap>,
    media: Arc<dyn MediaBridge>,
    catalog: Option<Arc<dyn CatalogBridge>>,
    keys: Arc<dyn KeySource>,
    remote: Arc<dyn RemoteIndex>,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("has_catalog", &self.catalog.is_some())
            .finish_non_exhaustive()
    }
}

impl Resolver {
    pub fn builder() -> ResolverBuilder {
        ResolverBuilder::default()
    }

    /// Resolve one attachment reference through the media transfer
    /// collaborator.
    pub fn resolve_media(&self, source_id: u64, destination: &DestinationInstance) -> Option<u64> {
        self.media.crosspost(source_id, destination)
    }

    /// Resolve one cross-entity reference. Ids governed by the catalog
    /// subtype delegate to its own table; everything else goes through the
    /// generic entity mapping.
    pub fn resolve_entity(&self, source_id: u64, destination: &DestinationInstance) -> Option<u64> {
        if let Some(catalog) = &self.catalog {
            if catalog.governs(source_id) {
                return catalog.crosspost(source_id, destination);
            }
        }
        self.identity
            .lookup(MappingKind::Entity, source_id, destination)
    }

    /// Resolve taxonomy-term ids by slug. Order of the input is preserved;
    /// ids with no origin slug or no destination match are silently dropped.
    pub fn resolve_terms(
        &self,
        source_ids: &[u64],
        taxonomy: &str,
        destination: &DestinationInstance,
    ) -> Vec<u64> {
        let collection = RemoteCollection::Terms {
            taxonomy: taxonomy.to_string(),
        };
        self.resolve_by_natural_key(source_ids, &collection, destination, |id| {
            self.keys.term_slug(id)
        })
    }

    /// Resolve user ids by stable handle, preserving input order and
    /// silently dropping misses.
    pub fn resolve_users(
        &self,
        source_ids: &[u64],
        destination: &DestinationInstance,
    ) -> Vec<u64> {
        self.resolve_by_natural_key(source_ids, &RemoteCollection::Users, destination, |id| {
            self.keys.user_handle(id)
        })
    }

    fn resolve_by_natural_key<F>(
        &self,
        source_ids: &[u64],
        collection: &RemoteCollection,
        destination: &DestinationInstance,
        key_of: F,
    ) -> Vec<u64>
    where
        F: Fn(u64) -> Option<String>,
    {
        let keyed: Vec<(u64, String)> = source_ids
            .iter()
            .filter_map(|&id| key_of(id).map(|key| (id, key)))
            .collect();
        if keyed.is_empty() {
            return Vec::new();
        }

        let mut matches: HashMap<String, u64> = HashMap::new();
        for chunk in keyed.chunks(NATURAL_KEY_PAGE_SIZE) {
            let keys: Vec<String> = chunk.iter().map(|(_, key)| key.clone()).collect();
            for found in self.remote.find(destination, collection, &keys) {
                matches.insert(found.slug, found.id);
            }
        }
        debug!(
            requested = keyed.len(),
            matched = matches.len(),
            "natural-key resolution"
        );

        keyed
            .iter()
            .filter_map(|(_, key)| matches.get(key).copied())
            .collect()
    }
}

/// Builder for [`Resolver`]. The catalog bridge is optional; every other
/// collaborator is required.
#[derive(Default)]
pub struct ResolverBuilder {
    identity: Option<Arc<dyn IdentityMap>>,
    media: Option<Arc<dyn MediaBridge>>,
    catalog: Option<Arc<dyn CatalogBridge>>,
    keys: Option<Arc<dyn KeySource>>,
    remote: Option<Arc<dyn RemoteIndex>>,
}

impl ResolverBuilder {
    pub fn identity_map(mut self, identity: Arc<dyn IdentityMap>) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn media_bridge(mut self, media: Arc<dyn MediaBridge>) -> Self {
        self.media = Some(media);
        self
    }

    pub fn catalog_bridge(mut self, catalog: Arc<dyn CatalogBridge>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn key_source(mut self, keys: Arc<dyn KeySource>) -> Self {
        self.keys = Some(keys);
        self
    }

    pub fn remote_index(mut self, remote: Arc<dyn RemoteIndex>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn build(self) -> crate::Result<Resolver> {
        let missing = |what: &str| crate::Error::Configuration {
            message: format!("resolver is missing its {} collaborator", what),
            source: None,
        };
        Ok(Resolver {
            identity: self.identity.ok_or_else(|| missing("identity map"))?,
            media: self.media.ok_or_else(|| missing("media bridge"))?,
            catalog: self.catalog,
            keys: self.keys.ok_or_else(|| missing("key source"))?,
            remote: self.remote.ok_or_else(|| missing("remote index"))?,
        })
    }
}

/// HashMap-backed local mapping table adapter.
#[derive(Debug, Default)]
pub struct TableIdentityMap {
    entries: HashMap<(MappingKind, String, u64), u64>,
}

impl TableIdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mapping(
        mut self,
        kind: MappingKind,
        destination_key: impl Into<String>,
        source_id: u64,
        destination_id: u64,
    ) -> Self {
        self.entries
            .insert((kind, destination_key.into(), source_id), destination_id);
        self
    }
}

impl IdentityMap for TableIdentityMap {
    fn lookup(
        &self,
        kind: MappingKind,
        source_id: u64,
        destination: &DestinationInstance,
    ) -> Option<u64> {
        self.entries
            .get(&(kind, destination.key.clone(), source_id))
            .copied()
    }
}

/// Static origin-side natural-key snapshot.
#[derive(Debug, Default)]
pub struct StaticKeySource {
    term_slugs: HashMap<u64, String>,
    user_handles: HashMap<u64, String>,
}

impl StaticKeySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_term(mut self, term_id: u64, slug: impl Into<String>) -> Self {
        self.term_slugs.insert(term_id, slug.into());
        self
    }

    pub fn with_user(mut self, user_id: u64, handle: impl Into<String>) -> Self {
        self.user_handles.insert(user_id, handle.into());
        self
    }
}

impl KeySource for StaticKeySource {
    fn term_slug(&self, term_id: u64) -> Option<String> {
        self.term_slugs.get(&term_id).cloned()
    }

    fn user_handle(&self, user_id: u64) -> Option<String> {
        self.user_handles.get(&user_id).cloned()
    }
}
