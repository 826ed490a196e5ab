//! Crossport Core - record transformation engine for cross-instance publishing
//!
//! This crate prepares a tree-shaped content record produced on one
//! content-management instance for publication on a second, independent
//! instance.
//!
//! # Main Components
//!
//! - **Identifier Resolution**: map source-side entity identifiers
//!   (attachments, content objects, terms, users) to their destination-side
//!   counterparts, via local mapping tables or natural-key remote lookups
//! - **Field-Value Transformation**: per-kind normalization of custom-field
//!   values, with strict empty/zero/absent sentinel policies
//! - **Field-Tree Walking**: rebuild a record's flat field map into the
//!   nested form the destination expects
//! - **Block Content Processing**: parse, rewrite and re-serialize block
//!   markup documents without disturbing unmanaged blocks
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use crossport_core::{Crossposter, DestinationInstance, InMemoryRegistry, Resolver};
//!
//! fn example(resolver: Resolver) -> crossport_core::Result<()> {
//!     let registry = Arc::new(InMemoryRegistry::new());
//!     let core = Crossposter::new(registry, resolver);
//!     let destination = DestinationInstance::new(
//!         "docs-site",
//!         url::Url::parse("https://docs.example.com/wp-json/").unwrap(),
//!     );
//!     let record = serde_json::json!({ "id": 1, "meta": {} });
//!     let _prepared = core.transform_post(record, &destination);
//!     Ok(())
//! }
//! ```

pub mod blocks;
pub mod error;
pub mod pipeline;
pub mod registry;
pub mod resolver;
pub mod transform;
pub mod types;
pub mod walker;

// Re-export main types for convenience
pub use error::{Error, Result};
pub use types::{
    // Field data model
    FieldDeclaration, FieldKind, FieldPath,
    RecordFieldMap, TransformedFieldMap,

    // Per-run context
    BasicAuth, DestinationInstance, ObjectKind, ResolutionContext,
};

pub use registry::{FieldRegistry, InMemoryRegistry, RegistryHandle};
pub use resolver::{
    CatalogBridge, HttpRemoteIndex, IdentityMap, KeySource, MappingKind, MediaBridge,
    RemoteCollection, RemoteIndex, RemoteIndexConfig, RemoteMatch, Resolver, ResolverBuilder,
    StaticKeySource, TableIdentityMap,
};
pub use transform::{FieldPosition, FieldTransformer};
pub use blocks::{BlockNode, BlockProcessor, EscapeContext, InnerSegment};
pub use pipeline::{Crossposter, FilterChain, RecordFilter, BLOCKS_PRIORITY, FIELDS_PRIORITY};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_error_creation() {
        let err = Error::Configuration {
            message: "Test error".to_string(),
            source: None,
        };
        assert!(err.to_string().contains("Test error"));
    }
}
