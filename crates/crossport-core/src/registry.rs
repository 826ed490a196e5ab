//! Field-declaration registry boundary
//!
//! The origin instance owns the field registry; this module defines the
//! narrow read interface the core consumes, plus a per-run memoizing handle
//! so one transformation run resolves each declaration at most once. The
//! cache lives and dies with the run.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use crate::types::FieldDeclaration;

/// Read access to the origin instance's field registry.
///
/// `field_declaration` resolves an opaque identifier to its declaration;
/// `declaration_pointer` recovers, from the origin's per-object metadata
/// store, which opaque identifier governs a given flat key on a given
/// object. Both return `None` for fields the registry does not manage —
/// never an error.
pub trait FieldRegistry: Send + Sync {
    fn field_declaration(&self, key: &str) -> Option<FieldDeclaration>;

    fn declaration_pointer(&self, object_id: u64, field_name: &str) -> Option<String>;
}

/// Per-run registry handle memoizing declaration lookups.
///
/// Declarations are immutable for the duration of a run, and composite
/// fields resolve the same sub-declarations once per row, so the handle
/// caches by opaque key. Single-threaded by design (`RefCell`): a handle is
/// owned by exactly one in-flight run and discarded at its end.
pub struct RegistryHandle {
    inner: Arc<dyn FieldRegistry>,
    cache: RefCell<HashMap<String, Option<FieldDeclaration>>>,
}

impl RegistryHandle {
    pub fn new(inner: Arc<dyn FieldRegistry>) -> Self {
        Self {
            inner,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Resolve a declaration by opaque key, memoized for this run.
    pub fn field_declaration(&self, key: &str) -> Option<FieldDeclaration> {
        if let Some(cached) = self.cache.borrow().get(key) {
            return cached.clone();
        }
        let resolved = self.inner.field_declaration(key);
        self.cache
            .borrow_mut()
            .insert(key.to_string(), resolved.clone());
        resolved
    }

    /// Recover the opaque identifier governing a flat key on an object.
    pub fn declaration_pointer(&self, object_id: u64, field_name: &str) -> Option<String> {
        self.inner.declaration_pointer(object_id, field_name)
    }
}

/// HashMap-backed registry, usable as a snapshot adapter over an exported
/// registry or as a test fixture.
#[derive(Debug, Default, Clone)]
pub struct InMemoryRegistry {
    declarations: HashMap<String, FieldDeclaration>,
    pointers: HashMap<(u64, String), String>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a declaration under its own opaque key.
    pub fn with_declaration(mut self, decl: FieldDeclaration) -> Self {
        self.declarations.insert(decl.key.clone(), decl);
        self
    }

    /// Pair a flat key on an object with the opaque identifier of its
    /// declaration.
    pub fn with_pointer(
        mut self,
        object_id: u64,
        field_name: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        self.pointers
            .insert((object_id, field_name.into()), key.into());
        self
    }
}

impl FieldRegistry for InMemoryRegistry {
    fn field_declaration(&self, key: &str) -> Option<FieldDeclaration> {
        self.declarations.get(key).cloned()
    }

    fn declaration_pointer(&self, object_id: u64, field_name: &str) -> Option<String> {
        self.pointers
            .get(&(object_id, field_name.to_string()))
            .cloned()
    }
}
