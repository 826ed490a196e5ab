//! Core types for the crossport transformation engine
//!
//! Data structures shared by the resolver, the field transformer, the
//! field-tree walker and the block processor: field declarations, the flat
//! field map convention, the per-run resolution context and the destination
//! instance descriptor.
//!
//! Copyright (c) 2025 Crossport Team
//! Licensed under the Apache-2.0 license

use serde::{Deserialize, Serialize};
use url::Url;

/// Flat field-data section of a record as produced by the origin instance.
///
/// Keys follow the origin convention where a leading-underscore key of the
/// same base name (`_price` for `price`) holds the opaque identifier of the
/// field declaration governing that key.
pub type RecordFieldMap = serde_json::Map<String, serde_json::Value>;

/// Field-data section delivered to the destination instance, keyed by field
/// name and nested for composite kinds.
pub type TransformedFieldMap = serde_json::Map<String, serde_json::Value>;

/// Closed taxonomy of custom-field kinds.
///
/// Registry tags outside the known set map to [`FieldKind::Opaque`], whose
/// transform is the identity: unrecognized kinds are left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Plain scalar content (text, number, email). Empty string normalizes
    /// to the explicit absent marker (`null`).
    Scalar,
    /// Structured link value. Empty input normalizes to an empty-but-present
    /// `{"title":"","url":""}` object, never to the absent marker.
    Link,
    /// Single or multi attachment reference.
    Media,
    /// Single or multi cross-entity reference, including catalog-item
    /// subtypes resolved through their own mapping table.
    Entity,
    /// Taxonomy-term reference, resolved across instances by term slug.
    Taxonomy,
    /// User reference, resolved across instances by stable user handle.
    User,
    /// Ordered list of rows over a fixed sub-field set.
    Repeater,
    /// Ordered list of rows, each tagged with a variant name selecting its
    /// sub-field set ("flexible content").
    Flexible,
    /// Single row of a fixed sub-field set, no repetition.
    Group,
    /// Unrecognized registry kind; transformed as identity.
    Opaque,
}

impl FieldKind {
    /// Map an origin registry type tag onto the closed kind taxonomy.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "image" | "file" | "gallery" => FieldKind::Media,
            "relationship" | "post_object" => FieldKind::Entity,
            "taxonomy" => FieldKind::Taxonomy,
            "user" => FieldKind::User,
            "link" => FieldKind::Link,
            "repeater" => FieldKind::Repeater,
            "flexible_content" => FieldKind::Flexible,
            "group" => FieldKind::Group,
            "text" | "textarea" | "wysiwyg" | "number" | "range" | "email" | "url"
            | "password" | "select" | "checkbox" | "radio" | "button_group"
            | "true_false" | "date_picker" | "date_time_picker" | "time_picker"
            | "color_picker" | "oembed" => FieldKind::Scalar,
            _ => FieldKind::Opaque,
        }
    }
}

/// Metadata describing one custom field, owned by the origin instance's
/// field registry and looked up by an opaque identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDeclaration {
    /// Opaque registry identifier (`field_123`), distinct from the name.
    pub key: String,
    /// Human-readable field name; the flat-key segment for this field.
    pub name: String,
    /// Declared kind.
    pub kind: FieldKind,
    /// Taxonomy bound to a [`FieldKind::Taxonomy`] field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taxonomy: Option<String>,
    /// Ordered sub-field set for [`FieldKind::Repeater`] and
    /// [`FieldKind::Group`].
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_fields: Vec<FieldDeclaration>,
    /// Variant-name → ordered sub-field set for [`FieldKind::Flexible`].
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub layouts: Vec<(String, Vec<FieldDeclaration>)>,
}

impl FieldDeclaration {
    /// Leaf declaration with no sub-schema.
    pub fn leaf(key: impl Into<String>, name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            kind,
            taxonomy: None,
            sub_fields: Vec::new(),
            layouts: Vec::new(),
        }
    }

    /// Sub-field set for a flexible-content variant, if declared.
    pub fn layout(&self, variant: &str) -> Option<&[FieldDeclaration]> {
        self.layouts
            .iter()
            .find(|(name, _)| name == variant)
            .map(|(_, fields)| fields.as_slice())
    }
}

/// Growing path accumulator used to address flat row-data and row-count keys
/// for composite fields.
///
/// The origin's flat storage addresses nested repeated data as separately
/// keyed entries (`slides_0_title`, with the row count under `slides`), so
/// composite recursion threads one accumulator, appending the row index and
/// sub-field name on the way down and popping both on the way back up.
#[derive(Debug, Clone, Default)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulator seeded with the root flat key of the field being walked.
    pub fn seeded(root: impl Into<String>) -> Self {
        Self {
            segments: vec![root.into()],
        }
    }

    pub fn push(&mut self, segment: impl Into<String>) {
        self.segments.push(segment.into());
    }

    pub fn pop(&mut self) {
        self.segments.pop();
    }

    /// The flat-map key addressed by the current path.
    pub fn flat_key(&self) -> String {
        self.segments.join("_")
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Record kinds with a transformation entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    /// Generic content object.
    Post,
    /// Catalog item, carrying its flat fields in a `meta_data` list.
    CatalogItem,
    /// Taxonomy term.
    Term,
}

/// Basic credentials for destination-side read queries.
#[derive(Debug, Clone, PartialEq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

/// Descriptor of the destination instance a record is being prepared for.
#[derive(Debug, Clone)]
pub struct DestinationInstance {
    /// Stable key addressing this destination in the local identity-mapping
    /// table.
    pub key: String,
    /// Base URL of the destination's read API.
    pub base_url: Url,
    /// Credentials for read queries, when the destination requires them.
    pub auth: Option<BasicAuth>,
}

impl DestinationInstance {
    pub fn new(key: impl Into<String>, base_url: Url) -> Self {
        Self {
            key: key.into(),
            base_url,
            auth: None,
        }
    }

    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some(BasicAuth {
            username: username.into(),
            password: password.into(),
        });
        self
    }
}

/// Immutable per-run bundle threaded through every recursive transformation
/// call. Carries no mutable state of its own; everything mutable (the flat
/// map, the path accumulator, the per-run declaration cache) is owned by the
/// single in-flight run.
#[derive(Debug, Clone)]
pub struct ResolutionContext {
    /// Destination instance the record is being prepared for.
    pub destination: DestinationInstance,
    /// Identifier of the record on the origin instance.
    pub source_object_id: u64,
    /// Kind of record being transformed.
    pub object_kind: ObjectKind,
}

impl ResolutionContext {
    pub fn new(
        destination: DestinationInstance,
        source_object_id: u64,
        object_kind: ObjectKind,
    ) -> Self {
        Self {
            destination,
            source_object_id,
            object_kind,
        }
    }
}
