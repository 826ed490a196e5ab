//! Block content processing
//!
//! Parses a serialized block document into a tree of block nodes, rewrites
//! the typed-data attribute payload of managed blocks field by field through
//! the value transformer, and re-serializes the tree back to the exact
//! block markup grammar. Non-managed blocks round-trip byte for byte; a
//! document with no block markers at all is returned unchanged.
//!
//! Copyright (c) 2025 Crossport Team
//! Licensed under the Apache-2.0 license

pub mod escape;
pub mod parser;
pub mod serializer;

use serde_json::{Map, Value};
use tracing::debug;

use crate::transform::{FieldPosition, FieldTransformer};
use crate::types::{FieldPath, ResolutionContext};

pub use escape::EscapeContext;
pub use parser::{has_block_markers, parse_document, BLOCK_MARKER};
pub use serializer::serialize_document;

/// Namespace prefix of blocks whose typed data this core manages.
pub const MANAGED_BLOCK_PREFIX: &str = "acf/";

/// Attribute key carrying a managed block's typed field data.
pub const DATA_ATTRIBUTE: &str = "data";

/// One interleaving slot of a block's inner content: either a raw HTML
/// fragment or a placeholder consumed by the next inner block in order.
#[derive(Debug, Clone, PartialEq)]
pub enum InnerSegment {
    Html(String),
    Block,
}

/// One node of a parsed block document.
///
/// A node with no name is raw HTML between blocks. `attrs_raw` holds the
/// attribute JSON exactly as it appeared in the source document and is
/// reused verbatim on serialization; the transform pass clears it when it
/// rewrites the node, switching serialization to the escaping encoder.
///
/// Invariant: the number of [`InnerSegment::Block`] placeholders in
/// `inner_content` equals `inner_blocks.len()`.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockNode {
    pub name: Option<String>,
    pub attrs: Map<String, Value>,
    pub attrs_raw: Option<String>,
    pub inner_content: Vec<InnerSegment>,
    pub inner_blocks: Vec<BlockNode>,
}

impl BlockNode {
    /// Raw-HTML-only node.
    pub fn raw(html: String) -> Self {
        Self {
            name: None,
            attrs: Map::new(),
            attrs_raw: None,
            inner_content: vec![InnerSegment::Html(html)],
            inner_blocks: Vec::new(),
        }
    }
}

/// Depth-first transformer over a parsed block tree.
pub struct BlockProcessor<'a> {
    transformer: &'a FieldTransformer<'a>,
    managed_prefix: String,
}

impl<'a> BlockProcessor<'a> {
    pub fn new(transformer: &'a FieldTransformer<'a>) -> Self {
        Self {
            transformer,
            managed_prefix: MANAGED_BLOCK_PREFIX.to_string(),
        }
    }

    pub fn with_managed_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.managed_prefix = prefix.into();
        self
    }

    /// Transform a serialized block document for the destination instance.
    pub fn process(&self, content: &str, ctx: &ResolutionContext) -> String {
        if !has_block_markers(content) {
            return content.to_string();
        }
        let escape_ctx = EscapeContext::scan(content);
        let mut nodes = parse_document(content);
        debug!(blocks = nodes.len(), "parsed block document");
        for node in &mut nodes {
            self.transform_node(node, ctx);
        }
        serialize_document(&nodes, &escape_ctx)
    }

    /// Rewrite one node, innermost blocks first.
    fn transform_node(&self, node: &mut BlockNode, ctx: &ResolutionContext) {
        for inner in &mut node.inner_blocks {
            self.transform_node(inner, ctx);
        }

        let managed = node
            .name
            .as_deref()
            .is_some_and(|name| name.starts_with(&self.managed_prefix));
        if !managed {
            return;
        }
        let Some(data) = node.attrs.get(DATA_ATTRIBUTE).and_then(Value::as_object) else {
            return;
        };
        if data.is_empty() {
            return;
        }
        let data = data.clone();

        let mut fields = Map::new();
        for (key, value) in &data {
            if key.starts_with('_') {
                continue;
            }
            let pointer = data.get(&format!("_{}", key)).and_then(Value::as_str);
            let transformed = match pointer
                .and_then(|p| self.transformer.registry().field_declaration(p))
            {
                Some(decl) => {
                    let mut path = FieldPath::seeded(key);
                    self.transformer.transform(
                        value,
                        &decl,
                        &data,
                        &mut path,
                        ctx,
                        FieldPosition::TopLevel,
                    )
                }
                // Unmanaged fields pass through unchanged.
                None => value.clone(),
            };
            fields.insert(key.clone(), transformed);
            if let Some(pointer) = pointer {
                fields.insert(format!("_{}", key), Value::String(pointer.to_string()));
            }
        }

        node.attrs
            .insert(DATA_ATTRIBUTE.to_string(), Value::Object(fields));
        // The node no longer matches its source text.
        node.attrs_raw = None;
    }
}
