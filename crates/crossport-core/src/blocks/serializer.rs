//! Block tree serialization
//!
//! Reproduces the block-comment grammar depth first: an opening comment
//! with the block name and attribute payload, the positional interleaving
//! of raw HTML fragments and nested blocks, and the closing comment — or
//! the self-closing form for nodes with no inner content at all. Nodes the
//! transform pass did not touch emit their source attribute text verbatim,
//! so a document without managed blocks serializes byte for byte.

use super::escape::{encode_attrs, EscapeContext};
use super::{BlockNode, InnerSegment};

/// Serialize an ordered block tree back to document text.
pub fn serialize_document(nodes: &[BlockNode], escape_ctx: &EscapeContext) -> String {
    let mut out = String::new();
    for node in nodes {
        serialize_node(node, escape_ctx, &mut out);
    }
    out
}

fn serialize_node(node: &BlockNode, escape_ctx: &EscapeContext, out: &mut String) {
    let Some(name) = &node.name else {
        // Raw HTML between blocks survives verbatim.
        for segment in &node.inner_content {
            if let InnerSegment::Html(html) = segment {
                out.push_str(html);
            }
        }
        return;
    };

    out.push_str("<!-- wp:");
    out.push_str(name);
    match &node.attrs_raw {
        Some(raw) => {
            out.push(' ');
            out.push_str(raw);
        }
        None if !node.attrs.is_empty() => {
            out.push(' ');
            out.push_str(&encode_attrs(&node.attrs, escape_ctx));
        }
        None => {}
    }

    if node.inner_content.is_empty() && node.inner_blocks.is_empty() {
        out.push_str(" /-->");
        return;
    }

    out.push_str(" -->");
    let mut inner_blocks = node.inner_blocks.iter();
    for segment in &node.inner_content {
        match segment {
            InnerSegment::Html(html) => out.push_str(html),
            InnerSegment::Block => {
                if let Some(inner) = inner_blocks.next() {
                    serialize_node(inner, escape_ctx, out);
                }
            }
        }
    }
    out.push_str("<!-- /wp:");
    out.push_str(name);
    out.push_str(" -->");
}
