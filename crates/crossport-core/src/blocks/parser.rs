//! Lenient parser for the block-comment grammar
//!
//! Splits a serialized document into a tree of block nodes: opening comments
//! (`<!-- wp:name {json-attrs} -->`), self-closing comments
//! (`<!-- wp:name {json-attrs} /-->`), closing comments
//! (`<!-- /wp:name -->`), and the raw HTML between them. Parsing is
//! best-effort rather than strict-validate: a comment that does not scan as
//! a block token stays raw HTML, an unmatched closer is demoted to raw HTML,
//! and frames still open at end of input are closed there. The best-effort
//! tree always serializes.
//!
//! Copyright (c) 2025 Crossport Team
//! Licensed under the Apache-2.0 license

use serde_json::Value;

use super::{BlockNode, InnerSegment};

/// Every block token opens with this marker; a document without it contains
/// no blocks at all.
pub const BLOCK_MARKER: &str = "<!-- wp:";

/// Cheap pre-parse check for the no-blocks short circuit.
pub fn has_block_markers(document: &str) -> bool {
    document.contains(BLOCK_MARKER)
}

/// Parse a document into its ordered top-level block nodes.
pub fn parse_document(input: &str) -> Vec<BlockNode> {
    Parser::new(input).parse()
}

#[derive(Debug)]
enum TokenKind {
    Opener {
        name: String,
        attrs_raw: Option<String>,
    },
    Void {
        name: String,
        attrs_raw: Option<String>,
    },
    Closer {
        name: String,
    },
}

#[derive(Debug)]
struct Token {
    start: usize,
    end: usize,
    kind: TokenKind,
}

/// An open block awaiting its closer.
struct Frame {
    node: BlockNode,
}

struct Parser<'a> {
    input: &'a str,
    /// Scan position for the next token search
    pos: usize,
    stack: Vec<Frame>,
    output: Vec<BlockNode>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            stack: Vec::new(),
            output: Vec::new(),
        }
    }

    fn parse(mut self) -> Vec<BlockNode> {
        let mut cursor = 0;
        while let Some(token) = self.next_token() {
            let text = self.input[cursor..token.start].to_string();
            cursor = token.end;
            self.add_html(text);
            match token.kind {
                TokenKind::Void { name, attrs_raw } => {
                    self.add_block(make_node(name, attrs_raw));
                }
                TokenKind::Opener { name, attrs_raw } => {
                    self.stack.push(Frame {
                        node: make_node(name, attrs_raw),
                    });
                }
                TokenKind::Closer { name } => {
                    let matches = self
                        .stack
                        .last()
                        .map_or(false, |f| f.node.name.as_deref() == Some(name.as_str()));
                    if matches {
                        let frame = self.stack.pop().expect("matched frame");
                        self.add_block(frame.node);
                    } else {
                        // No open block to close: keep the comment as text.
                        let comment = self.input[token.start..token.end].to_string();
                        self.add_html(comment);
                    }
                }
            }
        }
        let trailing = self.input[cursor..].to_string();
        self.add_html(trailing);

        // Frames left open at end of input close here.
        while let Some(frame) = self.stack.pop() {
            self.add_block(frame.node);
        }
        self.output
    }

    fn add_html(&mut self, text: String) {
        if text.is_empty() {
            return;
        }
        match self.stack.last_mut() {
            Some(frame) => frame.node.inner_content.push(InnerSegment::Html(text)),
            None => self.output.push(BlockNode::raw(text)),
        }
    }

    fn add_block(&mut self, node: BlockNode) {
        match self.stack.last_mut() {
            Some(frame) => {
                frame.node.inner_content.push(InnerSegment::Block);
                frame.node.inner_blocks.push(node);
            }
            None => self.output.push(node),
        }
    }

    /// Advance to the next comment that scans as a block token. Comment
    /// openers that do not scan are skipped and remain part of the raw text.
    fn next_token(&mut self) -> Option<Token> {
        while let Some(offset) = self.input[self.pos..].find("<!--") {
            let start = self.pos + offset;
            match self.scan_token(start) {
                Some(token) => {
                    self.pos = token.end;
                    return Some(token);
                }
                None => {
                    self.pos = start + "<!--".len();
                }
            }
        }
        None
    }

    /// Scan one block token beginning at an `<!--` occurrence.
    fn scan_token(&self, start: usize) -> Option<Token> {
        let bytes = self.input.as_bytes();
        let mut i = start + "<!--".len();

        let ws = skip_whitespace(bytes, i);
        if ws == i {
            return None;
        }
        i = ws;

        let closer = bytes.get(i) == Some(&b'/');
        if closer {
            i += 1;
        }
        if !self.input[i..].starts_with("wp:") {
            return None;
        }
        i += "wp:".len();

        let name_end = scan_block_name(bytes, i)?;
        let name = self.input[i..name_end].to_string();
        i = name_end;

        let after_name = skip_whitespace(bytes, i);
        if after_name == i {
            return None;
        }
        i = after_name;

        let mut attrs_raw = None;
        if !closer && bytes.get(i) == Some(&b'{') {
            let json_end = scan_json_object(self.input, i)?;
            attrs_raw = Some(self.input[i..json_end].to_string());
            i = json_end;
            let after_attrs = skip_whitespace(bytes, i);
            if after_attrs == i {
                return None;
            }
            i = after_attrs;
        }

        let void = !closer && bytes.get(i) == Some(&b'/');
        if void {
            i += 1;
        }
        if !self.input[i..].starts_with("-->") {
            return None;
        }
        let end = i + "-->".len();

        let kind = if closer {
            TokenKind::Closer { name }
        } else if void {
            TokenKind::Void { name, attrs_raw }
        } else {
            TokenKind::Opener { name, attrs_raw }
        };
        Some(Token { start, end, kind })
    }
}

fn make_node(name: String, attrs_raw: Option<String>) -> BlockNode {
    let attrs = attrs_raw
        .as_deref()
        .and_then(|raw| serde_json::from_str::<serde_json::Map<String, Value>>(raw).ok())
        .unwrap_or_default();
    BlockNode {
        name: Some(name),
        attrs,
        attrs_raw,
        inner_content: Vec::new(),
        inner_blocks: Vec::new(),
    }
}

fn skip_whitespace(bytes: &[u8], mut i: usize) -> usize {
    while bytes.get(i).is_some_and(|b| b.is_ascii_whitespace()) {
        i += 1;
    }
    i
}

/// Block names are `name` or `namespace/name`, lowercase alphanumeric with
/// dashes and underscores, starting with a letter.
fn scan_block_name(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = scan_name_part(bytes, start)?;
    if bytes.get(i) == Some(&b'/') {
        i = scan_name_part(bytes, i + 1)?;
    }
    Some(i)
}

fn scan_name_part(bytes: &[u8], start: usize) -> Option<usize> {
    if !bytes.get(start).is_some_and(|b| b.is_ascii_lowercase()) {
        return None;
    }
    let mut i = start + 1;
    while bytes
        .get(i)
        .is_some_and(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-' || *b == b'_')
    {
        i += 1;
    }
    Some(i)
}

/// Find the end of the attribute JSON object (index just past the matching
/// brace), tracking string context so braces and comment terminators inside
/// string values do not end the scan early.
fn scan_json_object(input: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, c) in input[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset + 1);
                }
            }
            _ => {}
        }
    }
    None
}
