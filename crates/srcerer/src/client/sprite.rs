// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Sprite document parsing.
//!
//! Sprite payloads are small, machine-optimized SVG documents, so a
//! tokenizing parser is enough: elements, attributes, text and CDATA.
//! Comments, processing instructions and doctypes are skipped.

use crate::error::{Result, SrcererError};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref TOKEN_RE: Regex = Regex::new(
        r#"(?s)<!--.*?-->|<\?.*?\?>|<!DOCTYPE[^>]*>|<!\[CDATA\[(?P<cdata>.*?)\]\]>|<(?P<close>/)?(?P<tag>[A-Za-z_][\w:.-]*)(?P<attrs>(?:\s+[^\s=/>]+(?:\s*=\s*(?:"[^"]*"|'[^']*'))?)*)\s*(?P<selfclose>/)?>|(?P<text>[^<]+)"#
    )
    .unwrap();
    static ref ATTR_RE: Regex =
        Regex::new(r#"([^\s=/>]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'))?"#).unwrap();
}

/// A parsed sprite element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpriteNode {
    /// Tag name.
    pub tag: String,
    /// Attributes in source order.
    pub attributes: Vec<(String, String)>,
    /// Child content.
    pub children: Vec<SpriteChild>,
}

/// Child content of a [`SpriteNode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpriteChild {
    /// Nested element.
    Element(SpriteNode),
    /// Text.
    Text(String),
}

impl SpriteNode {
    /// Value of an attribute.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// The `id` attribute.
    pub fn id(&self) -> Option<&str> {
        self.attribute("id")
    }

    /// Every `<svg>` element carrying an id, this one included, in document
    /// order.
    pub fn identified(&self) -> Vec<&SpriteNode> {
        fn walk<'a>(node: &'a SpriteNode, out: &mut Vec<&'a SpriteNode>) {
            if node.tag == "svg" && node.id().is_some() {
                out.push(node);
            }
            for child in &node.children {
                if let SpriteChild::Element(el) = child {
                    walk(el, out);
                }
            }
        }
        let mut out = Vec::new();
        walk(self, &mut out);
        out
    }
}

fn malformed(message: impl Into<String>) -> SrcererError {
    SrcererError::InvalidArtifact {
        name: "sprite".to_string(),
        message: message.into(),
    }
}

fn decode_entities(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Parses sprite markup into its root element.
///
/// # Errors
///
/// [`SrcererError::InvalidArtifact`] for unbalanced tags, stray markup or a
/// document without a root element.
pub fn parse_sprite(markup: &str) -> Result<SpriteNode> {
    let mut stack: Vec<SpriteNode> = Vec::new();
    let mut root: Option<SpriteNode> = None;
    let mut position = 0;

    for caps in TOKEN_RE.captures_iter(markup) {
        let Some(whole) = caps.get(0) else { continue };
        if whole.start() != position {
            return Err(malformed(format!("unexpected markup at byte {}", position)));
        }
        position = whole.end();

        if let Some(text) = caps.name("text").or_else(|| caps.name("cdata")) {
            let text = if caps.name("cdata").is_some() {
                text.as_str().to_string()
            } else {
                decode_entities(text.as_str())
            };
            if let Some(parent) = stack.last_mut() {
                if !text.trim().is_empty() {
                    parent.children.push(SpriteChild::Text(text));
                }
            } else if !text.trim().is_empty() {
                return Err(malformed("text outside the root element"));
            }
            continue;
        }

        let Some(tag) = caps.name("tag") else {
            // comment, declaration or doctype
            continue;
        };
        let tag = tag.as_str().to_string();

        if caps.name("close").is_some() {
            let node = stack
                .pop()
                .ok_or_else(|| malformed(format!("unexpected </{}>", tag)))?;
            if node.tag != tag {
                return Err(malformed(format!("</{}> closes <{}>", tag, node.tag)));
            }
            attach(&mut stack, &mut root, node)?;
            continue;
        }

        let attributes = caps
            .name("attrs")
            .map(|a| {
                ATTR_RE
                    .captures_iter(a.as_str())
                    .map(|ac| {
                        let value = ac
                            .get(2)
                            .or_else(|| ac.get(3))
                            .map(|v| decode_entities(v.as_str()))
                            .unwrap_or_default();
                        (ac[1].to_string(), value)
                    })
                    .collect()
            })
            .unwrap_or_default();

        let node = SpriteNode {
            tag,
            attributes,
            children: Vec::new(),
        };

        if caps.name("selfclose").is_some() {
            attach(&mut stack, &mut root, node)?;
        } else {
            stack.push(node);
        }
    }

    if position != markup.len() {
        return Err(malformed(format!("unexpected markup at byte {}", position)));
    }
    if let Some(open) = stack.last() {
        return Err(malformed(format!("<{}> is never closed", open.tag)));
    }
    root.ok_or_else(|| malformed("no root element"))
}

fn attach(stack: &mut [SpriteNode], root: &mut Option<SpriteNode>, node: SpriteNode) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(SpriteChild::Element(node)),
        None if root.is_none() => *root = Some(node),
        None => return Err(malformed("more than one root element")),
    }
    Ok(())
}
