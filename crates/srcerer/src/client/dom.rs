// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! In-process document tree.
//!
//! An arena of nodes addressed by [`NodeId`]. Removing a node only detaches
//! it; ids stay valid for the lifetime of the document, so stale ids held by
//! component contexts never dangle. [`Document`] is a cheap handle that can
//! be cloned into concurrent load tasks.

use super::sprite::{SpriteChild, SpriteNode};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const VOID_ELEMENTS: &[&str] = &["br", "hr", "img", "input", "link", "meta"];

/// Identifies a node of a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Identifies a registered event listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// What a node is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// An element.
    Element {
        /// Tag name.
        tag: String,
        /// Attributes, including `class`.
        attributes: BTreeMap<String, String>,
        /// Inline style properties.
        styles: BTreeMap<String, String>,
    },
    /// A text node.
    Text(String),
    /// A comment; used as insertion marker.
    Comment(String),
    /// Raw markup inserted as-is.
    Markup(String),
}

/// An event delivered to listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Event name, e.g. `mousedown`.
    pub name: String,
    /// Node the event was dispatched on.
    pub target: NodeId,
}

/// A document-level event listener.
pub type DomListener = Arc<dyn Fn(&Event) + Send + Sync>;

struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    listeners: Vec<(ListenerId, String, DomListener)>,
}

struct Tree {
    nodes: Vec<NodeData>,
    next_listener: u64,
}

impl Tree {
    fn get(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id.0)
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.nodes.get_mut(id.0)
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
            listeners: Vec::new(),
        });
        NodeId(self.nodes.len() - 1)
    }

    fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.get(id).and_then(|n| n.parent) else {
            return;
        };
        if let Some(p) = self.get_mut(parent) {
            p.children.retain(|c| *c != id);
        }
        if let Some(n) = self.get_mut(id) {
            n.parent = None;
        }
    }

    fn is_ancestor(&self, candidate: NodeId, of: NodeId) -> bool {
        let mut current = Some(of);
        while let Some(id) = current {
            if id == candidate {
                return true;
            }
            current = self.get(id).and_then(|n| n.parent);
        }
        false
    }

    fn attach(&mut self, parent: NodeId, child: NodeId, before: Option<NodeId>) -> bool {
        if self.get(parent).is_none() || self.get(child).is_none() || self.is_ancestor(child, parent) {
            return false;
        }
        self.detach(child);
        if let Some(p) = self.get_mut(parent) {
            let index = before
                .and_then(|r| p.children.iter().position(|c| *c == r))
                .unwrap_or(p.children.len());
            p.children.insert(index, child);
        }
        if let Some(c) = self.get_mut(child) {
            c.parent = Some(parent);
        }
        true
    }

    fn element_mut(
        &mut self,
        id: NodeId,
    ) -> Option<(&mut BTreeMap<String, String>, &mut BTreeMap<String, String>)> {
        match self.get_mut(id).map(|n| &mut n.kind) {
            Some(NodeKind::Element {
                attributes, styles, ..
            }) => Some((attributes, styles)),
            _ => None,
        }
    }

    fn text_into(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.get(id) else { return };
        match &node.kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Element { .. } => {
                for child in &node.children {
                    self.text_into(*child, out);
                }
            }
            NodeKind::Comment(_) | NodeKind::Markup(_) => {}
        }
    }

    fn html_into(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.get(id) else { return };
        match &node.kind {
            NodeKind::Text(text) => out.push_str(&escape_text(text)),
            NodeKind::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeKind::Markup(markup) => out.push_str(markup),
            NodeKind::Element {
                tag,
                attributes,
                styles,
            } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attributes {
                    out.push_str(&format!(" {}=\"{}\"", name, escape_attribute(value)));
                }
                if !styles.is_empty() {
                    let style: Vec<String> =
                        styles.iter().map(|(k, v)| format!("{}:{}", k, v)).collect();
                    out.push_str(&format!(" style=\"{}\"", escape_attribute(&style.join(";"))));
                }
                out.push('>');
                if node.children.is_empty() && VOID_ELEMENTS.contains(&tag.as_str()) {
                    return;
                }
                for child in &node.children {
                    self.html_into(*child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attribute(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}

/// Shared handle to a document tree.
#[derive(Clone)]
pub struct Document {
    tree: Arc<Mutex<Tree>>,
    root: NodeId,
    head: NodeId,
    body: NodeId,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.tree().nodes.len())
            .finish()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Creates `<html><head></head><body></body></html>`.
    pub fn new() -> Self {
        let mut tree = Tree {
            nodes: Vec::new(),
            next_listener: 0,
        };
        let root = tree.push(element("html"));
        let head = tree.push(element("head"));
        let body = tree.push(element("body"));
        tree.attach(root, head, None);
        tree.attach(root, body, None);

        Self {
            tree: Arc::new(Mutex::new(tree)),
            root,
            head,
            body,
        }
    }

    fn tree(&self) -> MutexGuard<'_, Tree> {
        self.tree.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The `<html>` element.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The `<head>` element.
    pub fn head(&self) -> NodeId {
        self.head
    }

    /// The `<body>` element.
    pub fn body(&self) -> NodeId {
        self.body
    }

    /// Creates a detached element.
    pub fn create_element(&self, tag: &str) -> NodeId {
        self.tree().push(element(tag))
    }

    /// Creates a detached text node.
    pub fn create_text(&self, text: &str) -> NodeId {
        self.tree().push(NodeKind::Text(text.to_string()))
    }

    /// Creates a detached comment.
    pub fn create_comment(&self, text: &str) -> NodeId {
        self.tree().push(NodeKind::Comment(text.to_string()))
    }

    /// Creates a detached raw-markup node.
    pub fn create_markup(&self, markup: &str) -> NodeId {
        self.tree().push(NodeKind::Markup(markup.to_string()))
    }

    /// Creates a detached element tree from parsed sprite markup.
    pub fn import_sprite(&self, sprite: &SpriteNode) -> NodeId {
        fn build(tree: &mut Tree, node: &SpriteNode) -> NodeId {
            let id = tree.push(NodeKind::Element {
                tag: node.tag.clone(),
                attributes: node.attributes.iter().cloned().collect(),
                styles: BTreeMap::new(),
            });
            for child in &node.children {
                let child_id = match child {
                    SpriteChild::Element(el) => build(tree, el),
                    SpriteChild::Text(text) => tree.push(NodeKind::Text(text.clone())),
                };
                tree.attach(id, child_id, None);
            }
            id
        }
        build(&mut self.tree(), sprite)
    }

    /// Appends `child` as the last child of `parent`, moving it if attached
    /// elsewhere. Returns false when the move would create a cycle.
    pub fn append_child(&self, parent: NodeId, child: NodeId) -> bool {
        self.tree().attach(parent, child, None)
    }

    /// Inserts `child` before `reference` inside `parent`. Appends when
    /// `reference` is not a child of `parent`.
    pub fn insert_before(&self, parent: NodeId, child: NodeId, reference: NodeId) -> bool {
        self.tree().attach(parent, child, Some(reference))
    }

    /// Removes `child` from `parent`. Returns false, and changes nothing,
    /// when `child` is not a child of `parent`.
    pub fn remove_child(&self, parent: NodeId, child: NodeId) -> bool {
        let mut tree = self.tree();
        if tree.get(child).and_then(|n| n.parent) != Some(parent) {
            return false;
        }
        tree.detach(child);
        true
    }

    /// Detaches `node` from its parent.
    pub fn detach(&self, node: NodeId) {
        self.tree().detach(node)
    }

    /// Parent of `node`.
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.tree().get(node).and_then(|n| n.parent)
    }

    /// Children of `node`, in order.
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.tree()
            .get(node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// Whether `node` is reachable from the `<html>` element.
    pub fn is_attached(&self, node: NodeId) -> bool {
        self.tree().is_ancestor(self.root, node)
    }

    /// A copy of the node's kind.
    pub fn kind(&self, node: NodeId) -> Option<NodeKind> {
        self.tree().get(node).map(|n| n.kind.clone())
    }

    /// Tag name of an element.
    pub fn tag_name(&self, node: NodeId) -> Option<String> {
        match self.kind(node) {
            Some(NodeKind::Element { tag, .. }) => Some(tag),
            _ => None,
        }
    }

    /// Whether `node` is a comment.
    pub fn is_comment(&self, node: NodeId) -> bool {
        matches!(
            self.tree().get(node).map(|n| &n.kind),
            Some(NodeKind::Comment(_))
        )
    }

    /// Sets an attribute on an element.
    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        if let Some((attributes, _)) = self.tree().element_mut(node) {
            attributes.insert(name.to_string(), value.to_string());
        }
    }

    /// Removes an attribute from an element.
    pub fn remove_attribute(&self, node: NodeId, name: &str) {
        if let Some((attributes, _)) = self.tree().element_mut(node) {
            attributes.remove(name);
        }
    }

    /// Reads an attribute of an element.
    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        match self.tree().get(node).map(|n| &n.kind) {
            Some(NodeKind::Element { attributes, .. }) => attributes.get(name).cloned(),
            _ => None,
        }
    }

    /// Adds a class to an element's class list.
    pub fn add_class(&self, node: NodeId, class: &str) {
        if let Some((attributes, _)) = self.tree().element_mut(node) {
            let list = attributes.entry("class".to_string()).or_default();
            if !list.split_whitespace().any(|c| c == class) {
                if !list.is_empty() {
                    list.push(' ');
                }
                list.push_str(class);
            }
        }
    }

    /// The element's classes.
    pub fn classes(&self, node: NodeId) -> Vec<String> {
        self.attribute(node, "class")
            .map(|c| c.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Sets an inline style property.
    pub fn set_style(&self, node: NodeId, property: &str, value: &str) {
        if let Some((_, styles)) = self.tree().element_mut(node) {
            styles.insert(property.to_string(), value.to_string());
        }
    }

    /// Removes an inline style property.
    pub fn remove_style(&self, node: NodeId, property: &str) {
        if let Some((_, styles)) = self.tree().element_mut(node) {
            styles.remove(property);
        }
    }

    /// Reads an inline style property.
    pub fn style(&self, node: NodeId, property: &str) -> Option<String> {
        match self.tree().get(node).map(|n| &n.kind) {
            Some(NodeKind::Element { styles, .. }) => styles.get(property).cloned(),
            _ => None,
        }
    }

    /// Concatenated text of `node` and its descendants.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.tree().text_into(node, &mut out);
        out
    }

    /// Elements with tag `tag` below `node`, in document order.
    pub fn elements_by_tag(&self, node: NodeId, tag: &str) -> Vec<NodeId> {
        fn walk(tree: &Tree, id: NodeId, tag: &str, out: &mut Vec<NodeId>) {
            let Some(n) = tree.get(id) else { return };
            for child in &n.children {
                if let Some(NodeKind::Element { tag: t, .. }) = tree.get(*child).map(|c| &c.kind) {
                    if t == tag {
                        out.push(*child);
                    }
                }
                walk(tree, *child, tag, out);
            }
        }
        let mut out = Vec::new();
        walk(&self.tree(), node, tag, &mut out);
        out
    }

    /// Serializes `node` and its descendants.
    pub fn to_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.tree().html_into(node, &mut out);
        out
    }

    /// Adds a listener for `event` on `node`.
    pub fn add_listener(&self, node: NodeId, event: &str, listener: DomListener) -> Option<ListenerId> {
        let mut tree = self.tree();
        let id = ListenerId(tree.next_listener);
        let data = tree.get_mut(node)?;
        data.listeners.push((id, event.to_string(), listener));
        tree.next_listener += 1;
        Some(id)
    }

    /// Removes a listener. Returns whether it was registered.
    pub fn remove_listener(&self, node: NodeId, id: ListenerId) -> bool {
        let mut tree = self.tree();
        let Some(data) = tree.get_mut(node) else {
            return false;
        };
        let before = data.listeners.len();
        data.listeners.retain(|(l, _, _)| *l != id);
        data.listeners.len() != before
    }

    /// Delivers `event` to the listeners on `node`. Returns how many ran.
    pub fn dispatch(&self, node: NodeId, event: &str) -> usize {
        let listeners: Vec<DomListener> = self
            .tree()
            .get(node)
            .map(|n| {
                n.listeners
                    .iter()
                    .filter(|(_, e, _)| e == event)
                    .map(|(_, _, l)| l.clone())
                    .collect()
            })
            .unwrap_or_default();

        let event = Event {
            name: event.to_string(),
            target: node,
        };
        for listener in &listeners {
            listener(&event);
        }
        listeners.len()
    }
}

fn element(tag: &str) -> NodeKind {
    NodeKind::Element {
        tag: tag.to_string(),
        attributes: BTreeMap::new(),
        styles: BTreeMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn new_document_has_head_and_body() {
        let doc = Document::new();
        assert_eq!(doc.children(doc.root()), vec![doc.head(), doc.body()]);
        assert_eq!(
            doc.to_html(doc.root()),
            "<html><head></head><body></body></html>"
        );
    }

    #[test]
    fn insert_before_marker() {
        let doc = Document::new();
        let marker = doc.create_comment("slot");
        doc.append_child(doc.body(), marker);
        let a = doc.create_element("p");
        doc.insert_before(doc.body(), a, marker);
        assert_eq!(doc.children(doc.body()), vec![a, marker]);
        assert_eq!(doc.to_html(doc.body()), "<body><p></p><!--slot--></body>");
    }

    #[test]
    fn remove_child_checks_parent() {
        let doc = Document::new();
        let p = doc.create_element("p");
        doc.append_child(doc.body(), p);
        assert!(!doc.remove_child(doc.head(), p));
        assert!(doc.remove_child(doc.body(), p));
        assert!(!doc.remove_child(doc.body(), p));
        assert!(!doc.is_attached(p));
    }

    #[test]
    fn cycles_are_refused() {
        let doc = Document::new();
        let outer = doc.create_element("div");
        let inner = doc.create_element("div");
        doc.append_child(outer, inner);
        assert!(!doc.append_child(inner, outer));
    }

    #[test]
    fn classes_styles_and_text() {
        let doc = Document::new();
        let p = doc.create_element("p");
        doc.add_class(p, "pre");
        doc.add_class(p, "pre");
        doc.add_class(p, "big");
        doc.set_style(p, "color", "red");
        let t = doc.create_text("a < b");
        doc.append_child(p, t);
        assert_eq!(doc.classes(p), vec!["pre", "big"]);
        assert_eq!(doc.text_content(p), "a < b");
        assert_eq!(
            doc.to_html(p),
            "<p class=\"pre big\" style=\"color:red\">a &lt; b</p>"
        );
    }

    #[test]
    fn listeners_dispatch_and_cancel() {
        let doc = Document::new();
        let button = doc.create_element("button");
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let id = doc
            .add_listener(
                button,
                "click",
                Arc::new(move |_: &Event| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();

        assert_eq!(doc.dispatch(button, "click"), 1);
        assert_eq!(doc.dispatch(button, "keyup"), 0);
        assert!(doc.remove_listener(button, id));
        assert_eq!(doc.dispatch(button, "click"), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
