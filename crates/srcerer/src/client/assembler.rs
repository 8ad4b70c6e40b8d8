// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Tree assembly: turns [`Description`]s into document nodes.
//!
//! A node is created from the description's kind (marker, sprite clone or
//! element), registered under its `id`, decorated by every render extension
//! that applies, and finally placed into the target: before the target
//! when the target is an attached marker, appended to it otherwise.
//!
//! Extensions run in table order. The built-in table handles, in order,
//! text, markup, background image, inline style, classes, attributes,
//! events, nested components, signal-driven visibility and nested
//! descriptions. Custom extensions are appended
//! through [`RuntimeBuilder::extension`](super::runtime::RuntimeBuilder::extension).

use super::definition::{is_truthy, ComponentRef, Context, Description, Listener, Signal};
use super::dom::{Document, DomListener, Event, ListenerId, NodeId};
use super::runtime::ClientRuntime;
use serde_json::Value;
use std::sync::Arc;

/// Tag used when a description names none.
pub const DEFAULT_TAG: &str = "div";

/// Class added to text-bearing elements.
pub const TEXT_CLASS: &str = "pre";

/// Event aliases and the native events they stand for.
pub const EVENT_ALIASES: &[(&str, &[&str])] = &[
    ("start", &["mousedown", "touchstart"]),
    ("move", &["mousemove", "touchmove"]),
    ("end", &["mouseup", "mouseout", "touchend", "touchcancel"]),
];

/// What an extension sees besides the node and its description.
pub struct RenderScope<'a> {
    /// The runtime rendering the tree.
    pub runtime: &'a ClientRuntime,
    /// Context of the component being rendered.
    pub context: &'a Context,
}

/// Decorates a freshly created node from one aspect of its description.
pub trait RenderExtension: Send + Sync {
    /// Short name, used in logs.
    fn key(&self) -> &'static str;

    /// Whether the description carries this extension's aspect.
    fn applies(&self, description: &Description) -> bool;

    /// Applies the aspect to `node`.
    fn apply(&self, scope: &RenderScope<'_>, node: NodeId, description: &Description);
}

/// The built-in extension table.
pub fn default_extensions() -> Vec<Arc<dyn RenderExtension>> {
    vec![
        Arc::new(TextContent),
        Arc::new(MarkupContent),
        Arc::new(BackgroundImage),
        Arc::new(InlineStyle),
        Arc::new(Classes),
        Arc::new(Attributes),
        Arc::new(Events),
        Arc::new(Components),
        Arc::new(Visibility),
        Arc::new(Children),
    ]
}

struct TextContent;

impl RenderExtension for TextContent {
    fn key(&self) -> &'static str {
        "str"
    }

    fn applies(&self, description: &Description) -> bool {
        description.text.is_some()
    }

    fn apply(&self, scope: &RenderScope<'_>, node: NodeId, description: &Description) {
        let Some(text) = &description.text else { return };
        let doc = scope.runtime.document();
        doc.add_class(node, TEXT_CLASS);
        let text = doc.create_text(text);
        doc.append_child(node, text);
    }
}

struct MarkupContent;

impl RenderExtension for MarkupContent {
    fn key(&self) -> &'static str {
        "html"
    }

    fn applies(&self, description: &Description) -> bool {
        description.html.is_some()
    }

    fn apply(&self, scope: &RenderScope<'_>, node: NodeId, description: &Description) {
        let Some(html) = &description.html else { return };
        let markup = match scope.context.get(html) {
            Some(Value::String(s)) => s,
            Some(Value::Null) | None => html.clone(),
            Some(other) => other.to_string(),
        };
        let doc = scope.runtime.document();
        let markup = doc.create_markup(&markup);
        doc.append_child(node, markup);
    }
}

struct BackgroundImage;

impl RenderExtension for BackgroundImage {
    fn key(&self) -> &'static str {
        "bg"
    }

    fn applies(&self, description: &Description) -> bool {
        description.bg.is_some()
    }

    fn apply(&self, scope: &RenderScope<'_>, node: NodeId, description: &Description) {
        let Some(url) = &description.bg else { return };
        scope
            .runtime
            .document()
            .set_style(node, "background-image", &format!("url('{}')", url));
    }
}

struct InlineStyle;

impl RenderExtension for InlineStyle {
    fn key(&self) -> &'static str {
        "style"
    }

    fn applies(&self, description: &Description) -> bool {
        !description.style.is_empty()
    }

    fn apply(&self, scope: &RenderScope<'_>, node: NodeId, description: &Description) {
        for (property, value) in &description.style {
            scope.runtime.document().set_style(node, property, value);
        }
    }
}

struct Classes;

impl RenderExtension for Classes {
    fn key(&self) -> &'static str {
        "css"
    }

    fn applies(&self, description: &Description) -> bool {
        !description.css.is_empty()
    }

    fn apply(&self, scope: &RenderScope<'_>, node: NodeId, description: &Description) {
        for class in &description.css {
            scope.runtime.document().add_class(node, class);
        }
    }
}

struct Attributes;

impl RenderExtension for Attributes {
    fn key(&self) -> &'static str {
        "att"
    }

    fn applies(&self, description: &Description) -> bool {
        !description.att.is_empty()
    }

    fn apply(&self, scope: &RenderScope<'_>, node: NodeId, description: &Description) {
        for (name, value) in &description.att {
            scope.runtime.document().set_attribute(node, name, value);
        }
    }
}

struct Events;

impl RenderExtension for Events {
    fn key(&self) -> &'static str {
        "on"
    }

    fn applies(&self, description: &Description) -> bool {
        !description.on.is_empty()
    }

    fn apply(&self, scope: &RenderScope<'_>, node: NodeId, description: &Description) {
        for binding in &description.on {
            let handle = bind_events(
                scope.runtime.document(),
                node,
                &binding.events,
                scope.context,
                binding.listener.clone(),
            );
            scope.context.keep_listener(handle);
        }
    }
}

struct Components;

impl RenderExtension for Components {
    fn key(&self) -> &'static str {
        "blob"
    }

    fn applies(&self, description: &Description) -> bool {
        !description.blob.is_empty()
    }

    fn apply(&self, scope: &RenderScope<'_>, node: NodeId, description: &Description) {
        let doc = scope.runtime.document();
        for reference in &description.blob {
            // each child gets its own marker so siblings keep their order
            let marker = doc.create_comment(&reference.name);
            doc.append_child(node, marker);
            scope.runtime.spawn_load(reference.clone(), marker, scope.context.clone());
        }
    }
}

struct Visibility;

impl RenderExtension for Visibility {
    fn key(&self) -> &'static str {
        "future"
    }

    fn applies(&self, description: &Description) -> bool {
        description.future.is_some()
    }

    fn apply(&self, scope: &RenderScope<'_>, node: NodeId, description: &Description) {
        let Some(name) = &description.future else { return };
        let doc = scope.runtime.document().clone();
        doc.set_style(node, "display", "none");

        let signal = Signal::new();
        signal.then(move |value| {
            if is_truthy(value) {
                doc.remove_style(node, "display");
            } else {
                doc.set_style(node, "display", "none");
            }
        });
        scope.context.set_signal(name, signal);
    }
}

struct Children;

impl RenderExtension for Children {
    fn key(&self) -> &'static str {
        "elm"
    }

    fn applies(&self, description: &Description) -> bool {
        !description.elm.is_empty()
    }

    fn apply(&self, scope: &RenderScope<'_>, node: NodeId, description: &Description) {
        scope.runtime.render(&description.elm, node, scope.context);
    }
}

/// Expands aliases into native event names, keeping order and dropping
/// duplicates.
pub fn expand_events(events: &[String]) -> Vec<String> {
    let mut expanded: Vec<String> = Vec::new();
    for event in events {
        let natives = EVENT_ALIASES
            .iter()
            .find(|(alias, _)| alias == event)
            .map(|(_, natives)| natives.iter().map(|n| n.to_string()).collect())
            .unwrap_or_else(|| vec![event.clone()]);
        for native in natives {
            if !expanded.contains(&native) {
                expanded.push(native);
            }
        }
    }
    expanded
}

/// Listeners bound by one event binding.
#[derive(Debug, Clone)]
pub struct EventHandle {
    document: Document,
    node: NodeId,
    ids: Vec<ListenerId>,
}

impl EventHandle {
    /// The node the listeners are bound to.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Removes every listener of the binding.
    pub fn cancel(&self) {
        for id in &self.ids {
            self.document.remove_listener(self.node, *id);
        }
    }
}

/// Binds `listener` on `node` for every event in `events`, aliases
/// expanded. The listener receives the component context.
pub fn bind_events(
    document: &Document,
    node: NodeId,
    events: &[String],
    context: &Context,
    listener: Listener,
) -> EventHandle {
    let ctx = context.clone();
    let dom_listener: DomListener = Arc::new(move |event: &Event| listener(&ctx, event));

    let ids = expand_events(events)
        .iter()
        .filter_map(|event| document.add_listener(node, event, dom_listener.clone()))
        .collect();

    EventHandle {
        document: document.clone(),
        node,
        ids,
    }
}

/// Places `node` into `target`.
fn place(document: &Document, target: NodeId, node: NodeId) {
    match document.parent(target) {
        Some(parent) if document.is_comment(target) => {
            document.insert_before(parent, node, target);
        }
        _ => {
            document.append_child(target, node);
        }
    }
}

impl ClientRuntime {
    /// Renders `descriptions` into `target` and returns the created nodes in
    /// order. Sprite descriptions naming an unknown sprite produce no node.
    pub fn render(&self, descriptions: &[Description], target: NodeId, context: &Context) -> Vec<NodeId> {
        descriptions
            .iter()
            .filter_map(|description| self.render_one(description, target, context))
            .collect()
    }

    fn render_one(&self, description: &Description, target: NodeId, context: &Context) -> Option<NodeId> {
        let doc = self.document();

        let (node, is_marker) = if let Some(name) = &description.tg {
            let marker = doc.create_comment(name);
            context.set_marker(name, marker);
            (marker, true)
        } else if let Some(id) = &description.svg {
            let Some(sprite) = self.sprite(id) else {
                tracing::warn!(sprite = %id, "unknown sprite, skipped");
                return None;
            };
            let node = doc.import_sprite(&sprite);
            doc.remove_attribute(node, "id");
            doc.add_class(node, id);
            (node, false)
        } else {
            let tag = description.tag.as_deref().unwrap_or(DEFAULT_TAG);
            (doc.create_element(tag), false)
        };

        if let Some(id) = &description.id {
            context.set_ref(id, node);
        }

        if !is_marker {
            let scope = RenderScope {
                runtime: self,
                context,
            };
            for extension in self.extensions() {
                if extension.applies(description) {
                    extension.apply(&scope, node, description);
                }
            }
        }

        place(doc, target, node);
        Some(node)
    }

    /// Loads a nested component into `marker` in the background.
    ///
    /// Outside a tokio runtime the load is not started and the marker stays
    /// empty.
    pub(crate) fn spawn_load(&self, reference: ComponentRef, marker: NodeId, parent: Context) {
        let tokio_handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(err) => {
                tracing::error!(blob = %reference.name, error = %err, "no async runtime, nested component not loaded");
                return;
            }
        };
        let runtime = self.clone();
        let handle = tokio_handle.spawn(async move {
            let ComponentRef { name, params } = reference;
            if runtime.load_with(&name, marker, &parent, params).await.is_none() {
                tracing::warn!(blob = %name, "nested component did not load");
            }
        });
        self.track(handle);
    }
}
