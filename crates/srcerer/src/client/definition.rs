// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Component definitions, contexts and descriptions.

use super::assembler::EventHandle;
use super::dom::{Document, Event, NodeId};
use super::lifecycle::Teardown;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Parameters a parent passes to a nested component.
pub type Params = Map<String, Value>;

/// Model stage: fills the context from the parameters.
pub type ModelFn = Arc<dyn Fn(Context, Params) -> BoxFuture<'static, ()> + Send + Sync>;
/// View stage: produces the descriptions to render.
pub type ViewFn = Arc<dyn Fn(Context) -> BoxFuture<'static, Vec<Description>> + Send + Sync>;
/// Controller stage: attaches behavior to the rendered nodes.
pub type ControllerFn = Arc<dyn Fn(Context, Document) -> BoxFuture<'static, ()> + Send + Sync>;
/// Custom destroy hook. Must call [`Teardown::remove`] to finish teardown.
pub type DestroyFn = Arc<dyn Fn(Context, Teardown) + Send + Sync>;
/// Event listener bound through a description.
pub type Listener = Arc<dyn Fn(&Context, &Event) + Send + Sync>;
/// Callback run by a [`Signal`] with its result.
pub type SignalCallback = Arc<dyn Fn(&Value) + Send + Sync>;

/// Truthiness of a context value: `null`, `false`, `0`, `""` and missing
/// values are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[derive(Default)]
struct SignalData {
    result: Option<Value>,
    callbacks: Vec<SignalCallback>,
}

/// A repeating resolver.
///
/// Every [`Signal::resolve`] runs all callbacks with the new result. A
/// callback added while the current result is truthy runs at once. Clones
/// share state.
#[derive(Clone, Default)]
pub struct Signal {
    inner: Arc<Mutex<SignalData>>,
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.data();
        f.debug_struct("Signal")
            .field("result", &data.result)
            .field("callbacks", &data.callbacks.len())
            .finish()
    }
}

impl Signal {
    /// Creates an unresolved signal.
    pub fn new() -> Self {
        Self::default()
    }

    fn data(&self) -> MutexGuard<'_, SignalData> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The latest result.
    pub fn result(&self) -> Option<Value> {
        self.data().result.clone()
    }

    /// Stores `value` and runs every callback with it.
    pub fn resolve(&self, value: impl Into<Value>) {
        let value = value.into();
        let callbacks = {
            let mut data = self.data();
            data.result = Some(value.clone());
            data.callbacks.clone()
        };
        for callback in callbacks {
            callback(&value);
        }
    }

    /// Drops the result and every callback.
    pub fn clear(&self) {
        let mut data = self.data();
        data.result = None;
        data.callbacks.clear();
    }

    /// Adds a callback.
    pub fn then<F>(&self, callback: F) -> &Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let callback: SignalCallback = Arc::new(callback);
        let current = {
            let mut data = self.data();
            data.callbacks.push(callback.clone());
            data.result.clone()
        };
        if let Some(value) = current.filter(is_truthy) {
            callback(&value);
        }
        self
    }
}

#[derive(Default)]
struct ContextData {
    values: Map<String, Value>,
    refs: HashMap<String, NodeId>,
    markers: HashMap<String, NodeId>,
    signals: HashMap<String, Signal>,
    target: Option<NodeId>,
    listeners: Vec<EventHandle>,
}

/// Shared mutable bag of one component instance.
///
/// Holds free-form values plus the non-owning `ref` (element id) and `tg`
/// (marker) name maps filled by the assembler. Clones share state.
#[derive(Clone, Default)]
pub struct Context {
    inner: Arc<Mutex<ContextData>>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.data();
        f.debug_struct("Context")
            .field("values", &data.values)
            .field("refs", &data.refs)
            .field("markers", &data.markers)
            .field("signals", &data.signals.keys().collect::<Vec<_>>())
            .field("target", &data.target)
            .finish()
    }
}

impl Context {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    fn data(&self) -> MutexGuard<'_, ContextData> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates the context of a nested instance: a copy of this context's
    /// values overlaid with `params`, sharing this context's signals, with
    /// empty ref and marker maps.
    pub fn child(&self, params: &Params, target: NodeId) -> Context {
        let (mut values, signals) = {
            let data = self.data();
            (data.values.clone(), data.signals.clone())
        };
        for (k, v) in params {
            values.insert(k.clone(), v.clone());
        }
        Context {
            inner: Arc::new(Mutex::new(ContextData {
                values,
                signals,
                target: Some(target),
                ..Default::default()
            })),
        }
    }

    /// Reads a value.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.data().values.get(key).cloned()
    }

    /// Reads a string value.
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| v.as_str().map(str::to_string))
    }

    /// Sets a value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.data().values.insert(key.into(), value.into());
    }

    /// Whether both handles share the same state.
    pub fn same(&self, other: &Context) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Node the instance renders into.
    pub fn target(&self) -> Option<NodeId> {
        self.data().target
    }

    /// Element registered under `id` by a description.
    pub fn node_ref(&self, id: &str) -> Option<NodeId> {
        self.data().refs.get(id).copied()
    }

    pub(crate) fn set_ref(&self, id: &str, node: NodeId) {
        self.data().refs.insert(id.to_string(), node);
    }

    /// Marker registered under `name` by a description.
    pub fn marker(&self, name: &str) -> Option<NodeId> {
        self.data().markers.get(name).copied()
    }

    pub(crate) fn set_marker(&self, name: &str, node: NodeId) {
        self.data().markers.insert(name.to_string(), node);
    }

    /// Signal registered under `name` by a description.
    pub fn signal(&self, name: &str) -> Option<Signal> {
        self.data().signals.get(name).cloned()
    }

    pub(crate) fn set_signal(&self, name: &str, signal: Signal) {
        self.data().signals.insert(name.to_string(), signal);
    }

    /// Keeps an event handle so teardown can cancel it.
    pub fn keep_listener(&self, handle: EventHandle) {
        self.data().listeners.push(handle);
    }

    /// Cancels every kept event handle.
    pub fn cancel_listeners(&self) {
        let handles = std::mem::take(&mut self.data().listeners);
        for handle in handles {
            handle.cancel();
        }
    }
}

/// Reference to a nested component inside a description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRef {
    /// Component name.
    pub name: String,
    /// Parameters merged into the child's context.
    #[serde(flatten)]
    pub params: Params,
}

impl ComponentRef {
    /// A reference without parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Params::new(),
        }
    }

    /// Adds a parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// Event names plus the listener to run.
#[derive(Clone)]
pub struct EventBinding {
    /// Event names or aliases (`start`, `move`, `end`).
    pub events: Vec<String>,
    /// Listener; receives the context and the event.
    pub listener: Listener,
}

impl fmt::Debug for EventBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBinding")
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

/// Declarative description of one node and its content.
///
/// The JSON form uses the short keys `tg`, `svg`, `tag`, `id`, `str`,
/// `html`, `bg`, `style`, `css`, `att`, `blob`, `future` and `elm`; `css`,
/// `blob` and `elm` take either one value or a list. Event bindings can only
/// be attached in code.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Description {
    /// Insertion marker name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tg: Option<String>,
    /// Sprite id to clone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub svg: Option<String>,
    /// Element tag, `div` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Ref name the node is registered under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Literal text content.
    #[serde(default, rename = "str", skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Raw markup content: the context value of that name when there is
    /// one, else the markup itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    /// Background image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bg: Option<String>,
    /// Inline style properties.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub style: BTreeMap<String, String>,
    /// Classes.
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub css: Vec<String>,
    /// Attributes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub att: BTreeMap<String, String>,
    /// Event bindings.
    #[serde(skip)]
    pub on: Vec<EventBinding>,
    /// Nested components.
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub blob: Vec<ComponentRef>,
    /// Name of the signal that shows the node while its result is truthy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub future: Option<String>,
    /// Nested descriptions.
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub elm: Vec<Description>,
}

fn one_or_many<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<U> {
        Many(Vec<U>),
        One(U),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::Many(many) => many,
        OneOrMany::One(one) => vec![one],
    })
}

impl Description {
    /// An element with the given tag.
    pub fn element(tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            ..Default::default()
        }
    }

    /// A named insertion marker.
    pub fn marker(name: impl Into<String>) -> Self {
        Self {
            tg: Some(name.into()),
            ..Default::default()
        }
    }

    /// A clone of the sprite `id`.
    pub fn sprite(id: impl Into<String>) -> Self {
        Self {
            svg: Some(id.into()),
            ..Default::default()
        }
    }

    /// Sets the ref name.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the text content.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Sets raw markup content.
    pub fn html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    /// Sets the background image.
    pub fn background(mut self, url: impl Into<String>) -> Self {
        self.bg = Some(url.into());
        self
    }

    /// Hides the node until the signal `name` resolves truthy.
    pub fn future(mut self, name: impl Into<String>) -> Self {
        self.future = Some(name.into());
        self
    }

    /// Adds an inline style property.
    pub fn style(mut self, property: impl Into<String>, value: impl Into<String>) -> Self {
        self.style.insert(property.into(), value.into());
        self
    }

    /// Adds a class.
    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.css.push(class.into());
        self
    }

    /// Adds an attribute.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.att.insert(name.into(), value.into());
        self
    }

    /// Binds a listener to one or more events.
    pub fn on<I, S, F>(mut self, events: I, listener: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&Context, &Event) + Send + Sync + 'static,
    {
        self.on.push(EventBinding {
            events: events.into_iter().map(Into::into).collect(),
            listener: Arc::new(listener),
        });
        self
    }

    /// Adds a nested component.
    pub fn component(mut self, component: ComponentRef) -> Self {
        self.blob.push(component);
        self
    }

    /// Adds a nested description.
    pub fn child(mut self, child: Description) -> Self {
        self.elm.push(child);
        self
    }
}

/// A component's exported behavior.
///
/// Every stage is optional. Instances get their own clone; the stages are
/// shared closures.
#[derive(Clone, Default)]
pub struct ComponentDefinition {
    /// Component name.
    pub name: String,
    /// Model stage.
    pub model: Option<ModelFn>,
    /// View stage.
    pub view: Option<ViewFn>,
    /// Controller stage.
    pub controller: Option<ControllerFn>,
    /// Custom destroy hook.
    pub destroy: Option<DestroyFn>,
}

impl fmt::Debug for ComponentDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDefinition")
            .field("name", &self.name)
            .field("model", &self.model.is_some())
            .field("view", &self.view.is_some())
            .field("controller", &self.controller.is_some())
            .field("destroy", &self.destroy.is_some())
            .finish()
    }
}

impl ComponentDefinition {
    /// A definition without stages.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Sets the model stage.
    pub fn model<F, Fut>(mut self, model: F) -> Self
    where
        F: Fn(Context, Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.model = Some(Arc::new(move |ctx, params| model(ctx, params).boxed()));
        self
    }

    /// Sets the view stage.
    pub fn view<F, Fut>(mut self, view: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Vec<Description>> + Send + 'static,
    {
        self.view = Some(Arc::new(move |ctx| view(ctx).boxed()));
        self
    }

    /// Sets the controller stage.
    pub fn controller<F, Fut>(mut self, controller: F) -> Self
    where
        F: Fn(Context, Document) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.controller = Some(Arc::new(move |ctx, doc| controller(ctx, doc).boxed()));
        self
    }

    /// Sets the destroy hook.
    pub fn on_destroy<F>(mut self, destroy: F) -> Self
    where
        F: Fn(Context, Teardown) + Send + Sync + 'static,
    {
        self.destroy = Some(Arc::new(destroy));
        self
    }

    /// Whether any lifecycle stage is declared.
    pub fn has_lifecycle(&self) -> bool {
        self.model.is_some() || self.view.is_some() || self.controller.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn description_accepts_one_or_many() {
        let d: Description = serde_json::from_value(json!({
            "tag": "ul",
            "css": "list",
            "elm": [{ "tag": "li", "str": "one" }, { "tag": "li", "str": "two" }],
            "blob": { "name": "world", "greeting": "hi" }
        }))
        .unwrap();

        assert_eq!(d.tag.as_deref(), Some("ul"));
        assert_eq!(d.css, vec!["list"]);
        assert_eq!(d.elm.len(), 2);
        assert_eq!(d.elm[1].text.as_deref(), Some("two"));
        assert_eq!(d.blob[0].name, "world");
        assert_eq!(d.blob[0].params.get("greeting"), Some(&json!("hi")));
    }

    #[test]
    fn child_context_copies_values_and_overlays_params() {
        let doc = Document::new();
        let parent = Context::new();
        parent.set("theme", "dark");
        parent.set("msg", "parent");
        parent.set_ref("title", doc.body());

        let params = ComponentRef::new("x").param("msg", "child").params;
        let child = parent.child(&params, doc.body());

        assert_eq!(child.get_str("theme").as_deref(), Some("dark"));
        assert_eq!(child.get_str("msg").as_deref(), Some("child"));
        assert_eq!(child.node_ref("title"), None);
        assert_eq!(child.target(), Some(doc.body()));

        child.set("theme", "light");
        assert_eq!(parent.get_str("theme").as_deref(), Some("dark"));
    }

    #[test]
    fn signals_repeat_and_replay_truthy_results() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let signal = Signal::new();

        let early = seen.clone();
        signal.then(move |v| early.lock().unwrap().push(format!("early {}", v)));
        signal.resolve(false);
        signal.resolve(1);

        let late = seen.clone();
        signal.then(move |v| late.lock().unwrap().push(format!("late {}", v)));

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["early false", "early 1", "late 1"]
        );

        signal.clear();
        signal.resolve(true);
        assert_eq!(seen.lock().unwrap().len(), 3);
        assert_eq!(signal.result(), Some(json!(true)));
    }

    #[test]
    fn truthiness_follows_script_rules() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(is_truthy(&json!("no")));
        assert!(is_truthy(&json!([])));
        assert!(is_truthy(&json!(-1.5)));
    }

    #[test]
    fn definition_reports_lifecycle() {
        assert!(!ComponentDefinition::new("bare").has_lifecycle());
        let d = ComponentDefinition::new("m").model(|ctx, _| async move { ctx.set("a", 1) });
        assert!(d.has_lifecycle());
    }
}
