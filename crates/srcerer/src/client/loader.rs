// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Component loading.
//!
//! A component's artifact is fetched and evaluated at most once per runtime:
//! concurrent loads of the same name share one in-flight fetch, and later
//! loads reuse its registration. Each load then runs its own instance.

use super::definition::{ComponentDefinition, Context, Params};
use super::dom::NodeId;
use super::lifecycle::{self, ComponentInstance};
use super::runtime::{ClientRuntime, Fetch, Registration};
use futures_util::FutureExt;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Name of the component [`ClientRuntime::boot`] loads.
pub const ENTRY_COMPONENT: &str = "main";

/// Result of a successful load.
#[derive(Debug, Clone)]
pub enum Loaded {
    /// The component declared lifecycle stages and was run.
    Instance(ComponentInstance),
    /// The component declared no lifecycle; its definition is handed back
    /// as-is.
    Definition(ComponentDefinition),
}

impl Loaded {
    /// The running instance, if one was created.
    pub fn instance(&self) -> Option<&ComponentInstance> {
        match self {
            Loaded::Instance(instance) => Some(instance),
            Loaded::Definition(_) => None,
        }
    }
}

impl ClientRuntime {
    /// Loads the entry component into the document body.
    pub async fn boot(&self) -> Option<Loaded> {
        let body = self.document().body();
        self.load(ENTRY_COMPONENT, body, &Context::new()).await
    }

    /// Loads `name` into `target` with a context inherited from `inherit`.
    pub async fn load(&self, name: &str, target: NodeId, inherit: &Context) -> Option<Loaded> {
        self.load_with(name, target, inherit, Params::new()).await
    }

    /// Loads `name` into `target`, overlaying `params` on the inherited
    /// context.
    ///
    /// Returns `None` when the artifact could not be fetched, evaluated or
    /// registered; the failure is logged.
    pub async fn load_with(
        &self,
        name: &str,
        target: NodeId,
        inherit: &Context,
        params: Params,
    ) -> Option<Loaded> {
        let registration = self.fetch(name).await?;

        if let Some(css) = &registration.css {
            self.inject_style(name, css);
        }
        if let Some(svg) = &registration.svg {
            self.index_sprites(name, svg);
        }

        let definition = registration
            .definition
            .clone()
            .unwrap_or_else(|| ComponentDefinition::new(name));

        if !definition.has_lifecycle() {
            return Some(Loaded::Definition(definition));
        }

        let context = inherit.child(&params, target);
        let instance = lifecycle::run(self, definition, target, context, params).await;
        Some(Loaded::Instance(instance))
    }

    /// The shared fetch of `name`, started on first use.
    fn fetch(&self, name: &str) -> Fetch {
        let mut state = self.state();
        if let Some(fetch) = state.fetches.get(name) {
            return fetch.clone();
        }

        let runtime = self.clone();
        let owned = name.to_string();
        let fetch = async move { runtime.fetch_once(&owned).await.map(Arc::new) }
            .boxed()
            .shared();
        state.fetches.insert(name.to_string(), fetch.clone());
        fetch
    }

    async fn fetch_once(&self, name: &str) -> Option<Registration> {
        let doc = self.document();
        let script = doc.create_element("script");
        doc.set_attribute(script, "src", &self.source().url(name));
        doc.set_attribute(script, "data-blob", name);
        doc.append_child(doc.head(), script);

        let (sender, receiver) = oneshot::channel();
        self.state()
            .pending
            .insert(name.to_string(), (sender, script));

        let outcome = match self.source().fetch(name).await {
            Ok(text) => self.host().evaluate(self, &text).await,
            Err(e) => Err(e),
        };

        // a successful registration already took the entry
        if self.state().pending.remove(name).is_some() {
            doc.remove_child(doc.head(), script);
        }

        if let Err(e) = outcome {
            tracing::error!(blob = %name, "load failed: {}", e);
            return None;
        }
        match receiver.await {
            Ok(registration) => Some(registration),
            Err(_) => {
                tracing::error!(blob = %name, "artifact never registered");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{wrap_behavior, Artifact};
    use crate::client::definition::{ComponentRef, Description};
    use crate::client::dom::Document;
    use crate::client::runtime::NativeScriptHost;
    use crate::client::source::MemorySource;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn artifact(name: &str, css: Option<&str>, svg: Option<&str>, behavior: bool) -> String {
        let mut artifact = Artifact::new(name);
        artifact.css = css.map(str::to_string);
        artifact.svg = svg.map(str::to_string);
        if behavior {
            artifact.mvc = Some(wrap_behavior(name, "", false));
        }
        artifact.encode(false)
    }

    fn text_component(name: &str, text: &'static str) -> ComponentDefinition {
        ComponentDefinition::new(name).view(move |_| async move { vec![Description::element("p").text(text)] })
    }

    fn setup(host: NativeScriptHost) -> (ClientRuntime, Arc<MemorySource>) {
        let source = Arc::new(MemorySource::new());
        let runtime = ClientRuntime::new(Document::new(), source.clone(), Arc::new(host));
        (runtime, source)
    }

    #[tokio::test]
    async fn boots_the_entry_component() {
        let host = NativeScriptHost::new().component(text_component("main", "hi"));
        let (rt, source) = setup(host);
        source.insert("main", artifact("main", Some(".main{top:0}"), None, true));

        let loaded = rt.boot().await.unwrap();
        let instance = loaded.instance().unwrap();
        let doc = rt.document();

        assert_eq!(instance.roots().len(), 1);
        assert_eq!(doc.children(doc.body()), instance.roots().to_vec());
        assert_eq!(doc.text_content(instance.roots()[0]), "hi");

        // only the style is left in the head; the script node is gone
        let head = doc.children(doc.head());
        assert_eq!(head.len(), 1);
        assert_eq!(doc.tag_name(head[0]).as_deref(), Some("style"));
    }

    #[tokio::test]
    async fn greeter_binds_its_model_into_the_view() {
        let greeter = ComponentDefinition::new("main")
            .model(|ctx, _| async move { ctx.set("msg", "hi") })
            .view(|ctx| async move {
                let msg = ctx.get_str("msg").unwrap_or_default();
                vec![Description::default().text(msg)]
            });
        let (rt, source) = setup(NativeScriptHost::new().component(greeter));
        source.insert("main", artifact("main", None, None, true));

        rt.boot().await.unwrap();
        rt.settle().await;

        let doc = rt.document();
        let children = doc.children(doc.body());
        assert_eq!(children.len(), 1);
        assert_eq!(doc.tag_name(children[0]).as_deref(), Some("div"));
        assert_eq!(doc.text_content(children[0]), "hi");
    }

    #[tokio::test]
    async fn concurrent_loads_share_one_fetch() {
        let host = NativeScriptHost::new().component(text_component("item", "x"));
        let (rt, source) = setup(host);
        source.insert("item", artifact("item", Some(".item{top:0}"), None, true));
        source.delay("item", Duration::from_millis(20));

        let body = rt.document().body();
        let ctx = Context::new();
        let (a, b, c) = tokio::join!(
            rt.load("item", body, &ctx),
            rt.load("item", body, &ctx),
            rt.load("item", body, &ctx)
        );
        assert!(a.is_some() && b.is_some() && c.is_some());
        rt.load("item", body, &ctx).await.unwrap();

        assert_eq!(source.fetches("item"), 1);
        let doc = rt.document();
        assert_eq!(doc.children(body).len(), 4);
        assert_eq!(doc.elements_by_tag(doc.head(), "style").len(), 1);
    }

    #[tokio::test]
    async fn missing_artifacts_resolve_to_none() {
        let (rt, source) = setup(NativeScriptHost::new());
        let body = rt.document().body();

        assert!(rt.load("nowhere", body, &Context::new()).await.is_none());
        assert_eq!(source.fetches("nowhere"), 1);
        assert!(rt.document().children(rt.document().head()).is_empty());
    }

    #[tokio::test]
    async fn undefined_behavior_resolves_to_none() {
        let (rt, source) = setup(NativeScriptHost::new());
        source.insert("ghost", artifact("ghost", None, None, true));
        let body = rt.document().body();
        assert!(rt.load("ghost", body, &Context::new()).await.is_none());
    }

    #[tokio::test]
    async fn style_only_components_return_their_definition() {
        let (rt, source) = setup(NativeScriptHost::new());
        source.insert("theme", artifact("theme", Some("body{margin:0}"), None, false));
        let body = rt.document().body();

        let loaded = rt.load("theme", body, &Context::new()).await.unwrap();
        assert!(matches!(loaded, Loaded::Definition(ref d) if d.name == "theme"));
        assert!(rt.document().children(body).is_empty());
        assert_eq!(rt.document().elements_by_tag(rt.document().head(), "style").len(), 1);
    }

    #[tokio::test]
    async fn sprites_clone_by_id() {
        let icons = ComponentDefinition::new("icons").view(|_| async { vec![Description::sprite("a")] });
        let (rt, source) = setup(NativeScriptHost::new().component(icons));
        source.insert(
            "icons",
            artifact("icons", None, Some(r#"<svg><svg id="a"/><svg id="b"/></svg>"#), true),
        );

        let body = rt.document().body();
        let loaded = rt.load("icons", body, &Context::new()).await.unwrap();
        let roots = loaded.instance().unwrap().roots().to_vec();
        let doc = rt.document();

        assert_eq!(roots.len(), 1);
        assert_eq!(doc.tag_name(roots[0]).as_deref(), Some("svg"));
        assert_eq!(doc.attribute(roots[0], "id"), None);
        assert_eq!(doc.classes(roots[0]), vec!["a"]);
    }

    #[tokio::test]
    async fn nested_components_keep_declared_order() {
        let page = ComponentDefinition::new("main").view(|_| async {
            vec![Description::default()
                .id("list")
                .component(ComponentRef::new("a"))
                .component(ComponentRef::new("b").param("label", "bee"))
                .component(ComponentRef::new("c"))]
        });
        let b = ComponentDefinition::new("b").view(|ctx| async move {
            let label = ctx.get_str("label").unwrap_or_default();
            vec![Description::element("p").text(label)]
        });
        let host = NativeScriptHost::new()
            .component(page)
            .component(text_component("a", "a"))
            .component(b)
            .component(text_component("c", "c"));
        let (rt, source) = setup(host);
        for name in ["main", "a", "b", "c"] {
            source.insert(name, artifact(name, None, None, true));
        }
        source.delay("b", Duration::from_millis(30));

        let loaded = rt.boot().await.unwrap();
        rt.settle().await;

        let doc = rt.document();
        let list = loaded.instance().unwrap().context().node_ref("list").unwrap();
        let texts: Vec<String> = doc
            .children(list)
            .into_iter()
            .filter(|n| !doc.is_comment(*n))
            .map(|n| doc.text_content(n))
            .collect();
        assert_eq!(texts, vec!["a", "bee", "c"]);
    }

    #[tokio::test]
    async fn destroy_is_idempotent() {
        let host = NativeScriptHost::new().component(text_component("main", "hi"));
        let (rt, source) = setup(host);
        source.insert("main", artifact("main", None, None, true));

        let loaded = rt.boot().await.unwrap();
        let instance = loaded.instance().unwrap();
        let doc = rt.document();
        let before = doc.to_html(doc.root());

        instance.destroy();
        let after = doc.to_html(doc.root());
        assert_ne!(before, after);
        assert!(doc.children(doc.body()).is_empty());

        instance.destroy();
        assert_eq!(doc.to_html(doc.root()), after);
    }

    #[tokio::test]
    async fn destroy_hook_replaces_removal() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let main = text_component("main", "hi").on_destroy(move |_, _teardown| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let (rt, source) = setup(NativeScriptHost::new().component(main));
        source.insert("main", artifact("main", None, None, true));

        let loaded = rt.boot().await.unwrap();
        loaded.instance().unwrap().destroy();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(rt.document().children(rt.document().body()).len(), 1);
    }

    #[tokio::test]
    async fn stages_run_in_order() {
        let main = ComponentDefinition::new("main")
            .model(|ctx, params| async move {
                ctx.set("order", "model");
                assert!(params.is_empty());
            })
            .view(|ctx| async move {
                let order = ctx.get_str("order").unwrap_or_default();
                ctx.set("order", format!("{} view", order));
                vec![]
            })
            .controller(|ctx, _doc| async move {
                let order = ctx.get_str("order").unwrap_or_default();
                ctx.set("order", format!("{} controller", order));
            });
        let (rt, source) = setup(NativeScriptHost::new().component(main));
        source.insert("main", artifact("main", None, None, true));

        let loaded = rt.boot().await.unwrap();
        let instance = loaded.instance().unwrap();
        assert_eq!(
            instance.context().get_str("order").as_deref(),
            Some("model view controller")
        );
        assert!(instance.roots().is_empty());
        instance.destroy();
    }
}
