// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The per-page component runtime.
//!
//! [`ClientRuntime`] owns everything a page shares between component loads:
//! the document, the artifact fetch cache, the style and sprite registries
//! and the registration callback that artifacts call into. Cloning the
//! runtime clones a handle, not the state.
//!
//! Artifacts are evaluated by a [`ScriptHost`]. The bundled
//! [`NativeScriptHost`] reads the artifact payloads and resolves the
//! registered behavior to a natively defined [`ComponentDefinition`].

use super::assembler::{default_extensions, RenderExtension};
use super::definition::ComponentDefinition;
use super::dom::{Document, NodeId};
use super::source::ArtifactSource;
use super::sprite::{parse_sprite, SpriteNode};
use crate::artifact::{registered_name, Artifact};
use crate::error::{Result, SrcererError};
use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// What an evaluated artifact hands to the registration callback.
#[derive(Debug, Clone)]
pub struct Registration {
    /// Component name.
    pub name: String,
    /// Component CSS.
    pub css: Option<String>,
    /// Component sprite markup.
    pub svg: Option<String>,
    /// Exported behavior.
    pub definition: Option<ComponentDefinition>,
}

/// Evaluates artifact text on behalf of the runtime.
///
/// Implementations must call [`ClientRuntime::register`] with the artifact's
/// payloads before the returned future completes.
pub trait ScriptHost: Send + Sync {
    /// Evaluates `script`.
    fn evaluate<'a>(&'a self, runtime: &'a ClientRuntime, script: &'a str) -> BoxFuture<'a, Result<()>>;
}

/// Builds a fresh definition for each registration.
pub type DefinitionFactory = Arc<dyn Fn() -> ComponentDefinition + Send + Sync>;

/// [`ScriptHost`] that maps registered component names to native
/// definitions.
#[derive(Default, Clone)]
pub struct NativeScriptHost {
    factories: HashMap<String, DefinitionFactory>,
}

impl fmt::Debug for NativeScriptHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("NativeScriptHost")
            .field("components", &names)
            .finish()
    }
}

impl NativeScriptHost {
    /// Creates a host without components.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory for `name`.
    pub fn define<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> ComponentDefinition + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
        self
    }

    /// Registers a definition, cloned for every registration.
    pub fn component(self, definition: ComponentDefinition) -> Self {
        let name = definition.name.clone();
        self.define(name, move || definition.clone())
    }
}

impl ScriptHost for NativeScriptHost {
    fn evaluate<'a>(&'a self, runtime: &'a ClientRuntime, script: &'a str) -> BoxFuture<'a, Result<()>> {
        async move {
            let artifact = Artifact::parse(script)?;

            let definition = match &artifact.mvc {
                None => None,
                Some(code) => {
                    let registered = registered_name(code).ok_or_else(|| SrcererError::InvalidArtifact {
                        name: artifact.name.clone(),
                        message: "behavior is not a registration call".to_string(),
                    })?;
                    if registered != artifact.name {
                        return Err(SrcererError::InvalidArtifact {
                            name: artifact.name.clone(),
                            message: format!("behavior registers '{}'", registered),
                        });
                    }
                    let factory = self.factories.get(&registered).ok_or_else(|| {
                        SrcererError::Registration(format!("no definition for component '{}'", registered))
                    })?;
                    let mut definition = factory();
                    definition.name = registered;
                    Some(definition)
                }
            };

            runtime.register(Registration {
                name: artifact.name,
                css: artifact.css,
                svg: artifact.svg,
                definition,
            })
        }
        .boxed()
    }
}

pub(crate) type Fetch = Shared<BoxFuture<'static, Option<Arc<Registration>>>>;

#[derive(Default)]
pub(crate) struct RuntimeState {
    pub(crate) fetches: HashMap<String, Fetch>,
    pub(crate) pending: HashMap<String, (oneshot::Sender<Registration>, NodeId)>,
    styled: HashSet<String>,
    sprited: HashSet<String>,
    sprites: HashMap<String, SpriteNode>,
    tasks: Vec<JoinHandle<()>>,
}

struct RuntimeInner {
    document: Document,
    source: Arc<dyn ArtifactSource>,
    host: Arc<dyn ScriptHost>,
    extensions: Vec<Arc<dyn RenderExtension>>,
    state: Mutex<RuntimeState>,
}

/// Handle to the component runtime of one page.
#[derive(Clone)]
pub struct ClientRuntime {
    inner: Arc<RuntimeInner>,
}

impl fmt::Debug for ClientRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("ClientRuntime")
            .field("fetches", &state.fetches.len())
            .field("sprites", &state.sprites.len())
            .field("extensions", &self.inner.extensions.len())
            .finish()
    }
}

/// Configures a [`ClientRuntime`].
pub struct RuntimeBuilder {
    document: Document,
    source: Arc<dyn ArtifactSource>,
    host: Arc<dyn ScriptHost>,
    extensions: Vec<Arc<dyn RenderExtension>>,
}

impl RuntimeBuilder {
    /// Appends a render extension after the built-in ones.
    pub fn extension<E: RenderExtension + 'static>(mut self, extension: E) -> Self {
        self.extensions.push(Arc::new(extension));
        self
    }

    /// Builds the runtime.
    pub fn build(self) -> ClientRuntime {
        ClientRuntime {
            inner: Arc::new(RuntimeInner {
                document: self.document,
                source: self.source,
                host: self.host,
                extensions: self.extensions,
                state: Mutex::new(RuntimeState::default()),
            }),
        }
    }
}

impl ClientRuntime {
    /// Creates a runtime with the built-in render extensions.
    pub fn new(document: Document, source: Arc<dyn ArtifactSource>, host: Arc<dyn ScriptHost>) -> Self {
        Self::builder(document, source, host).build()
    }

    /// Starts configuring a runtime.
    pub fn builder(document: Document, source: Arc<dyn ArtifactSource>, host: Arc<dyn ScriptHost>) -> RuntimeBuilder {
        RuntimeBuilder {
            document,
            source,
            host,
            extensions: default_extensions(),
        }
    }

    /// The page document.
    pub fn document(&self) -> &Document {
        &self.inner.document
    }

    pub(crate) fn source(&self) -> &dyn ArtifactSource {
        self.inner.source.as_ref()
    }

    pub(crate) fn host(&self) -> &dyn ScriptHost {
        self.inner.host.as_ref()
    }

    pub(crate) fn extensions(&self) -> &[Arc<dyn RenderExtension>] {
        &self.inner.extensions
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, RuntimeState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The registration callback called by evaluated artifacts.
    ///
    /// Resolves the pending fetch of the component and removes its script
    /// node.
    ///
    /// # Errors
    ///
    /// [`SrcererError::Registration`] when no fetch of that name is pending.
    pub fn register(&self, registration: Registration) -> Result<()> {
        let pending = self.state().pending.remove(&registration.name);
        let Some((sender, script)) = pending else {
            return Err(SrcererError::Registration(format!(
                "component '{}' was not requested",
                registration.name
            )));
        };

        let doc = self.document();
        doc.remove_child(doc.head(), script);
        tracing::debug!(blob = %registration.name, "registered");

        let name = registration.name.clone();
        sender
            .send(registration)
            .map_err(|_| SrcererError::Registration(format!("load of '{}' was dropped", name)))
    }

    /// Clone source of sprite `id`.
    pub fn sprite(&self, id: &str) -> Option<SpriteNode> {
        self.state().sprites.get(id).cloned()
    }

    /// Every indexed sprite id, sorted.
    pub fn sprite_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.state().sprites.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Injects the component's CSS into the head, once per name.
    pub(crate) fn inject_style(&self, name: &str, css: &str) {
        let mut state = self.state();
        if !state.styled.insert(name.to_string()) {
            return;
        }
        let doc = self.document();
        let style = doc.create_element("style");
        doc.set_attribute(style, "type", "text/css");
        doc.set_attribute(style, "data-blob", name);
        let text = doc.create_text(css);
        doc.append_child(style, text);
        doc.append_child(doc.head(), style);
    }

    /// Indexes the component's sprites by element id, once per name.
    pub(crate) fn index_sprites(&self, name: &str, svg: &str) {
        let mut state = self.state();
        if !state.sprited.insert(name.to_string()) {
            return;
        }
        let root = match parse_sprite(svg) {
            Ok(root) => root,
            Err(e) => {
                tracing::warn!(blob = %name, "sprite unreadable: {}", e);
                return;
            }
        };
        for sprite in root.identified() {
            let Some(id) = sprite.id() else { continue };
            if state.sprites.insert(id.to_string(), sprite.clone()).is_some() {
                tracing::warn!(blob = %name, sprite = %id, "duplicate sprite id, replacing");
            }
        }
    }

    /// Keeps a spawned load so [`ClientRuntime::settle`] can wait for it.
    pub(crate) fn track(&self, handle: JoinHandle<()>) {
        self.state().tasks.push(handle);
    }

    /// Waits until every spawned nested load, including loads spawned while
    /// waiting, has finished.
    pub async fn settle(&self) {
        loop {
            let handles = std::mem::take(&mut self.state().tasks);
            if handles.is_empty() {
                break;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    tracing::error!("nested load failed: {}", e);
                }
            }
        }
    }
}
