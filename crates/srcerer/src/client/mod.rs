// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Client component runtime.
//!
//! The runtime loads compiled component artifacts, registers their styles and
//! sprites, runs their model/view/controller lifecycle and assembles their
//! views into a document tree.
//!
//! ```rust,ignore
//! use srcerer::client::{ClientRuntime, ComponentDefinition, Description, Document,
//!     MemorySource, NativeScriptHost};
//!
//! let host = NativeScriptHost::new().component(
//!     ComponentDefinition::new("main")
//!         .view(|_| async { vec![Description::element("p").text("hi")] }),
//! );
//! let runtime = ClientRuntime::new(Document::new(), Arc::new(source), Arc::new(host));
//! runtime.boot().await;
//! runtime.settle().await;
//! ```
//!
//! Nested components are loaded in the background, each into its own
//! comment marker, so siblings keep their declared order whatever order
//! their artifacts arrive in. A nested load whose marker was removed in the
//! meantime still completes; its nodes end up in the detached subtree.

mod assembler;
mod definition;
mod dom;
mod lifecycle;
mod loader;
mod runtime;
mod source;
mod sprite;

pub use assembler::{
    bind_events, default_extensions, expand_events, EventHandle, RenderExtension, RenderScope,
    DEFAULT_TAG, EVENT_ALIASES, TEXT_CLASS,
};
pub use definition::{
    is_truthy, ComponentDefinition, ComponentRef, Context, ControllerFn, Description, DestroyFn,
    EventBinding, Listener, ModelFn, Params, Signal, SignalCallback, ViewFn,
};
pub use dom::{Document, DomListener, Event, ListenerId, NodeId, NodeKind};
pub use lifecycle::{ComponentInstance, Teardown};
pub use loader::{Loaded, ENTRY_COMPONENT};
pub use runtime::{
    ClientRuntime, DefinitionFactory, NativeScriptHost, Registration, RuntimeBuilder, ScriptHost,
};
#[cfg(feature = "http-source")]
pub use source::HttpSource;
pub use source::{ArtifactSource, DirectorySource, MemorySource};
pub use sprite::{parse_sprite, SpriteChild, SpriteNode};
