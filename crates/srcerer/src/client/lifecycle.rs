// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Component lifecycle: model, view, controller, destroy.

use super::definition::{ComponentDefinition, Context, DestroyFn, Params};
use super::dom::{Document, NodeId};
use super::runtime::ClientRuntime;
use crate::task::Sequence;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Default removal of a component's rendered roots.
///
/// Handed to custom destroy hooks, which decide when (or whether) to run it.
pub struct Teardown {
    document: Document,
    parent: Option<NodeId>,
    roots: Vec<NodeId>,
    context: Context,
}

impl fmt::Debug for Teardown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Teardown")
            .field("parent", &self.parent)
            .field("roots", &self.roots)
            .finish()
    }
}

impl Teardown {
    /// Cancels the component's event listeners and removes every root that
    /// is still a child of the expected parent. Returns how many roots were
    /// removed.
    pub fn remove(self) -> usize {
        self.context.cancel_listeners();
        let Some(parent) = self.parent else {
            return 0;
        };
        self.roots
            .iter()
            .filter(|root| self.document.remove_child(parent, **root))
            .count()
    }
}

struct InstanceData {
    name: String,
    context: Context,
    roots: Vec<NodeId>,
    target: NodeId,
    document: Document,
    destroy: Option<DestroyFn>,
}

/// A running component.
#[derive(Clone)]
pub struct ComponentInstance {
    inner: Arc<InstanceData>,
}

impl fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("name", &self.inner.name)
            .field("target", &self.inner.target)
            .field("roots", &self.inner.roots)
            .finish()
    }
}

impl ComponentInstance {
    /// Component name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The instance context.
    pub fn context(&self) -> &Context {
        &self.inner.context
    }

    /// Nodes produced by the view stage, in order.
    pub fn roots(&self) -> &[NodeId] {
        &self.inner.roots
    }

    /// Where the component was mounted.
    pub fn target(&self) -> NodeId {
        self.inner.target
    }

    /// Tears the component down.
    ///
    /// Components without rendered roots are left alone. Otherwise the
    /// custom destroy hook runs when declared, else the default
    /// [`Teardown`]. Removing twice leaves the tree unchanged.
    pub fn destroy(&self) {
        let data = &self.inner;
        if data.roots.is_empty() {
            return;
        }

        // a marker stands in its parent; any other target holds the roots
        let parent = if data.document.is_comment(data.target) {
            data.document.parent(data.target)
        } else {
            Some(data.target)
        };

        let teardown = Teardown {
            document: data.document.clone(),
            parent,
            roots: data.roots.clone(),
            context: data.context.clone(),
        };

        match &data.destroy {
            Some(hook) => hook(data.context.clone(), teardown),
            None => {
                let removed = teardown.remove();
                tracing::debug!(blob = %data.name, removed, "destroyed");
            }
        }
    }
}

/// Runs model, view and controller in order and returns the instance.
pub(crate) async fn run(
    runtime: &ClientRuntime,
    definition: ComponentDefinition,
    target: NodeId,
    context: Context,
    params: Params,
) -> ComponentInstance {
    let roots: Mutex<Vec<NodeId>> = Mutex::new(Vec::new());
    let steps = Sequence::new();

    if let Some(model) = definition.model.clone() {
        let ctx = context.clone();
        steps.push(async move { model(ctx, params).await });
    }

    if let Some(view) = definition.view.clone() {
        let ctx = context.clone();
        let roots = &roots;
        steps.push(async move {
            let descriptions = view(ctx.clone()).await;
            let nodes = runtime.render(&descriptions, target, &ctx);
            *roots.lock().await = nodes;
        });
    }

    if let Some(controller) = definition.controller.clone() {
        let ctx = context.clone();
        let document = runtime.document().clone();
        steps.push(async move { controller(ctx, document).await });
    }

    let stages = steps.run().await;
    tracing::debug!(blob = %definition.name, stages, "ready");

    ComponentInstance {
        inner: Arc::new(InstanceData {
            name: definition.name,
            context,
            roots: roots.into_inner(),
            target,
            document: runtime.document().clone(),
            destroy: definition.destroy,
        }),
    }
}
