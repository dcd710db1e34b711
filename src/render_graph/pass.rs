//! Render pass definitions for the render graph

use crate::backend::Command;
use crate::render_graph::builder::Builder;
use crate::render_graph::context::Context;
use crate::render_graph::resource::{
    downcast_entry, ErasedEntry, Resource, ResourceEntry, ResourceHandle,
};

/// A unit of rendering work.
///
/// Passes are recorded in two phases. [`record`](Self::record) runs while the
/// graph is being built: it declares resources through the [`Builder`], reads
/// and publishes payloads in the [`Context`], and returns whatever data
/// `render` will need (usually handles). [`render`](Self::render) runs during
/// execution, after every declared access has been transitioned.
pub trait RenderGraphPass {
    type Data;

    /// Get the pass name for debugging
    fn name(&self) -> &str;

    fn record(&self, builder: &mut Builder<'_>, context: &mut Context) -> Self::Data;

    fn render(&self, command: &mut dyn Command, resources: &PassResources<'_>, data: &Self::Data);
}

/// Live resource instances, available to a pass while it renders.
pub struct PassResources<'r> {
    pub(crate) entries: &'r [Box<dyn ErasedEntry>],
}

impl<'r> PassResources<'r> {
    /// Instance behind `handle`.
    ///
    /// # Panics
    ///
    /// If the resource is not allocated at this point of the frame, which means
    /// the pass did not declare it or it was already released.
    pub fn get<R: Resource>(&self, handle: ResourceHandle<R>) -> &R {
        let entry = self.entry(handle);
        entry.instance.as_ref().unwrap_or_else(|| {
            panic!(
                "resource '{}' is not allocated; was it declared by this pass?",
                entry.name
            )
        })
    }

    pub fn try_get<R: Resource>(&self, handle: ResourceHandle<R>) -> Option<&R> {
        self.entries
            .get(handle.index())
            .and_then(|entry| entry.as_any().downcast_ref::<ResourceEntry<R>>())
            .and_then(|entry| entry.instance.as_ref())
    }

    pub fn descriptor<R: Resource>(&self, handle: ResourceHandle<R>) -> &R::Descriptor {
        &self.entry(handle).descriptor
    }

    pub fn name<R: Resource>(&self, handle: ResourceHandle<R>) -> &str {
        &self.entry(handle).name
    }

    fn entry<R: Resource>(
        &self,
        handle: ResourceHandle<R>,
    ) -> &'r ResourceEntry<R> {
        let entry = self
            .entries
            .get(handle.index())
            .unwrap_or_else(|| panic!("{:?} is out of range", handle));
        downcast_entry(entry.as_ref())
    }
}

/// Object-safe render callback stored in a record.
pub(crate) trait ErasedPass {
    fn render(&self, command: &mut dyn Command, resources: &PassResources<'_>);
}

/// A pass together with the data its `record` returned.
pub(crate) struct BoundPass<'a, P: RenderGraphPass> {
    pub(crate) pass: &'a P,
    pub(crate) data: P::Data,
}

impl<P: RenderGraphPass> ErasedPass for BoundPass<'_, P> {
    fn render(&self, command: &mut dyn Command, resources: &PassResources<'_>) {
        self.pass.render(command, resources, &self.data);
    }
}
