//! Resources tracked by the render graph.
//!
//! The graph stores entries of different resource kinds side by side. Each
//! kind implements [`Resource`], which names its descriptor and access types
//! and routes allocation and barrier calls to the matching per-kind method of
//! [`Allocator`] and [`Command`]. Inside the graph the entries are held behind
//! the object-safe [`ErasedEntry`] model.

use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use crate::backend::error::BackendResult;
use crate::backend::types::{BufferDescriptor, RenderBuffer, RenderTexture, TextureDescriptor};
use crate::backend::{Allocator, Command};
use crate::render_graph::access::{BufferAccess, TextureAccess};
use crate::render_graph::graph::RecordId;

/// Untyped identifier of a graph resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub(crate) u32);

impl ResourceId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Typed index of a resource in one render graph.
///
/// Handles are `Copy` and carry no ownership. Equality and ordering compare the
/// index only. A handle is only valid for the graph that produced it; using it
/// with another graph panics.
pub struct ResourceHandle<R> {
    index: u32,
    graph: u32,
    _marker: PhantomData<fn() -> R>,
}

impl<R> ResourceHandle<R> {
    pub(crate) fn new(index: u32, graph: u32) -> Self {
        Self {
            index,
            graph,
            _marker: PhantomData,
        }
    }

    pub fn id(self) -> ResourceId {
        ResourceId(self.index)
    }

    pub fn index(self) -> usize {
        self.index as usize
    }

    pub(crate) fn graph(self) -> u32 {
        self.graph
    }
}

impl<R> Clone for ResourceHandle<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for ResourceHandle<R> {}

impl<R> PartialEq for ResourceHandle<R> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<R> Eq for ResourceHandle<R> {}

impl<R> PartialOrd for ResourceHandle<R> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<R> Ord for ResourceHandle<R> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.index.cmp(&other.index)
    }
}

impl<R> Hash for ResourceHandle<R> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<R> fmt::Debug for ResourceHandle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = std::any::type_name::<R>().rsplit("::").next().unwrap_or("?");
        write!(f, "ResourceHandle<{}>({})", kind, self.index)
    }
}

/// Resource kind enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Texture,
    Buffer,
}

/// Who owns the resource behind an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// Allocated and released by the graph within one frame.
    Transient,
    /// Owned by the caller (e.g. the swapchain image); never allocated or released.
    External,
}

/// A resource kind the graph can track.
///
/// Implemented for [`RenderTexture`] and [`RenderBuffer`]. Each method forwards
/// to the per-kind method of the allocator or command, which is what lets the
/// graph drive heterogeneous resources through two narrow traits.
pub trait Resource: Sized + 'static {
    type Descriptor: Clone + fmt::Debug + 'static;
    type Access: Clone + fmt::Debug + 'static;

    const KIND: ResourceKind;

    fn allocate(allocator: &mut dyn Allocator, descriptor: &Self::Descriptor) -> BackendResult<Self>;

    fn release(allocator: &mut dyn Allocator, descriptor: &Self::Descriptor, instance: Self);

    fn before_read(
        command: &mut dyn Command,
        descriptor: &Self::Descriptor,
        instance: &mut Self,
        access: &Self::Access,
    );

    fn before_write(
        command: &mut dyn Command,
        descriptor: &Self::Descriptor,
        instance: &mut Self,
        access: &Self::Access,
    );
}

impl Resource for RenderTexture {
    type Descriptor = TextureDescriptor;
    type Access = TextureAccess;

    const KIND: ResourceKind = ResourceKind::Texture;

    fn allocate(allocator: &mut dyn Allocator, descriptor: &TextureDescriptor) -> BackendResult<Self> {
        allocator.allocate_texture(descriptor)
    }

    fn release(allocator: &mut dyn Allocator, descriptor: &TextureDescriptor, instance: Self) {
        allocator.release_texture(descriptor, instance);
    }

    fn before_read(
        command: &mut dyn Command,
        descriptor: &TextureDescriptor,
        instance: &mut Self,
        access: &TextureAccess,
    ) {
        command.before_read_texture(descriptor, instance, access);
    }

    fn before_write(
        command: &mut dyn Command,
        descriptor: &TextureDescriptor,
        instance: &mut Self,
        access: &TextureAccess,
    ) {
        command.before_write_texture(descriptor, instance, access);
    }
}

impl Resource for RenderBuffer {
    type Descriptor = BufferDescriptor;
    type Access = BufferAccess;

    const KIND: ResourceKind = ResourceKind::Buffer;

    fn allocate(allocator: &mut dyn Allocator, descriptor: &BufferDescriptor) -> BackendResult<Self> {
        allocator.allocate_buffer(descriptor)
    }

    fn release(allocator: &mut dyn Allocator, descriptor: &BufferDescriptor, instance: Self) {
        allocator.release_buffer(descriptor, instance);
    }

    fn before_read(
        command: &mut dyn Command,
        descriptor: &BufferDescriptor,
        instance: &mut Self,
        access: &BufferAccess,
    ) {
        command.before_read_buffer(descriptor, instance, access);
    }

    fn before_write(
        command: &mut dyn Command,
        descriptor: &BufferDescriptor,
        instance: &mut Self,
        access: &BufferAccess,
    ) {
        command.before_write_buffer(descriptor, instance, access);
    }
}

/// Storage cell for one resource.
pub(crate) struct ResourceEntry<R: Resource> {
    pub(crate) name: String,
    pub(crate) lifetime: Lifetime,
    pub(crate) descriptor: R::Descriptor,
    /// `None` until the allocating record executes, and again after release.
    pub(crate) instance: Option<R>,
    pub(crate) last_user: Option<RecordId>,
}

impl<R: Resource> ResourceEntry<R> {
    pub(crate) fn transient(name: String, descriptor: R::Descriptor) -> Self {
        Self {
            name,
            lifetime: Lifetime::Transient,
            descriptor,
            instance: None,
            last_user: None,
        }
    }

    pub(crate) fn external(name: String, descriptor: R::Descriptor, instance: R) -> Self {
        Self {
            name,
            lifetime: Lifetime::External,
            descriptor,
            instance: Some(instance),
            last_user: None,
        }
    }
}

/// Object-safe view of a [`ResourceEntry`] of any kind.
pub(crate) trait ErasedEntry {
    fn name(&self) -> &str;
    fn kind(&self) -> ResourceKind;
    fn lifetime(&self) -> Lifetime;
    fn last_user(&self) -> Option<RecordId>;
    fn set_last_user(&mut self, record: RecordId);
    fn is_populated(&self) -> bool;

    /// Allocate the instance of a transient entry.
    fn allocate(&mut self, allocator: &mut dyn Allocator) -> BackendResult<()>;

    /// Hand a transient instance back to the allocator. Returns false if there
    /// was nothing to release.
    fn release(&mut self, allocator: &mut dyn Allocator) -> bool;

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<R: Resource> ErasedEntry for ResourceEntry<R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ResourceKind {
        R::KIND
    }

    fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    fn last_user(&self) -> Option<RecordId> {
        self.last_user
    }

    fn set_last_user(&mut self, record: RecordId) {
        debug_assert!(
            self.last_user.map_or(true, |last| last <= record),
            "last user of '{}' moved backwards",
            self.name
        );
        self.last_user = Some(record);
    }

    fn is_populated(&self) -> bool {
        self.instance.is_some()
    }

    fn allocate(&mut self, allocator: &mut dyn Allocator) -> BackendResult<()> {
        debug_assert_eq!(self.lifetime, Lifetime::Transient);
        debug_assert!(self.instance.is_none(), "'{}' allocated twice", self.name);
        self.instance = Some(R::allocate(allocator, &self.descriptor)?);
        Ok(())
    }

    fn release(&mut self, allocator: &mut dyn Allocator) -> bool {
        if self.lifetime == Lifetime::External {
            return false;
        }
        match self.instance.take() {
            Some(instance) => {
                R::release(allocator, &self.descriptor, instance);
                true
            }
            None => false,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Downcast an erased entry to its concrete kind.
///
/// Handles are typed and bound to their graph, so a mismatch means the graph's
/// own bookkeeping is broken.
pub(crate) fn downcast_entry<R: Resource>(entry: &dyn ErasedEntry) -> &ResourceEntry<R> {
    entry
        .as_any()
        .downcast_ref::<ResourceEntry<R>>()
        .unwrap_or_else(|| panic!("resource entry is not a {:?}", R::KIND))
}

pub(crate) fn downcast_entry_mut<R: Resource>(entry: &mut dyn ErasedEntry) -> &mut ResourceEntry<R> {
    entry
        .as_any_mut()
        .downcast_mut::<ResourceEntry<R>>()
        .unwrap_or_else(|| panic!("resource entry is not a {:?}", R::KIND))
}
