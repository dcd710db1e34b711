//! Per-pass recording surface.

use std::any::Any;
use std::fmt;

use crate::backend::Command;
use crate::render_graph::resource::{
    downcast_entry_mut, ErasedEntry, Resource, ResourceEntry, ResourceHandle, ResourceId,
};

/// One declared read or write of a resource.
pub(crate) struct Access<R: Resource> {
    pub(crate) handle: ResourceHandle<R>,
    pub(crate) info: R::Access,
}

/// Object-safe view of an [`Access`] of any kind.
pub(crate) trait ErasedAccess {
    fn resource(&self) -> ResourceId;
    fn before_read(&self, entry: &mut dyn ErasedEntry, command: &mut dyn Command);
    fn before_write(&self, entry: &mut dyn ErasedEntry, command: &mut dyn Command);
    fn as_any(&self) -> &dyn Any;
    fn debug(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

impl<R: Resource> Access<R> {
    /// Split the entry into descriptor and live instance.
    fn unpack(entry: &mut dyn ErasedEntry) -> (&R::Descriptor, &mut R) {
        let entry = downcast_entry_mut::<R>(entry);
        let ResourceEntry {
            name,
            descriptor,
            instance,
            ..
        } = entry;
        match instance {
            Some(instance) => (&*descriptor, instance),
            None => panic!("resource '{}' is accessed while not allocated", name),
        }
    }
}

impl<R: Resource> ErasedAccess for Access<R> {
    fn resource(&self) -> ResourceId {
        self.handle.id()
    }

    fn before_read(&self, entry: &mut dyn ErasedEntry, command: &mut dyn Command) {
        let (descriptor, instance) = Self::unpack(entry);
        R::before_read(command, descriptor, instance, &self.info);
    }

    fn before_write(&self, entry: &mut dyn ErasedEntry, command: &mut dyn Command) {
        let (descriptor, instance) = Self::unpack(entry);
        R::before_write(command, descriptor, instance, &self.info);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn debug(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {:?}", self.handle, self.info)
    }
}

impl fmt::Debug for dyn ErasedAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.debug(f)
    }
}

/// Resources a record declared while its pass was recording.
#[derive(Default)]
pub(crate) struct Declarations {
    pub(crate) allocates: Vec<ResourceId>,
    pub(crate) reads: Vec<Box<dyn ErasedAccess>>,
    pub(crate) writes: Vec<Box<dyn ErasedAccess>>,
}

/// Handed to [`RenderGraphPass::record`](crate::render_graph::RenderGraphPass::record)
/// so a pass can declare what it allocates, reads and writes.
///
/// Declarations are pure bookkeeping; nothing is allocated or recorded on the
/// GPU until the graph executes.
pub struct Builder<'g> {
    graph: u32,
    pass_name: &'g str,
    entries: &'g mut Vec<Box<dyn ErasedEntry>>,
    declarations: &'g mut Declarations,
}

impl<'g> Builder<'g> {
    pub(crate) fn new(
        graph: u32,
        pass_name: &'g str,
        entries: &'g mut Vec<Box<dyn ErasedEntry>>,
        declarations: &'g mut Declarations,
    ) -> Self {
        Self {
            graph,
            pass_name,
            entries,
            declarations,
        }
    }

    /// Name of the pass being recorded.
    pub fn pass_name(&self) -> &str {
        self.pass_name
    }

    /// Declare a transient resource, allocated when this pass executes.
    pub fn allocate<R: Resource>(
        &mut self,
        name: impl Into<String>,
        descriptor: R::Descriptor,
    ) -> ResourceHandle<R> {
        let name = name.into();
        let handle = ResourceHandle::new(self.entries.len() as u32, self.graph);
        log::trace!(
            "Pass '{}' declares {:?} '{}': {:?}",
            self.pass_name,
            R::KIND,
            name,
            descriptor
        );
        self.entries
            .push(Box::new(ResourceEntry::<R>::transient(name, descriptor)));
        self.declarations.allocates.push(handle.id());
        handle
    }

    /// Declare a read of `handle`.
    ///
    /// # Panics
    ///
    /// If `handle` was not produced by this graph.
    pub fn read<R: Resource>(&mut self, handle: ResourceHandle<R>, access: R::Access) {
        self.check(handle, "read");
        self.declarations.reads.push(Box::new(Access {
            handle,
            info: access,
        }));
    }

    /// Declare a write of `handle`.
    ///
    /// # Panics
    ///
    /// If `handle` was not produced by this graph.
    pub fn write<R: Resource>(&mut self, handle: ResourceHandle<R>, access: R::Access) {
        self.check(handle, "write");
        self.declarations.writes.push(Box::new(Access {
            handle,
            info: access,
        }));
    }

    fn check<R: Resource>(&self, handle: ResourceHandle<R>, op: &str) {
        assert!(
            handle.graph() == self.graph && handle.index() < self.entries.len(),
            "pass '{}' tries to {} {:?}, which does not belong to this render graph",
            self.pass_name,
            op,
            handle
        );
    }
}
