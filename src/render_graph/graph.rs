//! Render graph construction and compilation

use std::sync::atomic::{AtomicU32, Ordering};

use crate::render_graph::builder::{Access, Builder, Declarations, ErasedAccess};
use crate::render_graph::context::Context;
use crate::render_graph::executor::CompiledGraph;
use crate::render_graph::pass::{BoundPass, ErasedPass, RenderGraphPass};
use crate::render_graph::resource::{
    ErasedEntry, Lifetime, Resource, ResourceEntry, ResourceHandle, ResourceId,
};

static NEXT_GRAPH_ID: AtomicU32 = AtomicU32::new(1);

/// Position of a record in the graph's schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(pub(crate) u32);

impl RecordId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A recorded pass: its render callback plus everything it declared.
pub struct Record<'a> {
    pub(crate) name: String,
    pub(crate) pass: Box<dyn ErasedPass + 'a>,
    pub(crate) declarations: Declarations,
}

impl<'a> Record<'a> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Transients this record allocates, in declaration order.
    pub fn allocates(&self) -> &[ResourceId] {
        &self.declarations.allocates
    }

    /// Resources read, one entry per `read` call.
    pub fn reads(&self) -> impl Iterator<Item = ResourceId> + '_ {
        self.declarations.reads.iter().map(|access| access.resource())
    }

    /// Resources written, one entry per `write` call.
    pub fn writes(&self) -> impl Iterator<Item = ResourceId> + '_ {
        self.declarations.writes.iter().map(|access| access.resource())
    }

    /// Typed reads of kind `R` with their access info.
    pub fn read_accesses<R: Resource>(&self) -> Vec<(ResourceHandle<R>, R::Access)> {
        typed_accesses(&self.declarations.reads)
    }

    /// Typed writes of kind `R` with their access info.
    pub fn write_accesses<R: Resource>(&self) -> Vec<(ResourceHandle<R>, R::Access)> {
        typed_accesses(&self.declarations.writes)
    }

    pub(crate) fn touched(&self) -> impl Iterator<Item = ResourceId> + '_ {
        self.allocates()
            .iter()
            .copied()
            .chain(self.reads())
            .chain(self.writes())
    }
}

impl std::fmt::Debug for Record<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Record")
            .field("name", &self.name)
            .field("allocates", &self.declarations.allocates)
            .field("reads", &self.declarations.reads)
            .field("writes", &self.declarations.writes)
            .finish()
    }
}

fn typed_accesses<R: Resource>(
    accesses: &[Box<dyn ErasedAccess>],
) -> Vec<(ResourceHandle<R>, R::Access)> {
    accesses
        .iter()
        .filter_map(|access| access.as_any().downcast_ref::<Access<R>>())
        .map(|access| (access.handle, access.info.clone()))
        .collect()
}

/// A frame's render graph while passes are being added.
///
/// Passes run in the order they are added. The graph borrows each pass for
/// `'a` and owns every resource entry until the frame is executed.
pub struct RenderGraph<'a> {
    id: u32,
    entries: Vec<Box<dyn ErasedEntry>>,
    records: Vec<Record<'a>>,
    context: Context,
}

impl Default for RenderGraph<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> RenderGraph<'a> {
    pub fn new() -> Self {
        Self {
            id: NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed),
            entries: Vec::new(),
            records: Vec::new(),
            context: Context::new(),
        }
    }

    /// Register a resource the caller owns, such as the swapchain image.
    ///
    /// The graph transitions it like any other resource but never allocates or
    /// releases it. Take it back with
    /// [`ExecutedGraph::take_external`](crate::render_graph::ExecutedGraph::take_external).
    pub fn import<R: Resource>(
        &mut self,
        name: impl Into<String>,
        descriptor: R::Descriptor,
        instance: R,
    ) -> ResourceHandle<R> {
        let name = name.into();
        let handle = ResourceHandle::new(self.entries.len() as u32, self.id);
        log::trace!("Importing {:?} '{}' as {:?}", R::KIND, name, handle.id());
        self.entries
            .push(Box::new(ResourceEntry::external(name, descriptor, instance)));
        handle
    }

    /// Record `pass` and append it to the schedule.
    pub fn add_pass<P: RenderGraphPass>(&mut self, pass: &'a P) -> RecordId
    where
        P::Data: 'a,
    {
        let id = RecordId(self.records.len() as u32);
        let name = pass.name().to_string();
        let mut declarations = Declarations::default();
        let data = {
            let mut builder = Builder::new(self.id, &name, &mut self.entries, &mut declarations);
            pass.record(&mut builder, &mut self.context)
        };
        log::trace!(
            "Recorded pass '{}': {} allocations, {} reads, {} writes",
            name,
            declarations.allocates.len(),
            declarations.reads.len(),
            declarations.writes.len()
        );
        self.records.push(Record {
            name,
            pass: Box::new(BoundPass { pass, data }),
            declarations,
        });
        id
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    pub fn records(&self) -> &[Record<'a>] {
        &self.records
    }

    pub fn resource_count(&self) -> usize {
        self.entries.len()
    }

    pub fn resource_name(&self, id: ResourceId) -> &str {
        self.entries[id.index()].name()
    }

    /// Compute the last record using each resource and the per-record release
    /// lists.
    ///
    /// A transient's allocating record counts as a use, so a transient nobody
    /// accesses is released right after the pass that declared it.
    pub fn compile(self) -> CompiledGraph<'a> {
        let RenderGraph {
            id,
            mut entries,
            records,
            ..
        } = self;

        let mut accessed = vec![false; entries.len()];
        for (index, record) in records.iter().enumerate() {
            let record_id = RecordId(index as u32);
            for resource in record.touched() {
                entries[resource.index()].set_last_user(record_id);
            }
            for resource in record.reads().chain(record.writes()) {
                accessed[resource.index()] = true;
            }
        }

        let mut releases = vec![Vec::new(); records.len()];
        let mut transients = 0;
        for (index, entry) in entries.iter().enumerate() {
            if entry.lifetime() != Lifetime::Transient {
                continue;
            }
            transients += 1;
            if !accessed[index] {
                log::warn!(
                    "Transient '{}' is allocated but never read or written",
                    entry.name()
                );
            }
            if let Some(last) = entry.last_user() {
                releases[last.index()].push(ResourceId(index as u32));
            }
        }

        log::debug!(
            "Render graph compiled: {} passes, {} resources ({} transient)",
            records.len(),
            entries.len(),
            transients
        );

        CompiledGraph::new(id, entries, records, releases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::types::{
        BufferDescriptor, BufferUsage, RenderBuffer, RenderTexture, TextureDescriptor,
        TextureFormat, TextureUsage,
    };
    use crate::backend::Command;
    use crate::render_graph::access::TextureAccess;
    use crate::render_graph::pass::PassResources;

    fn color_desc() -> TextureDescriptor {
        TextureDescriptor::new(
            64,
            64,
            TextureFormat::HDR,
            TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED,
        )
    }

    /// Allocates one texture and writes it.
    struct Producer;

    impl RenderGraphPass for Producer {
        type Data = ResourceHandle<RenderTexture>;

        fn name(&self) -> &str {
            "producer"
        }

        fn record(&self, builder: &mut Builder<'_>, context: &mut Context) -> Self::Data {
            let target = builder.allocate::<RenderTexture>("color", color_desc());
            builder.write(target, TextureAccess::color_attachment());
            context.add(target);
            target
        }

        fn render(&self, _: &mut dyn Command, _: &PassResources<'_>, _: &Self::Data) {}
    }

    /// Reads the producer's texture.
    struct Consumer;

    impl RenderGraphPass for Consumer {
        type Data = ();

        fn name(&self) -> &str {
            "consumer"
        }

        fn record(&self, builder: &mut Builder<'_>, context: &mut Context) {
            let color = *context.get::<ResourceHandle<RenderTexture>>();
            builder.read(color, TextureAccess::sampled(0, 0));
        }

        fn render(&self, _: &mut dyn Command, _: &PassResources<'_>, _: &()) {}
    }

    /// Declares a buffer and never touches it.
    struct Idle;

    impl RenderGraphPass for Idle {
        type Data = ();

        fn name(&self) -> &str {
            "idle"
        }

        fn record(&self, builder: &mut Builder<'_>, _: &mut Context) {
            builder.allocate::<RenderBuffer>(
                "scratch",
                BufferDescriptor::new(64, BufferUsage::STORAGE),
            );
        }

        fn render(&self, _: &mut dyn Command, _: &PassResources<'_>, _: &()) {}
    }

    #[test]
    fn test_add_pass_returns_sequential_ids() {
        let (producer, consumer) = (Producer, Consumer);
        let mut graph = RenderGraph::new();
        assert_eq!(graph.add_pass(&producer), RecordId(0));
        assert_eq!(graph.add_pass(&consumer), RecordId(1));
        assert_eq!(graph.records().len(), 2);
        assert_eq!(graph.records()[0].name(), "producer");
    }

    #[test]
    fn test_compile_tracks_last_user() {
        let (producer, consumer) = (Producer, Consumer);
        let mut graph = RenderGraph::new();
        graph.add_pass(&producer);
        graph.add_pass(&consumer);
        let color = graph.records()[0].allocates()[0];

        let compiled = graph.compile();
        assert_eq!(compiled.last_user(color), Some(RecordId(1)));
        assert!(compiled.release_schedule(RecordId(0)).is_empty());
        assert_eq!(compiled.release_schedule(RecordId(1)), &[color]);
    }

    #[test]
    fn test_unaccessed_transient_released_after_allocating_pass() {
        let (idle, producer) = (Idle, Producer);
        let mut graph = RenderGraph::new();
        graph.add_pass(&idle);
        graph.add_pass(&producer);
        let scratch = graph.records()[0].allocates()[0];

        let compiled = graph.compile();
        assert_eq!(compiled.last_user(scratch), Some(RecordId(0)));
        assert_eq!(compiled.release_schedule(RecordId(0)), &[scratch]);
    }

    #[test]
    fn test_record_exposes_typed_accesses() {
        let producer = Producer;
        let mut graph = RenderGraph::new();
        graph.add_pass(&producer);

        let writes = graph.records()[0].write_accesses::<RenderTexture>();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].1, TextureAccess::color_attachment());
        assert!(graph.records()[0]
            .write_accesses::<RenderBuffer>()
            .is_empty());
        assert!(graph.records()[0].read_accesses::<RenderBuffer>().is_empty());
    }

    #[test]
    fn test_imported_resource_is_never_scheduled_for_release() {
        let consumer = Consumer;
        let mut factory = crate::backend::dummy::DummyFactory::new();
        let backbuffer = factory.external_texture(color_desc());

        let mut graph = RenderGraph::new();
        let handle = graph.import("backbuffer", color_desc(), backbuffer);
        graph.context_mut().add(handle);
        graph.add_pass(&consumer);

        let compiled = graph.compile();
        assert_eq!(compiled.last_user(handle.id()), Some(RecordId(0)));
        assert!(compiled.release_schedule(RecordId(0)).is_empty());
    }

    #[test]
    #[should_panic(expected = "does not belong to this render graph")]
    fn test_foreign_handle_panics() {
        let producer = Producer;
        let mut first = RenderGraph::new();
        first.add_pass(&producer);
        let stale = *first.context().get::<ResourceHandle<RenderTexture>>();

        let consumer = Consumer;
        let mut second = RenderGraph::new();
        second.add_pass(&producer);
        let mut context = Context::new();
        context.add(stale);
        let mut declarations = Declarations::default();
        let mut builder = Builder::new(second.id, "consumer", &mut second.entries, &mut declarations);
        consumer.record(&mut builder, &mut context);
    }
}
