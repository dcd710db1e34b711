//! Render graph execution

use crate::backend::{Allocator, Command};
use crate::render_graph::graph::{Record, RecordId};
use crate::render_graph::pass::PassResources;
use crate::render_graph::resource::{
    downcast_entry, downcast_entry_mut, ErasedEntry, Lifetime, Resource, ResourceHandle,
    ResourceId, ResourceKind,
};
use crate::render_graph::GraphError;

/// Counters for one executed frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionStats {
    pub passes: usize,
    pub allocations: usize,
    pub releases: usize,
    pub reads: usize,
    pub writes: usize,
}

/// A graph whose resource lifetimes are known, ready to execute.
pub struct CompiledGraph<'a> {
    graph: u32,
    entries: Vec<Box<dyn ErasedEntry>>,
    records: Vec<Record<'a>>,
    releases: Vec<Vec<ResourceId>>,
}

impl<'a> CompiledGraph<'a> {
    pub(crate) fn new(
        graph: u32,
        entries: Vec<Box<dyn ErasedEntry>>,
        records: Vec<Record<'a>>,
        releases: Vec<Vec<ResourceId>>,
    ) -> Self {
        Self {
            graph,
            entries,
            records,
            releases,
        }
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

    pub fn lifetime(&self, id: ResourceId) -> Lifetime {
        self.entries[id.index()].lifetime()
    }

    pub fn kind(&self, id: ResourceId) -> ResourceKind {
        self.entries[id.index()].kind()
    }

    /// Last record that allocates, reads or writes `id`.
    pub fn last_user(&self, id: ResourceId) -> Option<RecordId> {
        self.entries[id.index()].last_user()
    }

    /// Transients released right after `record` renders.
    pub fn release_schedule(&self, record: RecordId) -> &[ResourceId] {
        &self.releases[record.index()]
    }

    /// Run every record in order.
    ///
    /// For each record: allocate its transients, issue `before_read` for every
    /// read and `before_write` for every write, wrap `render` in
    /// `begin_pass`/`end_pass`, then release the transients whose last use it
    /// was. If an allocation fails, every live transient is handed back to the
    /// allocator and the frame is abandoned.
    pub fn execute(
        self,
        command: &mut dyn Command,
        allocator: &mut dyn Allocator,
    ) -> Result<ExecutedGraph, GraphError> {
        let CompiledGraph {
            graph,
            mut entries,
            records,
            releases,
        } = self;
        let mut stats = ExecutionStats::default();

        for (record, release_list) in records.iter().zip(&releases) {
            for &resource in record.allocates() {
                let entry = &mut entries[resource.index()];
                if let Err(source) = entry.allocate(allocator) {
                    let error = GraphError::Allocation {
                        resource: entry.name().to_string(),
                        pass: record.name().to_string(),
                        source,
                    };
                    log::error!("{}", error);
                    release_live(&mut entries, allocator);
                    return Err(error);
                }
                stats.allocations += 1;
                log::trace!("Allocated '{}' for pass '{}'", entry.name(), record.name());
            }

            for access in &record.declarations.reads {
                access.before_read(entries[access.resource().index()].as_mut(), command);
                stats.reads += 1;
            }
            for access in &record.declarations.writes {
                access.before_write(entries[access.resource().index()].as_mut(), command);
                stats.writes += 1;
            }

            command.begin_pass(record.name());
            record.pass.render(command, &PassResources { entries: &entries });
            command.end_pass();
            stats.passes += 1;

            for &resource in release_list {
                let entry = &mut entries[resource.index()];
                if entry.release(allocator) {
                    stats.releases += 1;
                    log::trace!("Released '{}' after pass '{}'", entry.name(), record.name());
                }
            }
        }

        log::debug!(
            "Render graph executed: {} passes, {} allocations, {} releases, {} barriers requested",
            stats.passes,
            stats.allocations,
            stats.releases,
            stats.reads + stats.writes
        );

        Ok(ExecutedGraph {
            graph,
            entries,
            stats,
        })
    }
}

/// Hand every still-allocated transient back to the allocator.
fn release_live(entries: &mut [Box<dyn ErasedEntry>], allocator: &mut dyn Allocator) {
    let mut released = 0;
    for entry in entries.iter_mut() {
        if entry.is_populated() && entry.release(allocator) {
            released += 1;
        }
    }
    log::debug!("Returned {} live transients after aborted frame", released);
}

/// A frame that has finished executing.
///
/// All transients are back in the allocator. Imported resources stay here,
/// carrying their final tracked state, until taken back.
pub struct ExecutedGraph {
    graph: u32,
    entries: Vec<Box<dyn ErasedEntry>>,
    stats: ExecutionStats,
}

impl ExecutedGraph {
    pub fn stats(&self) -> ExecutionStats {
        self.stats
    }

    /// Imported resource behind `handle`, if it was not taken yet.
    pub fn external<R: Resource>(&self, handle: ResourceHandle<R>) -> Option<&R> {
        self.check(handle);
        let entry = downcast_entry::<R>(self.entries[handle.index()].as_ref());
        match entry.lifetime {
            Lifetime::External => entry.instance.as_ref(),
            Lifetime::Transient => None,
        }
    }

    /// Move an imported resource back out of the graph.
    ///
    /// Returns `None` for transients and for externals already taken.
    pub fn take_external<R: Resource>(&mut self, handle: ResourceHandle<R>) -> Option<R> {
        self.check(handle);
        let entry = downcast_entry_mut::<R>(self.entries[handle.index()].as_mut());
        match entry.lifetime {
            Lifetime::External => entry.instance.take(),
            Lifetime::Transient => None,
        }
    }

    fn check<R: Resource>(&self, handle: ResourceHandle<R>) {
        assert!(
            handle.graph() == self.graph && handle.index() < self.entries.len(),
            "{:?} does not belong to this render graph",
            handle
        );
    }
}
