//! Render Graph System
//!
//! Passes declare which resources they allocate, read and write; the graph
//! runs them in the order they were added, inserts the transitions each access
//! needs through a backend [`Command`](crate::backend::Command), and recycles
//! transient resources through an [`Allocator`](crate::backend::Allocator).
//!
//! A frame moves through three states, each consuming the previous one:
//!
//! 1. [`RenderGraph`]: `import` external resources and `add_pass` passes.
//! 2. [`CompiledGraph`]: last uses and release lists are known.
//! 3. [`ExecutedGraph`]: everything has been recorded; imported resources can
//!    be taken back.
//!
//! ```ignore
//! let mut graph = RenderGraph::new();
//! let backbuffer = graph.import("backbuffer", descriptor, swapchain_image);
//! graph.context_mut().add(Backbuffer(backbuffer));
//! graph.add_pass(&shadow_pass);
//! graph.add_pass(&forward_pass);
//! let mut executed = graph.compile().execute(&mut command, &mut allocator)?;
//! let swapchain_image = executed.take_external(backbuffer);
//! ```

pub mod access;
pub mod builder;
pub mod context;
pub mod executor;
pub mod graph;
pub mod pass;
pub mod resource;

pub use access::{AttachmentAspect, BufferAccess, BufferAccessKind, SamplerKind, TextureAccess};
pub use builder::Builder;
pub use context::Context;
pub use executor::{CompiledGraph, ExecutedGraph, ExecutionStats};
pub use graph::{Record, RecordId, RenderGraph};
pub use pass::{PassResources, RenderGraphPass};
pub use resource::{Lifetime, Resource, ResourceHandle, ResourceId, ResourceKind};

use thiserror::Error;

use crate::backend::error::BackendError;

/// Errors raised while executing a frame.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("failed to allocate '{resource}' for pass '{pass}'")]
    Allocation {
        resource: String,
        pass: String,
        #[source]
        source: BackendError,
    },
}
