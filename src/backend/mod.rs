//! Backend abstraction layer.
//!
//! The render graph talks to the GPU through two seams:
//!
//! - [`Command`] - records barriers, opens and closes pass scopes, and carries
//!   the pass-content operations user passes call from `render`.
//! - [`Allocator`] - hands out and takes back concrete textures and buffers.
//!   [`PooledAllocator`] implements it on top of a [`ResourceFactory`].
//!
//! # Available Backends
//!
//! - `dummy` (always built): handle-only resources and a recording command
//!   stream, for tests and headless tooling
//! - `vulkan-backend`: native Vulkan via ash and gpu-allocator
//!
//! Everything in [`crate::render_graph`] is backend-agnostic; a new backend only
//! implements the traits in this module.

pub mod dummy;
pub mod error;
pub mod pool;
pub mod state;
pub mod types;

#[cfg(feature = "vulkan-backend")]
pub mod vulkan;

pub use dummy::{CommandEvent, DummyFactory, RecordingCommand};
pub use error::{BackendError, BackendResult};
pub use pool::{AllocatorStats, PoolConfig, PooledAllocator};
pub use state::{
    transition, AccessFlags, PipelineStages, ResourceState, TextureLayout, TrackedState, Transition,
};
pub use types::{
    BufferDescriptor, BufferUsage, GpuBuffer, GpuTexture, RenderBuffer, RenderTexture,
    TextureDescriptor, TextureFormat, TextureUsage,
};

use glam::Mat4;

use crate::render_graph::access::{BufferAccess, TextureAccess};
use crate::scene::{Camera, Primitive};

/// Backend command recording interface used while a graph executes.
///
/// `before_*` calls arrive for every declared access of a record, reads first,
/// then writes, followed by `begin_pass`, the pass's `render`, and `end_pass`.
/// Implementations must route every access through [`transition`] so the
/// resource's [`TrackedState`] stays current.
pub trait Command {
    fn before_read_texture(
        &mut self,
        descriptor: &TextureDescriptor,
        texture: &mut RenderTexture,
        access: &TextureAccess,
    );

    /// Attachment writes also register the texture as an attachment of the
    /// upcoming pass scope.
    fn before_write_texture(
        &mut self,
        descriptor: &TextureDescriptor,
        texture: &mut RenderTexture,
        access: &TextureAccess,
    );

    fn before_read_buffer(
        &mut self,
        descriptor: &BufferDescriptor,
        buffer: &mut RenderBuffer,
        access: &BufferAccess,
    );

    fn before_write_buffer(
        &mut self,
        descriptor: &BufferDescriptor,
        buffer: &mut RenderBuffer,
        access: &BufferAccess,
    );

    /// Open a rendering scope over the attachments written by the current record.
    /// Does nothing when the record wrote no attachments.
    fn begin_pass(&mut self, name: &str);

    fn end_pass(&mut self);

    /// Draw scene geometry with the main camera.
    fn draw_geometry(&mut self, camera: &Camera, primitives: &[Primitive]);

    /// Draw depth-only geometry from a light's point of view.
    fn draw_shadow(&mut self, light_view_projection: Mat4, primitives: &[Primitive]);

    /// Copy `src` onto `dst`, scaling to `dst`'s extent.
    fn blit(&mut self, src: &RenderTexture, dst: &RenderTexture);

    /// Write `data` into `buffer` at `offset`.
    fn update_buffer(&mut self, buffer: &RenderBuffer, offset: u64, data: &[u8]);
}

/// Allocation interface the graph uses for transient resources.
///
/// `allocate_*` must return a resource matching the descriptor exactly;
/// `release_*` hands it back for reuse by a later identical request.
pub trait Allocator {
    fn allocate_texture(&mut self, descriptor: &TextureDescriptor) -> BackendResult<RenderTexture>;

    fn release_texture(&mut self, descriptor: &TextureDescriptor, texture: RenderTexture);

    fn allocate_buffer(&mut self, descriptor: &BufferDescriptor) -> BackendResult<RenderBuffer>;

    fn release_buffer(&mut self, descriptor: &BufferDescriptor, buffer: RenderBuffer);
}

/// Creates and destroys the actual GPU objects behind pooled resources.
pub trait ResourceFactory {
    fn create_texture(&mut self, descriptor: &TextureDescriptor) -> BackendResult<RenderTexture>;

    fn destroy_texture(&mut self, texture: RenderTexture);

    fn create_buffer(&mut self, descriptor: &BufferDescriptor) -> BackendResult<RenderBuffer>;

    fn destroy_buffer(&mut self, buffer: RenderBuffer);
}
