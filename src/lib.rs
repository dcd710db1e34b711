//! Frame Graph - a per-frame render graph with pooled transient resources
//!
//! Rendering passes declare which textures and buffers they allocate, read and
//! write without knowing about each other. The graph runs them in declaration
//! order, inserts the layout and access transitions each declared access needs,
//! and hands transient resources back to a descriptor-keyed pool as soon as
//! their last user has rendered.
//!
//! # Backends
//! - **dummy**: handle-only resources and a recording command stream (always built)
//! - **Vulkan**: barriers, dynamic rendering and gpu-allocator images via ash
//!   (feature `vulkan-backend`, on by default)
//!
//! # Features
//! - Typed resource handles and a type-erased resource store
//! - Typed context for passing payloads between independent passes
//! - Automatic barrier generation from declared accesses
//! - Resource pooling across and within frames
//! - A forward pipeline (camera upload, shadow map, forward shading, present blit)

pub mod backend;
pub mod pipeline;
pub mod render_graph;
pub mod scene;

pub use backend::{
    Allocator, BackendError, Command, DummyFactory, PoolConfig, PooledAllocator,
    RecordingCommand, RenderBuffer, RenderTexture, ResourceFactory,
};
pub use pipeline::{ForwardConfig, ForwardRenderer, RendererError};
pub use render_graph::{
    Builder, Context, GraphError, PassResources, RenderGraph, RenderGraphPass, ResourceHandle,
};
pub use scene::{Camera, Scene};
