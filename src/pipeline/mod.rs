//! Forward rendering pipeline
//!
//! This module wires concrete passes into a render graph:
//! 1. Camera pass - Uploads the camera uniform block
//! 2. Shadow pass - Renders the sun's shadow map (when the scene has a sun)
//! 3. Forward pass - Shades scene geometry into an HDR target
//! 4. Present pass - Blits the HDR target onto the backbuffer
//!
//! Passes never reference each other. Each one publishes its outputs as a
//! payload in the graph [`Context`](crate::render_graph::Context) and looks up
//! the payloads it depends on.

pub mod camera_pass;
pub mod forward_pass;
pub mod present_pass;
pub mod shadow_pass;

pub use camera_pass::CameraPass;
pub use forward_pass::ForwardPass;
pub use present_pass::PresentPass;
pub use shadow_pass::ShadowPass;

use glam::Mat4;
use thiserror::Error;

use crate::backend::pool::{AllocatorStats, PoolConfig, PooledAllocator};
use crate::backend::types::{RenderBuffer, RenderTexture, TextureFormat};
use crate::backend::{Command, ResourceFactory};
use crate::render_graph::{ExecutionStats, GraphError, RenderGraph, ResourceHandle};
use crate::scene::Scene;

/// Configuration for the forward pipeline
#[derive(Debug, Clone)]
pub struct ForwardConfig {
    /// Width and height of the square shadow map
    pub shadow_map_size: u32,
    /// Format of the intermediate color target
    pub hdr_format: TextureFormat,
    /// Format of the main depth buffer and the shadow map
    pub depth_format: TextureFormat,
    /// Render the sun's shadow map
    pub shadows: bool,
    /// Pooling behaviour of the frame allocator
    pub pool: PoolConfig,
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            shadow_map_size: 2048,
            hdr_format: TextureFormat::HDR,
            depth_format: TextureFormat::DEPTH,
            shadows: true,
            pool: PoolConfig::default(),
        }
    }
}

impl ForwardConfig {
    pub fn with_shadow_map_size(mut self, size: u32) -> Self {
        self.shadow_map_size = size;
        self
    }

    pub fn with_shadows(mut self, enabled: bool) -> Self {
        self.shadows = enabled;
        self
    }

    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }
}

/// The frame's output image, published before any pass is added.
#[derive(Debug, Clone, Copy)]
pub struct Backbuffer {
    pub texture: ResourceHandle<RenderTexture>,
    pub width: u32,
    pub height: u32,
}

/// Published by [`CameraPass`].
#[derive(Debug, Clone, Copy)]
pub struct CameraOutput {
    pub uniform_buffer: ResourceHandle<RenderBuffer>,
}

/// Published by [`ShadowPass`].
#[derive(Debug, Clone, Copy)]
pub struct ShadowOutput {
    pub shadow_map: ResourceHandle<RenderTexture>,
    pub light_view_projection: Mat4,
}

/// Published by [`ForwardPass`].
#[derive(Debug, Clone, Copy)]
pub struct ForwardOutput {
    pub color: ResourceHandle<RenderTexture>,
    pub depth: ResourceHandle<RenderTexture>,
}

/// Errors from [`ForwardRenderer::render`].
#[derive(Error, Debug)]
pub enum RendererError {
    #[error("backbuffer extent {0}x{1} is empty")]
    EmptyBackbuffer(u32, u32),
    #[error("backbuffer was not returned by the graph")]
    MissingBackbuffer,
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Result of one rendered frame.
#[derive(Debug)]
pub struct Frame {
    /// The backbuffer handed to `render`, in its final tracked state.
    pub backbuffer: RenderTexture,
    pub stats: ExecutionStats,
}

/// Builds, compiles and executes the forward pipeline's graph every frame.
///
/// The renderer owns the pooled allocator, so transient targets are reused
/// from one frame to the next.
pub struct ForwardRenderer<F: ResourceFactory> {
    config: ForwardConfig,
    allocator: PooledAllocator<F>,
    frame_index: u64,
}

impl<F: ResourceFactory> ForwardRenderer<F> {
    pub fn new(factory: F, config: ForwardConfig) -> Self {
        let allocator = PooledAllocator::with_config(factory, config.pool);
        Self {
            config,
            allocator,
            frame_index: 0,
        }
    }

    pub fn config(&self) -> &ForwardConfig {
        &self.config
    }

    pub fn allocator(&self) -> &PooledAllocator<F> {
        &self.allocator
    }

    pub fn allocator_stats(&self) -> AllocatorStats {
        self.allocator.stats()
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Render `scene` into `backbuffer`.
    ///
    /// `command` must be recording. On success the backbuffer comes back in
    /// [`Frame`], left in the transfer-destination state of the final blit; the
    /// caller transitions it for presentation. On failure it is dropped along
    /// with the graph.
    pub fn render(
        &mut self,
        scene: &Scene,
        command: &mut dyn Command,
        backbuffer: RenderTexture,
    ) -> Result<Frame, RendererError> {
        let descriptor = *backbuffer.descriptor();
        if descriptor.width == 0 || descriptor.height == 0 {
            return Err(RendererError::EmptyBackbuffer(
                descriptor.width,
                descriptor.height,
            ));
        }

        let camera_pass = CameraPass::new(&scene.camera);
        let shadow_pass = scene
            .sun
            .as_ref()
            .filter(|_| self.config.shadows)
            .map(|sun| ShadowPass::new(sun, scene, &self.config));
        let forward_pass = ForwardPass::new(scene, &self.config);
        let present_pass = PresentPass;

        let mut graph = RenderGraph::new();
        let texture = graph.import("backbuffer", descriptor, backbuffer);
        graph.context_mut().add(Backbuffer {
            texture,
            width: descriptor.width,
            height: descriptor.height,
        });

        graph.add_pass(&camera_pass);
        if let Some(shadow_pass) = &shadow_pass {
            graph.add_pass(shadow_pass);
        }
        graph.add_pass(&forward_pass);
        graph.add_pass(&present_pass);

        let mut executed = graph.compile().execute(command, &mut self.allocator)?;
        self.allocator.end_frame();
        self.frame_index += 1;

        let stats = executed.stats();
        log::debug!(
            "Frame {}: {} passes, pool {:?}",
            self.frame_index,
            stats.passes,
            self.allocator.stats()
        );

        let backbuffer = executed
            .take_external(texture)
            .ok_or(RendererError::MissingBackbuffer)?;
        Ok(Frame { backbuffer, stats })
    }
}
