//! Descriptor-keyed resource pooling.
//!
//! [`PooledAllocator`] keeps released textures and buffers in free lists keyed
//! by their exact descriptor. A later request with an identical descriptor,
//! in the same frame or a following one, gets a pooled instance back instead of
//! a freshly created one.
//!
//! Pooled resources that sit unused for more than
//! [`PoolConfig::max_idle_frames`] calls to [`PooledAllocator::end_frame`] are
//! destroyed, so a resolution change does not pin the old targets forever.

use std::collections::HashMap;
use std::hash::Hash;

use crate::backend::error::BackendResult;
use crate::backend::types::{BufferDescriptor, RenderBuffer, RenderTexture, TextureDescriptor};
use crate::backend::{Allocator, ResourceFactory};

/// Configuration for [`PooledAllocator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Frames a pooled resource may stay unused before it is destroyed.
    pub max_idle_frames: u32,
    /// Maximum free instances kept per descriptor; extra releases are destroyed.
    pub max_per_descriptor: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle_frames: 8,
            max_per_descriptor: 4,
        }
    }
}

impl PoolConfig {
    pub fn with_max_idle_frames(mut self, frames: u32) -> Self {
        self.max_idle_frames = frames;
        self
    }

    pub fn with_max_per_descriptor(mut self, count: usize) -> Self {
        self.max_per_descriptor = count;
        self
    }
}

/// Counters describing pool behaviour since creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocatorStats {
    /// Resources constructed by the factory (pool misses).
    pub created: u64,
    /// Requests served from the pool (pool hits).
    pub reused: u64,
    /// Resources handed back through `release_*`.
    pub released: u64,
    /// Resources destroyed through the factory.
    pub destroyed: u64,
}

struct Pooled<R> {
    resource: R,
    idle_frames: u32,
}

/// Free lists for one resource kind.
struct ResourcePool<D, R> {
    free: HashMap<D, Vec<Pooled<R>>>,
}

impl<D: Eq + Hash + Copy, R> ResourcePool<D, R> {
    fn new() -> Self {
        Self {
            free: HashMap::new(),
        }
    }

    fn acquire(&mut self, descriptor: &D) -> Option<R> {
        self.free
            .get_mut(descriptor)?
            .pop()
            .map(|pooled| pooled.resource)
    }

    /// Returns the resource back if the free list for `descriptor` is full.
    fn release(&mut self, descriptor: D, resource: R, capacity: usize) -> Option<R> {
        let list = self.free.entry(descriptor).or_default();
        if list.len() >= capacity {
            return Some(resource);
        }
        list.push(Pooled {
            resource,
            idle_frames: 0,
        });
        None
    }

    /// Age every free resource by one frame and return those past `max_idle`.
    fn age(&mut self, max_idle: u32) -> Vec<R> {
        let mut evicted = Vec::new();
        for list in self.free.values_mut() {
            let mut kept = Vec::with_capacity(list.len());
            for mut pooled in list.drain(..) {
                pooled.idle_frames += 1;
                if pooled.idle_frames > max_idle {
                    evicted.push(pooled.resource);
                } else {
                    kept.push(pooled);
                }
            }
            *list = kept;
        }
        self.free.retain(|_, list| !list.is_empty());
        evicted
    }

    fn drain(&mut self) -> Vec<R> {
        self.free
            .drain()
            .flat_map(|(_, list)| list.into_iter().map(|pooled| pooled.resource))
            .collect()
    }

    fn len(&self) -> usize {
        self.free.values().map(Vec::len).sum()
    }
}

/// [`Allocator`] that recycles resources through descriptor-keyed pools.
///
/// The pool outlives individual frames; it is the sole owner of released
/// resources until they are handed out again or destroyed.
pub struct PooledAllocator<F: ResourceFactory> {
    factory: F,
    config: PoolConfig,
    textures: ResourcePool<TextureDescriptor, RenderTexture>,
    buffers: ResourcePool<BufferDescriptor, RenderBuffer>,
    stats: AllocatorStats,
}

impl<F: ResourceFactory> PooledAllocator<F> {
    pub fn new(factory: F) -> Self {
        Self::with_config(factory, PoolConfig::default())
    }

    pub fn with_config(factory: F, config: PoolConfig) -> Self {
        Self {
            factory,
            config,
            textures: ResourcePool::new(),
            buffers: ResourcePool::new(),
            stats: AllocatorStats::default(),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn stats(&self) -> AllocatorStats {
        self.stats
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn factory_mut(&mut self) -> &mut F {
        &mut self.factory
    }

    /// Number of free textures currently held.
    pub fn pooled_textures(&self) -> usize {
        self.textures.len()
    }

    /// Number of free buffers currently held.
    pub fn pooled_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// Mark the end of a frame and destroy resources idle for too long.
    ///
    /// Must only be called once the GPU is done with the frame's work.
    pub fn end_frame(&mut self) {
        let max_idle = self.config.max_idle_frames;
        let textures = self.textures.age(max_idle);
        let buffers = self.buffers.age(max_idle);

        if !textures.is_empty() || !buffers.is_empty() {
            log::debug!(
                "Pool eviction: {} textures, {} buffers idle for more than {} frames",
                textures.len(),
                buffers.len(),
                max_idle
            );
        }

        for texture in textures {
            self.destroy_texture(texture);
        }
        for buffer in buffers {
            self.destroy_buffer(buffer);
        }
    }

    /// Destroy every pooled resource.
    pub fn clear(&mut self) {
        for texture in self.textures.drain() {
            self.destroy_texture(texture);
        }
        for buffer in self.buffers.drain() {
            self.destroy_buffer(buffer);
        }
    }

    fn destroy_texture(&mut self, texture: RenderTexture) {
        log::trace!("Pool: destroying texture {}", texture.id());
        self.stats.destroyed += 1;
        self.factory.destroy_texture(texture);
    }

    fn destroy_buffer(&mut self, buffer: RenderBuffer) {
        log::trace!("Pool: destroying buffer {}", buffer.id());
        self.stats.destroyed += 1;
        self.factory.destroy_buffer(buffer);
    }
}

impl<F: ResourceFactory> Allocator for PooledAllocator<F> {
    fn allocate_texture(&mut self, descriptor: &TextureDescriptor) -> BackendResult<RenderTexture> {
        if let Some(mut texture) = self.textures.acquire(descriptor) {
            // The previous owner's contents are not carried over.
            texture.discard_contents();
            self.stats.reused += 1;
            log::trace!("Pool hit: texture {} for {:?}", texture.id(), descriptor);
            return Ok(texture);
        }

        let texture = self.factory.create_texture(descriptor)?;
        self.stats.created += 1;
        log::trace!("Pool miss: created texture {} for {:?}", texture.id(), descriptor);
        Ok(texture)
    }

    fn release_texture(&mut self, descriptor: &TextureDescriptor, texture: RenderTexture) {
        self.stats.released += 1;
        if let Some(overflow) =
            self.textures
                .release(*descriptor, texture, self.config.max_per_descriptor)
        {
            self.destroy_texture(overflow);
        }
    }

    fn allocate_buffer(&mut self, descriptor: &BufferDescriptor) -> BackendResult<RenderBuffer> {
        if let Some(buffer) = self.buffers.acquire(descriptor) {
            self.stats.reused += 1;
            log::trace!("Pool hit: buffer {} for {:?}", buffer.id(), descriptor);
            return Ok(buffer);
        }

        let buffer = self.factory.create_buffer(descriptor)?;
        self.stats.created += 1;
        log::trace!("Pool miss: created buffer {} for {:?}", buffer.id(), descriptor);
        Ok(buffer)
    }

    fn release_buffer(&mut self, descriptor: &BufferDescriptor, buffer: RenderBuffer) {
        self.stats.released += 1;
        if let Some(overflow) =
            self.buffers
                .release(*descriptor, buffer, self.config.max_per_descriptor)
        {
            self.destroy_buffer(overflow);
        }
    }
}

impl<F: ResourceFactory> Drop for PooledAllocator<F> {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::{DummyFactory, RecordingCommand};
    use crate::backend::state::{PipelineStages, TextureLayout};
    use crate::backend::types::{BufferUsage, TextureFormat, TextureUsage};
    use crate::backend::Command;
    use crate::render_graph::access::TextureAccess;

    fn shadow_desc() -> TextureDescriptor {
        TextureDescriptor::new(
            2048,
            2048,
            TextureFormat::DEPTH,
            TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED,
        )
    }

    #[test]
    fn test_release_then_allocate_reuses_instance() {
        let mut pool = PooledAllocator::new(DummyFactory::new());
        let desc = shadow_desc();

        let first = pool.allocate_texture(&desc).unwrap();
        let id = first.id();
        pool.release_texture(&desc, first);

        let second = pool.allocate_texture(&desc).unwrap();
        assert_eq!(second.id(), id);
        assert_eq!(pool.stats().created, 1);
        assert_eq!(pool.stats().reused, 1);
    }

    #[test]
    fn test_reused_texture_starts_discarded() {
        let mut pool = PooledAllocator::new(DummyFactory::new());
        let desc = shadow_desc();
        let mut command = RecordingCommand::new();

        let mut texture = pool.allocate_texture(&desc).unwrap();
        command.before_write_texture(&desc, &mut texture, &TextureAccess::depth_attachment());
        assert!(!texture.contents_discarded());
        pool.release_texture(&desc, texture);

        let reused = pool.allocate_texture(&desc).unwrap();
        assert!(reused.contents_discarded());
        assert_eq!(reused.state().layout, TextureLayout::Undefined);
        assert!(reused.state().stages.contains(PipelineStages::LATE_FRAGMENT_TESTS));
    }

    #[test]
    fn test_different_descriptor_misses() {
        let mut pool = PooledAllocator::new(DummyFactory::new());
        let desc = shadow_desc();
        let other = TextureDescriptor {
            width: 1024,
            ..desc
        };

        let texture = pool.allocate_texture(&desc).unwrap();
        pool.release_texture(&desc, texture);
        let _ = pool.allocate_texture(&other).unwrap();

        assert_eq!(pool.stats().created, 2);
        assert_eq!(pool.pooled_textures(), 1);
    }

    #[test]
    fn test_idle_resources_are_evicted() {
        let config = PoolConfig::default().with_max_idle_frames(2);
        let mut pool = PooledAllocator::with_config(DummyFactory::new(), config);
        let desc = BufferDescriptor::new(256, BufferUsage::UNIFORM | BufferUsage::COPY_DST);

        let buffer = pool.allocate_buffer(&desc).unwrap();
        pool.release_buffer(&desc, buffer);

        pool.end_frame();
        pool.end_frame();
        assert_eq!(pool.pooled_buffers(), 1);

        pool.end_frame();
        assert_eq!(pool.pooled_buffers(), 0);
        assert_eq!(pool.stats().destroyed, 1);
        assert_eq!(pool.factory().live_buffers(), 0);
    }

    #[test]
    fn test_overflow_is_destroyed() {
        let config = PoolConfig::default().with_max_per_descriptor(1);
        let mut pool = PooledAllocator::with_config(DummyFactory::new(), config);
        let desc = shadow_desc();

        let a = pool.allocate_texture(&desc).unwrap();
        let b = pool.allocate_texture(&desc).unwrap();
        pool.release_texture(&desc, a);
        pool.release_texture(&desc, b);

        assert_eq!(pool.pooled_textures(), 1);
        assert_eq!(pool.stats().destroyed, 1);
    }

    #[test]
    fn test_clear_destroys_everything() {
        let mut pool = PooledAllocator::new(DummyFactory::new());
        let desc = shadow_desc();
        let texture = pool.allocate_texture(&desc).unwrap();
        pool.release_texture(&desc, texture);

        pool.clear();

        assert_eq!(pool.pooled_textures(), 0);
        assert_eq!(pool.factory().live_textures(), 0);
    }
}
