//! Common utilities for render graph integration tests.
//!
//! Provides a scripted pass whose `record` is a closure, a shared journal that
//! interleaves allocator and pass activity, and allocators that trace or fail
//! on demand.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use frame_graph::backend::types::{TextureFormat, TextureUsage};
use frame_graph::backend::{
    Allocator, BackendError, BackendResult, BufferDescriptor, DummyFactory, PooledAllocator,
    RenderBuffer, RenderTexture, ResourceFactory, TextureDescriptor,
};
use frame_graph::render_graph::{Builder, Context, PassResources, RenderGraphPass};
use frame_graph::Command;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// Descriptors
// ============================================================================

pub fn hdr_descriptor(width: u32, height: u32) -> TextureDescriptor {
    TextureDescriptor::new(
        width,
        height,
        TextureFormat::HDR,
        TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED | TextureUsage::COPY_SRC,
    )
}

pub fn backbuffer_descriptor(width: u32, height: u32) -> TextureDescriptor {
    TextureDescriptor::new(
        width,
        height,
        TextureFormat::Bgra8UnormSrgb,
        TextureUsage::RENDER_TARGET | TextureUsage::COPY_DST,
    )
}

pub fn shadow_descriptor(size: u32) -> TextureDescriptor {
    TextureDescriptor::new(
        size,
        size,
        TextureFormat::DEPTH,
        TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED,
    )
}

// ============================================================================
// Journal
// ============================================================================

/// Ordered log shared by passes and allocators of one test.
#[derive(Clone, Default)]
pub struct Journal(Rc<RefCell<Vec<String>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.0.borrow().iter().position(|e| e == entry)
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.0.borrow().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

// ============================================================================
// Scripted pass
// ============================================================================

type RecordFn = Box<dyn Fn(&mut Builder<'_>, &mut Context)>;

/// A pass whose declarations come from a closure. `render` only journals.
pub struct ScriptedPass {
    name: String,
    script: RecordFn,
    journal: Journal,
}

impl ScriptedPass {
    pub fn new(
        name: &str,
        journal: &Journal,
        script: impl Fn(&mut Builder<'_>, &mut Context) + 'static,
    ) -> Self {
        Self {
            name: name.to_string(),
            script: Box::new(script),
            journal: journal.clone(),
        }
    }
}

impl RenderGraphPass for ScriptedPass {
    type Data = ();

    fn name(&self) -> &str {
        &self.name
    }

    fn record(&self, builder: &mut Builder<'_>, context: &mut Context) {
        (self.script)(builder, context);
    }

    fn render(&self, _command: &mut dyn Command, _resources: &PassResources<'_>, _data: &()) {
        self.journal.push(format!("render {}", self.name));
    }
}

// ============================================================================
// Allocators
// ============================================================================

/// Pooled allocator that journals every allocate and release by resource id.
pub struct TracingAllocator<F: ResourceFactory> {
    pub inner: PooledAllocator<F>,
    journal: Journal,
}

impl<F: ResourceFactory> TracingAllocator<F> {
    pub fn new(factory: F, journal: &Journal) -> Self {
        Self {
            inner: PooledAllocator::new(factory),
            journal: journal.clone(),
        }
    }
}

impl<F: ResourceFactory> Allocator for TracingAllocator<F> {
    fn allocate_texture(&mut self, descriptor: &TextureDescriptor) -> BackendResult<RenderTexture> {
        let texture = self.inner.allocate_texture(descriptor)?;
        self.journal
            .push(format!("allocate {}x{}", descriptor.width, descriptor.height));
        Ok(texture)
    }

    fn release_texture(&mut self, descriptor: &TextureDescriptor, texture: RenderTexture) {
        self.journal
            .push(format!("release {}x{}", descriptor.width, descriptor.height));
        self.inner.release_texture(descriptor, texture);
    }

    fn allocate_buffer(&mut self, descriptor: &BufferDescriptor) -> BackendResult<RenderBuffer> {
        let buffer = self.inner.allocate_buffer(descriptor)?;
        self.journal.push(format!("allocate buffer {}", descriptor.size));
        Ok(buffer)
    }

    fn release_buffer(&mut self, descriptor: &BufferDescriptor, buffer: RenderBuffer) {
        self.journal.push(format!("release buffer {}", descriptor.size));
        self.inner.release_buffer(descriptor, buffer);
    }
}

/// Dummy factory that runs out of memory after a fixed number of creations.
pub struct ExhaustibleFactory {
    pub inner: DummyFactory,
    remaining: usize,
}

impl ExhaustibleFactory {
    pub fn new(budget: usize) -> Self {
        Self {
            inner: DummyFactory::new(),
            remaining: budget,
        }
    }

    fn spend(&mut self) -> BackendResult<()> {
        if self.remaining == 0 {
            return Err(BackendError::OutOfMemory);
        }
        self.remaining -= 1;
        Ok(())
    }
}

impl ResourceFactory for ExhaustibleFactory {
    fn create_texture(&mut self, descriptor: &TextureDescriptor) -> BackendResult<RenderTexture> {
        self.spend()?;
        self.inner.create_texture(descriptor)
    }

    fn destroy_texture(&mut self, texture: RenderTexture) {
        self.inner.destroy_texture(texture);
    }

    fn create_buffer(&mut self, descriptor: &BufferDescriptor) -> BackendResult<RenderBuffer> {
        self.spend()?;
        self.inner.create_buffer(descriptor)
    }

    fn destroy_buffer(&mut self, buffer: RenderBuffer) {
        self.inner.destroy_buffer(buffer);
    }
}
