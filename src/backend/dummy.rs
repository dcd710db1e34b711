//! Dummy backend for testing and headless runs.
//!
//! [`DummyFactory`] creates handle-only resources with unique ids, and
//! [`RecordingCommand`] records every call the graph and its passes make as a
//! [`CommandEvent`]. Barrier computation goes through the same
//! [`transition`](crate::backend::state::transition) logic the GPU backends use,
//! so recorded transitions are exactly what a real backend would emit.

use std::sync::atomic::{AtomicU64, Ordering};

use glam::Mat4;

use crate::backend::error::{BackendError, BackendResult};
use crate::backend::state::{transition, ResourceState, Transition};
use crate::backend::types::{
    BufferDescriptor, GpuBuffer, GpuTexture, RenderBuffer, RenderTexture, TextureDescriptor,
};
use crate::backend::{Command, ResourceFactory};
use crate::render_graph::access::{AttachmentAspect, BufferAccess, TextureAccess};
use crate::scene::{Camera, Primitive};

/// Ids are unique across factories so stand-in backbuffers never collide
/// with pooled resources in recorded events.
static NEXT_DUMMY_ID: AtomicU64 = AtomicU64::new(1);

/// Factory producing handle-only resources.
#[derive(Debug, Default)]
pub struct DummyFactory {
    live_textures: usize,
    live_buffers: usize,
}

impl DummyFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Textures created and not yet destroyed.
    pub fn live_textures(&self) -> usize {
        self.live_textures
    }

    pub fn live_buffers(&self) -> usize {
        self.live_buffers
    }

    /// Create a texture outside of any pool, e.g. a stand-in backbuffer.
    pub fn external_texture(&mut self, descriptor: TextureDescriptor) -> RenderTexture {
        let id = self.next_id();
        RenderTexture::with_state(
            GpuTexture::Dummy { id },
            descriptor,
            ResourceState::PRESENTED,
        )
    }

    fn next_id(&mut self) -> u64 {
        NEXT_DUMMY_ID.fetch_add(1, Ordering::Relaxed)
    }
}

impl ResourceFactory for DummyFactory {
    fn create_texture(&mut self, descriptor: &TextureDescriptor) -> BackendResult<RenderTexture> {
        if descriptor.width == 0 || descriptor.height == 0 {
            return Err(BackendError::InvalidParameter(format!(
                "texture extent {}x{} is empty",
                descriptor.width, descriptor.height
            )));
        }
        let id = self.next_id();
        self.live_textures += 1;
        log::trace!(
            "DummyFactory: creating texture {} ({}x{} {:?})",
            id,
            descriptor.width,
            descriptor.height,
            descriptor.format
        );
        Ok(RenderTexture::new(GpuTexture::Dummy { id }, *descriptor))
    }

    fn destroy_texture(&mut self, texture: RenderTexture) {
        log::trace!("DummyFactory: destroying texture {}", texture.id());
        self.live_textures = self.live_textures.saturating_sub(1);
    }

    fn create_buffer(&mut self, descriptor: &BufferDescriptor) -> BackendResult<RenderBuffer> {
        if descriptor.size == 0 {
            return Err(BackendError::InvalidParameter("buffer size is zero".into()));
        }
        let id = self.next_id();
        self.live_buffers += 1;
        log::trace!("DummyFactory: creating buffer {} ({} bytes)", id, descriptor.size);
        Ok(RenderBuffer::new(GpuBuffer::Dummy { id }, *descriptor))
    }

    fn destroy_buffer(&mut self, buffer: RenderBuffer) {
        log::trace!("DummyFactory: destroying buffer {}", buffer.id());
        self.live_buffers = self.live_buffers.saturating_sub(1);
    }
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandEvent {
    TextureBarrier {
        texture: u64,
        transition: Transition,
    },
    BufferBarrier {
        buffer: u64,
        transition: Transition,
    },
    BeginPass {
        name: String,
        color_attachments: Vec<u64>,
        depth_attachment: Option<u64>,
    },
    EndPass,
    DrawGeometry {
        primitives: usize,
    },
    DrawShadow {
        primitives: usize,
    },
    Blit {
        src: u64,
        dst: u64,
    },
    UpdateBuffer {
        buffer: u64,
        offset: u64,
        size: usize,
    },
}

/// [`Command`] that records calls instead of talking to a GPU.
#[derive(Debug, Default)]
pub struct RecordingCommand {
    events: Vec<CommandEvent>,
    color_attachments: Vec<u64>,
    depth_attachment: Option<u64>,
    /// Read and write accesses seen, including those that needed no barrier.
    accesses: usize,
    /// Attachments whose first write since allocation would clear.
    cleared: Vec<u64>,
}

impl RecordingCommand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[CommandEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<CommandEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn access_count(&self) -> usize {
        self.accesses
    }

    /// Attachment writes that would clear rather than load, in order.
    pub fn cleared_attachments(&self) -> &[u64] {
        &self.cleared
    }

    /// Every transition recorded for one texture, in order.
    pub fn texture_transitions(&self, texture: u64) -> Vec<Transition> {
        self.events
            .iter()
            .filter_map(|event| match event {
                CommandEvent::TextureBarrier {
                    texture: id,
                    transition,
                } if *id == texture => Some(*transition),
                _ => None,
            })
            .collect()
    }

    /// Names of the passes in the order they were opened.
    pub fn pass_names(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|event| match event {
                CommandEvent::BeginPass { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    fn record_texture(&mut self, texture: &mut RenderTexture, required: ResourceState) {
        self.accesses += 1;
        if let Some(transition) = transition(&mut texture.state, required) {
            self.events.push(CommandEvent::TextureBarrier {
                texture: texture.id(),
                transition,
            });
        }
    }

    fn record_buffer(&mut self, buffer: &mut RenderBuffer, required: ResourceState) {
        self.accesses += 1;
        if let Some(transition) = transition(&mut buffer.state, required) {
            self.events.push(CommandEvent::BufferBarrier {
                buffer: buffer.id(),
                transition,
            });
        }
    }
}

impl Command for RecordingCommand {
    fn before_read_texture(
        &mut self,
        descriptor: &TextureDescriptor,
        texture: &mut RenderTexture,
        access: &TextureAccess,
    ) {
        self.record_texture(texture, ResourceState::texture_read(access, descriptor.format));
    }

    fn before_write_texture(
        &mut self,
        _descriptor: &TextureDescriptor,
        texture: &mut RenderTexture,
        access: &TextureAccess,
    ) {
        if matches!(access, TextureAccess::Attachment { .. }) && texture.contents_discarded() {
            self.cleared.push(texture.id());
        }
        self.record_texture(texture, ResourceState::texture_write(access));
        match access {
            TextureAccess::Attachment {
                aspect: AttachmentAspect::Color,
            } => self.color_attachments.push(texture.id()),
            TextureAccess::Attachment {
                aspect: AttachmentAspect::Depth,
            } => self.depth_attachment = Some(texture.id()),
            _ => {}
        }
    }

    fn before_read_buffer(
        &mut self,
        _descriptor: &BufferDescriptor,
        buffer: &mut RenderBuffer,
        access: &BufferAccess,
    ) {
        self.record_buffer(buffer, ResourceState::buffer_read(access));
    }

    fn before_write_buffer(
        &mut self,
        _descriptor: &BufferDescriptor,
        buffer: &mut RenderBuffer,
        access: &BufferAccess,
    ) {
        self.record_buffer(buffer, ResourceState::buffer_write(access));
    }

    fn begin_pass(&mut self, name: &str) {
        self.events.push(CommandEvent::BeginPass {
            name: name.to_string(),
            color_attachments: std::mem::take(&mut self.color_attachments),
            depth_attachment: self.depth_attachment.take(),
        });
    }

    fn end_pass(&mut self) {
        self.events.push(CommandEvent::EndPass);
    }

    fn draw_geometry(&mut self, _camera: &Camera, primitives: &[Primitive]) {
        self.events.push(CommandEvent::DrawGeometry {
            primitives: primitives.len(),
        });
    }

    fn draw_shadow(&mut self, _light_view_projection: Mat4, primitives: &[Primitive]) {
        self.events.push(CommandEvent::DrawShadow {
            primitives: primitives.len(),
        });
    }

    fn blit(&mut self, src: &RenderTexture, dst: &RenderTexture) {
        self.events.push(CommandEvent::Blit {
            src: src.id(),
            dst: dst.id(),
        });
    }

    fn update_buffer(&mut self, buffer: &RenderBuffer, offset: u64, data: &[u8]) {
        self.events.push(CommandEvent::UpdateBuffer {
            buffer: buffer.id(),
            offset,
            size: data.len(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::state::TextureLayout;
    use crate::backend::types::{TextureFormat, TextureUsage};

    fn hdr_desc() -> TextureDescriptor {
        TextureDescriptor::new(
            1600,
            900,
            TextureFormat::HDR,
            TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED,
        )
    }

    #[test]
    fn test_factory_rejects_empty_extent() {
        let mut factory = DummyFactory::new();
        let desc = TextureDescriptor { width: 0, ..hdr_desc() };
        assert!(matches!(
            factory.create_texture(&desc),
            Err(BackendError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_factory_ids_are_unique() {
        let mut factory = DummyFactory::new();
        let a = factory.create_texture(&hdr_desc()).unwrap();
        let b = factory.create_texture(&hdr_desc()).unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(factory.live_textures(), 2);
    }

    #[test]
    fn test_attachment_writes_feed_begin_pass() {
        let mut factory = DummyFactory::new();
        let desc = hdr_desc();
        let mut color = factory.create_texture(&desc).unwrap();
        let mut command = RecordingCommand::new();

        command.before_write_texture(&desc, &mut color, &TextureAccess::color_attachment());
        command.begin_pass("main");
        command.end_pass();
        command.begin_pass("empty");

        match &command.events()[1] {
            CommandEvent::BeginPass {
                color_attachments, ..
            } => assert_eq!(color_attachments, &vec![color.id()]),
            other => panic!("unexpected event {other:?}"),
        }
        match &command.events()[3] {
            CommandEvent::BeginPass {
                color_attachments, ..
            } => assert!(color_attachments.is_empty()),
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(color.state().layout, TextureLayout::ColorAttachment);
    }

    #[test]
    fn test_only_first_write_since_allocation_clears() {
        let mut factory = DummyFactory::new();
        let desc = hdr_desc();
        let mut target = factory.create_texture(&desc).unwrap();
        let mut imported = factory.external_texture(desc);
        let mut command = RecordingCommand::new();

        command.before_write_texture(&desc, &mut target, &TextureAccess::color_attachment());
        command.before_write_texture(&desc, &mut target, &TextureAccess::color_attachment());
        command.before_write_texture(&desc, &mut imported, &TextureAccess::color_attachment());

        assert_eq!(command.cleared_attachments(), &[target.id()]);
    }
}
