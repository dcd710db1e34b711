//! Resource state tracking for automatic barrier placement.
//!
//! Every texture and buffer carries a [`ResourceState`]: the pipeline stages that
//! last touched it, the memory access they performed, and (for textures) the
//! image layout it is currently in. Before a pass touches a resource, the
//! backend computes the state the access requires and asks [`transition`] for
//! the barrier that moves the resource there.
//!
//! A [`TrackedState`] follows each resource between barriers. The `old` side
//! of a barrier is the `new` side of the previous one on the same resource,
//! except for a read that widens an existing read scope: it waits on the
//! last producer instead. Pooled textures are discarded on reuse so their
//! first barrier leaves `Undefined`.

use bitflags::bitflags;

use crate::backend::types::TextureFormat;
use crate::render_graph::access::{
    AttachmentAspect, BufferAccess, BufferAccessKind, TextureAccess,
};

bitflags! {
    /// Pipeline stages, mirroring the Vulkan stage bits the graph uses.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PipelineStages: u32 {
        const TOP_OF_PIPE = 1 << 0;
        const VERTEX_SHADER = 1 << 1;
        const FRAGMENT_SHADER = 1 << 2;
        const EARLY_FRAGMENT_TESTS = 1 << 3;
        const LATE_FRAGMENT_TESTS = 1 << 4;
        const COLOR_ATTACHMENT_OUTPUT = 1 << 5;
        const COMPUTE_SHADER = 1 << 6;
        const TRANSFER = 1 << 7;
        const BOTTOM_OF_PIPE = 1 << 8;
    }
}

bitflags! {
    /// Memory access kinds.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AccessFlags: u32 {
        const UNIFORM_READ = 1 << 0;
        const SHADER_READ = 1 << 1;
        const SHADER_WRITE = 1 << 2;
        const COLOR_ATTACHMENT_READ = 1 << 3;
        const COLOR_ATTACHMENT_WRITE = 1 << 4;
        const DEPTH_STENCIL_ATTACHMENT_READ = 1 << 5;
        const DEPTH_STENCIL_ATTACHMENT_WRITE = 1 << 6;
        const TRANSFER_READ = 1 << 7;
        const TRANSFER_WRITE = 1 << 8;
    }
}

impl AccessFlags {
    const WRITES: Self = Self::SHADER_WRITE
        .union(Self::COLOR_ATTACHMENT_WRITE)
        .union(Self::DEPTH_STENCIL_ATTACHMENT_WRITE)
        .union(Self::TRANSFER_WRITE);

    /// Check if any of the accesses writes memory.
    pub fn is_write(self) -> bool {
        self.intersects(Self::WRITES)
    }
}

/// Image layouts a texture can be in.
///
/// Buffers have no layout and always report [`TextureLayout::Undefined`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureLayout {
    /// Initial state, contents undefined.
    #[default]
    Undefined,
    ColorAttachment,
    DepthStencilAttachment,
    DepthStencilReadOnly,
    ShaderReadOnly,
    TransferSrc,
    TransferDst,
    PresentSrc,
    /// Least optimal but most flexible; used for storage images.
    General,
}

/// Synchronization state of one resource: `(stages, access, layout)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ResourceState {
    pub stages: PipelineStages,
    pub access: AccessFlags,
    pub layout: TextureLayout,
}

impl ResourceState {
    pub const fn new(stages: PipelineStages, access: AccessFlags, layout: TextureLayout) -> Self {
        Self {
            stages,
            access,
            layout,
        }
    }

    /// State of a swapchain image handed back by the presentation engine.
    pub const PRESENTED: Self = Self::new(
        PipelineStages::BOTTOM_OF_PIPE,
        AccessFlags::empty(),
        TextureLayout::PresentSrc,
    );

    /// State required to read a texture with the given access.
    pub fn texture_read(access: &TextureAccess, format: TextureFormat) -> Self {
        match access {
            TextureAccess::Binding { .. } if format.is_depth() => Self::new(
                PipelineStages::FRAGMENT_SHADER,
                AccessFlags::SHADER_READ,
                TextureLayout::DepthStencilReadOnly,
            ),
            TextureAccess::Binding { .. } => Self::new(
                PipelineStages::FRAGMENT_SHADER,
                AccessFlags::SHADER_READ,
                TextureLayout::ShaderReadOnly,
            ),
            TextureAccess::Attachment {
                aspect: AttachmentAspect::Color,
            } => Self::new(
                PipelineStages::COLOR_ATTACHMENT_OUTPUT,
                AccessFlags::COLOR_ATTACHMENT_READ,
                TextureLayout::ColorAttachment,
            ),
            TextureAccess::Attachment {
                aspect: AttachmentAspect::Depth,
            } => Self::new(
                PipelineStages::EARLY_FRAGMENT_TESTS | PipelineStages::LATE_FRAGMENT_TESTS,
                AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ,
                TextureLayout::DepthStencilReadOnly,
            ),
            TextureAccess::Transfer => Self::new(
                PipelineStages::TRANSFER,
                AccessFlags::TRANSFER_READ,
                TextureLayout::TransferSrc,
            ),
        }
    }

    /// State required to write a texture with the given access.
    pub fn texture_write(access: &TextureAccess) -> Self {
        match access {
            TextureAccess::Binding { .. } => Self::new(
                PipelineStages::FRAGMENT_SHADER | PipelineStages::COMPUTE_SHADER,
                AccessFlags::SHADER_READ | AccessFlags::SHADER_WRITE,
                TextureLayout::General,
            ),
            TextureAccess::Attachment {
                aspect: AttachmentAspect::Color,
            } => Self::new(
                PipelineStages::COLOR_ATTACHMENT_OUTPUT,
                AccessFlags::COLOR_ATTACHMENT_READ | AccessFlags::COLOR_ATTACHMENT_WRITE,
                TextureLayout::ColorAttachment,
            ),
            TextureAccess::Attachment {
                aspect: AttachmentAspect::Depth,
            } => Self::new(
                PipelineStages::EARLY_FRAGMENT_TESTS | PipelineStages::LATE_FRAGMENT_TESTS,
                AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                    | AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
                TextureLayout::DepthStencilAttachment,
            ),
            TextureAccess::Transfer => Self::new(
                PipelineStages::TRANSFER,
                AccessFlags::TRANSFER_WRITE,
                TextureLayout::TransferDst,
            ),
        }
    }

    /// State required to read a buffer with the given access.
    pub fn buffer_read(access: &BufferAccess) -> Self {
        match access.kind {
            BufferAccessKind::Uniform => Self::new(
                PipelineStages::VERTEX_SHADER | PipelineStages::FRAGMENT_SHADER,
                AccessFlags::UNIFORM_READ,
                TextureLayout::Undefined,
            ),
            BufferAccessKind::Storage => Self::new(
                PipelineStages::VERTEX_SHADER
                    | PipelineStages::FRAGMENT_SHADER
                    | PipelineStages::COMPUTE_SHADER,
                AccessFlags::SHADER_READ,
                TextureLayout::Undefined,
            ),
            BufferAccessKind::Transfer => Self::new(
                PipelineStages::TRANSFER,
                AccessFlags::TRANSFER_READ,
                TextureLayout::Undefined,
            ),
        }
    }

    /// State required to write a buffer with the given access.
    pub fn buffer_write(access: &BufferAccess) -> Self {
        match access.kind {
            // Uniform buffers are never shader-writable; a uniform write means an upload.
            BufferAccessKind::Uniform | BufferAccessKind::Transfer => Self::new(
                PipelineStages::TRANSFER,
                AccessFlags::TRANSFER_WRITE,
                TextureLayout::Undefined,
            ),
            BufferAccessKind::Storage => Self::new(
                PipelineStages::VERTEX_SHADER
                    | PipelineStages::FRAGMENT_SHADER
                    | PipelineStages::COMPUTE_SHADER,
                AccessFlags::SHADER_READ | AccessFlags::SHADER_WRITE,
                TextureLayout::Undefined,
            ),
        }
    }
}

/// A barrier between two states of the same resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub old: ResourceState,
    pub new: ResourceState,
}

impl Transition {
    pub fn is_layout_change(&self) -> bool {
        self.old.layout != self.new.layout
    }

    /// Source stage mask; a resource that has never been touched waits on nothing.
    pub fn src_stages(&self) -> PipelineStages {
        if self.old.stages.is_empty() {
            PipelineStages::TOP_OF_PIPE
        } else {
            self.old.stages
        }
    }

    pub fn dst_stages(&self) -> PipelineStages {
        self.new.stages
    }
}

/// Per-resource tracking between barriers.
///
/// `current` is the destination of the last barrier, widened by later readers
/// that needed no layout change. `producer` is the scope that last wrote the
/// contents or moved them to a new layout; readers outside the current scope
/// synchronize against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackedState {
    current: ResourceState,
    producer: ResourceState,
    discarded: bool,
}

impl TrackedState {
    /// Start tracking from a known state. Contents count as discarded when the
    /// layout is undefined.
    pub fn new(state: ResourceState) -> Self {
        Self {
            current: state,
            producer: state,
            discarded: state.layout == TextureLayout::Undefined,
        }
    }

    pub fn current(&self) -> ResourceState {
        self.current
    }

    /// No write has happened since the contents were last discarded.
    pub fn contents_discarded(&self) -> bool {
        self.discarded
    }

    /// Forget the contents. The next barrier leaves `Undefined` but still
    /// waits on the stages that last touched the resource.
    pub fn discard(&mut self) {
        self.current.layout = TextureLayout::Undefined;
        self.producer = self.current;
        self.discarded = true;
    }
}

impl Default for TrackedState {
    fn default() -> Self {
        Self::new(ResourceState::default())
    }
}

/// Move `state` to `required`, returning the barrier that must be recorded.
///
/// A read in the current layout with no write on either side needs nothing
/// when its stages and access are already covered by the current scope. A
/// read outside that scope gets a barrier from the last producer. Any write,
/// or any layout change, produces a barrier from the current state.
pub fn transition(state: &mut TrackedState, required: ResourceState) -> Option<Transition> {
    let old = state.current;
    let layout_change = old.layout != required.layout;
    let write = required.access.is_write();

    if !layout_change && !write && !old.access.is_write() {
        let covered =
            old.stages.contains(required.stages) && old.access.contains(required.access);
        // Widen the scope so a later writer waits on every reader.
        state.current.stages |= required.stages;
        state.current.access |= required.access;
        if covered || state.producer.access.is_empty() {
            return None;
        }
        return Some(Transition {
            old: state.producer,
            new: required,
        });
    }

    state.current = required;
    if write || layout_change {
        state.producer = required;
    }
    if write {
        state.discarded = false;
    }
    Some(Transition { old, new: required })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_graph::access::SamplerKind;

    fn sampled() -> TextureAccess {
        TextureAccess::Binding {
            set: 0,
            location: 0,
            sampler: SamplerKind::Linear,
        }
    }

    #[test]
    fn test_first_write_transitions_from_undefined() {
        let mut state = TrackedState::default();
        let required = ResourceState::texture_write(&TextureAccess::color_attachment());
        let barrier = transition(&mut state, required).unwrap();
        assert_eq!(barrier.old.layout, TextureLayout::Undefined);
        assert_eq!(barrier.new.layout, TextureLayout::ColorAttachment);
        assert_eq!(barrier.src_stages(), PipelineStages::TOP_OF_PIPE);
        assert_eq!(state.current(), required);
        assert!(!state.contents_discarded());
    }

    #[test]
    fn test_chained_transitions_carry_previous_new_state() {
        let mut state = TrackedState::default();
        let write = ResourceState::texture_write(&TextureAccess::color_attachment());
        let read = ResourceState::texture_read(&sampled(), TextureFormat::HDR);
        let copy = ResourceState::texture_read(&TextureAccess::Transfer, TextureFormat::HDR);

        let first = transition(&mut state, write).unwrap();
        let second = transition(&mut state, read).unwrap();
        let third = transition(&mut state, copy).unwrap();

        assert_eq!(second.old, first.new);
        assert_eq!(third.old, second.new);
        assert_eq!(third.new.layout, TextureLayout::TransferSrc);
    }

    #[test]
    fn test_read_after_read_needs_no_barrier() {
        let mut state = TrackedState::default();
        let read = ResourceState::texture_read(&sampled(), TextureFormat::HDR);
        assert!(transition(&mut state, read).is_some());
        assert!(transition(&mut state, read).is_none());
        assert_eq!(state.current().layout, TextureLayout::ShaderReadOnly);
    }

    #[test]
    fn test_write_after_write_same_layout_still_barriers() {
        let mut state = TrackedState::default();
        let write = ResourceState::texture_write(&TextureAccess::depth_attachment());
        transition(&mut state, write);
        let barrier = transition(&mut state, write).unwrap();
        assert!(!barrier.is_layout_change());
    }

    #[test]
    fn test_sampled_depth_uses_read_only_layout() {
        let state = ResourceState::texture_read(&sampled(), TextureFormat::DEPTH);
        assert_eq!(state.layout, TextureLayout::DepthStencilReadOnly);
    }

    #[test]
    fn test_uniform_upload_then_read() {
        let mut state = TrackedState::default();
        let access = BufferAccess::uniform(0, 0);
        let upload = transition(&mut state, ResourceState::buffer_write(&access)).unwrap();
        assert_eq!(upload.new.access, AccessFlags::TRANSFER_WRITE);
        let read = transition(&mut state, ResourceState::buffer_read(&access)).unwrap();
        assert_eq!(read.old.stages, PipelineStages::TRANSFER);
        assert_eq!(read.new.access, AccessFlags::UNIFORM_READ);
    }

    #[test]
    fn test_read_outside_scope_waits_on_producer() {
        let mut state = TrackedState::default();
        let upload = ResourceState::buffer_write(&BufferAccess::uniform(0, 0));
        let uniform = ResourceState::buffer_read(&BufferAccess::uniform(0, 0));
        let storage = ResourceState::buffer_read(&BufferAccess::storage(0, 1));

        transition(&mut state, upload).unwrap();
        transition(&mut state, uniform).unwrap();
        let compute = transition(&mut state, storage).unwrap();

        assert_eq!(compute.old.stages, PipelineStages::TRANSFER);
        assert_eq!(compute.old.access, AccessFlags::TRANSFER_WRITE);
        assert!(compute.new.stages.contains(PipelineStages::COMPUTE_SHADER));
        assert!(state.current().stages.contains(PipelineStages::COMPUTE_SHADER));
        // Both read scopes are now covered.
        assert!(transition(&mut state, uniform).is_none());
        assert!(transition(&mut state, storage).is_none());
    }

    #[test]
    fn test_untouched_buffer_read_needs_no_barrier() {
        let mut state = TrackedState::default();
        let read = ResourceState::buffer_read(&BufferAccess::storage(0, 0));
        assert!(transition(&mut state, read).is_none());
    }

    #[test]
    fn test_discard_restarts_from_undefined() {
        let mut state = TrackedState::default();
        let write = ResourceState::texture_write(&TextureAccess::depth_attachment());
        let read = ResourceState::texture_read(&sampled(), TextureFormat::DEPTH);
        transition(&mut state, write);
        transition(&mut state, read);
        assert!(!state.contents_discarded());

        state.discard();
        assert!(state.contents_discarded());

        let barrier = transition(&mut state, write).unwrap();
        assert_eq!(barrier.old.layout, TextureLayout::Undefined);
        // The previous frame's readers still finish before the new write.
        assert_eq!(barrier.old.stages, read.stages);
        assert_eq!(barrier.old.access, read.access);
        assert!(!state.contents_discarded());
    }

    #[test]
    fn test_known_state_is_not_discarded() {
        let state = TrackedState::new(ResourceState::PRESENTED);
        assert!(!state.contents_discarded());
    }
}
