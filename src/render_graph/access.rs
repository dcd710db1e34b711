//! Access declarations: how a pass intends to touch a resource.
//!
//! These only describe intent. The backend turns them into barriers and
//! attachment lists when the graph executes.

/// Sampler used when a texture is bound for sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SamplerKind {
    #[default]
    Linear,
    Nearest,
    /// Depth comparison sampler for shadow lookups.
    Shadow,
}

/// Which aspect of an attachment a pass renders to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentAspect {
    Color,
    Depth,
}

/// How a pass accesses a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureAccess {
    /// Bound to a shader descriptor slot.
    Binding {
        set: u32,
        location: u32,
        sampler: SamplerKind,
    },
    /// Used as a render pass attachment.
    Attachment { aspect: AttachmentAspect },
    /// Source (read) or destination (write) of a blit or copy.
    Transfer,
}

impl TextureAccess {
    pub fn sampled(set: u32, location: u32) -> Self {
        Self::Binding {
            set,
            location,
            sampler: SamplerKind::Linear,
        }
    }

    pub fn shadow_sampled(set: u32, location: u32) -> Self {
        Self::Binding {
            set,
            location,
            sampler: SamplerKind::Shadow,
        }
    }

    pub fn color_attachment() -> Self {
        Self::Attachment {
            aspect: AttachmentAspect::Color,
        }
    }

    pub fn depth_attachment() -> Self {
        Self::Attachment {
            aspect: AttachmentAspect::Depth,
        }
    }

    pub fn is_attachment(&self) -> bool {
        matches!(self, Self::Attachment { .. })
    }
}

/// How a buffer is bound or transferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BufferAccessKind {
    #[default]
    Uniform,
    Storage,
    Transfer,
}

/// How a pass accesses a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferAccess {
    pub set: u32,
    pub binding: u32,
    pub kind: BufferAccessKind,
}

impl BufferAccess {
    pub fn new(set: u32, binding: u32) -> Self {
        Self {
            set,
            binding,
            kind: BufferAccessKind::default(),
        }
    }

    pub fn uniform(set: u32, binding: u32) -> Self {
        Self::new(set, binding)
    }

    pub fn storage(set: u32, binding: u32) -> Self {
        Self {
            kind: BufferAccessKind::Storage,
            ..Self::new(set, binding)
        }
    }

    /// Upload or copy target; set and binding are unused.
    pub fn transfer() -> Self {
        Self {
            kind: BufferAccessKind::Transfer,
            ..Self::new(0, 0)
        }
    }
}
