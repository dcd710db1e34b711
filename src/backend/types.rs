//! Resource descriptors and the concrete resource instances handed out by allocators.

use bitflags::bitflags;

use crate::backend::state::{ResourceState, TrackedState};

/// Texture format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFormat {
    #[default]
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Bgra8UnormSrgb,
    Rgba16Float,
    Rgba32Float,
    R32Float,
    Rg32Float,
    Depth32Float,
    Depth24PlusStencil8,
}

impl TextureFormat {
    /// HDR color target format used by the forward pipeline.
    pub const HDR: Self = Self::Rgba16Float;

    /// Depth format used for depth buffers and shadow maps.
    pub const DEPTH: Self = Self::Depth32Float;

    pub fn is_depth(&self) -> bool {
        matches!(
            self,
            TextureFormat::Depth32Float | TextureFormat::Depth24PlusStencil8
        )
    }

    pub fn has_stencil(&self) -> bool {
        matches!(self, TextureFormat::Depth24PlusStencil8)
    }

    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            TextureFormat::Rgba8Unorm
            | TextureFormat::Rgba8UnormSrgb
            | TextureFormat::Bgra8Unorm
            | TextureFormat::Bgra8UnormSrgb
            | TextureFormat::Depth32Float
            | TextureFormat::Depth24PlusStencil8
            | TextureFormat::R32Float => 4,
            TextureFormat::Rgba16Float | TextureFormat::Rg32Float => 8,
            TextureFormat::Rgba32Float => 16,
        }
    }
}

bitflags! {
    /// Usage flags for textures.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TextureUsage: u32 {
        const COPY_SRC = 1 << 0;
        const COPY_DST = 1 << 1;
        /// Texture can be sampled in a shader.
        const SAMPLED = 1 << 2;
        const STORAGE = 1 << 3;
        /// Texture can be used as a color or depth attachment.
        const RENDER_TARGET = 1 << 4;
    }
}

bitflags! {
    /// Usage flags for buffers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BufferUsage: u32 {
        const COPY_SRC = 1 << 0;
        const COPY_DST = 1 << 1;
        const INDEX = 1 << 2;
        const VERTEX = 1 << 3;
        const UNIFORM = 1 << 4;
        const STORAGE = 1 << 5;
        const INDIRECT = 1 << 6;
    }
}

/// Descriptor of a 2D render texture.
///
/// Two descriptors compare equal only when every field matches, which is what
/// the allocator pool keys on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureDescriptor {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub usage: TextureUsage,
}

impl TextureDescriptor {
    pub fn new(width: u32, height: u32, format: TextureFormat, usage: TextureUsage) -> Self {
        Self {
            width,
            height,
            format,
            usage,
        }
    }

    pub fn extent(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Approximate size of the texture in bytes.
    pub fn byte_size(&self) -> u64 {
        self.width as u64 * self.height as u64 * self.format.bytes_per_pixel() as u64
    }
}

/// Descriptor of a GPU buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferDescriptor {
    pub size: u64,
    pub usage: BufferUsage,
}

impl BufferDescriptor {
    pub fn new(size: u64, usage: BufferUsage) -> Self {
        Self { size, usage }
    }
}

/// Backend handle of a texture.
#[derive(Debug)]
pub enum GpuTexture {
    /// Handle-only texture created by the dummy backend
    Dummy { id: u64 },
    /// Vulkan image and its default view
    #[cfg(feature = "vulkan-backend")]
    Vulkan {
        image: ash::vk::Image,
        view: ash::vk::ImageView,
        /// `None` for images the graph does not own (e.g. swapchain images)
        allocation: Option<gpu_allocator::vulkan::Allocation>,
    },
}

/// Backend handle of a buffer.
#[derive(Debug)]
pub enum GpuBuffer {
    /// Handle-only buffer created by the dummy backend
    Dummy { id: u64 },
    #[cfg(feature = "vulkan-backend")]
    Vulkan {
        buffer: ash::vk::Buffer,
        allocation: Option<gpu_allocator::vulkan::Allocation>,
    },
}

/// A 2D texture usable as render target, sampled binding, or blit endpoint.
///
/// Carries the tracked synchronization state of the underlying image so that
/// each transition starts from the state the previous one left behind.
#[derive(Debug)]
pub struct RenderTexture {
    gpu: GpuTexture,
    descriptor: TextureDescriptor,
    pub(crate) state: TrackedState,
}

impl RenderTexture {
    pub fn new(gpu: GpuTexture, descriptor: TextureDescriptor) -> Self {
        Self {
            gpu,
            descriptor,
            state: TrackedState::default(),
        }
    }

    /// Create a texture whose contents are already in a known state, e.g. a
    /// swapchain image that was presented last frame.
    pub fn with_state(gpu: GpuTexture, descriptor: TextureDescriptor, state: ResourceState) -> Self {
        Self {
            gpu,
            descriptor,
            state: TrackedState::new(state),
        }
    }

    pub fn gpu(&self) -> &GpuTexture {
        &self.gpu
    }

    pub fn descriptor(&self) -> &TextureDescriptor {
        &self.descriptor
    }

    pub fn state(&self) -> ResourceState {
        self.state.current()
    }

    /// Nothing has been written since allocation, so an attachment write may
    /// clear instead of load.
    pub fn contents_discarded(&self) -> bool {
        self.state.contents_discarded()
    }

    /// Forget the contents, e.g. when a pooled texture changes owner.
    pub fn discard_contents(&mut self) {
        self.state.discard();
    }

    /// Stable identifier of the underlying image, used in logs and recordings.
    pub fn id(&self) -> u64 {
        match &self.gpu {
            GpuTexture::Dummy { id } => *id,
            #[cfg(feature = "vulkan-backend")]
            GpuTexture::Vulkan { image, .. } => ash::vk::Handle::as_raw(*image),
        }
    }

    pub(crate) fn into_gpu(self) -> GpuTexture {
        self.gpu
    }
}

/// A GPU buffer usable as uniform, storage, or transfer target.
#[derive(Debug)]
pub struct RenderBuffer {
    gpu: GpuBuffer,
    descriptor: BufferDescriptor,
    pub(crate) state: TrackedState,
}

impl RenderBuffer {
    pub fn new(gpu: GpuBuffer, descriptor: BufferDescriptor) -> Self {
        Self {
            gpu,
            descriptor,
            state: TrackedState::default(),
        }
    }

    pub fn gpu(&self) -> &GpuBuffer {
        &self.gpu
    }

    pub fn descriptor(&self) -> &BufferDescriptor {
        &self.descriptor
    }

    pub fn state(&self) -> ResourceState {
        self.state.current()
    }

    pub fn id(&self) -> u64 {
        match &self.gpu {
            GpuBuffer::Dummy { id } => *id,
            #[cfg(feature = "vulkan-backend")]
            GpuBuffer::Vulkan { buffer, .. } => ash::vk::Handle::as_raw(*buffer),
        }
    }

    pub(crate) fn into_gpu(self) -> GpuBuffer {
        self.gpu
    }
}
