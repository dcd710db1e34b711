//! Vulkan backend implementation using ash
//!
//! [`VulkanCommand`] records into a command buffer the caller has already begun:
//! pipeline barriers for every tracked transition, dynamic rendering scopes
//! around attachment writes, blits and inline buffer updates. Geometry is
//! drawn by a caller-provided [`DrawEncoder`], which owns pipelines and
//! descriptor sets. [`VulkanResourceFactory`] creates device-local images and
//! buffers through gpu-allocator.
//!
//! Requires a Vulkan 1.3 device (or `VK_KHR_dynamic_rendering`).

pub mod conversion;
mod factory;

pub use factory::VulkanResourceFactory;

use ash::vk;
use glam::Mat4;

use crate::backend::state::{transition, ResourceState};
use crate::backend::types::{
    BufferDescriptor, GpuBuffer, GpuTexture, RenderBuffer, RenderTexture, TextureDescriptor,
};
use crate::backend::Command;
use crate::render_graph::access::{AttachmentAspect, BufferAccess, TextureAccess};
use crate::scene::{Camera, Primitive};
use conversion::{aspect_mask, convert_access, convert_layout, convert_stages};

/// Largest payload `vkCmdUpdateBuffer` accepts in one call.
const MAX_INLINE_UPDATE: usize = 65536;

/// Records the draw calls of a rendering scope.
///
/// Called while the scope opened by [`VulkanCommand`] is active, with viewport
/// and scissor already set to the attachments' extent.
pub trait DrawEncoder {
    fn draw_geometry(
        &mut self,
        device: &ash::Device,
        command_buffer: vk::CommandBuffer,
        camera: &Camera,
        primitives: &[Primitive],
    );

    fn draw_shadow(
        &mut self,
        device: &ash::Device,
        command_buffer: vk::CommandBuffer,
        light_view_projection: Mat4,
        primitives: &[Primitive],
    );
}

struct PendingAttachment {
    view: vk::ImageView,
    extent: vk::Extent2D,
    /// Nothing was written since allocation, so the attachment is cleared
    /// instead of loaded.
    clear: bool,
}

/// [`Command`] recording into a live Vulkan command buffer.
pub struct VulkanCommand<'a> {
    device: &'a ash::Device,
    command_buffer: vk::CommandBuffer,
    encoder: Option<&'a mut dyn DrawEncoder>,
    clear_color: [f32; 4],
    color_attachments: Vec<PendingAttachment>,
    depth_attachment: Option<PendingAttachment>,
    rendering: bool,
}

impl<'a> VulkanCommand<'a> {
    pub fn new(device: &'a ash::Device, command_buffer: vk::CommandBuffer) -> Self {
        Self {
            device,
            command_buffer,
            encoder: None,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            color_attachments: Vec::new(),
            depth_attachment: None,
            rendering: false,
        }
    }

    pub fn with_encoder(mut self, encoder: &'a mut dyn DrawEncoder) -> Self {
        self.encoder = Some(encoder);
        self
    }

    pub fn with_clear_color(mut self, clear_color: [f32; 4]) -> Self {
        self.clear_color = clear_color;
        self
    }

    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    /// Move a texture into the present layout, e.g. the swapchain image after
    /// the graph has executed.
    pub fn transition_to_present(&mut self, texture: &mut RenderTexture) {
        self.texture_barrier(texture, ResourceState::PRESENTED);
    }

    fn texture_barrier(&mut self, texture: &mut RenderTexture, required: ResourceState) {
        let Some(transition) = transition(&mut texture.state, required) else {
            return;
        };
        let GpuTexture::Vulkan { image, .. } = texture.gpu() else {
            log::warn!("VulkanCommand: texture {} is not a Vulkan image", texture.id());
            return;
        };

        let barrier = vk::ImageMemoryBarrier::default()
            .src_access_mask(convert_access(transition.old.access))
            .dst_access_mask(convert_access(transition.new.access))
            .old_layout(convert_layout(transition.old.layout))
            .new_layout(convert_layout(transition.new.layout))
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(*image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect_mask(texture.descriptor().format),
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        log::trace!(
            "VulkanCommand: image {} {:?} -> {:?}",
            texture.id(),
            transition.old.layout,
            transition.new.layout
        );

        unsafe {
            self.device.cmd_pipeline_barrier(
                self.command_buffer,
                convert_stages(transition.src_stages()),
                convert_stages(transition.dst_stages()),
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        }
    }

    fn buffer_barrier(&mut self, buffer: &mut RenderBuffer, required: ResourceState) {
        let Some(transition) = transition(&mut buffer.state, required) else {
            return;
        };
        let GpuBuffer::Vulkan { buffer: handle, .. } = buffer.gpu() else {
            log::warn!("VulkanCommand: buffer {} is not a Vulkan buffer", buffer.id());
            return;
        };

        let barrier = vk::BufferMemoryBarrier::default()
            .src_access_mask(convert_access(transition.old.access))
            .dst_access_mask(convert_access(transition.new.access))
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .buffer(*handle)
            .offset(0)
            .size(vk::WHOLE_SIZE);

        unsafe {
            self.device.cmd_pipeline_barrier(
                self.command_buffer,
                convert_stages(transition.src_stages()),
                convert_stages(transition.dst_stages()),
                vk::DependencyFlags::empty(),
                &[],
                &[barrier],
                &[],
            );
        }
    }

    fn render_extent(&self) -> Option<vk::Extent2D> {
        self.color_attachments
            .iter()
            .chain(self.depth_attachment.as_ref())
            .map(|attachment| attachment.extent)
            .reduce(|a, b| vk::Extent2D {
                width: a.width.min(b.width),
                height: a.height.min(b.height),
            })
    }
}

impl Command for VulkanCommand<'_> {
    fn before_read_texture(
        &mut self,
        descriptor: &TextureDescriptor,
        texture: &mut RenderTexture,
        access: &TextureAccess,
    ) {
        self.texture_barrier(texture, ResourceState::texture_read(access, descriptor.format));
    }

    fn before_write_texture(
        &mut self,
        descriptor: &TextureDescriptor,
        texture: &mut RenderTexture,
        access: &TextureAccess,
    ) {
        // First write since allocation clears. Imported images start from a
        // known state (a presented swapchain image sits in PresentSrc) and load.
        let clear = texture.contents_discarded();
        self.texture_barrier(texture, ResourceState::texture_write(access));

        let TextureAccess::Attachment { aspect } = access else {
            return;
        };
        let GpuTexture::Vulkan { view, .. } = texture.gpu() else {
            return;
        };
        let attachment = PendingAttachment {
            view: *view,
            extent: vk::Extent2D {
                width: descriptor.width,
                height: descriptor.height,
            },
            clear,
        };
        match aspect {
            AttachmentAspect::Color => self.color_attachments.push(attachment),
            AttachmentAspect::Depth => self.depth_attachment = Some(attachment),
        }
    }

    fn before_read_buffer(
        &mut self,
        _descriptor: &BufferDescriptor,
        buffer: &mut RenderBuffer,
        access: &BufferAccess,
    ) {
        self.buffer_barrier(buffer, ResourceState::buffer_read(access));
    }

    fn before_write_buffer(
        &mut self,
        _descriptor: &BufferDescriptor,
        buffer: &mut RenderBuffer,
        access: &BufferAccess,
    ) {
        self.buffer_barrier(buffer, ResourceState::buffer_write(access));
    }

    fn begin_pass(&mut self, name: &str) {
        let Some(extent) = self.render_extent() else {
            return;
        };

        let load_op = |clear: bool| {
            if clear {
                vk::AttachmentLoadOp::CLEAR
            } else {
                vk::AttachmentLoadOp::LOAD
            }
        };

        let color_attachments: Vec<vk::RenderingAttachmentInfo> = self
            .color_attachments
            .iter()
            .map(|attachment| {
                vk::RenderingAttachmentInfo::default()
                    .image_view(attachment.view)
                    .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                    .load_op(load_op(attachment.clear))
                    .store_op(vk::AttachmentStoreOp::STORE)
                    .clear_value(vk::ClearValue {
                        color: vk::ClearColorValue {
                            float32: self.clear_color,
                        },
                    })
            })
            .collect();

        let depth_attachment = self.depth_attachment.as_ref().map(|attachment| {
            vk::RenderingAttachmentInfo::default()
                .image_view(attachment.view)
                .image_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
                .load_op(load_op(attachment.clear))
                .store_op(vk::AttachmentStoreOp::STORE)
                .clear_value(vk::ClearValue {
                    depth_stencil: vk::ClearDepthStencilValue {
                        depth: 1.0,
                        stencil: 0,
                    },
                })
        });

        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        let mut rendering_info = vk::RenderingInfo::default()
            .render_area(render_area)
            .layer_count(1)
            .color_attachments(&color_attachments);
        if let Some(depth) = depth_attachment.as_ref() {
            rendering_info = rendering_info.depth_attachment(depth);
        }

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };

        log::trace!(
            "VulkanCommand: begin '{}' ({} color, depth: {})",
            name,
            color_attachments.len(),
            depth_attachment.is_some()
        );

        unsafe {
            self.device
                .cmd_begin_rendering(self.command_buffer, &rendering_info);
            self.device
                .cmd_set_viewport(self.command_buffer, 0, &[viewport]);
            self.device
                .cmd_set_scissor(self.command_buffer, 0, &[render_area]);
        }
        self.rendering = true;
    }

    fn end_pass(&mut self) {
        if self.rendering {
            unsafe {
                self.device.cmd_end_rendering(self.command_buffer);
            }
            self.rendering = false;
        }
        self.color_attachments.clear();
        self.depth_attachment = None;
    }

    fn draw_geometry(&mut self, camera: &Camera, primitives: &[Primitive]) {
        match self.encoder.as_deref_mut() {
            Some(encoder) => {
                encoder.draw_geometry(self.device, self.command_buffer, camera, primitives)
            }
            None => log::trace!("VulkanCommand: no encoder, skipping {} primitives", primitives.len()),
        }
    }

    fn draw_shadow(&mut self, light_view_projection: Mat4, primitives: &[Primitive]) {
        match self.encoder.as_deref_mut() {
            Some(encoder) => encoder.draw_shadow(
                self.device,
                self.command_buffer,
                light_view_projection,
                primitives,
            ),
            None => log::trace!("VulkanCommand: no encoder, skipping {} shadow casters", primitives.len()),
        }
    }

    fn blit(&mut self, src: &RenderTexture, dst: &RenderTexture) {
        let (GpuTexture::Vulkan { image: src_image, .. }, GpuTexture::Vulkan { image: dst_image, .. }) =
            (src.gpu(), dst.gpu())
        else {
            log::warn!("VulkanCommand: blit between non-Vulkan textures skipped");
            return;
        };

        let subresource = |format| vk::ImageSubresourceLayers {
            aspect_mask: aspect_mask(format),
            mip_level: 0,
            base_array_layer: 0,
            layer_count: 1,
        };
        let corner = |descriptor: &TextureDescriptor| vk::Offset3D {
            x: descriptor.width as i32,
            y: descriptor.height as i32,
            z: 1,
        };

        let region = vk::ImageBlit::default()
            .src_subresource(subresource(src.descriptor().format))
            .src_offsets([vk::Offset3D::default(), corner(src.descriptor())])
            .dst_subresource(subresource(dst.descriptor().format))
            .dst_offsets([vk::Offset3D::default(), corner(dst.descriptor())]);

        let filter = if src.descriptor().format.is_depth() {
            vk::Filter::NEAREST
        } else {
            vk::Filter::LINEAR
        };

        unsafe {
            self.device.cmd_blit_image(
                self.command_buffer,
                *src_image,
                convert_layout(src.state().layout),
                *dst_image,
                convert_layout(dst.state().layout),
                &[region],
                filter,
            );
        }
    }

    fn update_buffer(&mut self, buffer: &RenderBuffer, offset: u64, data: &[u8]) {
        let GpuBuffer::Vulkan { buffer: handle, .. } = buffer.gpu() else {
            log::warn!("VulkanCommand: buffer {} is not a Vulkan buffer", buffer.id());
            return;
        };
        if offset % 4 != 0 || data.len() % 4 != 0 {
            log::warn!(
                "VulkanCommand: unaligned update of buffer {} ({} bytes at {}) skipped",
                buffer.id(),
                data.len(),
                offset
            );
            return;
        }

        for (index, chunk) in data.chunks(MAX_INLINE_UPDATE).enumerate() {
            let chunk_offset = offset + (index * MAX_INLINE_UPDATE) as u64;
            unsafe {
                self.device
                    .cmd_update_buffer(self.command_buffer, *handle, chunk_offset, chunk);
            }
        }
    }
}
