//! GPU resource creation through gpu-allocator.

use std::sync::Arc;

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator};
use gpu_allocator::{AllocationError, MemoryLocation};
use parking_lot::Mutex;

use super::conversion::{
    aspect_mask, convert_buffer_usage, convert_texture_format, convert_texture_usage,
};
use crate::backend::error::{BackendError, BackendResult};
use crate::backend::types::{
    BufferDescriptor, GpuBuffer, GpuTexture, RenderBuffer, RenderTexture, TextureDescriptor,
};
use crate::backend::ResourceFactory;

/// Map a Vulkan error onto the backend error space.
pub(crate) fn vk_error(context: &str, result: vk::Result) -> BackendError {
    match result {
        vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY => {
            BackendError::OutOfMemory
        }
        vk::Result::ERROR_DEVICE_LOST => BackendError::DeviceLost,
        other => BackendError::ResourceCreationFailed(format!("{context}: {other}")),
    }
}

fn allocation_error(context: &str, error: AllocationError) -> BackendError {
    match error {
        AllocationError::OutOfMemory => BackendError::OutOfMemory,
        other => BackendError::ResourceCreationFailed(format!("{context}: {other}")),
    }
}

/// [`ResourceFactory`] creating device-local images and buffers.
///
/// The gpu-allocator instance is shared with the rest of the renderer, hence
/// the `Arc<Mutex<_>>`.
pub struct VulkanResourceFactory {
    device: ash::Device,
    allocator: Arc<Mutex<Allocator>>,
}

impl VulkanResourceFactory {
    pub fn new(device: ash::Device, allocator: Arc<Mutex<Allocator>>) -> Self {
        Self { device, allocator }
    }

    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    fn allocate_memory(
        &self,
        name: &str,
        requirements: vk::MemoryRequirements,
        location: MemoryLocation,
        linear: bool,
    ) -> BackendResult<Allocation> {
        self.allocator
            .lock()
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location,
                linear,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| allocation_error(name, e))
    }

    fn free_memory(&self, allocation: Allocation) {
        if let Err(e) = self.allocator.lock().free(allocation) {
            log::warn!("Failed to free GPU memory: {}", e);
        }
    }
}

impl ResourceFactory for VulkanResourceFactory {
    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<RenderTexture> {
        if desc.width == 0 || desc.height == 0 {
            return Err(BackendError::InvalidParameter(format!(
                "texture extent {}x{} is empty",
                desc.width, desc.height
            )));
        }

        let format = convert_texture_format(desc.format);
        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: desc.width,
                height: desc.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(convert_texture_usage(desc.usage, desc.format))
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .samples(vk::SampleCountFlags::TYPE_1);

        unsafe {
            let image = self
                .device
                .create_image(&image_info, None)
                .map_err(|e| vk_error("create_image", e))?;

            let requirements = self.device.get_image_memory_requirements(image);
            let allocation =
                match self.allocate_memory("graph texture", requirements, MemoryLocation::GpuOnly, false) {
                    Ok(allocation) => allocation,
                    Err(e) => {
                        self.device.destroy_image(image, None);
                        return Err(e);
                    }
                };

            if let Err(e) = self
                .device
                .bind_image_memory(image, allocation.memory(), allocation.offset())
            {
                self.device.destroy_image(image, None);
                self.free_memory(allocation);
                return Err(vk_error("bind_image_memory", e));
            }

            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format)
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: aspect_mask(desc.format),
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });

            let view = match self.device.create_image_view(&view_info, None) {
                Ok(view) => view,
                Err(e) => {
                    self.device.destroy_image(image, None);
                    self.free_memory(allocation);
                    return Err(vk_error("create_image_view", e));
                }
            };

            log::trace!(
                "VulkanResourceFactory: created image {:?} ({}x{} {:?})",
                image,
                desc.width,
                desc.height,
                desc.format
            );

            Ok(RenderTexture::new(
                GpuTexture::Vulkan {
                    image,
                    view,
                    allocation: Some(allocation),
                },
                *desc,
            ))
        }
    }

    fn destroy_texture(&mut self, texture: RenderTexture) {
        match texture.into_gpu() {
            GpuTexture::Vulkan {
                image,
                view,
                allocation,
            } => unsafe {
                self.device.destroy_image_view(view, None);
                self.device.destroy_image(image, None);
                if let Some(allocation) = allocation {
                    self.free_memory(allocation);
                }
            },
            GpuTexture::Dummy { id } => {
                log::warn!("VulkanResourceFactory: ignoring dummy texture {}", id);
            }
        }
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<RenderBuffer> {
        if desc.size == 0 {
            return Err(BackendError::InvalidParameter("buffer size is zero".into()));
        }

        let buffer_info = vk::BufferCreateInfo::default()
            .size(desc.size)
            .usage(convert_buffer_usage(desc.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        unsafe {
            let buffer = self
                .device
                .create_buffer(&buffer_info, None)
                .map_err(|e| vk_error("create_buffer", e))?;

            let requirements = self.device.get_buffer_memory_requirements(buffer);
            let allocation =
                match self.allocate_memory("graph buffer", requirements, MemoryLocation::GpuOnly, true) {
                    Ok(allocation) => allocation,
                    Err(e) => {
                        self.device.destroy_buffer(buffer, None);
                        return Err(e);
                    }
                };

            if let Err(e) = self
                .device
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
            {
                self.device.destroy_buffer(buffer, None);
                self.free_memory(allocation);
                return Err(vk_error("bind_buffer_memory", e));
            }

            log::trace!(
                "VulkanResourceFactory: created buffer {:?} ({} bytes)",
                buffer,
                desc.size
            );

            Ok(RenderBuffer::new(
                GpuBuffer::Vulkan {
                    buffer,
                    allocation: Some(allocation),
                },
                *desc,
            ))
        }
    }

    fn destroy_buffer(&mut self, buffer: RenderBuffer) {
        match buffer.into_gpu() {
            GpuBuffer::Vulkan { buffer, allocation } => unsafe {
                self.device.destroy_buffer(buffer, None);
                if let Some(allocation) = allocation {
                    self.free_memory(allocation);
                }
            },
            GpuBuffer::Dummy { id } => {
                log::warn!("VulkanResourceFactory: ignoring dummy buffer {}", id);
            }
        }
    }
}
