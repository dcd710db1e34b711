//! Camera uniform upload pass

use crate::backend::types::{BufferDescriptor, BufferUsage, RenderBuffer};
use crate::backend::Command;
use crate::pipeline::CameraOutput;
use crate::render_graph::{
    BufferAccess, Builder, Context, PassResources, RenderGraphPass, ResourceHandle,
};
use crate::scene::{Camera, CameraUniform};

/// Writes the frame's [`CameraUniform`] into a transient uniform buffer.
pub struct CameraPass<'s> {
    camera: &'s Camera,
}

impl<'s> CameraPass<'s> {
    pub fn new(camera: &'s Camera) -> Self {
        Self { camera }
    }
}

pub struct CameraPassData {
    buffer: ResourceHandle<RenderBuffer>,
    uniform: CameraUniform,
}

impl RenderGraphPass for CameraPass<'_> {
    type Data = CameraPassData;

    fn name(&self) -> &str {
        "Camera Upload"
    }

    fn record(&self, builder: &mut Builder<'_>, context: &mut Context) -> CameraPassData {
        let buffer = builder.allocate::<RenderBuffer>(
            "camera_uniform",
            BufferDescriptor::new(
                CameraUniform::SIZE,
                BufferUsage::UNIFORM | BufferUsage::COPY_DST,
            ),
        );
        builder.write(buffer, BufferAccess::transfer());
        context.add(CameraOutput {
            uniform_buffer: buffer,
        });

        CameraPassData {
            buffer,
            uniform: self.camera.uniform(),
        }
    }

    fn render(&self, command: &mut dyn Command, resources: &PassResources<'_>, data: &CameraPassData) {
        let buffer = resources.get(data.buffer);
        command.update_buffer(buffer, 0, bytemuck::bytes_of(&data.uniform));
    }
}
