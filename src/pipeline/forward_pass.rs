//! Forward shading pass

use crate::backend::types::{RenderTexture, TextureDescriptor, TextureFormat, TextureUsage};
use crate::backend::Command;
use crate::pipeline::{Backbuffer, CameraOutput, ForwardConfig, ForwardOutput, ShadowOutput};
use crate::render_graph::{
    BufferAccess, Builder, Context, PassResources, RenderGraphPass, TextureAccess,
};
use crate::scene::Scene;

/// Shades every primitive into a backbuffer-sized HDR target.
///
/// Needs [`Backbuffer`] and [`CameraOutput`] in the context; samples the shadow
/// map when a [`ShadowOutput`] was published.
pub struct ForwardPass<'s> {
    scene: &'s Scene,
    color_format: TextureFormat,
    depth_format: TextureFormat,
}

impl<'s> ForwardPass<'s> {
    pub fn new(scene: &'s Scene, config: &ForwardConfig) -> Self {
        Self {
            scene,
            color_format: config.hdr_format,
            depth_format: config.depth_format,
        }
    }
}

impl RenderGraphPass for ForwardPass<'_> {
    type Data = ();

    fn name(&self) -> &str {
        "Forward Pass"
    }

    fn record(&self, builder: &mut Builder<'_>, context: &mut Context) {
        let backbuffer = *context.get::<Backbuffer>();
        let camera = *context.get::<CameraOutput>();

        let color = builder.allocate::<RenderTexture>(
            "hdr_color",
            TextureDescriptor::new(
                backbuffer.width,
                backbuffer.height,
                self.color_format,
                TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED | TextureUsage::COPY_SRC,
            ),
        );
        let depth = builder.allocate::<RenderTexture>(
            "forward_depth",
            TextureDescriptor::new(
                backbuffer.width,
                backbuffer.height,
                self.depth_format,
                TextureUsage::RENDER_TARGET,
            ),
        );

        builder.read(camera.uniform_buffer, BufferAccess::uniform(0, 0));
        if let Some(shadow) = context.try_get::<ShadowOutput>() {
            builder.read(shadow.shadow_map, TextureAccess::shadow_sampled(1, 0));
        }
        builder.write(color, TextureAccess::color_attachment());
        builder.write(depth, TextureAccess::depth_attachment());

        context.add(ForwardOutput { color, depth });
    }

    fn render(&self, command: &mut dyn Command, _resources: &PassResources<'_>, _data: &()) {
        command.draw_geometry(&self.scene.camera, &self.scene.primitives);
    }
}
