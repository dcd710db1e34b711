//! Directional shadow map pass

use glam::Mat4;

use crate::backend::types::{RenderTexture, TextureDescriptor, TextureFormat, TextureUsage};
use crate::backend::Command;
use crate::pipeline::{ForwardConfig, ShadowOutput};
use crate::render_graph::{
    Builder, Context, PassResources, RenderGraphPass, ResourceHandle, TextureAccess,
};
use crate::scene::{DirectionalLight, Primitive, Scene};

/// Renders shadow casters into a square depth map from the sun's point of view.
pub struct ShadowPass {
    light_view_projection: Mat4,
    casters: Vec<Primitive>,
    size: u32,
    format: TextureFormat,
}

impl ShadowPass {
    pub fn new(light: &DirectionalLight, scene: &Scene, config: &ForwardConfig) -> Self {
        Self {
            light_view_projection: light.view_projection(),
            casters: scene.shadow_casters().copied().collect(),
            size: config.shadow_map_size,
            format: config.depth_format,
        }
    }
}

impl RenderGraphPass for ShadowPass {
    type Data = ResourceHandle<RenderTexture>;

    fn name(&self) -> &str {
        "Shadow Pass"
    }

    fn record(&self, builder: &mut Builder<'_>, context: &mut Context) -> Self::Data {
        let shadow_map = builder.allocate::<RenderTexture>(
            "shadow_map",
            TextureDescriptor::new(
                self.size,
                self.size,
                self.format,
                TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED,
            ),
        );
        builder.write(shadow_map, TextureAccess::depth_attachment());
        context.add(ShadowOutput {
            shadow_map,
            light_view_projection: self.light_view_projection,
        });
        shadow_map
    }

    fn render(&self, command: &mut dyn Command, _resources: &PassResources<'_>, _data: &Self::Data) {
        command.draw_shadow(self.light_view_projection, &self.casters);
    }
}
