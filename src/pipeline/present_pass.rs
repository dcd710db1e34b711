//! Final blit onto the backbuffer

use crate::backend::types::RenderTexture;
use crate::backend::Command;
use crate::pipeline::{Backbuffer, ForwardOutput};
use crate::render_graph::{
    Builder, Context, PassResources, RenderGraphPass, ResourceHandle, TextureAccess,
};

/// Copies the forward pass's HDR color onto the backbuffer.
pub struct PresentPass;

impl RenderGraphPass for PresentPass {
    type Data = (ResourceHandle<RenderTexture>, ResourceHandle<RenderTexture>);

    fn name(&self) -> &str {
        "Present Blit"
    }

    fn record(&self, builder: &mut Builder<'_>, context: &mut Context) -> Self::Data {
        let source = context.get::<ForwardOutput>().color;
        let target = context.get::<Backbuffer>().texture;
        builder.read(source, TextureAccess::Transfer);
        builder.write(target, TextureAccess::Transfer);
        (source, target)
    }

    fn render(&self, command: &mut dyn Command, resources: &PassResources<'_>, data: &Self::Data) {
        let (source, target) = *data;
        command.blit(resources.get(source), resources.get(target));
    }
}
