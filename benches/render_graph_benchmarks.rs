use std::cell::Cell;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use glam::{Mat4, Vec3};

use frame_graph::backend::{
    Command, DummyFactory, PooledAllocator, RecordingCommand, RenderTexture, TextureDescriptor,
    TextureFormat, TextureUsage,
};
use frame_graph::pipeline::{ForwardConfig, ForwardRenderer};
use frame_graph::render_graph::{
    Builder, Context, PassResources, RenderGraph, RenderGraphPass, ResourceHandle, TextureAccess,
};
use frame_graph::scene::{Camera, DirectionalLight, MaterialId, MeshId, Primitive, Scene};

/// Samples the previous link's target and renders into a fresh one.
struct ChainPass<'c> {
    name: String,
    previous: &'c Cell<Option<ResourceHandle<RenderTexture>>>,
}

impl RenderGraphPass for ChainPass<'_> {
    type Data = ();

    fn name(&self) -> &str {
        &self.name
    }

    fn record(&self, builder: &mut Builder<'_>, _context: &mut Context) {
        let target = builder.allocate::<RenderTexture>(
            "link",
            TextureDescriptor::new(
                1280,
                720,
                TextureFormat::HDR,
                TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED,
            ),
        );
        if let Some(previous) = self.previous.get() {
            builder.read(previous, TextureAccess::sampled(0, 0));
        }
        builder.write(target, TextureAccess::color_attachment());
        self.previous.set(Some(target));
    }

    fn render(&self, _command: &mut dyn Command, _resources: &PassResources<'_>, _data: &()) {}
}

fn chain_passes<'c>(
    count: usize,
    previous: &'c Cell<Option<ResourceHandle<RenderTexture>>>,
) -> Vec<ChainPass<'c>> {
    (0..count)
        .map(|i| ChainPass {
            name: format!("link_{i}"),
            previous,
        })
        .collect()
}

fn bench_scene(primitives: u32) -> Scene {
    let mut scene = Scene::new(Camera::default()).with_sun(DirectionalLight::default());
    for i in 0..primitives {
        scene.add_primitive(Primitive::new(
            MeshId(i),
            MaterialId(i % 8),
            Mat4::from_translation(Vec3::new(i as f32, 0.0, 0.0)),
        ));
    }
    scene
}

// ---------------------------------------------------------------------------
// Render graph construction
// ---------------------------------------------------------------------------

fn bench_graph_build_chain(c: &mut Criterion) {
    c.bench_function("render_graph_build_32_pass_chain", |b| {
        b.iter(|| {
            let previous = Cell::new(None);
            let passes = chain_passes(32, &previous);
            let mut graph = RenderGraph::new();
            for pass in &passes {
                graph.add_pass(pass);
            }
            black_box(graph.resource_count());
        });
    });
}

// ---------------------------------------------------------------------------
// Render graph compilation and execution
// ---------------------------------------------------------------------------

fn bench_graph_compile_chain(c: &mut Criterion) {
    c.bench_function("render_graph_compile_32_pass_chain", |b| {
        b.iter(|| {
            let previous = Cell::new(None);
            let passes = chain_passes(32, &previous);
            let mut graph = RenderGraph::new();
            for pass in &passes {
                graph.add_pass(pass);
            }
            black_box(graph.compile());
        });
    });
}

fn bench_graph_execute_chain(c: &mut Criterion) {
    let mut allocator = PooledAllocator::new(DummyFactory::new());
    c.bench_function("render_graph_execute_32_pass_chain", |b| {
        b.iter(|| {
            let previous = Cell::new(None);
            let passes = chain_passes(32, &previous);
            let mut graph = RenderGraph::new();
            for pass in &passes {
                graph.add_pass(pass);
            }
            let mut command = RecordingCommand::new();
            let executed = graph.compile().execute(&mut command, &mut allocator);
            allocator.end_frame();
            black_box(executed.is_ok());
        });
    });
}

// ---------------------------------------------------------------------------
// Forward pipeline
// ---------------------------------------------------------------------------

fn bench_forward_frame(c: &mut Criterion) {
    let scene = bench_scene(256);
    let mut swapchain = DummyFactory::new();
    let backbuffer_desc = TextureDescriptor::new(
        1920,
        1080,
        TextureFormat::Bgra8UnormSrgb,
        TextureUsage::RENDER_TARGET | TextureUsage::COPY_DST,
    );
    let mut backbuffer = Some(swapchain.external_texture(backbuffer_desc));
    let mut renderer = ForwardRenderer::new(DummyFactory::new(), ForwardConfig::default());

    c.bench_function("forward_renderer_frame_256_primitives", |b| {
        b.iter(|| {
            let texture = backbuffer
                .take()
                .unwrap_or_else(|| swapchain.external_texture(backbuffer_desc));
            let mut command = RecordingCommand::new();
            if let Ok(frame) = renderer.render(&scene, &mut command, texture) {
                backbuffer = Some(frame.backbuffer);
            }
            black_box(command.events().len());
        });
    });
}

criterion_group!(
    benches,
    bench_graph_build_chain,
    bench_graph_compile_chain,
    bench_graph_execute_chain,
    bench_forward_frame,
);
criterion_main!(benches);
