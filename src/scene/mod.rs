//! Scene data consumed by concrete passes.
//!
//! The render graph itself never looks at any of this. Passes copy what they
//! need out of a [`Scene`] while recording and hand it to the backend from
//! `render`.

mod camera;
mod light;

pub use camera::{Camera, CameraUniform, Projection};
pub use light::DirectionalLight;

use glam::Mat4;

/// Identifier of a mesh owned by the resource manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshId(pub u32);

/// Identifier of a material owned by the resource manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialId(pub u32);

/// One drawable: a mesh with a material at a world transform.
#[derive(Debug, Clone, Copy)]
pub struct Primitive {
    pub mesh: MeshId,
    pub material: MaterialId,
    /// Shader permutation selected for this material.
    pub variant: u32,
    pub transform: Mat4,
    pub casts_shadow: bool,
}

impl Primitive {
    pub fn new(mesh: MeshId, material: MaterialId, transform: Mat4) -> Self {
        Self {
            mesh,
            material,
            variant: 0,
            transform,
            casts_shadow: true,
        }
    }
}

/// Everything the forward pipeline renders in one frame.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub camera: Camera,
    pub sun: Option<DirectionalLight>,
    pub primitives: Vec<Primitive>,
}

impl Scene {
    pub fn new(camera: Camera) -> Self {
        Self {
            camera,
            sun: None,
            primitives: Vec::new(),
        }
    }

    pub fn with_sun(mut self, sun: DirectionalLight) -> Self {
        self.sun = Some(sun);
        self
    }

    pub fn add_primitive(&mut self, primitive: Primitive) {
        self.primitives.push(primitive);
    }

    pub fn shadow_casters(&self) -> impl Iterator<Item = &Primitive> {
        self.primitives.iter().filter(|p| p.casts_shadow)
    }
}
