//! Directional light used for the shadow pass

use glam::{Mat4, Vec3};

/// Sun-like light with parallel rays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    /// Half-extent of the orthographic shadow volume around the origin.
    pub shadow_extent: f32,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            direction: Vec3::new(-0.5, -1.0, -0.3),
            color: Vec3::ONE,
            intensity: 1.0,
            shadow_extent: 50.0,
        }
    }
}

impl DirectionalLight {
    pub fn new(direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            direction,
            color,
            intensity,
            ..Default::default()
        }
    }

    /// View-projection of the light's shadow camera.
    pub fn view_projection(&self) -> Mat4 {
        let dir = self.direction.normalize_or_zero();
        let dir = if dir == Vec3::ZERO { -Vec3::Y } else { dir };
        let eye = -dir * self.shadow_extent;
        // look_at degenerates when looking straight along the up vector
        let up = if dir.cross(Vec3::Y).length_squared() < 1e-6 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        let view = Mat4::look_at_rh(eye, Vec3::ZERO, up);
        let e = self.shadow_extent;
        let proj = Mat4::orthographic_rh(-e, e, -e, e, 0.1, 2.0 * e);
        proj * view
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_straight_down_light_is_finite() {
        let light = DirectionalLight::new(-Vec3::Y, Vec3::ONE, 1.0);
        assert!(light.view_projection().is_finite());
    }
}
