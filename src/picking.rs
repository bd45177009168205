//! Mouse picking against axis-aligned object bounds.

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::camera::Camera;
use crate::gpu::GpuBackend;
use crate::registry::SceneRegistry;
use crate::scene::SceneObject;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit length.
    pub direction: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub center: Vec3,
    pub half_extents: Vec3,
}

impl Aabb {
    pub fn min(&self) -> Vec3 {
        self.center - self.half_extents
    }

    pub fn max(&self) -> Vec3 {
        self.center + self.half_extents
    }

    /// Slab test. Returns the entry distance, or the exit distance when the
    /// origin is inside the box; `None` when the box is missed or behind.
    pub fn intersect_ray(&self, ray: &Ray) -> Option<f32> {
        let (min, max) = (self.min(), self.max());
        let mut entry = f32::NEG_INFINITY;
        let mut exit = f32::INFINITY;

        for axis in 0..3 {
            let origin = ray.origin[axis];
            let direction = ray.direction[axis];
            if direction == 0.0 {
                // Parallel to this slab: it either always or never overlaps.
                if origin < min[axis] || origin > max[axis] {
                    return None;
                }
                continue;
            }
            let inv = direction.recip();
            let near = (min[axis] - origin) * inv;
            let far = (max[axis] - origin) * inv;
            entry = entry.max(near.min(far));
            exit = exit.min(near.max(far));
        }

        if exit < 0.0 || entry > exit {
            return None;
        }
        Some(if entry >= 0.0 { entry } else { exit })
    }
}

/// Unprojects a normalized-device-coordinate point into a world-space direction.
pub fn ray_direction_from_ndc(ndc: Vec2, view: Mat4, projection: Mat4) -> Vec3 {
    let eye = projection.inverse() * Vec4::new(ndc.x, ndc.y, -1.0, 1.0);
    let eye = Vec4::new(eye.x, eye.y, -1.0, 0.0);
    (view.inverse() * eye).truncate().normalize()
}

/// Ray from the camera through a window pixel (origin top-left).
pub fn screen_to_ray(
    cursor: Vec2,
    viewport: (u32, u32),
    camera: &Camera,
    fov_deg: f32,
    near: f32,
    far: f32,
) -> Ray {
    let (width, height) = (viewport.0.max(1) as f32, viewport.1.max(1) as f32);
    let ndc = Vec2::new(2.0 * cursor.x / width - 1.0, 1.0 - 2.0 * cursor.y / height);
    let projection = Mat4::perspective_rh(fov_deg.to_radians(), width / height, near, far);
    Ray {
        origin: camera.position,
        direction: ray_direction_from_ndc(ndc, camera.view_matrix(), projection),
    }
}

/// Unit box around the object's current position, scaled by its scale.
///
/// Rotation and bobbing are ignored.
pub fn object_bounds(object: &SceneObject) -> Aabb {
    Aabb {
        center: object.position,
        half_extents: object.scale * 0.5,
    }
}

/// `false` when no object has that name.
pub fn is_object_hit<B: GpuBackend>(registry: &SceneRegistry<B>, name: &str, ray: &Ray) -> bool {
    registry
        .find_object(name)
        .is_some_and(|object| object_bounds(object).intersect_ray(ray).is_some())
}

/// Rising-edge detector for a held button.
#[derive(Debug, Clone, Copy, Default)]
pub struct PressEdge {
    was_down: bool,
}

impl PressEdge {
    /// `true` only on the first poll where the button is down.
    pub fn consume(&mut self, is_down: bool) -> bool {
        let edge = is_down && !self.was_down;
        self.was_down = is_down;
        edge
    }
}
