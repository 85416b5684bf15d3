//! Camera and world-to-screen projection

use crate::grid::ScreenPosition;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Quat, Vec3, Vec4Swizzles};

/// Written by the projection kernel for bodies behind the camera
pub const OFFSCREEN: ScreenPosition = [-1.0, -1.0];

/// Projection kernel uniform
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct ProjectionParams {
    pub world_to_screen: [[f32; 4]; 4],
    pub num_masses: u32,
    pub _padding: [u32; 3],
}

/// Orbit camera looking at `target` from `distance` along `rotation`
#[derive(Debug, Clone)]
pub struct ScreenCamera {
    pub distance: f32,
    pub rotation: Quat,
    pub target: Vec3,
    pub aspect: f32,
    pub fovy: f32,
    pub znear: f32,
    pub zfar: f32,
}

impl ScreenCamera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            distance: 400.0,
            rotation: Quat::from_rotation_x(-0.3),
            target: Vec3::ZERO,
            aspect: width.max(1) as f32 / height.max(1) as f32,
            fovy: 45.0_f32.to_radians(),
            znear: 0.1,
            zfar: 100000.0,
        }
    }

    pub fn position(&self) -> Vec3 {
        let offset = self.rotation * Vec3::new(0.0, 0.0, self.distance);
        self.target + offset
    }

    pub fn rotate(&mut self, delta_x: f32, delta_y: f32) {
        let up = self.rotation * Vec3::Y;
        let yaw_rotation = Quat::from_axis_angle(up, delta_x);

        let right = self.rotation * Vec3::X;
        let pitch_rotation = Quat::from_axis_angle(right, -delta_y);

        self.rotation = (yaw_rotation * pitch_rotation * self.rotation).normalize();
    }

    pub fn view_projection(&self) -> Mat4 {
        let rotation_matrix = Mat4::from_quat(self.rotation.conjugate());
        let translation_matrix = Mat4::from_translation(-self.position());
        let view = rotation_matrix * translation_matrix;
        let proj = Mat4::perspective_rh(self.fovy, self.aspect, self.znear, self.zfar);
        proj * view
    }

    /// Clip space to pixels: `Scale(w, h, 1) · Translate(½) · Scale(½) · viewProj`.
    ///
    /// Pixel `(0, 0)` is the bottom-left corner of the screen.
    pub fn world_to_screen(&self, width: u32, height: u32) -> Mat4 {
        let viewport = Mat4::from_scale(Vec3::new(width as f32, height as f32, 1.0));
        let clip_to_viewport =
            Mat4::from_translation(Vec3::splat(0.5)) * Mat4::from_scale(Vec3::splat(0.5));
        viewport * clip_to_viewport * self.view_projection()
    }

    /// Host-side counterpart of the projection kernel
    pub fn project(&self, world: Vec3, width: u32, height: u32) -> ScreenPosition {
        project_point(&self.world_to_screen(width, height), world)
    }

    pub fn projection_params(&self, width: u32, height: u32, num_masses: u32) -> ProjectionParams {
        ProjectionParams {
            world_to_screen: self.world_to_screen(width, height).to_cols_array_2d(),
            num_masses,
            _padding: [0; 3],
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width.max(1) as f32 / height.max(1) as f32;
    }
}

/// Apply a world-to-screen matrix with perspective divide
pub fn project_point(world_to_screen: &Mat4, world: Vec3) -> ScreenPosition {
    let clip = *world_to_screen * world.extend(1.0);
    if clip.w <= 0.0 {
        return OFFSCREEN;
    }
    (clip.xy() / clip.w).to_array()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facing_origin() -> ScreenCamera {
        ScreenCamera {
            rotation: Quat::IDENTITY,
            distance: 100.0,
            ..ScreenCamera::new(800, 600)
        }
    }

    #[test]
    fn target_projects_to_screen_center() {
        let camera = facing_origin();
        let [x, y] = camera.project(Vec3::ZERO, 800, 600);
        assert!((x - 400.0).abs() < 1e-3);
        assert!((y - 300.0).abs() < 1e-3);
    }

    #[test]
    fn screen_axes_follow_world_axes() {
        let camera = facing_origin();
        let [x, y] = camera.project(Vec3::new(10.0, 10.0, 0.0), 800, 600);
        assert!(x > 400.0, "+x should land right of center");
        assert!(y > 300.0, "+y should land above center");
    }

    #[test]
    fn points_behind_camera_are_offscreen() {
        let camera = facing_origin();
        assert_eq!(camera.project(Vec3::new(0.0, 0.0, 200.0), 800, 600), OFFSCREEN);
    }

    #[test]
    fn projection_params_layout() {
        assert_eq!(std::mem::size_of::<ProjectionParams>(), 80);
        let params = facing_origin().projection_params(800, 600, 7);
        assert_eq!(params.num_masses, 7);
    }
}
