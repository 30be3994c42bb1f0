use arena_render::RenderView;
use glam::{Mat4, Vec3};

/// First-person camera: the player's view plus the window aspect ratio.
///
/// Holds no state of its own beyond the aspect; the view is copied from the
/// world every frame, so the camera can never drift from the simulation.
#[derive(Debug, Clone, Copy)]
pub struct FirstPersonCamera {
    pub view: RenderView,
    pub aspect: f32,
}

impl Default for FirstPersonCamera {
    fn default() -> Self {
        Self {
            view: RenderView::default(),
            aspect: 16.0 / 9.0,
        }
    }
}

impl FirstPersonCamera {
    pub fn new(view: RenderView, width: u32, height: u32) -> Self {
        let mut cam = Self {
            view,
            ..Self::default()
        };
        cam.set_viewport(width, height);
        cam
    }

    /// Update the aspect from a window size. A zero dimension keeps the old aspect.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn eye(&self) -> Vec3 {
        self.view.eye
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.view.view_matrix()
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.view.projection_matrix(self.aspect)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_camera_is_finite() {
        let cam = FirstPersonCamera::default();
        assert!(cam.view_projection().is_finite());
    }

    #[test]
    fn viewport_sets_aspect() {
        let mut cam = FirstPersonCamera::new(RenderView::default(), 800, 400);
        assert_eq!(cam.aspect, 2.0);
        cam.set_viewport(0, 600);
        assert_eq!(cam.aspect, 2.0);
    }

    #[test]
    fn point_ahead_lands_in_clip_volume() {
        let cam = FirstPersonCamera::default();
        let ahead = cam.eye() + cam.view.forward() * 10.0;
        let clip = cam.view_projection().project_point3(ahead);
        assert!(clip.x.abs() < 1e-4 && clip.y.abs() < 1e-4);
        assert!((0.0..=1.0).contains(&clip.z));
    }

    #[test]
    fn point_behind_is_outside() {
        let cam = FirstPersonCamera::default();
        let behind = cam.eye() - cam.view.forward() * 10.0;
        let clip = cam.view_projection() * behind.extend(1.0);
        assert!(clip.w < 0.0);
    }
}
