use crate::scene::extract_scene;
use arena_kernel::{TaskStatus, World};
use glam::{Mat4, Vec3};
use std::fmt::Write;

/// First-person view configuration for rendering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderView {
    /// Camera position in world space.
    pub eye: Vec3,
    /// Yaw in radians; 0 looks down -Z.
    pub yaw: f32,
    /// Pitch in radians; positive looks up.
    pub pitch: f32,
    /// Vertical field of view in degrees.
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for RenderView {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 1.8, 10.0),
            yaw: 0.0,
            pitch: 0.0,
            fov_degrees: 75.0,
            near: 0.05,
            far: 200.0,
        }
    }
}

impl RenderView {
    /// View from the player's eyes.
    pub fn from_world(world: &World) -> Self {
        let player = world.player();
        Self {
            eye: world.eye(),
            yaw: player.yaw,
            pitch: player.pitch,
            ..Self::default()
        }
    }

    pub fn forward(&self) -> Vec3 {
        let (sy, cy) = self.yaw.sin_cos();
        let (sp, cp) = self.pitch.sin_cos();
        Vec3::new(-sy * cp, sp, -cy * cp)
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_to_rh(self.eye, self.forward(), Vec3::Y)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_degrees.to_radians(), aspect, self.near, self.far)
    }

    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }
}

/// Renderer-agnostic interface. All renderers implement this trait.
///
/// The renderer reads world state and a view, then produces output. It never
/// mutates the world.
pub trait Renderer {
    type Output;

    /// Render one frame from the given world state and view.
    fn render(&self, world: &World, view: &RenderView) -> Self::Output;
}

/// Text renderer for the CLI, logs and tests.
#[derive(Debug, Default)]
pub struct DebugTextRenderer;

impl DebugTextRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Renderer for DebugTextRenderer {
    type Output = String;

    fn render(&self, world: &World, view: &RenderView) -> String {
        let mut out = String::new();
        let p = world.player();
        let (done, total) = world.tasks().progress();

        // Writing to a String cannot fail.
        let _ = writeln!(
            out,
            "=== Arena (tick={}, seed={}) ===",
            world.tick(),
            world.seed()
        );
        let _ = writeln!(
            out,
            "Player: pos=({:.2}, {:.2}, {:.2}) vel_y={:.2} grounded={}",
            p.position.x, p.position.y, p.position.z, p.velocity.y, p.grounded
        );
        let f = view.forward();
        let _ = writeln!(
            out,
            "Camera: eye=({:.2}, {:.2}, {:.2}) dir=({:.2}, {:.2}, {:.2}) fov={:.0}",
            view.eye.x, view.eye.y, view.eye.z, f.x, f.y, f.z, view.fov_degrees
        );
        let _ = writeln!(
            out,
            "Scene: {} boxes, {} NPCs",
            extract_scene(world).len(),
            world.npcs().len()
        );
        for (id, npc) in world.npcs() {
            let _ = writeln!(
                out,
                "  npc [{}] {:<10} {:?} pos=({:.2}, {:.2})",
                id.short(),
                npc.name,
                npc.mode,
                npc.position.x,
                npc.position.z
            );
        }
        let _ = writeln!(out, "Tasks: {done}/{total}");
        for task in world.tasks().iter() {
            let mark = match task.status {
                TaskStatus::Completed => "x",
                TaskStatus::Available => " ",
                TaskStatus::Locked => "-",
            };
            let _ = writeln!(out, "  [{mark}] {} ({})", task.name, task.id);
        }
        out
    }
}
