use arena_common::{Aabb, Transform};
use arena_kernel::{BodyKind, NpcMode, TaskStatus, World};
use glam::{Quat, Vec3};

/// What a box stands for. Drives its colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawKind {
    Floor,
    Wall,
    Obstacle,
    Npc(NpcMode),
    Task(TaskStatus),
}

impl DrawKind {
    /// Linear RGBA.
    pub fn color(self) -> [f32; 4] {
        match self {
            Self::Floor => [0.22, 0.24, 0.26, 1.0],
            Self::Wall => [0.55, 0.55, 0.6, 1.0],
            Self::Obstacle => [0.62, 0.42, 0.22, 1.0],
            Self::Npc(NpcMode::Wandering) => [0.2, 0.45, 0.85, 1.0],
            Self::Npc(NpcMode::Idle) => [0.3, 0.35, 0.6, 1.0],
            Self::Npc(NpcMode::Observing) => [0.9, 0.3, 0.25, 1.0],
            Self::Task(TaskStatus::Locked) => [0.35, 0.35, 0.35, 1.0],
            Self::Task(TaskStatus::Available) => [0.95, 0.8, 0.15, 1.0],
            Self::Task(TaskStatus::Completed) => [0.25, 0.8, 0.35, 1.0],
        }
    }
}

impl From<BodyKind> for DrawKind {
    fn from(kind: BodyKind) -> Self {
        match kind {
            BodyKind::Floor => Self::Floor,
            BodyKind::Wall => Self::Wall,
            BodyKind::Obstacle => Self::Obstacle,
        }
    }
}

/// One solid box to draw: a unit cube scaled to `size`, turned by `yaw`
/// about its vertical axis, centred on `center`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawBox {
    pub center: Vec3,
    pub size: Vec3,
    pub yaw: f32,
    pub color: [f32; 4],
    pub kind: DrawKind,
}

impl DrawBox {
    pub fn from_aabb(aabb: &Aabb, kind: DrawKind) -> Self {
        Self {
            center: aabb.center(),
            size: aabb.size(),
            yaw: 0.0,
            color: kind.color(),
            kind,
        }
    }

    /// Model transform applied to a unit cube to draw this box.
    pub fn transform(&self) -> Transform {
        Transform {
            position: self.center,
            rotation: Quat::from_rotation_y(self.yaw),
            scale: self.size,
        }
    }
}

/// Size of a task marker post.
const MARKER_SIZE: Vec3 = Vec3::new(0.3, 1.2, 0.3);

/// Everything visible, in a stable order: statics, NPCs, then task markers.
/// The player has no body in first person.
pub fn extract_scene(world: &World) -> Vec<DrawBox> {
    let mut boxes = Vec::with_capacity(world.statics().len() + world.npcs().len() + world.tasks().len());

    boxes.extend(
        world
            .statics()
            .values()
            .map(|body| DrawBox::from_aabb(&body.aabb, body.kind.into())),
    );

    boxes.extend(world.npcs().values().map(|npc| DrawBox {
        yaw: npc.facing,
        ..DrawBox::from_aabb(&npc.aabb(), DrawKind::Npc(npc.mode))
    }));

    boxes.extend(world.tasks().iter().map(|task| {
        let center = task.position + Vec3::Y * (MARKER_SIZE.y * 0.5);
        let kind = DrawKind::Task(task.status);
        DrawBox {
            center,
            size: MARKER_SIZE,
            yaw: 0.0,
            color: kind.color(),
            kind,
        }
    }));

    tracing::trace!(boxes = boxes.len(), "scene extracted");
    boxes
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_level::LevelDef;

    #[test]
    fn default_arena_scene_has_every_object() {
        let world = LevelDef::default_arena().build(0).unwrap();
        let scene = extract_scene(&world);
        assert_eq!(scene.len(), 10 + 3 + 4);
        assert_eq!(scene.iter().filter(|b| b.kind == DrawKind::Floor).count(), 1);
        assert_eq!(
            scene.iter().filter(|b| matches!(b.kind, DrawKind::Npc(_))).count(),
            3
        );
        assert_eq!(
            scene
                .iter()
                .filter(|b| b.kind == DrawKind::Task(TaskStatus::Available))
                .count(),
            1
        );
    }

    #[test]
    fn boxes_match_world_geometry() {
        let world = LevelDef::default_arena().build(0).unwrap();
        let scene = extract_scene(&world);
        for (body, drawn) in world.statics().values().zip(&scene) {
            assert_eq!(drawn.center, body.aabb.center());
            assert_eq!(drawn.size, body.aabb.size());
        }
    }

    #[test]
    fn transform_scales_unit_cube() {
        let b = DrawBox::from_aabb(
            &Aabb::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(2.0, 4.0, 6.0)),
            DrawKind::Obstacle,
        );
        let t = b.transform();
        assert_eq!(t.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(t.scale, Vec3::new(2.0, 4.0, 6.0));
        assert_eq!(b.color, DrawKind::Obstacle.color());
    }

    #[test]
    fn status_colours_differ() {
        let locked = DrawKind::Task(TaskStatus::Locked).color();
        let done = DrawKind::Task(TaskStatus::Completed).color();
        assert_ne!(locked, done);
    }
}
