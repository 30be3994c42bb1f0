use crate::def::{ArenaDef, LevelDef, NpcDef, ObstacleDef, PlayerDef, TaskDef};
use arena_kernel::{BodyKind, SimConfig, TaskTrigger};
use glam::Vec3;

impl LevelDef {
    /// The built-in arena: a 40 x 40 walled floor with a wall across the
    /// middle, a few crates, three wanderers and a four-step task chain.
    /// The player starts at (0, 0, 10) facing the middle wall.
    pub fn default_arena() -> Self {
        let mut middle = ObstacleDef::new("middle wall", Vec3::new(0.0, 1.5, 0.0), Vec3::new(10.0, 3.0, 1.0));
        middle.kind = BodyKind::Wall;

        Self {
            name: "arena".into(),
            arena: ArenaDef::default(),
            obstacles: vec![
                middle,
                ObstacleDef::resting("crate west", -6.0, 6.0, Vec3::ONE),
                ObstacleDef::resting("crate east", 7.0, -6.0, Vec3::splat(1.5)),
                ObstacleDef::resting("crate stack", -8.0, -8.0, Vec3::new(2.0, 1.0, 2.0)),
                ObstacleDef::resting("ledge", 8.0, 8.0, Vec3::new(3.0, 1.0, 3.0)),
            ],
            npcs: vec![
                npc("ada", Vec3::new(-10.0, 0.0, -12.0), 5.0, 1.5),
                npc("bo", Vec3::new(12.0, 0.0, -8.0), 4.0, 1.2),
                npc("cy", Vec3::new(-12.0, 0.0, 12.0), 4.0, 1.0),
            ],
            tasks: vec![
                task("approach", "Walk up to the middle wall", Vec3::new(0.0, 0.0, 2.0), 1.5, &[]),
                task("crate", "Find the west crate", Vec3::new(-6.0, 0.0, 7.5), 1.2, &["approach"]),
                task("ledge", "Climb onto the ledge", Vec3::new(8.0, 1.0, 8.0), 1.0, &["crate"]),
                TaskDef {
                    trigger: TaskTrigger::Interact,
                    ..task(
                        "beacon",
                        "Activate the beacon behind the wall",
                        Vec3::new(0.0, 0.0, -10.0),
                        1.5,
                        &["ledge"],
                    )
                },
            ],
            player: PlayerDef::default(),
            sim: SimConfig::default(),
        }
    }
}

fn npc(name: &str, home: Vec3, wander_radius: f32, speed: f32) -> NpcDef {
    NpcDef {
        name: name.into(),
        home,
        wander_radius,
        speed,
        notice_radius: 4.0,
    }
}

fn task(id: &str, name: &str, position: Vec3, radius: f32, requires: &[&str]) -> TaskDef {
    TaskDef {
        id: id.into(),
        name: name.into(),
        position,
        radius,
        trigger: TaskTrigger::Proximity,
        requires: requires.iter().map(|r| (*r).into()).collect(),
    }
}
