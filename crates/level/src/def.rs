use arena_common::{Aabb, TaskId};
use arena_kernel::collision::player_box;
use arena_kernel::{
    BodyKind, Npc, PlayerTuning, SimConfig, Task, TaskError, TaskGraph, TaskTrigger, World,
    WorldError,
};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Errors from loading, validating or building a level.
#[derive(Debug, thiserror::Error)]
pub enum LevelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("unsupported level format: {0} (expected .yaml, .yml or .json)")]
    UnsupportedFormat(PathBuf),
    #[error("{what} must be positive, got {value}")]
    NonPositive { what: String, value: f32 },
    #[error("player spawn {spawn} is inside {body}")]
    SpawnBlocked { spawn: Vec3, body: String },
    #[error("player spawn {0} is outside the arena")]
    SpawnOutsideArena(Vec3),
    #[error("npc {name} home {home} is outside the arena")]
    NpcOutsideArena { name: String, home: Vec3 },
    #[error("npc {name} starts inside {body}")]
    NpcBlocked { name: String, body: String },
    #[error("invalid task setup: {0}")]
    Task(#[from] TaskError),
    #[error("world construction failed: {0}")]
    World(#[from] WorldError),
}

/// Arena footprint: a square floor of side `2 * half_size` ringed by walls.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaDef {
    pub half_size: f32,
    pub wall_height: f32,
    pub wall_thickness: f32,
}

impl Default for ArenaDef {
    fn default() -> Self {
        Self {
            half_size: 20.0,
            wall_height: 3.0,
            wall_thickness: 1.0,
        }
    }
}

impl ArenaDef {
    /// Walkable interior, from floor level to the top of the walls.
    pub fn interior(&self) -> Aabb {
        let hs = self.half_size;
        Aabb::new(Vec3::new(-hs, 0.0, -hs), Vec3::new(hs, self.wall_height, hs))
    }

    /// Floor slab and the four perimeter walls, as (name, box, kind).
    pub fn shell(&self) -> Vec<(String, Aabb, BodyKind)> {
        let hs = self.half_size;
        let t = self.wall_thickness;
        let h = self.wall_height;
        let outer = hs + t;
        vec![
            (
                "floor".into(),
                Aabb::new(Vec3::new(-outer, -1.0, -outer), Vec3::new(outer, 0.0, outer)),
                BodyKind::Floor,
            ),
            (
                "north wall".into(),
                Aabb::new(Vec3::new(-outer, 0.0, -outer), Vec3::new(outer, h, -hs)),
                BodyKind::Wall,
            ),
            (
                "south wall".into(),
                Aabb::new(Vec3::new(-outer, 0.0, hs), Vec3::new(outer, h, outer)),
                BodyKind::Wall,
            ),
            (
                "west wall".into(),
                Aabb::new(Vec3::new(-outer, 0.0, -hs), Vec3::new(-hs, h, hs)),
                BodyKind::Wall,
            ),
            (
                "east wall".into(),
                Aabb::new(Vec3::new(hs, 0.0, -hs), Vec3::new(outer, h, hs)),
                BodyKind::Wall,
            ),
        ]
    }
}

/// A box placed inside the arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObstacleDef {
    pub name: String,
    pub center: Vec3,
    pub size: Vec3,
    #[serde(default)]
    pub kind: BodyKind,
}

impl ObstacleDef {
    pub fn new(name: impl Into<String>, center: Vec3, size: Vec3) -> Self {
        Self {
            name: name.into(),
            center,
            size,
            kind: BodyKind::Obstacle,
        }
    }

    /// Box resting on the floor, `size` wide, centred on (x, z).
    pub fn resting(name: impl Into<String>, x: f32, z: f32, size: Vec3) -> Self {
        Self::new(name, Vec3::new(x, size.y * 0.5, z), size)
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::from_center_size(self.center, self.size)
    }
}

fn default_notice_radius() -> f32 {
    4.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpcDef {
    pub name: String,
    pub home: Vec3,
    pub wander_radius: f32,
    pub speed: f32,
    #[serde(default = "default_notice_radius")]
    pub notice_radius: f32,
}

impl NpcDef {
    fn to_npc(&self) -> Npc {
        let mut npc = Npc::new(&self.name, self.home, self.wander_radius, self.speed);
        npc.notice_radius = self.notice_radius;
        npc
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDef {
    pub id: TaskId,
    pub name: String,
    pub position: Vec3,
    pub radius: f32,
    #[serde(default)]
    pub trigger: TaskTrigger,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<TaskId>,
}

impl TaskDef {
    fn to_task(&self) -> Task {
        Task::new(self.id.clone(), &self.name, self.position, self.radius)
            .with_trigger(self.trigger)
            .requiring(self.requires.iter().cloned())
    }
}

fn default_spawn() -> Vec3 {
    Vec3::new(0.0, 0.0, 10.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerDef {
    /// Feet position.
    #[serde(default = "default_spawn")]
    pub spawn: Vec3,
    #[serde(default)]
    pub tuning: PlayerTuning,
}

impl Default for PlayerDef {
    fn default() -> Self {
        Self {
            spawn: default_spawn(),
            tuning: PlayerTuning::default(),
        }
    }
}

/// A complete level description. Everything except `name` has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelDef {
    pub name: String,
    #[serde(default)]
    pub arena: ArenaDef,
    #[serde(default)]
    pub obstacles: Vec<ObstacleDef>,
    #[serde(default)]
    pub npcs: Vec<NpcDef>,
    #[serde(default)]
    pub tasks: Vec<TaskDef>,
    #[serde(default)]
    pub player: PlayerDef,
    #[serde(default)]
    pub sim: SimConfig,
}

enum Format {
    Yaml,
    Json,
}

fn format_of(path: &Path) -> Result<Format, LevelError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => Ok(Format::Yaml),
        Some("json") => Ok(Format::Json),
        _ => Err(LevelError::UnsupportedFormat(path.to_path_buf())),
    }
}

impl LevelDef {
    /// Load a level from a `.yaml`/`.yml` or `.json` file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LevelError> {
        let path = path.as_ref();
        let format = format_of(path)?;
        let text = std::fs::read_to_string(path)?;
        let level = match format {
            Format::Yaml => Self::from_yaml(&text)?,
            Format::Json => serde_json::from_str(&text)?,
        };
        tracing::debug!(path = %path.display(), name = %level.name, "level loaded");
        Ok(level)
    }

    /// Write the level, picking the format from the extension.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), LevelError> {
        let path = path.as_ref();
        let text = match format_of(path)? {
            Format::Yaml => self.to_yaml()?,
            Format::Json => serde_json::to_string_pretty(self)?,
        };
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn from_yaml(text: &str) -> Result<Self, LevelError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn to_yaml(&self) -> Result<String, LevelError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// All static boxes the level produces, in insertion order.
    pub fn static_bodies(&self) -> Vec<(String, Aabb, BodyKind)> {
        let mut bodies = self.arena.shell();
        bodies.extend(
            self.obstacles
                .iter()
                .map(|o| (o.name.clone(), o.aabb(), o.kind)),
        );
        bodies
    }

    /// Check the level for anything that would build a broken world.
    pub fn validate(&self) -> Result<(), LevelError> {
        positive("arena.half_size", self.arena.half_size)?;
        positive("arena.wall_height", self.arena.wall_height)?;
        positive("arena.wall_thickness", self.arena.wall_thickness)?;
        positive("sim.tick_rate", self.sim.tick_rate)?;
        positive("sim.cell_size", self.sim.cell_size)?;
        positive("player.tuning.height", self.player.tuning.height)?;
        positive("player.tuning.radius", self.player.tuning.radius)?;
        positive("player.tuning.walk_speed", self.player.tuning.walk_speed)?;
        for o in &self.obstacles {
            for (axis, v) in ["x", "y", "z"].iter().zip(o.size.to_array()) {
                positive(&format!("obstacle {} size.{axis}", o.name), v)?;
            }
        }
        for n in &self.npcs {
            positive(&format!("npc {} speed", n.name), n.speed)?;
            positive(&format!("npc {} wander_radius", n.name), n.wander_radius)?;
        }

        let interior = self.arena.interior();
        let bodies = self.static_bodies();
        let spawn = self.player.spawn;
        if !interior.contains_point(spawn) {
            return Err(LevelError::SpawnOutsideArena(spawn));
        }
        let pbox = player_box(spawn, &self.player.tuning);
        if let Some((name, _, _)) = bodies.iter().find(|(_, b, _)| b.overlaps(&pbox)) {
            return Err(LevelError::SpawnBlocked {
                spawn,
                body: name.clone(),
            });
        }

        for n in &self.npcs {
            if !interior.contains_point(n.home) {
                return Err(LevelError::NpcOutsideArena {
                    name: n.name.clone(),
                    home: n.home,
                });
            }
            let nbox = n.to_npc().aabb();
            if let Some((name, _, _)) = bodies.iter().find(|(_, b, _)| b.overlaps(&nbox)) {
                return Err(LevelError::NpcBlocked {
                    name: n.name.clone(),
                    body: name.clone(),
                });
            }
        }

        self.task_graph()?;
        Ok(())
    }

    /// Build the task graph. Fails on duplicates, unknown dependencies and cycles.
    pub fn task_graph(&self) -> Result<TaskGraph, LevelError> {
        Ok(TaskGraph::new(self.tasks.iter().map(TaskDef::to_task).collect())?)
    }

    /// Validate and construct a fresh world at tick 0.
    pub fn build(&self, seed: u64) -> Result<World, LevelError> {
        self.validate()?;
        let mut world = World::with_config(seed, self.sim, self.player.tuning)?;
        for (name, aabb, kind) in self.static_bodies() {
            world.add_static(name, aabb, kind);
        }
        world.set_bounds(self.arena.interior());
        world.set_spawn(self.player.spawn);
        for n in &self.npcs {
            world.spawn_npc(n.to_npc());
        }
        world.set_tasks(self.task_graph()?);
        tracing::info!(
            level = %self.name,
            seed,
            statics = world.statics().len(),
            npcs = world.npcs().len(),
            tasks = world.tasks().len(),
            "level built"
        );
        Ok(world)
    }
}

fn positive(what: &str, value: f32) -> Result<(), LevelError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(LevelError::NonPositive {
            what: what.to_string(),
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny() -> LevelDef {
        LevelDef {
            name: "tiny".into(),
            arena: ArenaDef {
                half_size: 5.0,
                ..ArenaDef::default()
            },
            obstacles: vec![ObstacleDef::resting("box", 2.0, 0.0, Vec3::ONE)],
            npcs: vec![],
            tasks: vec![],
            player: PlayerDef {
                spawn: Vec3::ZERO,
                ..PlayerDef::default()
            },
            sim: SimConfig::default(),
        }
    }

    #[test]
    fn minimal_yaml_uses_defaults() {
        let level = LevelDef::from_yaml("name: bare\n").unwrap();
        assert_eq!(level.arena, ArenaDef::default());
        assert_eq!(level.player.spawn, Vec3::new(0.0, 0.0, 10.0));
        assert_eq!(level.sim.tick_rate, 60.0);
        level.validate().unwrap();
    }

    #[test]
    fn yaml_tasks_and_npcs_parse() {
        let text = r#"
name: chain
npcs:
  - name: walker
    home: [3.0, 0.0, 3.0]
    wander_radius: 2.0
    speed: 1.0
tasks:
  - id: a
    name: first
    position: [0.0, 0.0, 5.0]
    radius: 1.0
  - id: b
    name: second
    position: [0.0, 0.0, -5.0]
    radius: 1.0
    trigger: interact
    requires: [a]
"#;
        let level = LevelDef::from_yaml(text).unwrap();
        assert_eq!(level.npcs[0].notice_radius, 4.0);
        assert_eq!(level.tasks[1].trigger, TaskTrigger::Interact);
        assert_eq!(level.tasks[1].requires, vec![TaskId::from("a")]);
        let world = level.build(1).unwrap();
        assert_eq!(world.tasks().len(), 2);
        assert_eq!(world.npcs().len(), 1);
    }

    #[test]
    fn shell_is_floor_plus_four_walls() {
        let shell = ArenaDef::default().shell();
        assert_eq!(shell.len(), 5);
        assert_eq!(shell.iter().filter(|(_, _, k)| *k == BodyKind::Wall).count(), 4);
        let interior = ArenaDef::default().interior();
        for (name, aabb, _) in &shell {
            assert!(!aabb.overlaps(&interior), "{name} intrudes");
        }
    }

    #[test]
    fn build_populates_world() {
        let world = tiny().build(3).unwrap();
        assert_eq!(world.statics().len(), 6);
        assert_eq!(world.player().position, Vec3::ZERO);
        assert_eq!(world.tick(), 0);
    }

    #[test]
    fn rejects_non_positive_sizes() {
        let mut level = tiny();
        level.obstacles[0].size.y = 0.0;
        assert!(matches!(level.validate(), Err(LevelError::NonPositive { .. })));

        let mut level = tiny();
        level.arena.half_size = -1.0;
        assert!(matches!(level.validate(), Err(LevelError::NonPositive { .. })));
    }

    #[test]
    fn rejects_spawn_inside_obstacle() {
        let mut level = tiny();
        level.player.spawn = Vec3::new(2.0, 0.0, 0.0);
        match level.validate() {
            Err(LevelError::SpawnBlocked { body, .. }) => assert_eq!(body, "box"),
            other => panic!("expected SpawnBlocked, got {other:?}"),
        }
    }

    #[test]
    fn rejects_spawn_outside_arena() {
        let mut level = tiny();
        level.player.spawn = Vec3::new(50.0, 0.0, 0.0);
        assert!(matches!(level.validate(), Err(LevelError::SpawnOutsideArena(_))));
    }

    #[test]
    fn rejects_npc_outside_arena() {
        let mut level = tiny();
        level.npcs.push(NpcDef {
            name: "lost".into(),
            home: Vec3::new(0.0, 0.0, 30.0),
            wander_radius: 1.0,
            speed: 1.0,
            notice_radius: 4.0,
        });
        assert!(matches!(level.validate(), Err(LevelError::NpcOutsideArena { .. })));
    }

    #[test]
    fn rejects_bad_task_graphs() {
        let task = |id: &str, requires: &[&str]| TaskDef {
            id: id.into(),
            name: id.into(),
            position: Vec3::ZERO,
            radius: 1.0,
            trigger: TaskTrigger::Proximity,
            requires: requires.iter().map(|r| TaskId::from(*r)).collect(),
        };

        let mut level = tiny();
        level.tasks = vec![task("a", &[]), task("a", &[])];
        assert!(matches!(level.validate(), Err(LevelError::Task(TaskError::Duplicate(_)))));

        level.tasks = vec![task("a", &["ghost"])];
        assert!(matches!(
            level.validate(),
            Err(LevelError::Task(TaskError::UnknownDependency { .. }))
        ));

        level.tasks = vec![task("a", &["b"]), task("b", &["a"])];
        assert!(matches!(level.validate(), Err(LevelError::Task(TaskError::Cycle(_)))));
    }

    #[test]
    fn save_and_load_yaml_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let level = tiny();
        for file in ["level.yaml", "level.json"] {
            let path = dir.path().join(file);
            level.save(&path).unwrap();
            let back = LevelDef::load(&path).unwrap();
            assert_eq!(back, level);
        }
    }

    #[test]
    fn unknown_extension_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("level.toml");
        assert!(matches!(tiny().save(&path), Err(LevelError::UnsupportedFormat(_))));
        assert!(matches!(LevelDef::load(&path), Err(LevelError::UnsupportedFormat(_))));
    }
}
