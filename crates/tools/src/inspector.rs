use arena_common::{EntityId, TaskId};
use arena_kernel::{NpcMode, TaskStatus, TaskTrigger, World, WorldEvent};
use glam::Vec3;
use serde::Serialize;
use std::fmt;

/// Read-only queries against the arena for the HUD, CLI and logs.
pub struct ArenaInspector;

impl ArenaInspector {
    /// One-line overview of the world.
    pub fn summary(world: &World) -> ArenaSummary {
        let player = world.player();
        let count = |mode: NpcMode| world.npcs().values().filter(|n| n.mode == mode).count();
        let (tasks_done, tasks_total) = world.tasks().progress();
        ArenaSummary {
            tick: world.tick(),
            seed: world.seed(),
            state_hash: world.state_hash(),
            player_position: player.position,
            grounded: player.grounded,
            npcs_wandering: count(NpcMode::Wandering),
            npcs_idle: count(NpcMode::Idle),
            npcs_observing: count(NpcMode::Observing),
            tasks_done,
            tasks_total,
            pending_events: world.events().len(),
        }
    }

    /// Tasks in id order, with the player's horizontal distance to each.
    pub fn task_list(world: &World) -> Vec<TaskInfo> {
        let feet = world.player().position;
        world
            .tasks()
            .iter()
            .map(|t| TaskInfo {
                id: t.id.clone(),
                name: t.name.clone(),
                status: t.status,
                trigger: t.trigger,
                distance: flat_distance(feet, t.position),
                completed_at: t.completed_at,
            })
            .collect()
    }

    pub fn npc_info(world: &World, id: EntityId) -> Option<NpcInfo> {
        let feet = world.player().position;
        world.npcs().get(&id).map(|npc| NpcInfo {
            id,
            name: npc.name.clone(),
            mode: npc.mode,
            position: npc.position,
            target: npc.target,
            distance_to_player: flat_distance(feet, npc.position),
        })
    }

    pub fn list_npcs(world: &World) -> Vec<NpcInfo> {
        world
            .npcs()
            .keys()
            .filter_map(|id| Self::npc_info(world, *id))
            .collect()
    }

    /// Human-readable line for an event, with names resolved against `world`.
    pub fn describe_event(world: &World, event: &WorldEvent) -> String {
        let npc_name = |id: &EntityId| {
            world
                .npcs()
                .get(id)
                .map_or_else(|| id.short(), |n| n.name.clone())
        };
        let task_name = |id: &TaskId| {
            world
                .tasks()
                .get(id)
                .map_or_else(|| id.to_string(), |t| t.name.clone())
        };
        match event {
            WorldEvent::Stepped { tick, .. } => format!("[{tick}] step"),
            WorldEvent::Jumped { tick, .. } => format!("[{tick}] jumped"),
            WorldEvent::Landed { tick, position } => format!("[{tick}] landed at y={:.2}", position.y),
            WorldEvent::Respawned { tick, .. } => format!("[{tick}] fell out, respawned"),
            WorldEvent::NpcNoticedPlayer { tick, npc } => {
                format!("[{tick}] {} is watching you", npc_name(npc))
            }
            WorldEvent::NpcLostPlayer { tick, npc } => {
                format!("[{tick}] {} lost interest", npc_name(npc))
            }
            WorldEvent::TaskCompleted { tick, task } => {
                format!("[{tick}] completed: {}", task_name(task))
            }
            WorldEvent::TaskUnlocked { tick, task } => {
                format!("[{tick}] unlocked: {}", task_name(task))
            }
            WorldEvent::AllTasksComplete { tick } => format!("[{tick}] all tasks complete"),
        }
    }
}

fn flat_distance(a: Vec3, b: Vec3) -> f32 {
    let d = b - a;
    (d.x * d.x + d.z * d.z).sqrt()
}

/// Summary of arena state for the inspector.
#[derive(Debug, Clone, Serialize)]
pub struct ArenaSummary {
    pub tick: u64,
    pub seed: u64,
    pub state_hash: u64,
    pub player_position: Vec3,
    pub grounded: bool,
    pub npcs_wandering: usize,
    pub npcs_idle: usize,
    pub npcs_observing: usize,
    pub tasks_done: usize,
    pub tasks_total: usize,
    pub pending_events: usize,
}

impl fmt::Display for ArenaSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = self.player_position;
        write!(
            f,
            "Arena: tick={} hash={:016x} player=({:.2}, {:.2}, {:.2}){} npcs={}/{}/{} (wander/idle/watch) tasks={}/{}",
            self.tick,
            self.state_hash,
            p.x,
            p.y,
            p.z,
            if self.grounded { "" } else { " airborne" },
            self.npcs_wandering,
            self.npcs_idle,
            self.npcs_observing,
            self.tasks_done,
            self.tasks_total,
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskInfo {
    pub id: TaskId,
    pub name: String,
    pub status: TaskStatus,
    pub trigger: TaskTrigger,
    /// Horizontal distance from the player's feet.
    pub distance: f32,
    pub completed_at: Option<u64>,
}

impl fmt::Display for TaskInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = match self.status {
            TaskStatus::Completed => "[x]",
            TaskStatus::Available => "[ ]",
            TaskStatus::Locked => "[-]",
        };
        write!(f, "{mark} {} ({:.1} m)", self.name, self.distance)?;
        if self.trigger == TaskTrigger::Interact && self.status == TaskStatus::Available {
            write!(f, " press E")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NpcInfo {
    pub id: EntityId,
    pub name: String,
    pub mode: NpcMode,
    pub position: Vec3,
    pub target: Vec3,
    pub distance_to_player: f32,
}

impl fmt::Display for NpcInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "NPC [{}] {} {:?} pos=({:.2}, {:.2}) {:.1} m away",
            self.id.short(),
            self.name,
            self.mode,
            self.position.x,
            self.position.z,
            self.distance_to_player,
        )
    }
}
