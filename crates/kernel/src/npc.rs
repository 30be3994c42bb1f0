//! Wandering NPCs.
//!
//! An NPC idles, picks a random point inside its home disc, walks there, and
//! repeats. When the player comes within `notice_radius` it stops and turns
//! to watch them until they leave.

use crate::collision::CollisionScene;
use crate::rng::SimRng;
use arena_common::Aabb;
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Distance at which a wander target counts as reached.
pub const ARRIVE_DISTANCE: f32 = 0.1;
/// Idle pause range in ticks.
pub const IDLE_TICKS: (u32, u32) = (30, 120);

const SKIN: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NpcMode {
    Wandering,
    Idle,
    Observing,
}

/// Reported transitions that the world turns into events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NpcTransition {
    Noticed,
    Lost,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Npc {
    pub name: String,
    /// Feet position.
    pub position: Vec3,
    pub home: Vec3,
    pub wander_radius: f32,
    /// Meters per second.
    pub speed: f32,
    pub half_extents: Vec3,
    pub notice_radius: f32,
    /// Facing yaw, same convention as the player.
    pub facing: f32,
    pub target: Vec3,
    pub mode: NpcMode,
    pub idle_ticks: u32,
}

impl Npc {
    pub fn new(name: impl Into<String>, home: Vec3, wander_radius: f32, speed: f32) -> Self {
        Self {
            name: name.into(),
            position: home,
            home,
            wander_radius,
            speed,
            half_extents: Vec3::new(0.4, 0.9, 0.4),
            notice_radius: 4.0,
            facing: 0.0,
            target: home,
            mode: NpcMode::Idle,
            idle_ticks: 0,
        }
    }

    /// Collision box for feet at `feet`.
    pub fn box_at(&self, feet: Vec3) -> Aabb {
        let h = self.half_extents;
        Aabb::new(
            Vec3::new(feet.x - h.x, feet.y + SKIN, feet.z - h.z),
            Vec3::new(feet.x + h.x, feet.y + 2.0 * h.y, feet.z + h.z),
        )
    }

    pub fn aabb(&self) -> Aabb {
        self.box_at(self.position)
    }

    /// Advance one tick. `bounds` is the walkable interior of the arena,
    /// `player` the player's feet and `player_box` its collision box.
    pub(crate) fn step(
        &mut self,
        dt: f32,
        rng: &mut SimRng,
        scene: &CollisionScene<'_>,
        bounds: &Aabb,
        player: Vec3,
        player_box: &Aabb,
    ) -> Option<NpcTransition> {
        let to_player = flat(player - self.position);
        if to_player.length() <= self.notice_radius {
            if to_player.length_squared() > f32::EPSILON {
                self.facing = yaw_toward(to_player);
            }
            if self.mode != NpcMode::Observing {
                self.mode = NpcMode::Observing;
                return Some(NpcTransition::Noticed);
            }
            return None;
        }

        match self.mode {
            NpcMode::Observing => {
                self.mode = NpcMode::Idle;
                self.idle_ticks = rng.range_u32(IDLE_TICKS.0, IDLE_TICKS.1);
                return Some(NpcTransition::Lost);
            }
            NpcMode::Idle => {
                if self.idle_ticks == 0 {
                    self.target = self.pick_target(rng, bounds);
                    self.mode = NpcMode::Wandering;
                } else {
                    self.idle_ticks -= 1;
                }
            }
            NpcMode::Wandering => {
                let to_target = flat(self.target - self.position);
                let distance = to_target.length();
                if distance <= ARRIVE_DISTANCE {
                    self.mode = NpcMode::Idle;
                    self.idle_ticks = rng.range_u32(IDLE_TICKS.0, IDLE_TICKS.1);
                    return None;
                }
                let step = (self.speed * dt).min(distance);
                let dir = to_target / distance;
                let next = self.position + Vec3::new(dir.x, 0.0, dir.y) * step;
                let current = self.aabb();
                if scene.blocks(&current, &self.box_at(next), std::slice::from_ref(player_box)) {
                    self.target = self.pick_target(rng, bounds);
                } else {
                    self.position = next;
                    self.facing = yaw_toward(dir);
                }
            }
        }
        None
    }

    /// Random point in the home disc, kept inside `bounds` by the body's half-extents.
    fn pick_target(&self, rng: &mut SimRng, bounds: &Aabb) -> Vec3 {
        let angle = rng.next_f32() * std::f32::consts::TAU;
        let r = rng.next_f32().sqrt() * self.wander_radius;
        let raw = self.home + Vec3::new(angle.cos() * r, 0.0, angle.sin() * r);
        let lo = bounds.min + self.half_extents;
        let hi = bounds.max - self.half_extents;
        Vec3::new(
            clamp_span(raw.x, lo.x, hi.x),
            self.position.y,
            clamp_span(raw.z, lo.z, hi.z),
        )
    }
}

fn flat(v: Vec3) -> Vec2 {
    Vec2::new(v.x, v.z)
}

/// Yaw whose forward vector points along `dir` (x, z).
fn yaw_toward(dir: Vec2) -> f32 {
    (-dir.x).atan2(-dir.y)
}

/// Clamp that tolerates an empty span by collapsing to its midpoint.
fn clamp_span(v: f32, lo: f32, hi: f32) -> f32 {
    if lo > hi { (lo + hi) * 0.5 } else { v.clamp(lo, hi) }
}
