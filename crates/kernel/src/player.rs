//! First-person player body: look, walk, jump, fall, land.

use crate::collision::{CollisionScene, player_box};
use crate::config::PlayerTuning;
use arena_common::{Aabb, PlayerInput};
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

const PITCH_LIMIT: f32 = 89.0_f32 * std::f32::consts::PI / 180.0;

/// Player state. `position` is the feet; the camera sits `eye_height` above.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub position: Vec3,
    pub velocity: Vec3,
    /// Radians. Yaw 0 looks down -Z.
    pub yaw: f32,
    pub pitch: f32,
    /// Standing on something; a jump is allowed.
    pub grounded: bool,
    pub spawn: Vec3,
}

/// What happened to the player during one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveOutcome {
    pub jumped: bool,
    pub landed: bool,
    pub bumped_head: bool,
}

impl PlayerState {
    pub fn new(spawn: Vec3) -> Self {
        Self {
            position: spawn,
            velocity: Vec3::ZERO,
            yaw: 0.0,
            pitch: 0.0,
            grounded: false,
            spawn,
        }
    }

    pub fn eye(&self, tuning: &PlayerTuning) -> Vec3 {
        self.position + Vec3::Y * tuning.eye_height
    }

    /// Horizontal view direction.
    pub fn forward(&self) -> Vec3 {
        forward_from_yaw(self.yaw)
    }

    /// View direction including pitch.
    pub fn look_direction(&self) -> Vec3 {
        let (sy, cy) = self.yaw.sin_cos();
        let (sp, cp) = self.pitch.sin_cos();
        Vec3::new(-sy * cp, sp, -cy * cp)
    }

    pub fn right(&self) -> Vec3 {
        let (s, c) = self.yaw.sin_cos();
        Vec3::new(c, 0.0, -s)
    }

    pub fn respawn(&mut self) {
        self.position = self.spawn;
        self.velocity = Vec3::ZERO;
        self.grounded = false;
    }

    /// Advance one fixed tick.
    pub(crate) fn step(
        &mut self,
        input: &PlayerInput,
        tuning: &PlayerTuning,
        dt: f32,
        scene: &CollisionScene<'_>,
        blockers: &[Aabb],
    ) -> MoveOutcome {
        let mut outcome = MoveOutcome::default();

        self.yaw = input.yaw;
        self.pitch = input.pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);

        // Horizontal: X then Z, each rejected independently so walls slide.
        let wish = self.wish_velocity(input.move_axis, tuning);
        self.velocity.x = wish.x;
        self.velocity.z = wish.z;
        for delta in [Vec3::X * wish.x * dt, Vec3::Z * wish.z * dt] {
            if delta == Vec3::ZERO {
                continue;
            }
            let current = player_box(self.position, tuning);
            let candidate = player_box(self.position + delta, tuning);
            if !scene.blocks(&current, &candidate, blockers) {
                self.position += delta;
            }
        }

        // Vertical.
        let was_grounded = self.grounded;
        if input.jump && self.grounded {
            self.velocity.y = tuning.jump_speed;
            self.grounded = false;
            outcome.jumped = true;
        }
        if self.grounded {
            self.velocity.y = 0.0;
        } else {
            self.velocity.y = (self.velocity.y - tuning.gravity * dt).max(-tuning.max_fall_speed);
        }

        let start_y = self.position.y;
        let new_y = start_y + self.velocity.y * dt;

        if self.velocity.y > 0.0 {
            let current = player_box(self.position, tuning);
            let raised = Vec3::new(self.position.x, new_y, self.position.z);
            if scene.blocks(&current, &player_box(raised, tuning), blockers) {
                self.velocity.y = 0.0;
                outcome.bumped_head = true;
            } else {
                self.position.y = new_y;
            }
            self.grounded = false;
        } else {
            // Highest top anywhere under the body, not just under its centre.
            let footprint = player_box(self.position, tuning);
            let ground = scene.support_height(
                &footprint,
                new_y - tuning.ground_snap,
                start_y + tuning.probe_height,
            );

            match ground {
                Some(ground_y) => {
                    self.position.y = ground_y;
                    self.velocity.y = 0.0;
                    self.grounded = true;
                    outcome.landed = !was_grounded;
                }
                None => {
                    self.position.y = new_y;
                    self.grounded = false;
                }
            }
        }

        outcome
    }

    fn wish_velocity(&self, axis: Vec2, tuning: &PlayerTuning) -> Vec3 {
        let axis = if axis.length_squared() > 1.0 {
            axis.normalize()
        } else {
            axis
        };
        let dir = self.right() * axis.x + self.forward() * axis.y;
        let control = if self.grounded { 1.0 } else { tuning.air_control };
        dir * tuning.walk_speed * control
    }
}

pub fn forward_from_yaw(yaw: f32) -> Vec3 {
    let (s, c) = yaw.sin_cos();
    Vec3::new(-s, 0.0, -c)
}
