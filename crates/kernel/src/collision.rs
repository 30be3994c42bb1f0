//! Narrow phase against static boxes, fed by the grid broad-phase.
//!
//! Movement is resolved by rejection: a body may not move into a box it was
//! not already overlapping, nor deeper into one it already is. A body that
//! spawned inside something can still walk free.

use crate::body::StaticBody;
use crate::config::PlayerTuning;
use arena_common::{Aabb, EntityId, Ray, RayHit};
use arena_partition::GridPartition;
use glam::Vec3;
use std::collections::BTreeMap;

/// Borrowed view of the static geometry for one query batch.
#[derive(Clone, Copy)]
pub struct CollisionScene<'a> {
    statics: &'a BTreeMap<EntityId, StaticBody>,
    index: &'a GridPartition,
}

impl<'a> CollisionScene<'a> {
    pub fn new(statics: &'a BTreeMap<EntityId, StaticBody>, index: &'a GridPartition) -> Self {
        Self { statics, index }
    }

    /// First static body (in id order) overlapping `aabb`.
    pub fn first_overlap(&self, aabb: &Aabb) -> Option<EntityId> {
        self.index
            .query_aabb(aabb)
            .into_iter()
            .find(|id| self.statics.get(id).is_some_and(|b| b.aabb.overlaps(aabb)))
    }

    /// Whether moving a body from `current` to `candidate` enters any static
    /// box or any of `extra` boxes, or pushes further into one it is
    /// already inside.
    pub fn blocks(&self, current: &Aabb, candidate: &Aabb, extra: &[Aabb]) -> bool {
        let enters = |b: &Aabb| {
            if !candidate.overlaps(b) {
                return false;
            }
            !current.overlaps(b) || penetration(candidate, b) > penetration(current, b)
        };

        if extra.iter().any(enters) {
            return true;
        }
        self.index
            .query_aabb(candidate)
            .into_iter()
            .filter_map(|id| self.statics.get(&id))
            .any(|body| enters(&body.aabb))
    }

    /// Highest static top under an XZ `footprint` whose height lies in
    /// `lo..=hi`. Boxes only touching the footprint edge do not count.
    pub fn support_height(&self, footprint: &Aabb, lo: f32, hi: f32) -> Option<f32> {
        let query = Aabb::new(
            Vec3::new(footprint.min.x, lo, footprint.min.z),
            Vec3::new(footprint.max.x, hi, footprint.max.z),
        );
        self.index
            .query_aabb(&query)
            .into_iter()
            .filter_map(|id| self.statics.get(&id))
            .map(|body| &body.aabb)
            .filter(|b| {
                b.min.x < footprint.max.x
                    && b.max.x > footprint.min.x
                    && b.min.z < footprint.max.z
                    && b.max.z > footprint.min.z
            })
            .map(|b| b.max.y)
            .filter(|&top| top >= lo && top <= hi)
            .reduce(f32::max)
    }

    /// Nearest static hit along the ray. Ties go to the lower id.
    pub fn raycast(&self, ray: &Ray, max_dist: f32) -> Option<(EntityId, RayHit)> {
        let mut best: Option<(EntityId, RayHit)> = None;
        for id in self.index.query_ray(ray, max_dist) {
            let Some(body) = self.statics.get(&id) else {
                continue;
            };
            let Some(hit) = body.aabb.ray_intersect(ray, max_dist) else {
                continue;
            };
            if best.is_none_or(|(_, b)| hit.distance < b.distance) {
                best = Some((id, hit));
            }
        }
        best
    }
}

/// Shallowest axis of overlap between two boxes; zero when apart.
fn penetration(a: &Aabb, b: &Aabb) -> f32 {
    let depth = a.max.min(b.max) - a.min.max(b.min);
    depth.min_element().max(0.0)
}

/// Player collision box for feet at `feet`.
pub fn player_box(feet: Vec3, tuning: &PlayerTuning) -> Aabb {
    Aabb::new(
        Vec3::new(feet.x - tuning.radius, feet.y + tuning.skin, feet.z - tuning.radius),
        Vec3::new(feet.x + tuning.radius, feet.y + tuning.height, feet.z + tuning.radius),
    )
}
