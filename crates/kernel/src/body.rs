use arena_common::Aabb;
use serde::{Deserialize, Serialize};

/// What a static box is, for rendering and level validation. Collision
/// treats every kind the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyKind {
    Floor,
    Wall,
    #[default]
    Obstacle,
}

/// Immovable collision box: floor slab, wall or crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticBody {
    pub name: String,
    pub aabb: Aabb,
    pub kind: BodyKind,
}

impl StaticBody {
    pub fn new(name: impl Into<String>, aabb: Aabb, kind: BodyKind) -> Self {
        Self {
            name: name.into(),
            aabb,
            kind,
        }
    }
}
