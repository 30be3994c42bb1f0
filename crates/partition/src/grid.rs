use arena_common::{Aabb, EntityId, Ray};
use glam::Vec3;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// A 2D cell coordinate in the grid (Y is ignored for partitioning).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellCoord {
    pub x: i32,
    pub z: i32,
}

impl CellCoord {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }
}

/// Cell edge length used when none is configured.
pub const DEFAULT_CELL_SIZE: f32 = 4.0;

#[derive(Debug, thiserror::Error)]
pub enum PartitionError {
    #[error("cell size must be positive and finite, got {0}")]
    InvalidCellSize(f32),
}

/// Fixed-size grid partitioning of static boxes.
///
/// A box is registered in every cell its XZ footprint overlaps, so a query
/// only has to look at the cells its own footprint covers.
#[derive(Debug, Clone)]
pub struct GridPartition {
    cell_size: f32,
    cells: HashMap<CellCoord, BTreeSet<EntityId>>,
    bounds: BTreeMap<EntityId, Aabb>,
    /// Inclusive corner cells of everything registered.
    extent: Option<(CellCoord, CellCoord)>,
}

impl Default for GridPartition {
    fn default() -> Self {
        Self {
            cell_size: DEFAULT_CELL_SIZE,
            cells: HashMap::new(),
            bounds: BTreeMap::new(),
            extent: None,
        }
    }
}

impl GridPartition {
    /// Create a new grid partition with the given cell size.
    pub fn new(cell_size: f32) -> Result<Self, PartitionError> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(PartitionError::InvalidCellSize(cell_size));
        }
        Ok(Self {
            cell_size,
            cells: HashMap::new(),
            bounds: BTreeMap::new(),
            extent: None,
        })
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Convert a world position to a cell coordinate.
    pub fn position_to_cell(&self, pos: Vec3) -> CellCoord {
        CellCoord {
            x: (pos.x / self.cell_size).floor() as i32,
            z: (pos.z / self.cell_size).floor() as i32,
        }
    }

    /// Register a box. Re-inserting an id replaces its previous footprint.
    pub fn insert(&mut self, id: EntityId, aabb: Aabb) {
        if self.bounds.contains_key(&id) {
            self.remove(id);
        }
        let (lo, hi) = self.cell_range(&aabb);
        let coords = cells_between(lo, hi);
        tracing::trace!(id = %id.short(), cells = coords.len(), "partition insert");
        for coord in coords {
            self.cells.entry(coord).or_default().insert(id);
        }
        self.bounds.insert(id, aabb);
        self.extent = Some(match self.extent {
            Some((a, b)) => (
                CellCoord::new(a.x.min(lo.x), a.z.min(lo.z)),
                CellCoord::new(b.x.max(hi.x), b.z.max(hi.z)),
            ),
            None => (lo, hi),
        });
    }

    /// Unregister a box. Returns its bounds if it was present.
    pub fn remove(&mut self, id: EntityId) -> Option<Aabb> {
        let aabb = self.bounds.remove(&id)?;
        let (lo, hi) = self.cell_range(&aabb);
        for coord in cells_between(lo, hi) {
            if let Some(set) = self.cells.get_mut(&coord) {
                set.remove(&id);
                if set.is_empty() {
                    self.cells.remove(&coord);
                }
            }
        }
        self.extent = self.cells.keys().fold(None, |acc, c| {
            Some(match acc {
                Some((a, b)) => (
                    CellCoord::new(a.x.min(c.x), a.z.min(c.z)),
                    CellCoord::new(b.x.max(c.x), b.z.max(c.z)),
                ),
                None => (*c, *c),
            })
        });
        Some(aabb)
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.bounds.clear();
        self.extent = None;
    }

    /// Candidate ids whose cells intersect the query box footprint.
    pub fn query_aabb(&self, query: &Aabb) -> BTreeSet<EntityId> {
        let mut result = BTreeSet::new();
        for coord in self.cells_covering(query) {
            if let Some(ids) = self.cells.get(&coord) {
                result.extend(ids.iter().copied());
            }
        }
        result
    }

    /// Candidate ids along a ray segment of length `max_dist`.
    ///
    /// Walks only the cells the ray passes through in XZ, clipped to the
    /// occupied part of the grid, so `max_dist` may be infinite.
    pub fn query_ray(&self, ray: &Ray, max_dist: f32) -> BTreeSet<EntityId> {
        let mut result = BTreeSet::new();
        let Some((lo, hi)) = self.extent else {
            return result;
        };

        // Clip the segment to the occupied region.
        let region_min = [lo.x as f32 * self.cell_size, lo.z as f32 * self.cell_size];
        let region_max = [
            (hi.x + 1) as f32 * self.cell_size,
            (hi.z + 1) as f32 * self.cell_size,
        ];
        let origin = [ray.origin.x, ray.origin.z];
        let dir = [ray.direction.x, ray.direction.z];
        let (mut t_enter, mut t_exit) = (0.0_f32, max_dist);
        for axis in 0..2 {
            if dir[axis] == 0.0 {
                if origin[axis] < region_min[axis] || origin[axis] > region_max[axis] {
                    return result;
                }
                continue;
            }
            let mut t0 = (region_min[axis] - origin[axis]) / dir[axis];
            let mut t1 = (region_max[axis] - origin[axis]) / dir[axis];
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_enter = t_enter.max(t0);
            t_exit = t_exit.min(t1);
        }
        if t_enter.is_nan() || t_exit.is_nan() || t_enter > t_exit {
            return result;
        }

        let start = ray.at(t_enter);
        let mut cell = self.position_to_cell(start);
        cell.x = cell.x.clamp(lo.x, hi.x);
        cell.z = cell.z.clamp(lo.z, hi.z);
        let remaining = t_exit - t_enter;

        let sign = |d: f32| {
            if d > 0.0 {
                1
            } else if d < 0.0 {
                -1
            } else {
                0
            }
        };
        let step = [sign(dir[0]), sign(dir[1])];
        let start = [start.x, start.z];
        let coords = [cell.x, cell.z];
        let mut next = [f32::INFINITY; 2];
        let mut delta = [f32::INFINITY; 2];
        for axis in 0..2 {
            if step[axis] == 0 {
                continue;
            }
            let edge_cell = if step[axis] > 0 {
                coords[axis] + 1
            } else {
                coords[axis]
            };
            let edge = edge_cell as f32 * self.cell_size;
            next[axis] = ((edge - start[axis]) / dir[axis]).max(0.0);
            delta[axis] = self.cell_size / dir[axis].abs();
        }

        loop {
            if let Some(ids) = self.cells.get(&cell) {
                result.extend(ids.iter().copied());
            }
            if step == [0, 0] {
                break;
            }
            let t = next[0].min(next[1]);
            if t.is_nan() || t > remaining {
                break;
            }
            if next[0] <= next[1] {
                cell.x += step[0];
                next[0] += delta[0];
            } else {
                cell.z += step[1];
                next[1] += delta[1];
            }
            if cell.x < lo.x || cell.x > hi.x || cell.z < lo.z || cell.z > hi.z {
                break;
            }
        }
        result
    }

    /// Get all entity ids registered in a specific cell.
    pub fn entities_in_cell(&self, coord: CellCoord) -> BTreeSet<EntityId> {
        self.cells.get(&coord).cloned().unwrap_or_default()
    }

    /// Registered bounds for an id.
    pub fn bounds(&self, id: EntityId) -> Option<&Aabb> {
        self.bounds.get(&id)
    }

    /// Number of registered boxes.
    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    /// Number of non-empty cells.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Total number of box placements across all cells.
    pub fn total_placements(&self) -> usize {
        self.cells.values().map(|s| s.len()).sum()
    }

    fn cell_range(&self, aabb: &Aabb) -> (CellCoord, CellCoord) {
        (
            self.position_to_cell(aabb.min),
            self.position_to_cell(aabb.max),
        )
    }

    /// Cells under `aabb`, limited to the occupied part of the grid.
    fn cells_covering(&self, aabb: &Aabb) -> Vec<CellCoord> {
        let Some((occ_lo, occ_hi)) = self.extent else {
            return Vec::new();
        };
        let (lo, hi) = self.cell_range(aabb);
        let lo = CellCoord::new(lo.x.max(occ_lo.x), lo.z.max(occ_lo.z));
        let hi = CellCoord::new(hi.x.min(occ_hi.x), hi.z.min(occ_hi.z));
        cells_between(lo, hi)
    }
}

fn cells_between(lo: CellCoord, hi: CellCoord) -> Vec<CellCoord> {
    let mut coords = Vec::new();
    for x in lo.x..=hi.x {
        for z in lo.z..=hi.z {
            coords.push(CellCoord::new(x, z));
        }
    }
    coords
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed(center: Vec3, half: f32) -> Aabb {
        Aabb::from_center_half_extents(center, Vec3::splat(half))
    }

    #[test]
    fn rejects_non_positive_cell_size() {
        assert!(GridPartition::new(0.0).is_err());
        assert!(GridPartition::new(-1.0).is_err());
        assert!(GridPartition::new(f32::NAN).is_err());
    }

    #[test]
    fn position_to_cell_basic() {
        let grid = GridPartition::new(16.0).unwrap();
        assert_eq!(
            grid.position_to_cell(Vec3::new(10.0, 0.0, 10.0)),
            CellCoord::new(0, 0)
        );
        assert_eq!(
            grid.position_to_cell(Vec3::new(20.0, 0.0, -5.0)),
            CellCoord::new(1, -1)
        );
    }

    #[test]
    fn large_box_spans_many_cells() {
        let mut grid = GridPartition::new(4.0).unwrap();
        let id = EntityId::new();
        // A 40x40 floor centered at the origin covers x,z in [-20, 20] -> cells -5..=5.
        grid.insert(
            id,
            Aabb::new(Vec3::new(-20.0, -1.0, -20.0), Vec3::new(20.0, 0.0, 20.0)),
        );
        assert_eq!(grid.cell_count(), 11 * 11);
        assert!(grid.entities_in_cell(CellCoord::new(-5, 4)).contains(&id));
    }

    #[test]
    fn query_finds_overlapping_and_skips_distant() {
        let mut grid = GridPartition::new(4.0).unwrap();
        let near = EntityId::new();
        let far = EntityId::new();
        grid.insert(near, boxed(Vec3::new(1.0, 0.0, 1.0), 0.5));
        grid.insert(far, boxed(Vec3::new(30.0, 0.0, 30.0), 0.5));

        let hits = grid.query_aabb(&boxed(Vec3::new(1.5, 0.0, 1.5), 0.5));
        assert!(hits.contains(&near));
        assert!(!hits.contains(&far));
    }

    #[test]
    fn reinsert_replaces_footprint() {
        let mut grid = GridPartition::new(4.0).unwrap();
        let id = EntityId::new();
        grid.insert(id, boxed(Vec3::new(1.0, 0.0, 1.0), 0.5));
        grid.insert(id, boxed(Vec3::new(21.0, 0.0, 1.0), 0.5));
        assert_eq!(grid.len(), 1);
        assert_eq!(grid.total_placements(), 1);
        assert!(grid.entities_in_cell(CellCoord::new(0, 0)).is_empty());
    }

    #[test]
    fn remove_cleans_up_cells() {
        let mut grid = GridPartition::new(4.0).unwrap();
        let id = EntityId::new();
        grid.insert(id, boxed(Vec3::new(3.9, 0.0, 3.9), 0.5));
        assert!(grid.cell_count() > 1);
        assert!(grid.remove(id).is_some());
        assert_eq!(grid.cell_count(), 0);
        assert!(grid.is_empty());
        assert!(grid.remove(id).is_none());
    }

    #[test]
    fn ray_query_covers_segment() {
        let mut grid = GridPartition::new(2.0).unwrap();
        let target = EntityId::new();
        grid.insert(target, boxed(Vec3::new(9.0, 0.0, 0.5), 0.5));
        let ray = Ray::new(Vec3::new(0.0, 0.0, 0.5), Vec3::X);
        assert!(grid.query_ray(&ray, 10.0).contains(&target));
        assert!(!grid.query_ray(&ray, 2.0).contains(&target));
    }

    #[test]
    fn infinite_ray_walks_only_occupied_cells() {
        let mut grid = GridPartition::new(4.0).unwrap();
        let a = EntityId::new();
        let b = EntityId::new();
        let off_line = EntityId::new();
        grid.insert(a, boxed(Vec3::new(-10.0, 0.0, -10.0), 0.5));
        grid.insert(b, boxed(Vec3::new(10.0, 0.0, 10.0), 0.5));
        grid.insert(off_line, boxed(Vec3::new(10.0, 0.0, -10.0), 0.5));

        let diagonal = Ray::new(Vec3::new(-1.0e6, 5.0, -1.0e6), Vec3::new(1.0, 0.0, 1.0));
        let hits = grid.query_ray(&diagonal, f32::INFINITY);
        assert!(hits.contains(&a) && hits.contains(&b));
        assert!(!hits.contains(&off_line));
        assert_eq!(grid.query_ray(&diagonal, 1.0e9), hits);

        // Pointing away from everything.
        let away = Ray::new(Vec3::new(50.0, 0.0, 50.0), Vec3::X);
        assert!(grid.query_ray(&away, f32::INFINITY).is_empty());

        let down = Ray::down(Vec3::new(10.0, 100.0, 10.0));
        assert_eq!(grid.query_ray(&down, f32::INFINITY), BTreeSet::from([b]));
    }

    #[test]
    fn removing_the_outer_box_shrinks_the_searched_region() {
        let mut grid = GridPartition::new(4.0).unwrap();
        let near = EntityId::new();
        let far = EntityId::new();
        grid.insert(near, boxed(Vec3::new(1.0, 0.0, 1.0), 0.5));
        grid.insert(far, boxed(Vec3::new(41.0, 0.0, 1.0), 0.5));
        grid.remove(far);
        let ray = Ray::new(Vec3::new(100.0, 0.0, 1.0), Vec3::NEG_X);
        assert_eq!(grid.query_ray(&ray, f32::INFINITY), BTreeSet::from([near]));
        grid.clear();
        assert!(grid.query_ray(&ray, f32::INFINITY).is_empty());
    }

    #[test]
    fn query_results_are_ordered() {
        let mut grid = GridPartition::new(8.0).unwrap();
        let mut ids: Vec<EntityId> = (0..20).map(|_| EntityId::new()).collect();
        for id in &ids {
            grid.insert(*id, boxed(Vec3::ZERO, 1.0));
        }
        ids.sort();
        let found: Vec<EntityId> = grid.query_aabb(&boxed(Vec3::ZERO, 1.0)).into_iter().collect();
        assert_eq!(found, ids);
    }
}
