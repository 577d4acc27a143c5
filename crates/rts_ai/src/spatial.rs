//! Spatial queries over a world snapshot.
//!
//! The AI only needs two questions answered: "what is within this radius?"
//! and "what is the nearest entity matching this predicate?". Hosts that
//! already maintain an index can implement [`SpatialQuery`] directly;
//! [`SpatialGrid`] is a uniform bucket grid built from a snapshot.
//!
//! Results are always returned in ascending entity id order, and nearest-hit
//! ties break toward the lower id, so callers never depend on bucket layout.

use std::collections::BTreeMap;

use crate::math::{Fixed, Vec2Fixed};
use crate::world::{EntityId, WorldSnapshot};

/// Read-only spatial index.
///
/// Implementations must tolerate concurrent shared access.
pub trait SpatialQuery: Sync {
    /// Live entities within `radius` of `center` (inclusive), in id order.
    fn query_radius(&self, center: Vec2Fixed, radius: Fixed) -> Vec<EntityId>;

    /// Nearest live entity accepted by `filter`.
    ///
    /// With `max_radius` set, entities further away are ignored.
    fn nearest(
        &self,
        center: Vec2Fixed,
        max_radius: Option<Fixed>,
        filter: &dyn Fn(EntityId) -> bool,
    ) -> Option<EntityId>;
}

type Cell = (i32, i32);

/// Uniform bucket grid keyed by cell coordinates.
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    cell_size: Fixed,
    cells: BTreeMap<Cell, Vec<(EntityId, Vec2Fixed)>>,
    len: usize,
}

impl SpatialGrid {
    /// Default bucket size in world units.
    pub const DEFAULT_CELL_SIZE: i32 = 256;

    /// Empty grid with the given cell size (clamped to at least 1).
    #[must_use]
    pub fn new(cell_size: i32) -> Self {
        Self {
            cell_size: Fixed::from_num(cell_size.max(1)),
            cells: BTreeMap::new(),
            len: 0,
        }
    }

    /// Index every live entity of a snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: &WorldSnapshot) -> Self {
        let mut grid = Self::new(Self::DEFAULT_CELL_SIZE);
        for entity in snapshot.live_entities() {
            grid.insert(entity.id, entity.position);
        }
        grid
    }

    /// Add an entity.
    pub fn insert(&mut self, id: EntityId, position: Vec2Fixed) {
        let cell = self.cell_of(position);
        self.cells.entry(cell).or_default().push((id, position));
        self.len += 1;
    }

    /// Number of indexed entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the grid is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn cell_of(&self, pos: Vec2Fixed) -> Cell {
        (
            (pos.x / self.cell_size).floor().to_num::<i32>(),
            (pos.y / self.cell_size).floor().to_num::<i32>(),
        )
    }

    fn cells_in_box(
        &self,
        center: Vec2Fixed,
        radius: Fixed,
    ) -> impl Iterator<Item = &(EntityId, Vec2Fixed)> {
        let (min_x, min_y) = self.cell_of(Vec2Fixed::new(center.x - radius, center.y - radius));
        let (max_x, max_y) = self.cell_of(Vec2Fixed::new(center.x + radius, center.y + radius));
        (min_x..=max_x).flat_map(move |cx| {
            (min_y..=max_y).flat_map(move |cy| self.cells.get(&(cx, cy)).into_iter().flatten())
        })
    }

    fn all(&self) -> impl Iterator<Item = &(EntityId, Vec2Fixed)> {
        self.cells.values().flatten()
    }
}

impl SpatialQuery for SpatialGrid {
    fn query_radius(&self, center: Vec2Fixed, radius: Fixed) -> Vec<EntityId> {
        let mut hits: Vec<EntityId> = self
            .cells_in_box(center, radius)
            .filter(|(_, pos)| center.within(*pos, radius))
            .map(|(id, _)| *id)
            .collect();
        hits.sort_unstable();
        hits
    }

    fn nearest(
        &self,
        center: Vec2Fixed,
        max_radius: Option<Fixed>,
        filter: &dyn Fn(EntityId) -> bool,
    ) -> Option<EntityId> {
        let candidates: Box<dyn Iterator<Item = &(EntityId, Vec2Fixed)>> = match max_radius {
            Some(radius) => Box::new(
                self.cells_in_box(center, radius)
                    .filter(move |(_, pos)| center.within(*pos, radius)),
            ),
            None => Box::new(self.all()),
        };

        candidates
            .filter(|(id, _)| filter(*id))
            .map(|(id, pos)| (center.distance_squared(*pos), *id))
            .min()
            .map(|(_, id)| id)
    }
}
