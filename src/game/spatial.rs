//! Spatial queries: static collision map plus a per-tick entity index
//!
//! The entity index is rebuilt from scratch at the start of every tick, so
//! radius queries observe the world as it was when the tick began. Results
//! are returned in registry insertion order regardless of grid layout.

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::game::constants::map::{SPEED_ZONE_FORCE, TILE_SIZE};
use crate::game::state::{EntityClass, EntityId, PlayerId};
use crate::util::vec2::Vec2;

// ============================================================================
// Query Interface
// ============================================================================

/// Inline capacity for radius query results
pub const QUERY_INLINE: usize = 16;

/// Radius query result list
pub type QueryResults = SmallVec<[SpatialEntry; QUERY_INLINE]>;

/// Result of sampling a speed zone
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedZoneSample {
    /// Tile index of the zone
    pub index: usize,
    /// Velocity the zone imposes per evaluation
    pub velocity: Vec2,
}

/// Read-only spatial questions entities may ask during their tick
pub trait SpatialQuery {
    /// Entities of `class` whose proximity circle overlaps the query circle,
    /// in insertion order
    fn find_in_radius(&self, point: Vec2, radius: f32, class: EntityClass) -> QueryResults;

    /// True when a solid tile lies on the segment
    fn is_segment_obstructed(&self, from: Vec2, to: Vec2) -> bool;

    /// Speed zone covering `point`, if any
    fn sample_speed_zone(&self, point: Vec2) -> Option<SpeedZoneSample>;
}

// ============================================================================
// Collision Map
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tile {
    Empty,
    Solid,
    SpeedZone(Vec2),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MapError {
    #[error("Map has no rows")]
    Empty,
    #[error("Row {row} has {found} tiles, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Unknown tile '{ch}' at ({x}, {y})")]
    UnknownTile { ch: char, x: usize, y: usize },
}

/// Static tile grid. Coordinates outside the map clamp to the border tiles.
#[derive(Debug, Clone)]
pub struct CollisionMap {
    width: usize,
    height: usize,
    tiles: Vec<Tile>,
}

impl CollisionMap {
    /// Map with no solid tiles
    pub fn open(width: usize, height: usize) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            tiles: vec![Tile::Empty; width * height],
        }
    }

    /// Build from ASCII rows: `.` empty, `#` solid, `<>^v` speed zones
    pub fn from_ascii(rows: &[&str]) -> Result<Self, MapError> {
        let first = rows.first().ok_or(MapError::Empty)?;
        let width = first.chars().count();
        if width == 0 {
            return Err(MapError::Empty);
        }

        let mut tiles = Vec::with_capacity(width * rows.len());
        for (y, row) in rows.iter().enumerate() {
            let found = row.chars().count();
            if found != width {
                return Err(MapError::RaggedRow {
                    row: y,
                    expected: width,
                    found,
                });
            }
            for (x, ch) in row.chars().enumerate() {
                let tile = match ch {
                    '.' | ' ' => Tile::Empty,
                    '#' => Tile::Solid,
                    '>' => Tile::SpeedZone(Vec2::new(SPEED_ZONE_FORCE, 0.0)),
                    '<' => Tile::SpeedZone(Vec2::new(-SPEED_ZONE_FORCE, 0.0)),
                    '^' => Tile::SpeedZone(Vec2::new(0.0, -SPEED_ZONE_FORCE)),
                    'v' => Tile::SpeedZone(Vec2::new(0.0, SPEED_ZONE_FORCE)),
                    _ => return Err(MapError::UnknownTile { ch, x, y }),
                };
                tiles.push(tile);
            }
        }

        Ok(Self {
            width,
            height: rows.len(),
            tiles,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Map extent in world units
    pub fn world_size(&self) -> Vec2 {
        Vec2::new(self.width as f32 * TILE_SIZE, self.height as f32 * TILE_SIZE)
    }

    /// Centre of tile `(x, y)` in world units
    pub fn tile_center(x: usize, y: usize) -> Vec2 {
        Vec2::new(
            (x as f32 + 0.5) * TILE_SIZE,
            (y as f32 + 0.5) * TILE_SIZE,
        )
    }

    pub fn set_tile(&mut self, x: usize, y: usize, tile: Tile) {
        if x < self.width && y < self.height {
            self.tiles[y * self.width + x] = tile;
        }
    }

    #[inline]
    fn tile_index(&self, position: Vec2) -> usize {
        let tx = ((position.x / TILE_SIZE).floor() as i64).clamp(0, self.width as i64 - 1) as usize;
        let ty = ((position.y / TILE_SIZE).floor() as i64).clamp(0, self.height as i64 - 1) as usize;
        ty * self.width + tx
    }

    #[inline]
    pub fn tile_at(&self, position: Vec2) -> Tile {
        self.tiles[self.tile_index(position)]
    }

    #[inline]
    pub fn is_solid(&self, position: Vec2) -> bool {
        matches!(self.tile_at(position), Tile::Solid)
    }

    /// Walk the segment in unit steps and return the first solid point
    pub fn intersect_line(&self, from: Vec2, to: Vec2) -> Option<Vec2> {
        let steps = (from.distance_to(to) + 1.0) as u32;
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            let point = from.lerp(to, t);
            let rounded = Vec2::new(point.x.round(), point.y.round());
            if self.is_solid(rounded) {
                return Some(point);
            }
        }
        None
    }

    pub fn speed_zone_at(&self, position: Vec2) -> Option<SpeedZoneSample> {
        let index = self.tile_index(position);
        match self.tiles[index] {
            Tile::SpeedZone(velocity) => Some(SpeedZoneSample { index, velocity }),
            _ => None,
        }
    }
}

// ============================================================================
// Entity Index
// ============================================================================

/// Default index cell size in world units
pub const INDEX_CELL_SIZE: f32 = 256.0;

/// Grid cell key - (x, y) cell coordinates
type CellKey = (i32, i32);

/// What a spatial entry refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpatialHandle {
    Character(PlayerId),
    Entity(EntityId),
}

/// One indexed entity at its live position
#[derive(Debug, Clone, Copy)]
pub struct SpatialEntry {
    pub handle: SpatialHandle,
    pub class: EntityClass,
    pub position: Vec2,
    pub radius: f32,
    pub(crate) order: u32,
}

/// Uniform hash grid over entity positions
pub struct SpatialIndex {
    inv_cell_size: f32,
    cells: HashMap<CellKey, Vec<SpatialEntry>>,
    max_radius: f32,
    next_order: u32,
}

impl SpatialIndex {
    pub fn new(cell_size: f32) -> Self {
        Self {
            inv_cell_size: 1.0 / cell_size,
            cells: HashMap::with_capacity(64),
            max_radius: 0.0,
            next_order: 0,
        }
    }

    /// Drop all entries; cells left empty since the last clear are freed
    pub fn clear(&mut self) {
        self.cells.retain(|_, cell| {
            let used = !cell.is_empty();
            cell.clear();
            used
        });
        self.max_radius = 0.0;
        self.next_order = 0;
    }

    #[inline]
    fn cell_of(&self, position: Vec2) -> CellKey {
        (
            (position.x * self.inv_cell_size).floor() as i32,
            (position.y * self.inv_cell_size).floor() as i32,
        )
    }

    /// Insert in registry order; query results preserve this order
    pub fn insert(&mut self, handle: SpatialHandle, class: EntityClass, position: Vec2, radius: f32) {
        let entry = SpatialEntry {
            handle,
            class,
            position,
            radius,
            order: self.next_order,
        };
        self.next_order += 1;
        self.max_radius = self.max_radius.max(radius);
        let key = self.cell_of(position);
        self.cells.entry(key).or_default().push(entry);
    }

    /// Move an entry to where its entity now stands; query order is kept
    pub fn relocate(&mut self, handle: SpatialHandle, from: Vec2, to: Vec2) {
        if from == to {
            return;
        }
        let (old_key, new_key) = (self.cell_of(from), self.cell_of(to));
        let Some(cell) = self.cells.get_mut(&old_key) else {
            return;
        };
        let Some(slot) = cell.iter().position(|entry| entry.handle == handle) else {
            return;
        };
        if old_key == new_key {
            cell[slot].position = to;
            return;
        }
        let mut entry = cell.swap_remove(slot);
        entry.position = to;
        self.cells.entry(new_key).or_default().push(entry);
    }

    pub fn len(&self) -> usize {
        self.next_order as usize
    }

    pub fn is_empty(&self) -> bool {
        self.next_order == 0
    }

    pub fn query(&self, point: Vec2, radius: f32, class: EntityClass) -> QueryResults {
        let reach = radius + self.max_radius;
        let (min_x, min_y) = self.cell_of(point - Vec2::new(reach, reach));
        let (max_x, max_y) = self.cell_of(point + Vec2::new(reach, reach));

        let mut found = QueryResults::new();
        for cy in min_y..=max_y {
            for cx in min_x..=max_x {
                let Some(cell) = self.cells.get(&(cx, cy)) else {
                    continue;
                };
                found.extend(cell.iter().copied().filter(|entry| {
                    entry.class == class && entry.position.distance_to(point) < radius + entry.radius
                }));
            }
        }
        found.sort_unstable_by_key(|entry| entry.order);
        found
    }
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new(INDEX_CELL_SIZE)
    }
}

/// The spatial view handed to entities during a tick
pub struct WorldSpatial<'a> {
    pub map: &'a CollisionMap,
    pub index: &'a SpatialIndex,
}

impl SpatialQuery for WorldSpatial<'_> {
    fn find_in_radius(&self, point: Vec2, radius: f32, class: EntityClass) -> QueryResults {
        self.index.query(point, radius, class)
    }

    fn is_segment_obstructed(&self, from: Vec2, to: Vec2) -> bool {
        self.map.intersect_line(from, to).is_some()
    }

    fn sample_speed_zone(&self, point: Vec2) -> Option<SpeedZoneSample> {
        self.map.speed_zone_at(point)
    }
}
