//! Uniform Grid Spatial Index
//!
//! Buckets fleets over a bounded world rectangle so neighbor queries only
//! touch the cells around the query shape.
//!
//! Memory layout:
//! ```text
//! cells:   [ [id, id], [], [id], ... ]   row-major, cols * rows buckets
//! entries: { id -> (cell, position, radius) }
//! ```
//!
//! `entries` is the reverse map: it makes removal O(bucket) instead of a
//! scan over every cell, and it remembers the position each fleet was last
//! indexed at so the narrow phase never needs the fleet itself. The grid
//! does not observe fleets; callers must `update` after moving one.

pub mod cache;

use std::collections::{HashMap, HashSet};

use glam::Vec2;
use ordered_float::OrderedFloat;
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::error::GridError;
use crate::fleet::{Fleet, FleetId};
use crate::vector;

pub use cache::{CacheConfig, QueryCache, QueryKey};

/// Upper bound on `cols * rows`; larger layouts are rejected.
pub const MAX_CELLS: usize = 1 << 20;

/// Where and how a fleet was last indexed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IndexedFleet {
    /// Bucket index (`row * cols + col`)
    pub cell: usize,
    pub position: Vec2,
    pub radius: f32,
}

/// One result of a nearest-neighbor lookup.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Neighbor {
    pub id: FleetId,
    /// Indexed position of the neighbor
    pub position: Vec2,
    pub distance: f32,
}

/// Bucket occupancy and cache counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridStats {
    pub cols: usize,
    pub rows: usize,
    pub total_cells: usize,
    pub used_cells: usize,
    pub indexed_fleets: usize,
    pub max_per_cell: usize,
    /// Average over non-empty cells
    pub avg_per_used_cell: f32,
    pub cache_entries: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_hit_rate: f32,
}

pub struct SpatialGrid {
    width: f32,
    height: f32,
    cell_size: f32,
    cols: usize,
    rows: usize,
    cells: Vec<Vec<FleetId>>,
    entries: HashMap<FleetId, IndexedFleet>,
    /// Largest radius inserted since the last clear; pads the broad phase
    max_radius: f32,
    cache: QueryCache,
}

impl SpatialGrid {
    /// Build an empty grid with the default query cache.
    pub fn new(world_width: f32, world_height: f32, cell_size: f32) -> Result<Self, GridError> {
        Self::with_cache(world_width, world_height, cell_size, CacheConfig::default())
    }

    pub fn with_cache(
        world_width: f32,
        world_height: f32,
        cell_size: f32,
        cache: CacheConfig,
    ) -> Result<Self, GridError> {
        if !valid_extent(cell_size) {
            return Err(GridError::InvalidConfig("cell_size must be a positive number"));
        }
        if !valid_extent(world_width) || !valid_extent(world_height) {
            return Err(GridError::InvalidConfig("world size must be positive numbers"));
        }
        if !valid_extent(cache.quantum) || !cache.window.is_finite() {
            return Err(GridError::InvalidConfig("cache quantum and window must be numbers"));
        }

        let Some((cols, rows)) = grid_dims(world_width, world_height, cell_size) else {
            return Err(GridError::InvalidConfig("world too large for cell_size"));
        };
        debug!(cols, rows, cell_size, "spatial grid created");

        Ok(Self {
            width: world_width,
            height: world_height,
            cell_size,
            cols,
            rows,
            cells: vec![Vec::new(); cols * rows],
            entries: HashMap::new(),
            max_radius: 0.0,
            cache: QueryCache::new(cache),
        })
    }

    // ==================== Layout ====================

    #[inline]
    pub fn dimensions(&self) -> (usize, usize) {
        (self.cols, self.rows)
    }

    #[inline]
    pub fn world_size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// `(col, row)` of the cell holding `position`, or `None` outside the world.
    pub fn cell_coords(&self, position: Vec2) -> Option<(usize, usize)> {
        if !vector::is_finite(position)
            || position.x < 0.0
            || position.y < 0.0
            || position.x >= self.width
            || position.y >= self.height
        {
            return None;
        }
        let col = ((position.x / self.cell_size).floor() as usize).min(self.cols - 1);
        let row = ((position.y / self.cell_size).floor() as usize).min(self.rows - 1);
        Some((col, row))
    }

    /// Bucket index for `position`, or `None` outside the world.
    #[inline]
    pub fn cell_index(&self, position: Vec2) -> Option<usize> {
        self.cell_coords(position)
            .map(|(col, row)| row * self.cols + col)
    }

    /// Fleets currently in bucket `cell`.
    pub fn cell(&self, cell: usize) -> &[FleetId] {
        self.cells.get(cell).map(Vec::as_slice).unwrap_or(&[])
    }

    // ==================== Membership ====================

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: FleetId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn indexed(&self, id: FleetId) -> Option<&IndexedFleet> {
        self.entries.get(&id)
    }

    /// Index `fleet` at its current position. Positions outside the world
    /// are dropped silently; the return value says whether it was indexed.
    pub fn insert(&mut self, fleet: &Fleet) -> bool {
        self.insert_at(fleet.id, fleet.position, fleet.effective_radius())
    }

    /// Drop `id` from the index. Unknown ids are ignored.
    pub fn remove(&mut self, id: FleetId) -> bool {
        let Some(entry) = self.entries.remove(&id) else {
            return false;
        };
        let bucket = &mut self.cells[entry.cell];
        if let Some(slot) = bucket.iter().position(|&other| other == id) {
            bucket.swap_remove(slot);
        }
        true
    }

    /// Re-index `fleet` after it moved.
    pub fn update(&mut self, fleet: &Fleet) -> bool {
        self.insert(fleet)
    }

    fn insert_at(&mut self, id: FleetId, position: Vec2, radius: f32) -> bool {
        // an id lives in at most one bucket
        self.remove(id);

        let Some(cell) = self.cell_index(position) else {
            trace!(?id, x = position.x, y = position.y, "insert outside world dropped");
            return false;
        };
        self.cells[cell].push(id);
        self.entries.insert(
            id,
            IndexedFleet {
                cell,
                position,
                radius,
            },
        );
        self.max_radius = self.max_radius.max(radius);
        true
    }

    /// Empty every bucket. The query cache is left alone.
    pub fn clear(&mut self) {
        for bucket in &mut self.cells {
            bucket.clear();
        }
        self.entries.clear();
        self.max_radius = 0.0;
    }

    /// Change the world size and re-bucket every indexed fleet at its
    /// indexed position. Fleets that fall outside the new world are dropped.
    pub fn resize(&mut self, world_width: f32, world_height: f32) {
        if !valid_extent(world_width) || !valid_extent(world_height) {
            warn!(world_width, world_height, "ignoring invalid grid resize");
            return;
        }
        let Some((cols, rows)) = grid_dims(world_width, world_height, self.cell_size) else {
            warn!(world_width, world_height, "ignoring grid resize beyond cell limit");
            return;
        };

        let mut indexed: Vec<(FleetId, IndexedFleet)> = self.entries.drain().collect();
        indexed.sort_by_key(|(id, _)| *id);

        self.width = world_width;
        self.height = world_height;
        self.cols = cols;
        self.rows = rows;
        self.cells = vec![Vec::new(); cols * rows];
        self.max_radius = 0.0;

        let before = indexed.len();
        for (id, entry) in indexed {
            self.insert_at(id, entry.position, entry.radius);
        }
        debug!(
            cols,
            rows,
            kept = self.entries.len(),
            dropped = before - self.entries.len(),
            "spatial grid resized"
        );
    }

    // ==================== Queries ====================

    /// Fleets whose circle (position inflated by radius) touches the
    /// rectangle with top-left corner `(x, y)`.
    pub fn query_rect(&mut self, x: f32, y: f32, w: f32, h: f32) -> Vec<FleetId> {
        if ![x, y, w, h].iter().all(|v| v.is_finite()) || w < 0.0 || h < 0.0 {
            return Vec::new();
        }

        let key = QueryKey::rect(x, y, w, h, self.cache.quantum());
        if let Some(ids) = self.cache.get(&key) {
            return ids;
        }
        let ids = self.collect_rect(x, y, w, h);
        self.cache.put(key, &ids);
        ids
    }

    /// Fleets whose indexed position is within `r` of `(x, y)`.
    pub fn query_radius(&mut self, x: f32, y: f32, r: f32) -> Vec<FleetId> {
        if !x.is_finite() || !y.is_finite() || !r.is_finite() || r < 0.0 {
            return Vec::new();
        }

        let key = QueryKey::radius(x, y, r, self.cache.quantum());
        if let Some(ids) = self.cache.get(&key) {
            return ids;
        }

        let center = Vec2::new(x, y);
        let mut ids = self.collect_rect(x - r, y - r, 2.0 * r, 2.0 * r);
        ids.retain(|id| {
            self.entries
                .get(id)
                .is_some_and(|entry| vector::distance(entry.position, center) <= r)
        });
        self.cache.put(key, &ids);
        ids
    }

    /// Up to `max_count` fleets within `max_distance` of `position`,
    /// nearest first, never including `id` itself.
    pub fn nearby_objects(
        &mut self,
        id: FleetId,
        position: Vec2,
        max_distance: f32,
        max_count: usize,
    ) -> Vec<Neighbor> {
        if max_count == 0 {
            return Vec::new();
        }

        let candidates = self.query_radius(position.x, position.y, max_distance);
        let mut neighbors: Vec<Neighbor> = candidates
            .into_iter()
            .filter(|&other| other != id)
            .filter_map(|other| {
                // cached answers may name fleets removed since
                let entry = self.entries.get(&other)?;
                let distance = entry.position.distance(position);
                (distance <= max_distance).then_some(Neighbor {
                    id: other,
                    position: entry.position,
                    distance,
                })
            })
            .collect();

        neighbors.sort_by_key(|n| (OrderedFloat(n.distance), n.id));
        neighbors.truncate(max_count);
        neighbors
    }

    /// [`Self::nearby_objects`] around a fleet's current position.
    pub fn nearby(&mut self, fleet: &Fleet, max_distance: f32, max_count: usize) -> Vec<Neighbor> {
        self.nearby_objects(fleet.id, fleet.position, max_distance, max_count)
    }

    /// Pairs of fleets closer than `collision_radius`, each reported once.
    ///
    /// Distances use indexed positions, and fleets missing from the index
    /// never collide. A pair found from both sides is kept only from the
    /// side with the smaller id; a partner outside `fleets` never queries,
    /// so it is reported from the side that did.
    pub fn detect_collisions(
        &mut self,
        fleets: &[Fleet],
        collision_radius: f32,
    ) -> Vec<(FleetId, FleetId)> {
        if !collision_radius.is_finite() || collision_radius <= 0.0 {
            return Vec::new();
        }

        let batch: HashSet<FleetId> = fleets.iter().map(|f| f.id).collect();
        let mut pairs = Vec::new();

        for fleet in fleets {
            let Some(origin) = self.entries.get(&fleet.id).map(|entry| entry.position) else {
                continue;
            };

            let candidates = self.query_radius(origin.x, origin.y, 2.0 * collision_radius);
            for other in candidates {
                if other == fleet.id || (other < fleet.id && batch.contains(&other)) {
                    continue;
                }
                let Some(entry) = self.entries.get(&other) else {
                    continue;
                };
                if entry.position.distance(origin) < collision_radius {
                    pairs.push((fleet.id, other));
                }
            }
        }
        pairs
    }

    /// Broad phase over the buckets touching the padded rectangle, then an
    /// exact circle-vs-rect test per candidate.
    fn collect_rect(&self, x: f32, y: f32, w: f32, h: f32) -> Vec<FleetId> {
        let pad = self.max_radius;
        let Some((col_min, col_max, row_min, row_max)) =
            self.cell_range(x - pad, y - pad, x + w + pad, y + h + pad)
        else {
            return Vec::new();
        };

        let rect_min = Vec2::new(x, y);
        let rect_max = Vec2::new(x + w, y + h);
        let mut ids = Vec::new();

        for row in row_min..=row_max {
            for col in col_min..=col_max {
                for id in &self.cells[row * self.cols + col] {
                    let Some(entry) = self.entries.get(id) else {
                        continue;
                    };
                    let closest = entry.position.clamp(rect_min, rect_max);
                    if closest.distance_squared(entry.position) <= entry.radius * entry.radius {
                        ids.push(*id);
                    }
                }
            }
        }
        ids
    }

    /// Inclusive bucket range overlapping the world-space box, or `None`
    /// when the box misses the world entirely.
    fn cell_range(
        &self,
        min_x: f32,
        min_y: f32,
        max_x: f32,
        max_y: f32,
    ) -> Option<(usize, usize, usize, usize)> {
        if max_x < 0.0 || max_y < 0.0 || min_x >= self.width || min_y >= self.height {
            return None;
        }
        let col_min = ((min_x.max(0.0) / self.cell_size).floor() as usize).min(self.cols - 1);
        let row_min = ((min_y.max(0.0) / self.cell_size).floor() as usize).min(self.rows - 1);
        let col_max = ((max_x / self.cell_size).floor() as usize).min(self.cols - 1);
        let row_max = ((max_y / self.cell_size).floor() as usize).min(self.rows - 1);
        Some((col_min, col_max, row_min, row_max))
    }

    // ==================== Cache ====================

    /// Forget every cached query answer.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Advance the cache clock by `dt` seconds, evicting stale answers.
    pub fn tick_cache(&mut self, dt: f32) {
        self.cache.advance(dt);
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    // ==================== Diagnostics ====================

    pub fn stats(&self) -> GridStats {
        let mut used_cells = 0;
        let mut max_per_cell = 0;
        for bucket in &self.cells {
            if !bucket.is_empty() {
                used_cells += 1;
                max_per_cell = max_per_cell.max(bucket.len());
            }
        }
        let indexed_fleets = self.entries.len();
        let hits = self.cache.hits();
        let misses = self.cache.misses();
        let lookups = hits + misses;

        GridStats {
            cols: self.cols,
            rows: self.rows,
            total_cells: self.cells.len(),
            used_cells,
            indexed_fleets,
            max_per_cell,
            avg_per_used_cell: if used_cells > 0 {
                indexed_fleets as f32 / used_cells as f32
            } else {
                0.0
            },
            cache_entries: self.cache.len(),
            cache_hits: hits,
            cache_misses: misses,
            cache_hit_rate: if lookups > 0 {
                hits as f32 / lookups as f32
            } else {
                0.0
            },
        }
    }
}

#[inline]
fn valid_extent(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

/// `(cols, rows)` covering the world, or `None` past [`MAX_CELLS`].
fn grid_dims(width: f32, height: f32, cell_size: f32) -> Option<(usize, usize)> {
    let cols = (width / cell_size).ceil();
    let rows = (height / cell_size).ceil();
    // as-casts saturate, so bound the floats first
    if !(cols <= MAX_CELLS as f32 && rows <= MAX_CELLS as f32) {
        return None;
    }
    let cols = (cols as usize).max(1);
    let rows = (rows as usize).max(1);
    cols.checked_mul(rows)
        .filter(|&cells| cells <= MAX_CELLS)
        .map(|_| (cols, rows))
}
