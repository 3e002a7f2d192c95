//! Fleet Simulation Host
//!
//! Owns the fleet list, the spatial grid and the flocking engine, and keeps
//! the three consistent: every add, remove or external move is reflected in
//! the grid, and the SoA output buffer is refreshed after every change.

use glam::Vec2;
use serde::Deserialize;
use tracing::debug;

use crate::error::{ConfigError, SimulationError};
use crate::flocking::{FlockConfig, FlockingEngine, FlockingStats};
use crate::fleet::{Fleet, FleetId};
use crate::soa::FleetBuffer;
use crate::spatial::{CacheConfig, GridStats, Neighbor, SpatialGrid};

/// Output buffer slots reserved up front.
const INITIAL_CAPACITY: usize = 64;

/// Everything tunable at construction time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimulationOptions {
    pub flock: FlockConfig,
    pub cache: CacheConfig,
}

pub struct Simulation {
    fleets: Vec<Fleet>,
    grid: SpatialGrid,
    engine: FlockingEngine,
    buffer: FleetBuffer,
}

impl Simulation {
    pub fn new(world_width: f32, world_height: f32, cell_size: f32) -> Result<Self, SimulationError> {
        Self::with_options(world_width, world_height, cell_size, SimulationOptions::default())
    }

    pub fn with_options(
        world_width: f32,
        world_height: f32,
        cell_size: f32,
        options: SimulationOptions,
    ) -> Result<Self, SimulationError> {
        options.flock.validate()?;
        options.cache.validate()?;
        let grid = SpatialGrid::with_cache(world_width, world_height, cell_size, options.cache)?;
        debug!(world_width, world_height, cell_size, "fleet simulation created");

        Ok(Self {
            fleets: Vec::new(),
            grid,
            engine: FlockingEngine::new(options.flock),
            buffer: FleetBuffer::with_capacity(INITIAL_CAPACITY),
        })
    }

    /// Replace the flocking parameters.
    pub fn configure(&mut self, config: FlockConfig) -> Result<(), ConfigError> {
        self.engine.set_config(config)
    }

    // ==================== Fleet lifecycle ====================

    /// Track `fleet`, replacing any fleet with the same id.
    pub fn add_fleet(&mut self, fleet: Fleet) {
        let index = match self.find(fleet.id) {
            Some(index) => {
                self.fleets[index] = fleet;
                index
            }
            None => {
                self.fleets.push(fleet);
                self.fleets.len() - 1
            }
        };
        self.grid.insert(&self.fleets[index]);
        self.buffer.sync(&self.fleets);
    }

    pub fn remove_fleet(&mut self, id: FleetId) -> Option<Fleet> {
        let index = self.find(id)?;
        let fleet = self.fleets.remove(index);
        self.grid.remove(id);
        self.buffer.sync(&self.fleets);
        Some(fleet)
    }

    pub fn set_target(&mut self, id: FleetId, target: Vec2) -> bool {
        self.with_fleet(id, |fleet| fleet.target = target)
    }

    /// Move a fleet from outside the flocking step (teleport, spawn point).
    pub fn set_position(&mut self, id: FleetId, position: Vec2) -> bool {
        let Some(index) = self.find(id) else {
            return false;
        };
        self.fleets[index].position = position;
        self.fleets[index].trail.clear();
        self.grid.update(&self.fleets[index]);
        self.buffer.sync(&self.fleets);
        true
    }

    pub fn set_ships(&mut self, id: FleetId, ships: i32) -> bool {
        self.with_fleet(id, |fleet| fleet.ships = ships)
    }

    pub fn mark_arrived(&mut self, id: FleetId) -> bool {
        self.with_fleet(id, Fleet::arrive)
    }

    // ==================== Frame ====================

    /// Advance the simulation by `dt` seconds.
    pub fn step(&mut self, dt: f32) {
        self.grid.tick_cache(dt);
        self.engine.update_all(&mut self.fleets, &mut self.grid, dt);
        self.reindex();
        self.buffer.sync(&self.fleets);
    }

    /// Bring every tracked fleet's index entry up to date. Fleets that left
    /// the world drop out and come back once they re-enter it.
    fn reindex(&mut self) {
        for fleet in &self.fleets {
            let indexed = self
                .grid
                .indexed(fleet.id)
                .map(|entry| (entry.position, entry.radius));
            if indexed != Some((fleet.position, fleet.effective_radius())) {
                self.grid.update(fleet);
            }
        }
    }

    // ==================== Queries ====================

    pub fn query_radius(&mut self, x: f32, y: f32, r: f32) -> Vec<FleetId> {
        self.grid.query_radius(x, y, r)
    }

    pub fn query_rect(&mut self, x: f32, y: f32, w: f32, h: f32) -> Vec<FleetId> {
        self.grid.query_rect(x, y, w, h)
    }

    /// Closest fleets to fleet `id`; empty when `id` is unknown.
    pub fn nearby(&mut self, id: FleetId, max_distance: f32, max_count: usize) -> Vec<Neighbor> {
        let Some(index) = self.find(id) else {
            return Vec::new();
        };
        self.grid.nearby(&self.fleets[index], max_distance, max_count)
    }

    /// Colliding pairs among all tracked fleets.
    pub fn detect_collisions(&mut self, collision_radius: f32) -> Vec<(FleetId, FleetId)> {
        self.grid.detect_collisions(&self.fleets, collision_radius)
    }

    // ==================== World ====================

    pub fn resize(&mut self, world_width: f32, world_height: f32) {
        self.grid.resize(world_width, world_height);
    }

    pub fn clear_cache(&mut self) {
        self.grid.clear_cache();
    }

    // ==================== Accessors ====================

    pub fn fleet(&self, id: FleetId) -> Option<&Fleet> {
        self.fleets.iter().find(|f| f.id == id)
    }

    pub fn fleets(&self) -> &[Fleet] {
        &self.fleets
    }

    pub fn len(&self) -> usize {
        self.fleets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fleets.is_empty()
    }

    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    pub fn buffer(&self) -> &FleetBuffer {
        &self.buffer
    }

    pub fn grid_stats(&self) -> GridStats {
        self.grid.stats()
    }

    pub fn engine_stats(&self) -> FlockingStats {
        self.engine.stats()
    }

    fn find(&self, id: FleetId) -> Option<usize> {
        self.fleets.iter().position(|f| f.id == id)
    }

    fn with_fleet(&mut self, id: FleetId, mutate: impl FnOnce(&mut Fleet)) -> bool {
        let Some(index) = self.find(id) else {
            return false;
        };
        mutate(&mut self.fleets[index]);
        self.buffer.sync(&self.fleets);
        true
    }
}
