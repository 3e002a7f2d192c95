//! WASM Fleet Flocking Module
//!
//! Moves fleets across a 2D map toward their targets while keeping them
//! grouped and uncrowded, using boid-style steering backed by a uniform
//! grid spatial index.
//!
//! # Architecture
//!
//! - [`spatial::SpatialGrid`]: bucketed fleet index with rect/radius
//!   queries, nearest-neighbor lookup and collision pairs, plus a query
//!   cache owned by the grid
//! - [`flocking::FlockingEngine`]: separation, alignment, cohesion and seek
//!   combined into one clamped force per fleet, then integrated
//! - [`simulation::Simulation`]: owns fleets, grid and engine and keeps them
//!   in sync; [`FleetSimulation`] exposes it to JavaScript
//!
//! Fleet state is mirrored into Structure of Arrays buffers after every
//! step, so the renderer reads positions straight out of WASM memory.
//!
//! # Usage from JavaScript
//!
//! ```javascript
//! import init, { FleetSimulation } from './fleets_wasm.js';
//!
//! const wasm = await init();
//! const sim = new FleetSimulation(2000, 1200, 100);
//!
//! sim.add_fleet(1, planet.x, planet.y, dest.x, dest.y, ships, undefined);
//!
//! // every frame
//! sim.step(dt);
//! const n = sim.fleet_count;
//! const xs = new Float32Array(wasm.memory.buffer, sim.positions_x_ptr(), n);
//! const ys = new Float32Array(wasm.memory.buffer, sim.positions_y_ptr(), n);
//! ```

pub mod error;
pub mod fleet;
pub mod flocking;
pub mod simulation;
pub mod soa;
pub mod spatial;
pub mod vector;

use glam::Vec2;
use wasm_bindgen::prelude::*;

use fleet::{Fleet, FleetId, FleetState};
use flocking::FlockConfig;
use simulation::{Simulation, SimulationOptions};

// Use `wee_alloc` as the global allocator for smaller WASM size
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

/// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Fleet simulation handle for JavaScript
///
/// Fleet ids are chosen by the caller and must be unique. All frame-time
/// calls tolerate bad input: unknown ids return `false` or empty results
/// and out-of-world positions are simply not indexed.
#[wasm_bindgen]
pub struct FleetSimulation {
    inner: Simulation,
}

#[wasm_bindgen]
impl FleetSimulation {
    /// Create a simulation over a `world_width` x `world_height` map
    #[wasm_bindgen(constructor)]
    pub fn new(
        world_width: f32,
        world_height: f32,
        cell_size: f32,
    ) -> Result<FleetSimulation, JsError> {
        Ok(Self {
            inner: Simulation::new(world_width, world_height, cell_size)?,
        })
    }

    /// Create a simulation with `{ flock: {...}, cache: {...} }` overrides
    #[wasm_bindgen(js_name = withOptions)]
    pub fn with_options(
        world_width: f32,
        world_height: f32,
        cell_size: f32,
        options: JsValue,
    ) -> Result<FleetSimulation, JsError> {
        let options: SimulationOptions = if options.is_undefined() || options.is_null() {
            SimulationOptions::default()
        } else {
            serde_wasm_bindgen::from_value(options)?
        };
        Ok(Self {
            inner: Simulation::with_options(world_width, world_height, cell_size, options)?,
        })
    }

    /// Replace flocking parameters; missing fields take their defaults
    #[wasm_bindgen]
    pub fn configure(&mut self, config: JsValue) -> Result<(), JsError> {
        let config: FlockConfig = serde_wasm_bindgen::from_value(config)?;
        self.inner.configure(config)?;
        Ok(())
    }

    // ==================== Fleets ====================

    /// Number of tracked fleets (length of every buffer array)
    #[wasm_bindgen(getter)]
    pub fn fleet_count(&self) -> usize {
        self.inner.len()
    }

    /// Start tracking a fleet, replacing any fleet with the same id
    #[allow(clippy::too_many_arguments)]
    #[wasm_bindgen]
    pub fn add_fleet(
        &mut self,
        id: u32,
        x: f32,
        y: f32,
        target_x: f32,
        target_y: f32,
        ships: i32,
        radius: Option<f32>,
    ) {
        let mut fleet = Fleet::new(id, Vec2::new(x, y), Vec2::new(target_x, target_y), ships);
        if let Some(radius) = radius {
            fleet = fleet.with_radius(radius);
        }
        self.inner.add_fleet(fleet);
    }

    #[wasm_bindgen]
    pub fn remove_fleet(&mut self, id: u32) -> bool {
        self.inner.remove_fleet(FleetId(id)).is_some()
    }

    #[wasm_bindgen]
    pub fn set_target(&mut self, id: u32, x: f32, y: f32) -> bool {
        self.inner.set_target(FleetId(id), Vec2::new(x, y))
    }

    /// Move a fleet outside the flocking step
    #[wasm_bindgen]
    pub fn set_position(&mut self, id: u32, x: f32, y: f32) -> bool {
        self.inner.set_position(FleetId(id), Vec2::new(x, y))
    }

    #[wasm_bindgen]
    pub fn set_ships(&mut self, id: u32, ships: i32) -> bool {
        self.inner.set_ships(FleetId(id), ships)
    }

    /// Stop steering a fleet for good
    #[wasm_bindgen]
    pub fn mark_arrived(&mut self, id: u32) -> bool {
        self.inner.mark_arrived(FleetId(id))
    }

    /// Trail points as `[x0, y0, x1, y1, ...]`, oldest first
    #[wasm_bindgen]
    pub fn trail(&self, id: u32) -> Vec<f32> {
        self.inner
            .fleet(FleetId(id))
            .map(|fleet| fleet.trail.iter().flat_map(|p| [p.x, p.y]).collect())
            .unwrap_or_default()
    }

    // ==================== Simulation ====================

    /// Advance every fleet by `dt` seconds
    #[wasm_bindgen]
    pub fn step(&mut self, dt: f32) {
        self.inner.step(dt);
    }

    #[wasm_bindgen]
    pub fn resize(&mut self, world_width: f32, world_height: f32) {
        self.inner.resize(world_width, world_height);
    }

    /// Drop all cached query answers
    #[wasm_bindgen]
    pub fn clear_cache(&mut self) {
        self.inner.clear_cache();
    }

    // ==================== Buffer Pointers ====================
    // These return raw pointers that JS converts to typed array views.
    // Re-create views after add/remove; the arrays may move.

    /// Get pointer to fleet ids array (u32)
    #[wasm_bindgen]
    pub fn ids_ptr(&self) -> *const u32 {
        self.inner.buffer().ids_ptr()
    }

    /// Get pointer to positions X array
    #[wasm_bindgen]
    pub fn positions_x_ptr(&self) -> *const f32 {
        self.inner.buffer().positions_x_ptr()
    }

    /// Get pointer to positions Y array
    #[wasm_bindgen]
    pub fn positions_y_ptr(&self) -> *const f32 {
        self.inner.buffer().positions_y_ptr()
    }

    /// Get pointer to velocities X array
    #[wasm_bindgen]
    pub fn velocities_x_ptr(&self) -> *const f32 {
        self.inner.buffer().velocities_x_ptr()
    }

    /// Get pointer to velocities Y array
    #[wasm_bindgen]
    pub fn velocities_y_ptr(&self) -> *const f32 {
        self.inner.buffer().velocities_y_ptr()
    }

    /// Get pointer to states array (u8)
    #[wasm_bindgen]
    pub fn states_ptr(&self) -> *const u8 {
        self.inner.buffer().states_ptr()
    }

    // ==================== Queries ====================

    /// Ids of fleets within `r` of `(x, y)`
    #[wasm_bindgen]
    pub fn query_radius(&mut self, x: f32, y: f32, r: f32) -> Vec<u32> {
        raw_ids(self.inner.query_radius(x, y, r))
    }

    /// Ids of fleets touching the rectangle (viewport culling)
    #[wasm_bindgen]
    pub fn query_rect(&mut self, x: f32, y: f32, w: f32, h: f32) -> Vec<u32> {
        raw_ids(self.inner.query_rect(x, y, w, h))
    }

    /// Ids of the closest fleets to `id`, nearest first
    #[wasm_bindgen]
    pub fn nearby(&mut self, id: u32, max_distance: f32, max_count: usize) -> Vec<u32> {
        self.inner
            .nearby(FleetId(id), max_distance, max_count)
            .into_iter()
            .map(|n| n.id.0)
            .collect()
    }

    /// Colliding pairs flattened as `[a0, b0, a1, b1, ...]`
    #[wasm_bindgen]
    pub fn detect_collisions(&mut self, collision_radius: f32) -> Vec<u32> {
        self.inner
            .detect_collisions(collision_radius)
            .into_iter()
            .flat_map(|(a, b)| [a.0, b.0])
            .collect()
    }

    // ==================== Diagnostics ====================

    #[wasm_bindgen]
    pub fn grid_stats(&self) -> Result<JsValue, JsError> {
        Ok(serde_wasm_bindgen::to_value(&self.inner.grid_stats())?)
    }

    #[wasm_bindgen]
    pub fn engine_stats(&self) -> Result<JsValue, JsError> {
        Ok(serde_wasm_bindgen::to_value(&self.inner.engine_stats())?)
    }
}

fn raw_ids(ids: Vec<FleetId>) -> Vec<u32> {
    ids.into_iter().map(|id| id.0).collect()
}

// ==================== Fleet State Constants ====================
// Exposed as getter functions for JS (wasm_bindgen doesn't support const exports)

/// Fleet is en route and steered every frame
#[wasm_bindgen]
pub fn state_active() -> u8 {
    FleetState::Active as u8
}

/// Fleet has arrived and is no longer steered
#[wasm_bindgen]
pub fn state_arrived() -> u8 {
    FleetState::Arrived as u8
}

// Note: wasm-bindgen automatically exports `memory` - don't define it manually
