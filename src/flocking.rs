//! Flocking Steering for Fleets
//!
//! Each active fleet gets one clamped steering force per frame, built from:
//! - **Separation**: push away from fleets that are too close
//! - **Alignment**: match the heading of nearby fleets
//! - **Cohesion**: steer toward the center of nearby fleets
//! - **Seek**: head for the fleet's own target, weighted highest so a fleet
//!   never loses its sense of direction inside a crowd
//!
//! Updates are snapshot-then-apply: every force in a pass is computed from
//! the velocities and indexed positions as they were when the pass began,
//! so the result does not depend on the order of the fleet slice.

use std::collections::HashMap;

use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::error::{require_non_negative, require_positive, ConfigError};
use crate::fleet::{Fleet, FleetId};
use crate::spatial::{Neighbor, SpatialGrid};
use crate::vector;

/// Steering parameters
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FlockConfig {
    /// Radius within which separation force applies
    pub separation_radius: f32,
    /// Radius within which neighbor headings are averaged
    pub alignment_radius: f32,
    /// Radius within which the neighbor centroid is taken
    pub cohesion_radius: f32,

    pub separation_weight: f32,
    pub alignment_weight: f32,
    pub cohesion_weight: f32,
    pub seek_weight: f32,

    /// Velocity magnitude cap (world units per second)
    pub max_speed: f32,
    /// Steering force magnitude cap
    pub max_force: f32,
    /// Closest neighbors considered per fleet
    pub max_neighbors: usize,

    /// Positions kept per fleet for trail drawing, 0 disables trails
    pub trail_length: usize,
    /// Re-index moved fleets in the grid after each pass
    pub reindex: bool,
}

impl Default for FlockConfig {
    fn default() -> Self {
        Self {
            separation_radius: 25.0,
            alignment_radius: 50.0,
            cohesion_radius: 60.0,

            separation_weight: 1.0,
            alignment_weight: 0.8,
            cohesion_weight: 0.8,
            seek_weight: 2.0,

            max_speed: 60.0,
            max_force: 120.0,
            max_neighbors: 8,

            trail_length: 20,
            reindex: true,
        }
    }
}

impl FlockConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_non_negative("separation_radius", self.separation_radius)?;
        require_non_negative("alignment_radius", self.alignment_radius)?;
        require_non_negative("cohesion_radius", self.cohesion_radius)?;
        require_non_negative("separation_weight", self.separation_weight)?;
        require_non_negative("alignment_weight", self.alignment_weight)?;
        require_non_negative("cohesion_weight", self.cohesion_weight)?;
        require_non_negative("seek_weight", self.seek_weight)?;
        require_positive("max_speed", self.max_speed)?;
        require_positive("max_force", self.max_force)?;
        Ok(())
    }

    /// Search radius covering all three flocking behaviors.
    #[inline]
    pub fn neighbor_radius(&self) -> f32 {
        self.separation_radius
            .max(self.alignment_radius)
            .max(self.cohesion_radius)
    }
}

/// Running counters since creation or the last `reset_stats`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlockingStats {
    pub frames: u64,
    pub fleets_updated: u64,
    /// Arrived or out of ships
    pub skipped_inactive: u64,
    /// Non-finite position or target
    pub skipped_malformed: u64,
    /// Steering forces that hit `max_force`
    pub force_clamps: u64,
    /// Velocities that hit `max_speed`
    pub speed_clamps: u64,
    pub neighbors_visited: u64,
}

pub struct FlockingEngine {
    config: FlockConfig,
    stats: FlockingStats,
}

impl Default for FlockingEngine {
    fn default() -> Self {
        Self::new(FlockConfig::default())
    }
}

impl FlockingEngine {
    pub fn new(config: FlockConfig) -> Self {
        Self {
            config,
            stats: FlockingStats::default(),
        }
    }

    #[inline]
    pub fn config(&self) -> &FlockConfig {
        &self.config
    }

    /// Swap in a new configuration, rejecting it if invalid.
    pub fn set_config(&mut self, config: FlockConfig) -> Result<(), ConfigError> {
        config.validate()?;
        debug!(?config, "flocking config updated");
        self.config = config;
        Ok(())
    }

    #[inline]
    pub fn stats(&self) -> FlockingStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = FlockingStats::default();
    }

    /// Steer and move every eligible fleet by `dt` seconds.
    ///
    /// Arrived fleets, fleets without ships, and fleets with non-finite
    /// position or target are left untouched. Fleets already present in
    /// `grid` are re-indexed after moving when `reindex` is set.
    pub fn update_all(&mut self, fleets: &mut [Fleet], grid: &mut SpatialGrid, dt: f32) {
        if !dt.is_finite() || dt <= 0.0 {
            warn!(dt, "skipping flocking frame with invalid delta time");
            return;
        }
        self.stats.frames += 1;

        // Snapshot: neighbor velocities as of the start of the pass
        let velocities: HashMap<FleetId, Vec2> = fleets
            .iter()
            .map(|f| (f.id, vector::sanitize(f.velocity)))
            .collect();

        // Compute: all forces before anything moves
        let radius = self.config.neighbor_radius();
        let mut forces: Vec<Option<Vec2>> = Vec::with_capacity(fleets.len());
        for fleet in fleets.iter() {
            if !fleet.is_active() {
                self.stats.skipped_inactive += 1;
                forces.push(None);
                continue;
            }
            if !fleet.is_well_formed() {
                trace!(id = ?fleet.id, "skipping malformed fleet");
                self.stats.skipped_malformed += 1;
                forces.push(None);
                continue;
            }

            let neighbors = grid.nearby(fleet, radius, self.config.max_neighbors);
            self.stats.neighbors_visited += neighbors.len() as u64;
            forces.push(Some(self.compute_steering(fleet, &neighbors, &velocities)));
        }

        // Apply
        for (fleet, force) in fleets.iter_mut().zip(forces) {
            let Some(force) = force else {
                continue;
            };
            self.integrate(fleet, force, dt);
            if self.config.reindex && grid.contains(fleet.id) {
                grid.update(fleet);
            }
        }
    }

    /// Combined, clamped steering force for one fleet.
    fn compute_steering(
        &mut self,
        fleet: &Fleet,
        neighbors: &[Neighbor],
        velocities: &HashMap<FleetId, Vec2>,
    ) -> Vec2 {
        let position = fleet.position;
        let velocity = vector::sanitize(fleet.velocity);

        let (seek, seek_clamped) = self.seek(position, velocity, fleet.target);
        if neighbors.is_empty() {
            if seek_clamped {
                self.stats.force_clamps += 1;
            }
            return seek;
        }

        let cfg = self.config;
        let separation = self.separation(position, neighbors);
        let alignment = self.alignment(neighbors, velocities);
        let cohesion = self.cohesion(position, velocity, neighbors);

        let combined = separation * cfg.separation_weight
            + alignment * cfg.alignment_weight
            + cohesion * cfg.cohesion_weight
            + seek * cfg.seek_weight;

        let (total, clamped) = vector::clamp_magnitude(vector::sanitize(combined), cfg.max_force);
        if clamped {
            self.stats.force_clamps += 1;
        }
        total
    }

    /// Average push away from neighbors inside the separation radius,
    /// stronger for closer neighbors. Coincident neighbors contribute nothing.
    fn separation(&self, position: Vec2, neighbors: &[Neighbor]) -> Vec2 {
        let radius = self.config.separation_radius;
        let mut sum = Vec2::ZERO;
        let mut count = 0u32;

        for n in neighbors {
            if n.distance <= vector::EPSILON || n.distance > radius {
                continue;
            }
            let away = (position - n.position) / n.distance;
            sum += away * (radius / n.distance);
            count += 1;
        }

        if count == 0 {
            return Vec2::ZERO;
        }
        vector::normalize_to(sum / count as f32, self.config.max_force)
    }

    /// Average neighbor velocity inside the alignment radius. Neighbors not
    /// in this pass count as stationary.
    fn alignment(&self, neighbors: &[Neighbor], velocities: &HashMap<FleetId, Vec2>) -> Vec2 {
        let mut sum = Vec2::ZERO;
        let mut count = 0u32;

        for n in neighbors.iter().filter(|n| n.distance <= self.config.alignment_radius) {
            sum += velocities.get(&n.id).copied().unwrap_or(Vec2::ZERO);
            count += 1;
        }

        if count == 0 {
            return Vec2::ZERO;
        }
        vector::normalize_to(sum / count as f32, self.config.max_force)
    }

    /// Seek toward the centroid of neighbors inside the cohesion radius.
    fn cohesion(&self, position: Vec2, velocity: Vec2, neighbors: &[Neighbor]) -> Vec2 {
        let mut sum = Vec2::ZERO;
        let mut count = 0u32;

        for n in neighbors.iter().filter(|n| n.distance <= self.config.cohesion_radius) {
            sum += n.position;
            count += 1;
        }

        if count == 0 {
            return Vec2::ZERO;
        }
        self.seek(position, velocity, sum / count as f32).0
    }

    /// Steering toward `target` at full speed, clamped to `max_force`.
    fn seek(&self, position: Vec2, velocity: Vec2, target: Vec2) -> (Vec2, bool) {
        let desired = vector::normalize_to(target - position, self.config.max_speed);
        vector::clamp_magnitude(desired - velocity, self.config.max_force)
    }

    fn integrate(&mut self, fleet: &mut Fleet, force: Vec2, dt: f32) {
        let velocity = vector::sanitize(fleet.velocity) + force * dt;
        let (velocity, clamped) = vector::clamp_magnitude(velocity, self.config.max_speed);
        if clamped {
            self.stats.speed_clamps += 1;
        }

        fleet.velocity = vector::sanitize(velocity);
        fleet.position += fleet.velocity * dt;
        fleet.trail.push(fleet.position, self.config.trail_length);
        self.stats.fleets_updated += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const EPS: f32 = 1.0e-3;

    fn fleet(id: u32, x: f32, y: f32, tx: f32, ty: f32) -> Fleet {
        Fleet::new(id, Vec2::new(x, y), Vec2::new(tx, ty), 10)
    }

    fn indexed(fleets: &[Fleet]) -> SpatialGrid {
        let mut grid = SpatialGrid::new(1000.0, 1000.0, 50.0).unwrap();
        for f in fleets {
            grid.insert(f);
        }
        grid
    }

    fn neighbor(id: u32, from: Vec2, at: Vec2) -> Neighbor {
        Neighbor {
            id: FleetId(id),
            position: at,
            distance: from.distance(at),
        }
    }

    #[test]
    fn test_default_config() {
        let config = FlockConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.neighbor_radius(), 60.0);
        assert!(config.seek_weight >= 2.0 * config.separation_weight);
        assert!(config.seek_weight >= 2.0 * config.alignment_weight);
        assert!(config.seek_weight >= 2.0 * config.cohesion_weight);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut engine = FlockingEngine::default();
        let config = FlockConfig {
            cohesion_radius: -1.0,
            ..FlockConfig::default()
        };
        assert_eq!(
            engine.set_config(config),
            Err(ConfigError::Negative("cohesion_radius"))
        );
        assert_eq!(engine.config().cohesion_radius, 60.0);
    }

    #[test]
    fn test_lonely_fleet_only_seeks() {
        let mut engine = FlockingEngine::default();
        let f = fleet(1, 100.0, 100.0, 500.0, 100.0).with_velocity(Vec2::new(0.0, 30.0));

        let force = engine.compute_steering(&f, &[], &HashMap::new());
        let (seek, _) = engine.seek(f.position, f.velocity, f.target);
        assert_eq!(force, seek);
        assert!(force.length() <= engine.config().max_force + EPS);
    }

    #[test]
    fn test_coincident_neighbor_separation_is_zero() {
        let engine = FlockingEngine::default();
        let here = Vec2::new(200.0, 200.0);
        let force = engine.separation(here, &[neighbor(2, here, here)]);
        assert_eq!(force, Vec2::ZERO);
        assert!(vector::is_finite(force));
    }

    #[test]
    fn test_separation_points_away() {
        let engine = FlockingEngine::default();
        let here = Vec2::new(200.0, 200.0);
        let force = engine.separation(here, &[neighbor(2, here, Vec2::new(210.0, 200.0))]);
        assert!(force.x < 0.0);
        assert!(force.y.abs() < EPS);
        assert!((force.length() - engine.config().max_force).abs() < EPS);
    }

    #[test]
    fn test_alignment_treats_unknown_velocity_as_zero() {
        let engine = FlockingEngine::default();
        let here = Vec2::new(200.0, 200.0);
        let neighbors = [
            neighbor(2, here, Vec2::new(220.0, 200.0)),
            neighbor(3, here, Vec2::new(200.0, 220.0)),
        ];
        let velocities = HashMap::from([(FleetId(2), Vec2::new(0.0, 10.0))]);

        let force = engine.alignment(&neighbors, &velocities);
        assert!(force.x.abs() < EPS);
        assert!(force.y > 0.0);
    }

    #[test]
    fn test_separation_pushes_fleets_apart() {
        let mut fleets = vec![
            fleet(1, 100.0, 100.0, 100.0, 100.0),
            fleet(2, 110.0, 100.0, 110.0, 100.0),
        ];
        let mut grid = indexed(&fleets);
        let mut engine = FlockingEngine::default();

        engine.update_all(&mut fleets, &mut grid, 0.1);

        assert!(fleets[0].position.x < 100.0);
        assert!(fleets[1].position.x > 110.0);
    }

    #[test]
    fn test_forces_and_speeds_stay_bounded() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut fleets: Vec<Fleet> = (0..200)
            .map(|id| {
                fleet(
                    id,
                    rng.gen_range(400.0..600.0),
                    rng.gen_range(400.0..600.0),
                    rng.gen_range(0.0..1000.0),
                    rng.gen_range(0.0..1000.0),
                )
                .with_velocity(Vec2::new(
                    rng.gen_range(-500.0..500.0),
                    rng.gen_range(-500.0..500.0),
                ))
            })
            .collect();
        let mut grid = indexed(&fleets);
        let mut engine = FlockingEngine::default();
        let max_force = engine.config().max_force;
        let max_speed = engine.config().max_speed;

        let velocities: HashMap<FleetId, Vec2> =
            fleets.iter().map(|f| (f.id, f.velocity)).collect();
        for f in &fleets {
            let neighbors = grid.nearby(f, 60.0, 8);
            let force = engine.compute_steering(f, &neighbors, &velocities);
            assert!(force.length() <= max_force + EPS);
        }

        for _ in 0..10 {
            engine.update_all(&mut fleets, &mut grid, 1.0 / 60.0);
            for f in &fleets {
                assert!(vector::is_finite(f.velocity));
                assert!(f.velocity.length() <= max_speed + EPS);
            }
        }
        assert!(engine.stats().speed_clamps > 0);
    }

    #[test]
    fn test_update_is_order_independent() {
        let make = || {
            vec![
                fleet(1, 300.0, 300.0, 800.0, 300.0).with_velocity(Vec2::new(10.0, 0.0)),
                fleet(2, 315.0, 305.0, 800.0, 300.0).with_velocity(Vec2::new(0.0, 20.0)),
                fleet(3, 290.0, 320.0, 100.0, 900.0).with_velocity(Vec2::new(-5.0, 5.0)),
                fleet(4, 330.0, 290.0, 300.0, 100.0),
            ]
        };

        let mut forward = make();
        let mut grid = indexed(&forward);
        FlockingEngine::default().update_all(&mut forward, &mut grid, 0.05);

        let mut backward: Vec<Fleet> = make().into_iter().rev().collect();
        let mut grid = indexed(&backward);
        FlockingEngine::default().update_all(&mut backward, &mut grid, 0.05);

        for f in &forward {
            let g = backward.iter().find(|g| g.id == f.id).unwrap();
            assert_eq!(f.position, g.position);
            assert_eq!(f.velocity, g.velocity);
        }
    }

    #[test]
    fn test_inactive_fleets_do_not_move() {
        let mut arrived = fleet(1, 100.0, 100.0, 900.0, 900.0);
        arrived.arrive();
        let empty = Fleet::new(2, Vec2::new(500.0, 500.0), Vec2::ZERO, 0);
        let mut fleets = vec![arrived, empty];
        let mut grid = indexed(&fleets);
        let mut engine = FlockingEngine::default();

        engine.update_all(&mut fleets, &mut grid, 0.1);

        assert_eq!(fleets[0].position, Vec2::new(100.0, 100.0));
        assert_eq!(fleets[1].position, Vec2::new(500.0, 500.0));
        assert_eq!(engine.stats().skipped_inactive, 2);
        assert_eq!(engine.stats().fleets_updated, 0);
    }

    #[test]
    fn test_malformed_fleet_skipped_others_move() {
        let mut fleets = vec![
            fleet(1, f32::NAN, 100.0, 900.0, 100.0),
            fleet(2, 100.0, 100.0, 900.0, 100.0).with_velocity(Vec2::new(f32::NAN, 0.0)),
        ];
        let mut grid = indexed(&fleets);
        let mut engine = FlockingEngine::default();

        engine.update_all(&mut fleets, &mut grid, 0.1);

        assert_eq!(engine.stats().skipped_malformed, 1);
        assert!(fleets[1].position.x > 100.0);
        assert!(vector::is_finite(fleets[1].velocity));
    }

    #[test]
    fn test_moved_fleets_are_reindexed() {
        let mut fleets = vec![fleet(1, 45.0, 45.0, 900.0, 45.0).with_velocity(Vec2::new(60.0, 0.0))];
        let mut grid = indexed(&fleets);
        let mut outsider = vec![fleet(2, 500.0, 500.0, 900.0, 900.0)];

        let mut engine = FlockingEngine::default();
        engine.update_all(&mut fleets, &mut grid, 0.5);
        engine.update_all(&mut outsider, &mut grid, 0.5);

        let entry = grid.indexed(FleetId(1)).unwrap();
        assert_eq!(entry.position, fleets[0].position);
        assert_eq!(Some(entry.cell), grid.cell_index(fleets[0].position));
        assert!(!grid.contains(FleetId(2)));
    }

    #[test]
    fn test_trail_bounded_by_config() {
        let mut fleets = vec![fleet(1, 100.0, 100.0, 900.0, 900.0)];
        let mut grid = indexed(&fleets);
        let mut engine = FlockingEngine::new(FlockConfig {
            trail_length: 5,
            ..FlockConfig::default()
        });

        for _ in 0..12 {
            engine.update_all(&mut fleets, &mut grid, 1.0 / 30.0);
        }
        assert_eq!(fleets[0].trail.len(), 5);
        assert_eq!(fleets[0].trail.iter().last(), Some(&fleets[0].position));
    }

    #[test]
    fn test_invalid_delta_skips_frame() {
        let mut fleets = vec![fleet(1, 100.0, 100.0, 900.0, 900.0)];
        let mut grid = indexed(&fleets);
        let mut engine = FlockingEngine::default();

        engine.update_all(&mut fleets, &mut grid, f32::NAN);
        engine.update_all(&mut fleets, &mut grid, -0.1);

        assert_eq!(fleets[0].position, Vec2::new(100.0, 100.0));
        assert_eq!(engine.stats().frames, 0);
    }
}
