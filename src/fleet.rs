//! Fleet View
//!
//! The fields the spatial grid and the flocking engine read and write.
//! Fleets are created, destroyed and conquered elsewhere; this crate only
//! moves them.

use std::collections::VecDeque;

use glam::Vec2;

use crate::vector;

/// Radius used when the caller has nothing better.
pub const DEFAULT_FLEET_RADIUS: f32 = 8.0;

/// Stable identifier for a fleet, unique for the lifetime of a simulation.
///
/// Totally ordered so pairwise results can be reported once with `a < b`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FleetId(pub u32);

/// Movement state. `Arrived` is terminal.
#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum FleetState {
    /// Fleet is en route and receives steering every frame
    #[default]
    Active = 0,
    /// Fleet reached its target - never steered again
    Arrived = 1,
}

/// Bounded history of recent positions, drawn as a fading trail.
#[derive(Clone, Debug, Default)]
pub struct Trail {
    points: VecDeque<Vec2>,
}

impl Trail {
    /// Append `point`, dropping the oldest entries beyond `max_len`.
    pub fn push(&mut self, point: Vec2, max_len: usize) {
        if max_len == 0 {
            self.points.clear();
            return;
        }
        self.points.push_back(point);
        while self.points.len() > max_len {
            self.points.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Vec2> {
        self.points.iter()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }
}

/// A group of ships moving as one agent.
#[derive(Clone, Debug)]
pub struct Fleet {
    pub id: FleetId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub target: Vec2,
    /// Only used for rectangle intersection queries
    pub radius: f32,
    pub state: FleetState,
    /// Remaining ships; a fleet with none left is inert
    pub ships: i32,
    pub trail: Trail,
}

impl Fleet {
    /// Create a stationary, active fleet heading for `target`.
    pub fn new(id: u32, position: Vec2, target: Vec2, ships: i32) -> Self {
        Self {
            id: FleetId(id),
            position,
            velocity: Vec2::ZERO,
            target,
            radius: DEFAULT_FLEET_RADIUS,
            state: FleetState::Active,
            ships,
            trail: Trail::default(),
        }
    }

    pub fn with_velocity(mut self, velocity: Vec2) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = radius;
        self
    }

    #[inline]
    pub fn has_arrived(&self) -> bool {
        self.state == FleetState::Arrived
    }

    /// Mark the fleet as arrived. There is no way back.
    pub fn arrive(&mut self) {
        self.state = FleetState::Arrived;
    }

    /// Active and still carrying ships.
    #[inline]
    pub fn is_active(&self) -> bool {
        !self.has_arrived() && self.ships > 0
    }

    /// Position and target are usable numbers.
    #[inline]
    pub fn is_well_formed(&self) -> bool {
        vector::is_finite(self.position) && vector::is_finite(self.target)
    }

    /// Radius to use for intersection tests, falling back to the default
    /// when the stored one is unusable.
    #[inline]
    pub fn effective_radius(&self) -> f32 {
        if self.radius.is_finite() && self.radius >= 0.0 {
            self.radius
        } else {
            DEFAULT_FLEET_RADIUS
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_fleet_is_active_and_still() {
        let fleet = Fleet::new(1, Vec2::new(10.0, 10.0), Vec2::new(100.0, 0.0), 5);
        assert!(fleet.is_active());
        assert_eq!(fleet.velocity, Vec2::ZERO);
        assert_eq!(fleet.radius, DEFAULT_FLEET_RADIUS);
    }

    #[test]
    fn arrival_is_terminal() {
        let mut fleet = Fleet::new(1, Vec2::ZERO, Vec2::ONE, 5);
        fleet.arrive();
        assert!(fleet.has_arrived());
        assert!(!fleet.is_active());
    }

    #[test]
    fn empty_fleet_is_inert() {
        let fleet = Fleet::new(1, Vec2::ZERO, Vec2::ONE, 0);
        assert!(!fleet.is_active());
    }

    #[test]
    fn nan_position_is_malformed() {
        let fleet = Fleet::new(1, Vec2::new(f32::NAN, 0.0), Vec2::ONE, 3);
        assert!(!fleet.is_well_formed());
    }

    #[test]
    fn trail_is_bounded() {
        let mut trail = Trail::default();
        for i in 0..10 {
            trail.push(Vec2::splat(i as f32), 4);
        }
        assert_eq!(trail.len(), 4);
        assert_eq!(trail.iter().next(), Some(&Vec2::splat(6.0)));
    }

    #[test]
    fn zero_length_trail_stays_empty() {
        let mut trail = Trail::default();
        trail.push(Vec2::ONE, 0);
        assert!(trail.is_empty());
    }
}
