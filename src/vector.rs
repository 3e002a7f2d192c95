//! 2D Vector Helpers for Steering
//!
//! Thin wrappers over [`glam::Vec2`] that never produce NaN or infinity.
//! Every normalization of a (near) zero-length vector yields `Vec2::ZERO`,
//! which keeps degenerate frames (two fleets stacked on the same point,
//! a fleet sitting exactly on its target) from poisoning velocities.

use glam::Vec2;

/// Squared lengths at or below this are treated as zero.
pub const EPSILON: f32 = 1.0e-6;

/// Length of `v`.
#[inline]
pub fn magnitude(v: Vec2) -> f32 {
    v.length()
}

/// Euclidean distance between two points.
#[inline]
pub fn distance(a: Vec2, b: Vec2) -> f32 {
    a.distance(b)
}

/// Rescale `v` to exactly `length`, or zero when `v` has no direction.
#[inline]
pub fn normalize_to(v: Vec2, length: f32) -> Vec2 {
    let len_sq = v.length_squared();
    if len_sq <= EPSILON || !len_sq.is_finite() {
        return Vec2::ZERO;
    }
    v * (length / len_sq.sqrt())
}

/// Shrink `v` so its length does not exceed `max`. Returns `true` in the
/// second slot when the vector was actually clamped.
#[inline]
pub fn clamp_magnitude(v: Vec2, max: f32) -> (Vec2, bool) {
    if max <= 0.0 {
        return (Vec2::ZERO, v != Vec2::ZERO);
    }
    let len_sq = v.length_squared();
    if len_sq <= max * max {
        return (v, false);
    }
    (normalize_to(v, max), true)
}

/// Both components are finite numbers.
#[inline]
pub fn is_finite(v: Vec2) -> bool {
    v.x.is_finite() && v.y.is_finite()
}

/// `v` itself when finite, otherwise zero.
#[inline]
pub fn sanitize(v: Vec2) -> Vec2 {
    if is_finite(v) {
        v
    } else {
        Vec2::ZERO
    }
}
