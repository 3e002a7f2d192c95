//! Structure of Arrays (SoA) Output Layout
//!
//! Mirrors fleet state into contiguous arrays so the renderer can read
//! every fleet's position and velocity straight out of WASM memory
//! through `Float32Array` / `Uint32Array` views, without a copy per frame.
//!
//! Memory layout:
//! ```text
//! ids:           [id0, id1, id2, ...]
//! positions_x:   [x0, x1, x2, ...]
//! positions_y:   [y0, y1, y2, ...]
//! velocities_x:  [vx0, vx1, vx2, ...]
//! velocities_y:  [vy0, vy1, vy2, ...]
//! states:        [s0, s1, s2, ...]
//! ```
//!
//! Slot `i` in every array describes the same fleet. Views must be
//! re-created after any call that changes the fleet count, since the
//! arrays may reallocate.

use crate::fleet::Fleet;

#[derive(Default)]
pub struct FleetBuffer {
    ids: Vec<u32>,
    positions_x: Vec<f32>,
    positions_y: Vec<f32>,
    velocities_x: Vec<f32>,
    velocities_y: Vec<f32>,
    /// `FleetState` as u8
    states: Vec<u8>,
}

impl FleetBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ids: Vec::with_capacity(capacity),
            positions_x: Vec::with_capacity(capacity),
            positions_y: Vec::with_capacity(capacity),
            velocities_x: Vec::with_capacity(capacity),
            velocities_y: Vec::with_capacity(capacity),
            states: Vec::with_capacity(capacity),
        }
    }

    /// Rewrite every array from `fleets`, in slice order.
    pub fn sync(&mut self, fleets: &[Fleet]) {
        self.clear();
        for fleet in fleets {
            self.ids.push(fleet.id.0);
            self.positions_x.push(fleet.position.x);
            self.positions_y.push(fleet.position.y);
            self.velocities_x.push(fleet.velocity.x);
            self.velocities_y.push(fleet.velocity.y);
            self.states.push(fleet.state as u8);
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.positions_x.clear();
        self.positions_y.clear();
        self.velocities_x.clear();
        self.velocities_y.clear();
        self.states.clear();
    }

    /// Read a position at index (for debugging/testing)
    #[inline]
    pub fn position(&self, index: usize) -> Option<(f32, f32)> {
        Some((*self.positions_x.get(index)?, *self.positions_y.get(index)?))
    }

    /// Read a velocity at index (for debugging/testing)
    #[inline]
    pub fn velocity(&self, index: usize) -> Option<(f32, f32)> {
        Some((*self.velocities_x.get(index)?, *self.velocities_y.get(index)?))
    }

    // ==================== Raw pointers for JS interop ====================

    #[inline]
    pub fn ids_ptr(&self) -> *const u32 {
        self.ids.as_ptr()
    }

    #[inline]
    pub fn positions_x_ptr(&self) -> *const f32 {
        self.positions_x.as_ptr()
    }

    #[inline]
    pub fn positions_y_ptr(&self) -> *const f32 {
        self.positions_y.as_ptr()
    }

    #[inline]
    pub fn velocities_x_ptr(&self) -> *const f32 {
        self.velocities_x.as_ptr()
    }

    #[inline]
    pub fn velocities_y_ptr(&self) -> *const f32 {
        self.velocities_y.as_ptr()
    }

    #[inline]
    pub fn states_ptr(&self) -> *const u8 {
        self.states.as_ptr()
    }
}
