//! Shared data types for the routing-fabric interface.
//!
//! This module defines the geometric and timing primitives the router core
//! exchanges with an architecture context: grid locations, inclusive bounding
//! rectangles, propagation delays, and binding strengths.

use serde::{Deserialize, Serialize};

/// A timing delay with min/typical/max corners.
///
/// Represents the propagation delay through a fabric element across
/// different process/voltage/temperature corners. The router costs paths
/// by the slow (max) corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Delay {
    /// Minimum delay in nanoseconds (fast corner).
    pub min_ns: f64,
    /// Typical delay in nanoseconds (nominal corner).
    pub typ_ns: f64,
    /// Maximum delay in nanoseconds (slow corner).
    pub max_ns: f64,
}

impl Delay {
    /// A zero delay (no propagation time).
    pub const ZERO: Self = Self {
        min_ns: 0.0,
        typ_ns: 0.0,
        max_ns: 0.0,
    };

    /// Creates a new delay with the given min/typ/max values.
    pub fn new(min_ns: f64, typ_ns: f64, max_ns: f64) -> Self {
        Self {
            min_ns,
            typ_ns,
            max_ns,
        }
    }

    /// Creates a delay with all three corners at the given value.
    pub fn from_ns(ns: f64) -> Self {
        Self::new(ns, ns, ns)
    }
}

impl Default for Delay {
    fn default() -> Self {
        Self::ZERO
    }
}

/// A location on the device grid.
///
/// Wire centroids and bel placements are expressed in these coordinates.
/// Signed 16-bit components match the on-device representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Loc {
    /// Column (0-based, left to right).
    pub x: i16,
    /// Row (0-based, bottom to top).
    pub y: i16,
}

impl Loc {
    /// Creates a location from its components.
    pub fn new(x: i16, y: i16) -> Self {
        Self { x, y }
    }
}

/// An inclusive bounding rectangle on the device grid.
///
/// Both corners are part of the rectangle: a single-tile box has
/// `x0 == x1 && y0 == y1`. A freshly-created box covers the *inverted*
/// extents of the grid so that the first [`extend`](Rect::extend) snaps it
/// to a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge (inclusive).
    pub x0: i16,
    /// Bottom edge (inclusive).
    pub y0: i16,
    /// Right edge (inclusive).
    pub x1: i16,
    /// Top edge (inclusive).
    pub y1: i16,
}

impl Rect {
    /// Creates a rectangle from its corners.
    pub fn new(x0: i16, y0: i16, x1: i16, y1: i16) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Creates the null rectangle for a grid of the given dimensions.
    ///
    /// The extents are inverted (`x0` at the far edge, `x1` at zero), so
    /// extending with any location produces that single point.
    pub fn inverted(grid_w: u16, grid_h: u16) -> Self {
        Self {
            x0: grid_w.saturating_sub(1) as i16,
            y0: grid_h.saturating_sub(1) as i16,
            x1: 0,
            y1: 0,
        }
    }

    /// Grows the rectangle to include the given location.
    pub fn extend(&mut self, loc: Loc) {
        self.x0 = self.x0.min(loc.x);
        self.y0 = self.y0.min(loc.y);
        self.x1 = self.x1.max(loc.x);
        self.y1 = self.y1.max(loc.y);
    }

    /// Returns whether the rectangle contains the given location.
    pub fn contains(&self, loc: Loc) -> bool {
        loc.x >= self.x0 && loc.x <= self.x1 && loc.y >= self.y0 && loc.y <= self.y1
    }

    /// Returns whether the rectangle overlaps another (inclusive edges).
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x0 <= other.x1 && other.x0 <= self.x1 && self.y0 <= other.y1 && other.y0 <= self.y1
    }

    /// Returns the rectangle grown by `margin` on every side, clamped to the grid.
    pub fn expand(&self, margin: u16, grid_w: u16, grid_h: u16) -> Rect {
        let m = margin as i16;
        Rect {
            x0: (self.x0 - m).max(0),
            y0: (self.y0 - m).max(0),
            x1: (self.x1 + m).min(grid_w.saturating_sub(1) as i16),
            y1: (self.y1 + m).min(grid_h.saturating_sub(1) as i16),
        }
    }

    /// Returns the perimeter (half-perimeter doubled) of the rectangle.
    pub fn perimeter(&self) -> u32 {
        let w = (self.x1 - self.x0).max(0) as u32;
        let h = (self.y1 - self.y0).max(0) as u32;
        2 * (w + h)
    }
}

/// The strength with which a wire or PIP is bound to a net.
///
/// The router binds its own results at [`Weak`](BindStrength::Weak) strength
/// and treats any pre-existing binding above [`Strong`](BindStrength::Strong)
/// as locked routing it must not rip up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BindStrength {
    /// Router-placed binding; may be ripped up freely.
    Weak,
    /// Deliberate binding; ripped up only under congestion pressure.
    Strong,
    /// Locked binding (e.g. a pre-routed global clock); never ripped up.
    Fixed,
}
