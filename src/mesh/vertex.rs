//! Struct and functions for working with `Vertex`s from which BSP `Polygon`s are composed.

use crate::float_types::Real;
use nalgebra::Point3;

/// A vertex of a clipping polygon.
///
/// Only the position survives a Boolean; shading normals are recomputed
/// from the welded result afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub pos: Point3<Real>,
}

impl Vertex {
    pub const fn new(pos: Point3<Real>) -> Self {
        Vertex { pos }
    }

    /// Return the linear interpolation between `self` (`t = 0`) and `other` (`t = 1`).
    pub fn interpolate(&self, other: &Vertex, t: Real) -> Vertex {
        // p(t) = p0 + t * (p1 - p0)
        Vertex::new(self.pos + (other.pos - self.pos) * t)
    }
}
