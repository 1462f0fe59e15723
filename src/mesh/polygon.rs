//! Convex polygons fed through the BSP tree.

use crate::float_types::Real;
use crate::float_types::parry3d::bounding_volume::Aabb;
use crate::mesh::plane::Plane;
use crate::mesh::vertex::Vertex;
use nalgebra::Point3;

/// A convex, planar polygon with its supporting plane cached.
#[derive(Debug, Clone)]
pub struct Polygon {
    pub vertices: Vec<Vertex>,
    pub plane: Plane,
}

impl Polygon {
    /// Create a polygon, deriving the plane from its first three vertices.
    ///
    /// Returns `None` for fewer than three vertices or a degenerate first corner.
    pub fn new(vertices: Vec<Vertex>) -> Option<Self> {
        if vertices.len() < 3 {
            return None;
        }
        let plane = Plane::from_points(&vertices[0].pos, &vertices[1].pos, &vertices[2].pos)?;
        Some(Polygon { vertices, plane })
    }

    /// Create a polygon that lies on an already known plane.
    pub const fn with_plane(vertices: Vec<Vertex>, plane: Plane) -> Self {
        Polygon { vertices, plane }
    }

    /// Reverse winding order and flip the plane
    pub fn flip(&mut self) {
        self.vertices.reverse();
        self.plane.flip();
    }

    /// Axis-aligned bounds of the polygon's vertices
    pub fn bounding_box(&self) -> Aabb {
        let mut mins = Point3::new(Real::MAX, Real::MAX, Real::MAX);
        let mut maxs = Point3::new(-Real::MAX, -Real::MAX, -Real::MAX);
        for v in &self.vertices {
            mins = mins.inf(&v.pos);
            maxs = maxs.sup(&v.pos);
        }
        Aabb::new(mins, maxs)
    }

    /// Fan-triangulate this (convex) polygon.
    pub fn triangulate(&self) -> impl Iterator<Item = [Point3<Real>; 3]> + '_ {
        let first = self.vertices[0].pos;
        self.vertices
            .windows(2)
            .skip(1)
            .map(move |w| [first, w[0].pos, w[1].pos])
    }
}
