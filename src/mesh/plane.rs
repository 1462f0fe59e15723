//! Oriented planes and the polygon splitting used by the BSP tree.

use crate::float_types::{EPSILON, Real};
use crate::mesh::polygon::Polygon;
use crate::mesh::vertex::Vertex;
use nalgebra::{Point3, Vector3};

// Plane classification constants, combined bitwise for polygons
pub const COPLANAR: i8 = 0;
pub const FRONT: i8 = 1;
pub const BACK: i8 = 2;
pub const SPANNING: i8 = 3;

/// A plane `n · p = w` with unit normal `n`.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    pub normal: Vector3<Real>,
    pub w: Real,
}

impl Plane {
    /// Create a new plane from a (not necessarily unit) normal and offset
    pub fn from_normal(normal: Vector3<Real>, w: Real) -> Self {
        let len = normal.norm();
        Plane {
            normal: normal / len,
            w: w / len,
        }
    }

    /// Plane through three points, oriented by the right-hand rule `(b-a) × (c-a)`.
    ///
    /// Returns `None` when the points are collinear.
    pub fn from_points(a: &Point3<Real>, b: &Point3<Real>, c: &Point3<Real>) -> Option<Self> {
        let n = (b - a).cross(&(c - a));
        let len = n.norm();
        if len <= Real::EPSILON {
            return None;
        }
        let normal = n / len;
        Some(Plane {
            normal,
            w: normal.dot(&a.coords),
        })
    }

    pub const fn normal(&self) -> Vector3<Real> {
        self.normal
    }

    pub const fn offset(&self) -> Real {
        self.w
    }

    /// Flip the plane (reverse normal and distance)
    pub fn flip(&mut self) {
        self.normal = -self.normal;
        self.w = -self.w;
    }

    /// Classify a point as `FRONT`, `BACK` or `COPLANAR` within [`EPSILON`].
    #[inline]
    pub fn orient_point(&self, point: &Point3<Real>) -> i8 {
        let t = self.normal.dot(&point.coords) - self.w;
        if t < -EPSILON {
            BACK
        } else if t > EPSILON {
            FRONT
        } else {
            COPLANAR
        }
    }

    /// Bitwise OR of every vertex classification.
    pub fn classify_polygon(&self, polygon: &Polygon) -> i8 {
        polygon
            .vertices
            .iter()
            .fold(COPLANAR, |acc, v| acc | self.orient_point(&v.pos))
    }

    /// Splits `polygon` by this plane, returning four buckets:
    /// `(coplanar_front, coplanar_back, front, back)`.
    ///
    /// Spanning polygons are cut along the plane; both halves keep the
    /// original polygon's plane so that thin slivers stay well oriented.
    #[allow(clippy::type_complexity)]
    pub fn split_polygon(
        &self,
        polygon: &Polygon,
    ) -> (Vec<Polygon>, Vec<Polygon>, Vec<Polygon>, Vec<Polygon>) {
        let mut coplanar_front = Vec::new();
        let mut coplanar_back = Vec::new();
        let mut front = Vec::new();
        let mut back = Vec::new();

        let types: Vec<i8> = polygon
            .vertices
            .iter()
            .map(|v| self.orient_point(&v.pos))
            .collect();
        let polygon_type = types.iter().fold(COPLANAR, |acc, &t| acc | t);

        match polygon_type {
            COPLANAR => {
                if self.normal.dot(&polygon.plane.normal) > 0.0 {
                    coplanar_front.push(polygon.clone());
                } else {
                    coplanar_back.push(polygon.clone());
                }
            },
            FRONT => front.push(polygon.clone()),
            BACK => back.push(polygon.clone()),
            _ => {
                let n = polygon.vertices.len();
                let mut split_front = Vec::<Vertex>::with_capacity(n + 1);
                let mut split_back = Vec::<Vertex>::with_capacity(n + 1);

                for i in 0..n {
                    let j = (i + 1) % n;
                    let (type_i, type_j) = (types[i], types[j]);
                    let vertex_i = &polygon.vertices[i];
                    let vertex_j = &polygon.vertices[j];

                    if type_i != BACK {
                        split_front.push(*vertex_i);
                    }
                    if type_i != FRONT {
                        split_back.push(*vertex_i);
                    }

                    if (type_i | type_j) == SPANNING {
                        let denom = self.normal.dot(&(vertex_j.pos - vertex_i.pos));
                        if denom.abs() > Real::EPSILON {
                            let t = (self.w - self.normal.dot(&vertex_i.pos.coords)) / denom;
                            let vertex_new = vertex_i.interpolate(vertex_j, t);
                            split_front.push(vertex_new);
                            split_back.push(vertex_new);
                        }
                    }
                }

                if split_front.len() >= 3 {
                    front.push(Polygon::with_plane(split_front, polygon.plane.clone()));
                }
                if split_back.len() >= 3 {
                    back.push(Polygon::with_plane(split_back, polygon.plane.clone()));
                }
            },
        }

        (coplanar_front, coplanar_back, front, back)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Polygon {
        Polygon::new(vec![
            Vertex::new(Point3::new(-1.0, -1.0, 0.0)),
            Vertex::new(Point3::new(1.0, -1.0, 0.0)),
            Vertex::new(Point3::new(1.0, 1.0, 0.0)),
            Vertex::new(Point3::new(-1.0, 1.0, 0.0)),
        ])
        .expect("square is planar")
    }

    #[test]
    fn orient_point_sides() {
        let plane = Plane::from_normal(Vector3::new(0.0, 0.0, 2.0), 2.0);
        assert_eq!(plane.w, 1.0);
        assert_eq!(plane.orient_point(&Point3::new(0.0, 0.0, 2.0)), FRONT);
        assert_eq!(plane.orient_point(&Point3::new(0.0, 0.0, 0.0)), BACK);
        assert_eq!(plane.orient_point(&Point3::new(5.0, 5.0, 1.0)), COPLANAR);
    }

    #[test]
    fn spanning_polygon_is_cut_in_two() {
        let plane = Plane::from_normal(Vector3::x(), 0.0);
        let (cf, cb, f, b) = plane.split_polygon(&square());
        assert!(cf.is_empty() && cb.is_empty());
        assert_eq!(f.len(), 1);
        assert_eq!(b.len(), 1);
        assert!(f[0].vertices.iter().all(|v| v.pos.x >= -EPSILON));
        assert!(b[0].vertices.iter().all(|v| v.pos.x <= EPSILON));
        assert_eq!(f[0].vertices.len(), 4);
    }

    #[test]
    fn coplanar_polygon_goes_by_facing() {
        let up = Plane::from_normal(Vector3::z(), 0.0);
        let (cf, cb, _, _) = up.split_polygon(&square());
        assert_eq!((cf.len(), cb.len()), (1, 0));

        let mut down = up.clone();
        down.flip();
        let (cf, cb, _, _) = down.split_polygon(&square());
        assert_eq!((cf.len(), cb.len()), (0, 1));
    }
}
