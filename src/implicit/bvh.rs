//! Bounding-volume hierarchy over a mesh's triangles.
//!
//! Answers two queries: unsigned distance to the surface and the generalized
//! winding number. The winding number uses exact solid angles near the query
//! point and a first-order dipole expansion for distant clusters.

use crate::aabb::AabbExt;
use crate::float_types::parry3d::{bounding_volume::Aabb, query::PointQuery, shape::Triangle};
use crate::float_types::{Real, TAU};
use crate::mesh::Mesh;
use nalgebra::{Point3, Vector3};
use std::sync::OnceLock;

const MAX_TRIANGLES_PER_LEAF: usize = 8;

/// Accuracy parameter of the far-field expansion: a cluster is treated as a
/// single dipole once the query is `BETA` radii away from its centre.
const BETA: Real = 2.0;

#[derive(Debug, Clone)]
enum NodeKind {
    Leaf { triangles: Vec<usize> },
    Internal { left: usize, right: usize },
}

#[derive(Debug, Clone)]
struct BvhNode {
    aabb: Aabb,
    kind: NodeKind,
}

/// Area-weighted first-order moment of a cluster of triangles.
#[derive(Debug, Clone, Copy)]
struct Dipole {
    center: Point3<Real>,
    /// Sum of the outward area vectors
    area_normal: Vector3<Real>,
    /// Total unsigned area, used to weight `center`
    area: Real,
    /// Distance from `center` to the farthest vertex of the cluster
    radius: Real,
}

/// Triangle BVH supporting distance and fast winding-number queries.
#[derive(Debug, Clone)]
pub struct TriangleBvh {
    triangles: Vec<Triangle>,
    nodes: Vec<BvhNode>,
    moments: OnceLock<Vec<Dipole>>,
}

impl TriangleBvh {
    /// Build the hierarchy over every face of `mesh`.
    pub fn new(mesh: &Mesh) -> Self {
        let triangles: Vec<Triangle> = (0..mesh.face_count())
            .map(|i| {
                let [a, b, c] = mesh.triangle(i);
                Triangle::new(a, b, c)
            })
            .collect();

        let mut bvh = TriangleBvh {
            triangles,
            nodes: Vec::new(),
            moments: OnceLock::new(),
        };
        if !bvh.triangles.is_empty() {
            let all = (0..bvh.triangles.len()).collect();
            bvh.build_node(all);
        }
        bvh
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    fn triangle_aabb(t: &Triangle) -> Aabb {
        Aabb::new(t.a.inf(&t.b).inf(&t.c), t.a.sup(&t.b).sup(&t.c))
    }

    /// Median split along the longest axis; returns the new node's index.
    fn build_node(&mut self, mut indices: Vec<usize>) -> usize {
        let aabb = indices
            .iter()
            .map(|&i| Self::triangle_aabb(&self.triangles[i]))
            .reduce(|a, b| Aabb::new(a.mins.inf(&b.mins), a.maxs.sup(&b.maxs)))
            .unwrap_or_else(crate::aabb::degenerate);

        let slot = self.nodes.len();
        if indices.len() <= MAX_TRIANGLES_PER_LEAF {
            self.nodes.push(BvhNode {
                aabb,
                kind: NodeKind::Leaf { triangles: indices },
            });
            return slot;
        }

        // Placeholder, patched once the children exist
        self.nodes.push(BvhNode {
            aabb,
            kind: NodeKind::Internal { left: 0, right: 0 },
        });

        let extents = aabb.extents();
        let axis = extents.imax();
        let centroid = |i: usize| {
            let t = &self.triangles[i];
            (t.a[axis] + t.b[axis] + t.c[axis]) / 3.0
        };
        indices.sort_by(|&a, &b| centroid(a).total_cmp(&centroid(b)));

        let right_half = indices.split_off(indices.len() / 2);
        let left = self.build_node(indices);
        let right = self.build_node(right_half);
        self.nodes[slot].kind = NodeKind::Internal { left, right };
        slot
    }

    /// Unsigned distance from `p` to the closest triangle, `Real::MAX` when empty.
    pub fn closest_distance(&self, p: &Point3<Real>) -> Real {
        let mut best = Real::MAX;
        if self.nodes.is_empty() {
            return best;
        }
        let mut stack = vec![0usize];
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx];
            if node.aabb.distance_to(p) >= best {
                continue;
            }
            match &node.kind {
                NodeKind::Leaf { triangles } => {
                    for &t in triangles {
                        best = best.min(self.triangles[t].distance_to_local_point(p, true));
                    }
                },
                NodeKind::Internal { left, right } => {
                    // Visit the nearer child first so it tightens `best`
                    let (dl, dr) = (
                        self.nodes[*left].aabb.distance_to(p),
                        self.nodes[*right].aabb.distance_to(p),
                    );
                    if dl < dr {
                        stack.push(*right);
                        stack.push(*left);
                    } else {
                        stack.push(*left);
                        stack.push(*right);
                    }
                },
            }
        }
        best
    }

    /// Force the far-field moments to be computed now rather than on first query.
    pub fn precompute(&self) {
        self.moments();
    }

    fn moments(&self) -> &[Dipole] {
        self.moments.get_or_init(|| {
            let mut moments = vec![
                Dipole {
                    center: Point3::origin(),
                    area_normal: Vector3::zeros(),
                    area: 0.0,
                    radius: 0.0,
                };
                self.nodes.len()
            ];
            // Children always have larger indices than their parent
            for idx in (0..self.nodes.len()).rev() {
                let (area_normal, area, center) = match &self.nodes[idx].kind {
                    NodeKind::Leaf { triangles } => {
                        let mut area_normal = Vector3::zeros();
                        let mut weighted = Vector3::zeros();
                        let mut area_sum = 0.0;
                        for &t in triangles {
                            let tri = &self.triangles[t];
                            let n = (tri.b - tri.a).cross(&(tri.c - tri.a)) * 0.5;
                            let area = n.norm();
                            area_normal += n;
                            weighted += (tri.a.coords + tri.b.coords + tri.c.coords) / 3.0 * area;
                            area_sum += area;
                        }
                        (
                            area_normal,
                            area_sum,
                            Self::weighted_center(weighted, area_sum, &self.nodes[idx].aabb),
                        )
                    },
                    NodeKind::Internal { left, right } => {
                        let (l, r) = (&moments[*left], &moments[*right]);
                        let weighted = l.center.coords * l.area + r.center.coords * r.area;
                        (
                            l.area_normal + r.area_normal,
                            l.area + r.area,
                            Self::weighted_center(weighted, l.area + r.area, &self.nodes[idx].aabb),
                        )
                    },
                };
                // The AABB bounds every vertex below this node
                let aabb = &self.nodes[idx].aabb;
                let radius = (0..8)
                    .map(|corner| {
                        let c = Point3::new(
                            if corner & 1 == 0 { aabb.mins.x } else { aabb.maxs.x },
                            if corner & 2 == 0 { aabb.mins.y } else { aabb.maxs.y },
                            if corner & 4 == 0 { aabb.mins.z } else { aabb.maxs.z },
                        );
                        (c - center).norm()
                    })
                    .fold(0.0, Real::max);
                moments[idx] = Dipole {
                    center,
                    area_normal,
                    area,
                    radius,
                };
            }
            moments
        })
    }

    fn weighted_center(weighted: Vector3<Real>, weight: Real, aabb: &Aabb) -> Point3<Real> {
        if weight > Real::EPSILON {
            Point3::from(weighted / weight)
        } else {
            aabb.center()
        }
    }

    /// Signed solid angle of one triangle seen from `p` (Van Oosterom–Strackee).
    #[inline]
    fn solid_angle(t: &Triangle, p: &Point3<Real>) -> Real {
        let (a, b, c) = (t.a - p, t.b - p, t.c - p);
        let (la, lb, lc) = (a.norm(), b.norm(), c.norm());
        let det = a.dot(&b.cross(&c));
        let denom = la * lb * lc + a.dot(&b) * lc + b.dot(&c) * la + c.dot(&a) * lb;
        2.0 * det.atan2(denom)
    }

    /// Generalized winding number at `p`: ~1 inside a closed outward mesh, ~0 outside.
    pub fn winding_number(&self, p: &Point3<Real>) -> Real {
        if self.nodes.is_empty() {
            return 0.0;
        }
        let moments = self.moments();
        let mut total = 0.0;
        let mut stack = vec![0usize];
        while let Some(idx) = stack.pop() {
            let m = &moments[idx];
            let d = m.center - p;
            let dist = d.norm();
            if dist > BETA * m.radius && dist > Real::EPSILON {
                total += m.area_normal.dot(&d) / (dist * dist * dist);
                continue;
            }
            match &self.nodes[idx].kind {
                NodeKind::Leaf { triangles } => {
                    total += triangles
                        .iter()
                        .map(|&t| Self::solid_angle(&self.triangles[t], p))
                        .sum::<Real>();
                },
                NodeKind::Internal { left, right } => {
                    stack.push(*left);
                    stack.push(*right);
                },
            }
        }
        // Full sphere is 4π steradians
        total / (2.0 * TAU)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn winding_inside_and_outside_sphere() {
        let bvh = TriangleBvh::new(&Mesh::sphere(1.0, 32, 16));
        assert!((bvh.winding_number(&Point3::origin()) - 1.0).abs() < 0.05);
        assert!(bvh.winding_number(&Point3::new(0.3, -0.2, 0.4)) > 0.9);
        assert!(bvh.winding_number(&Point3::new(5.0, 0.0, 0.0)).abs() < 0.05);
        assert!(bvh.winding_number(&Point3::new(1.5, 0.2, 0.1)) < 0.1);
    }

    #[test]
    fn winding_of_cube() {
        let bvh = TriangleBvh::new(&Mesh::cube(2.0));
        assert!((bvh.winding_number(&Point3::new(1.0, 1.0, 1.0)) - 1.0).abs() < 1e-9);
        assert!(bvh.winding_number(&Point3::new(-1.0, 1.0, 1.0)).abs() < 1e-9);
    }

    #[test]
    fn closest_distance_to_cube() {
        let bvh = TriangleBvh::new(&Mesh::cube(1.0));
        assert!((bvh.closest_distance(&Point3::new(0.5, 0.5, 0.5)) - 0.5).abs() < 1e-12);
        assert!((bvh.closest_distance(&Point3::new(3.0, 0.5, 0.5)) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn empty_mesh_queries() {
        let bvh = TriangleBvh::new(&Mesh::empty());
        assert_eq!(bvh.winding_number(&Point3::origin()), 0.0);
        assert_eq!(bvh.closest_distance(&Point3::origin()), Real::MAX);
    }
}
