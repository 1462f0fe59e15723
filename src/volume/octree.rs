//! Adaptive octree dual contouring with QEF vertex placement and vertex clustering.
//!
//! The octree spans a cube lattice of `2^depth` finest cells. Finest cells
//! crossed by the surface place one vertex minimizing the quadratic error of
//! their Hermite samples. Subtrees whose merged error stays small collapse
//! into one vertex, so flat regions end up with few triangles. Faces are
//! emitted per sign-changing finest edge, joining the vertices that
//! represent the four cells around it.

use crate::aabb::AabbExt;
use crate::errors::CsgError;
use crate::float_types::Real;
use crate::implicit::ImplicitFunction;
use crate::mesh::Mesh;
use crate::progress::CancellationToken;
use crate::volume::tables::{CORNER_OFFSETS, EDGE_CORNERS};
use crate::volume::{BORDER_CUBES, find_crossing};
use hashbrown::HashMap;
use nalgebra::{Matrix3, Point3, Vector3};

/// Occupancy and simplification threshold.
pub const THRESHOLD: Real = 0.001;

/// Singular values below this are ignored when solving a QEF.
const SVD_TRUNCATION: Real = 0.1;

/// Finest lattice edge: lower endpoint plus axis.
type EdgeKey = ([u32; 3], usize);

/// Quadratic error function accumulated from surface points and normals.
#[derive(Debug, Clone, Copy)]
struct Qef {
    ata: Matrix3<Real>,
    atb: Vector3<Real>,
    btb: Real,
    mass_sum: Vector3<Real>,
    count: u32,
}

impl Default for Qef {
    fn default() -> Self {
        Qef {
            ata: Matrix3::zeros(),
            atb: Vector3::zeros(),
            btb: 0.0,
            mass_sum: Vector3::zeros(),
            count: 0,
        }
    }
}

impl Qef {
    fn add(&mut self, p: &Point3<Real>, n: &Vector3<Real>) {
        let d = n.dot(&p.coords);
        self.ata += n * n.transpose();
        self.atb += n * d;
        self.btb += d * d;
        self.mass_sum += p.coords;
        self.count += 1;
    }

    fn merge(&mut self, other: &Qef) {
        self.ata += other.ata;
        self.atb += other.atb;
        self.btb += other.btb;
        self.mass_sum += other.mass_sum;
        self.count += other.count;
    }

    fn mass_point(&self) -> Point3<Real> {
        Point3::from(self.mass_sum / self.count.max(1) as Real)
    }

    fn error_at(&self, x: &Point3<Real>) -> Real {
        let x = x.coords;
        (x.dot(&(self.ata * x)) - 2.0 * x.dot(&self.atb) + self.btb).max(0.0)
    }

    /// Minimizer relative to the mass point, plus its residual.
    fn solve(&self) -> (Point3<Real>, Real) {
        let mass = self.mass_point();
        let rhs = self.atb - self.ata * mass.coords;
        let x = match self.ata.svd(true, true).pseudo_inverse(SVD_TRUNCATION) {
            Ok(pinv) => mass + pinv * rhs,
            Err(_) => mass,
        };
        (x, self.error_at(&x))
    }
}

/// Vertex shared by one or more finest cells.
struct Cluster {
    qef: Qef,
    vertex: Point3<Real>,
    cells: Vec<[u32; 3]>,
    alive: bool,
}

enum Node {
    Empty,
    Leaf(usize),
    Internal,
}

struct Builder<'a> {
    field: &'a ImplicitFunction,
    cancel: &'a CancellationToken,
    origin: Point3<Real>,
    h: Real,
    max_depth: u32,
    min_depth: u32,
    corner_cache: HashMap<[u32; 3], Real>,
    crossings: HashMap<EdgeKey, (Point3<Real>, Vector3<Real>)>,
    clusters: Vec<Cluster>,
}

impl Builder<'_> {
    fn point(&self, c: [u32; 3]) -> Point3<Real> {
        self.origin + Vector3::new(c[0] as Real, c[1] as Real, c[2] as Real) * self.h
    }

    fn value(&mut self, c: [u32; 3]) -> Real {
        if let Some(&v) = self.corner_cache.get(&c) {
            return v;
        }
        let v = self.field.value(&self.point(c));
        self.corner_cache.insert(c, v);
        v
    }

    fn contains(&self, cell: [u32; 3], size: u32, p: &Point3<Real>) -> bool {
        let lo = self.point(cell);
        let hi = lo + Vector3::repeat(size as Real * self.h);
        let slack = self.h * 1e-6;
        (0..3).all(|a| p[a] >= lo[a] - slack && p[a] <= hi[a] + slack)
    }

    /// Surface point and outward normal on a sign-changing finest edge.
    fn crossing(&mut self, lo: [u32; 3], axis: usize) -> (Point3<Real>, Vector3<Real>) {
        if let Some(hit) = self.crossings.get(&(lo, axis)) {
            return *hit;
        }
        let mut hi = lo;
        hi[axis] += 1;
        let (v0, v1) = (self.value(lo), self.value(hi));
        let p = find_crossing(self.field, self.point(lo), v0, self.point(hi), v1);

        let e = self.h * 0.1;
        let mut n = Vector3::zeros();
        for a in 0..3 {
            let mut d = Vector3::zeros();
            d[a] = e;
            n[a] = self.field.value(&(p + d)) - self.field.value(&(p - d));
        }
        let n = if n.norm() > Real::EPSILON {
            n.normalize()
        } else {
            // Field grows outward along the edge
            let mut n = Vector3::zeros();
            n[axis] = if v1 > v0 { 1.0 } else { -1.0 };
            n
        };

        self.crossings.insert((lo, axis), (p, n));
        (p, n)
    }

    fn finest_leaf(&mut self, cell: [u32; 3]) -> Node {
        let mut corner = [0.0; 8];
        for (i, o) in CORNER_OFFSETS.iter().enumerate() {
            corner[i] = self.value([cell[0] + o[0], cell[1] + o[1], cell[2] + o[2]]);
        }
        let inside = corner.iter().filter(|v| **v < 0.0).count();
        if inside == 0 || inside == 8 {
            return Node::Empty;
        }

        let mut qef = Qef::default();
        for &[c0, c1] in &EDGE_CORNERS {
            if (corner[c0] < 0.0) == (corner[c1] < 0.0) {
                continue;
            }
            let (o0, o1) = (CORNER_OFFSETS[c0], CORNER_OFFSETS[c1]);
            let axis = (0..3).find(|&a| o0[a] != o1[a]).unwrap_or(0);
            let lo_offset = if o0[axis] < o1[axis] { o0 } else { o1 };
            let lo = [cell[0] + lo_offset[0], cell[1] + lo_offset[1], cell[2] + lo_offset[2]];
            let (p, n) = self.crossing(lo, axis);
            qef.add(&p, &n);
        }

        let (mut vertex, _) = qef.solve();
        if !self.contains(cell, 1, &vertex) {
            vertex = qef.mass_point();
        }
        self.clusters.push(Cluster {
            qef,
            vertex,
            cells: vec![cell],
            alive: true,
        });
        Node::Leaf(self.clusters.len() - 1)
    }

    fn build(&mut self, cell: [u32; 3], size: u32, depth: u32) -> Result<Node, CsgError> {
        if depth == self.max_depth {
            return Ok(self.finest_leaf(cell));
        }
        self.cancel.check()?;

        if depth >= self.min_depth {
            let half = size / 2;
            let mut samples = CORNER_OFFSETS
                .iter()
                .map(|o| [cell[0] + o[0] * size, cell[1] + o[1] * size, cell[2] + o[2] * size])
                .collect::<Vec<_>>();
            samples.push([cell[0] + half, cell[1] + half, cell[2] + half]);
            let values: Vec<Real> = samples.into_iter().map(|c| self.value(c)).collect();
            let inside = values.iter().filter(|v| **v < 0.0).count();
            let near = values.iter().any(|v| v.abs() < THRESHOLD);
            if !near && (inside == 0 || inside == values.len()) {
                return Ok(Node::Empty);
            }
        }

        let half = size / 2;
        let mut leaves = Vec::with_capacity(8);
        let mut has_internal = false;
        for o in CORNER_OFFSETS {
            let child = [cell[0] + o[0] * half, cell[1] + o[1] * half, cell[2] + o[2] * half];
            match self.build(child, half, depth + 1)? {
                Node::Empty => {},
                Node::Leaf(idx) => leaves.push(idx),
                Node::Internal => has_internal = true,
            }
        }

        if has_internal {
            return Ok(Node::Internal);
        }
        if leaves.is_empty() {
            return Ok(Node::Empty);
        }
        if depth < self.min_depth {
            return Ok(Node::Internal);
        }

        // Try to collapse every child vertex into one
        let mut qef = Qef::default();
        for &idx in &leaves {
            qef.merge(&self.clusters[idx].qef);
        }
        let (vertex, error) = qef.solve();
        if error > THRESHOLD || !self.contains(cell, size, &vertex) {
            return Ok(Node::Internal);
        }

        let mut cells = Vec::new();
        for &idx in &leaves {
            let child = &mut self.clusters[idx];
            child.alive = false;
            cells.append(&mut child.cells);
        }
        self.clusters.push(Cluster {
            qef,
            vertex,
            cells,
            alive: true,
        });
        Ok(Node::Leaf(self.clusters.len() - 1))
    }
}

/// Extract the zero level set of `field` on an octree of depth
/// `log2(cell_count)` spanning its bounds plus a border of three cells.
pub fn extract(field: &ImplicitFunction, cell_count: u32, cancel: &CancellationToken) -> Result<Mesh, CsgError> {
    let bounds = field.bounds();
    if bounds.is_degenerate() || cell_count == 0 {
        return Ok(Mesh::empty());
    }

    let max_depth = cell_count.next_power_of_two().trailing_zeros();
    let n = 1u32 << max_depth;
    let cube = bounds.max_dim() / cell_count as Real;
    let side = bounds.max_dim() + 2.0 * BORDER_CUBES * cube;
    let h = side / n as Real;
    let origin = bounds.center() - Vector3::repeat(side * 0.5);

    let mut builder = Builder {
        field,
        cancel,
        origin,
        h,
        max_depth,
        min_depth: max_depth / 2,
        corner_cache: HashMap::new(),
        crossings: HashMap::new(),
        clusters: Vec::new(),
    };
    builder.build([0, 0, 0], n, 0)?;

    // Representative vertex of every surface cell
    let mut vertices = Vec::new();
    let mut cell_vertex: HashMap<[u32; 3], usize> = HashMap::new();
    for cluster in builder.clusters.iter().filter(|c| c.alive) {
        vertices.push(cluster.vertex);
        for &cell in &cluster.cells {
            cell_vertex.insert(cell, vertices.len() - 1);
        }
    }

    let mut edges: Vec<EdgeKey> = builder.crossings.keys().copied().collect();
    edges.sort_unstable();

    let mut faces = Vec::new();
    for (lo, axis) in edges {
        let (u, v) = ((axis + 1) % 3, (axis + 2) % 3);
        // Counter-clockwise around the edge seen from +axis
        let quad = [(-1i64, -1i64), (0, -1), (0, 0), (-1, 0)].map(|(du, dv)| {
            let mut c = lo.map(i64::from);
            c[u] += du;
            c[v] += dv;
            if c[u] < 0 || c[v] < 0 {
                return None;
            }
            cell_vertex.get(&c.map(|x| x as u32)).copied()
        });
        let [Some(q0), Some(q1), Some(q2), Some(q3)] = quad else {
            continue;
        };
        let inside_below = builder.corner_cache.get(&lo).is_some_and(|v| *v < 0.0);
        let [q0, q1, q2, q3] = if inside_below { [q0, q1, q2, q3] } else { [q0, q3, q2, q1] };
        for tri in [[q0, q1, q2], [q0, q2, q3]] {
            if tri[0] != tri[1] && tri[1] != tri[2] && tri[0] != tri[2] {
                faces.push(tri);
            }
        }
    }

    tracing::debug!(
        depth = max_depth,
        samples = builder.corner_cache.len(),
        vertices = vertices.len(),
        faces = faces.len(),
        "dual contouring finished"
    );

    let mut mesh = Mesh::from_parts(vertices, faces);
    mesh.compute_normals();
    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::implicit;

    #[test]
    fn qef_recovers_box_corner() {
        let mut qef = Qef::default();
        qef.add(&Point3::new(1.0, 0.3, 0.2), &Vector3::x());
        qef.add(&Point3::new(0.4, 1.0, 0.1), &Vector3::y());
        qef.add(&Point3::new(0.2, 0.6, 1.0), &Vector3::z());
        let (x, err) = qef.solve();
        assert!((x - Point3::new(1.0, 1.0, 1.0)).norm() < 1e-9);
        assert!(err < 1e-12);
    }

    #[test]
    fn cube_reconstruction_keeps_volume_and_sharp_corners() {
        let field = implicit::build(&Mesh::cube(1.0), false, 32);
        let mesh = extract(&field, 32, &CancellationToken::new()).expect("not cancelled");
        let v = mesh.signed_volume();
        assert!((v - 1.0).abs() < 0.1, "volume {v}");
        let bb = mesh.bounding_box();
        assert!(bb.mins.x > -0.1 && bb.maxs.x < 1.1);
    }

    #[test]
    fn adaptive_uses_fewer_triangles_than_uniform() {
        let field = implicit::build(&Mesh::cube(1.0), false, 32);
        let token = CancellationToken::new();
        let adaptive = extract(&field, 32, &token).expect("not cancelled");
        let uniform = crate::volume::marching_cubes::extract(&field, 32, &token).expect("not cancelled");
        assert!(adaptive.face_count() > 0);
        assert!(adaptive.face_count() < uniform.face_count());
    }
}
