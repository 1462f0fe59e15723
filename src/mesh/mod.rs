//! `Mesh`: the indexed triangle surface every Boolean strategy consumes and produces.

use crate::aabb::{self, AabbExt};
use crate::errors::ValidationError;
use crate::float_types::{Real, parry3d::bounding_volume::Aabb, tolerance};
use crate::mesh::{polygon::Polygon, vertex::Vertex};
use geo::{Coord, LineString, Polygon as GeoPolygon, TriangulateEarcut};
use hashbrown::HashMap;
use nalgebra::{Matrix4, Point3, Vector3};
use std::sync::OnceLock;

pub mod boolean;
pub mod bsp;
pub mod manifold;
pub mod plane;
pub mod polygon;
pub mod shapes;
pub mod vertex;

/// An indexed triangle mesh.
///
/// Every face index is valid within `vertices`; [`Mesh::new`] enforces this
/// and the engine only ever builds meshes through checked paths.
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    /// Vertex positions
    pub vertices: Vec<Point3<Real>>,

    /// Triangles as indices into `vertices`, counter-clockwise seen from outside
    pub faces: Vec<[usize; 3]>,

    /// Optional per-vertex normals, parallel to `vertices`
    pub normals: Option<Vec<Vector3<Real>>>,

    /// Lazily calculated AABB that spans `vertices`.
    pub bounding_box: OnceLock<Aabb>,
}

impl Mesh {
    /// Build a mesh, checking that coordinates are finite and indices are in range.
    pub fn new(vertices: Vec<Point3<Real>>, faces: Vec<[usize; 3]>) -> Result<Self, ValidationError> {
        if let Some(p) = vertices.iter().find(|p| !p.coords.iter().all(|c| c.is_finite())) {
            return Err(ValidationError::InvalidCoordinate(*p));
        }
        for (face_idx, face) in faces.iter().enumerate() {
            if let Some(&index) = face.iter().find(|&&i| i >= vertices.len()) {
                return Err(ValidationError::FaceIndexOutOfRange {
                    face: face_idx,
                    index,
                    vertex_count: vertices.len(),
                });
            }
        }
        Ok(Self::from_parts(vertices, faces))
    }

    /// Internal constructor for buffers already known to be consistent.
    pub(crate) fn from_parts(vertices: Vec<Point3<Real>>, faces: Vec<[usize; 3]>) -> Self {
        Mesh {
            vertices,
            faces,
            normals: None,
            bounding_box: OnceLock::new(),
        }
    }

    /// A mesh with no vertices and no faces
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a mesh from planar polygonal faces, ear-clipping each one into triangles.
    pub fn from_polygons(vertices: Vec<Point3<Real>>, polygons: &[Vec<usize>]) -> Result<Self, ValidationError> {
        let mut faces = Vec::with_capacity(polygons.len() * 2);
        for (face_idx, poly) in polygons.iter().enumerate() {
            if poly.len() < 3 {
                return Err(ValidationError::TooFewPoints { face: face_idx, count: poly.len() });
            }
            if let Some(&index) = poly.iter().find(|&&i| i >= vertices.len()) {
                return Err(ValidationError::FaceIndexOutOfRange {
                    face: face_idx,
                    index,
                    vertex_count: vertices.len(),
                });
            }
            if poly.len() == 3 {
                faces.push([poly[0], poly[1], poly[2]]);
            } else {
                faces.extend(triangulate_face(&vertices, poly));
            }
        }
        Self::new(vertices, faces)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Corner positions of face `i`
    #[inline]
    pub fn triangle(&self, i: usize) -> [Point3<Real>; 3] {
        let [a, b, c] = self.faces[i];
        [self.vertices[a], self.vertices[b], self.vertices[c]]
    }

    /// Deep copy with `mat` applied to every vertex. The input is left untouched.
    pub fn transformed(&self, mat: &Matrix4<Real>) -> Mesh {
        let mut mesh = self.clone();
        mesh.transform_mut(mat);
        mesh
    }

    /// Apply an affine transform in place, keeping normals consistent.
    pub fn transform_mut(&mut self, mat: &Matrix4<Real>) {
        for v in &mut self.vertices {
            *v = mat.transform_point(v);
        }
        // Mirroring transforms flip the winding
        if mat.fixed_view::<3, 3>(0, 0).into_owned().determinant() < 0.0 {
            for f in &mut self.faces {
                f.swap(1, 2);
            }
        }
        if self.normals.is_some() {
            self.compute_normals();
        }
        self.bounding_box = OnceLock::new();
    }

    /// Returns a [`parry3d::bounding_volume::Aabb`] spanning all vertices referenced or not.
    pub fn bounding_box(&self) -> Aabb {
        *self
            .bounding_box
            .get_or_init(|| Aabb::from_point_iter(&self.vertices).unwrap_or_else(aabb::degenerate))
    }

    /// Recompute area-weighted per-vertex normals from the face topology.
    pub fn compute_normals(&mut self) {
        let mut normals = vec![Vector3::zeros(); self.vertices.len()];
        for f in &self.faces {
            let [a, b, c] = [self.vertices[f[0]], self.vertices[f[1]], self.vertices[f[2]]];
            // Cross product length is twice the area, which weights the sum
            let n = (b - a).cross(&(c - a));
            for &i in f {
                normals[i] += n;
            }
        }
        for n in &mut normals {
            let len = n.norm();
            if len > Real::EPSILON {
                *n /= len;
            }
        }
        self.normals = Some(normals);
    }

    /// Signed enclosed volume (divergence theorem); positive for outward-facing solids.
    pub fn signed_volume(&self) -> Real {
        self.faces
            .iter()
            .map(|f| {
                let [a, b, c] = [self.vertices[f[0]], self.vertices[f[1]], self.vertices[f[2]]];
                a.coords.dot(&b.coords.cross(&c.coords))
            })
            .sum::<Real>()
            / 6.0
    }

    /// Convert every non-degenerate triangle into a BSP polygon.
    pub fn to_bsp_polygons(&self) -> Vec<Polygon> {
        self.faces
            .iter()
            .filter_map(|f| {
                Polygon::new(f.iter().map(|&i| Vertex::new(self.vertices[i])).collect())
            })
            .collect()
    }

    /// Fan-triangulate convex BSP fragments, weld vertices that coincide
    /// within [`tolerance`] and split the T-junctions left between fragments.
    pub fn from_bsp_polygons(polygons: &[Polygon]) -> Mesh {
        let tol = tolerance();
        let mut lookup: HashMap<[i64; 3], usize> = HashMap::new();
        let mut vertices = Vec::new();
        let mut faces = Vec::new();

        let mut index_of = |p: &Point3<Real>| -> usize {
            let key = [
                (p.x / tol).round() as i64,
                (p.y / tol).round() as i64,
                (p.z / tol).round() as i64,
            ];
            *lookup.entry(key).or_insert_with(|| {
                vertices.push(*p);
                vertices.len() - 1
            })
        };

        for poly in polygons {
            for [a, b, c] in poly.triangulate() {
                let tri = [index_of(&a), index_of(&b), index_of(&c)];
                if tri[0] != tri[1] && tri[1] != tri[2] && tri[0] != tri[2] {
                    faces.push(tri);
                }
            }
        }

        let mut mesh = Mesh::from_parts(vertices, faces);
        mesh.split_t_junctions();
        mesh
    }

    /// Flatten positions (through `mat`) and faces for the native accelerator.
    pub fn to_flat(&self, mat: &Matrix4<Real>) -> (Vec<f64>, Vec<i32>) {
        let vertices = self
            .vertices
            .iter()
            .flat_map(|v| {
                let p = mat.transform_point(v);
                [p.x, p.y, p.z]
            })
            .collect();
        let faces = self
            .faces
            .iter()
            .flat_map(|f| f.map(|i| i as i32))
            .collect();
        (vertices, faces)
    }

    /// Rebuild a mesh from flat buffers, validating counts and indices.
    pub fn from_flat(vertices: &[f64], faces: &[i32]) -> Result<Mesh, ValidationError> {
        if vertices.len() % 3 != 0 || faces.len() % 3 != 0 {
            return Err(ValidationError::Other(
                format!(
                    "flat buffers must hold whole triples (vertices: {}, faces: {})",
                    vertices.len(),
                    faces.len()
                ),
                None,
            ));
        }
        let points = vertices
            .chunks_exact(3)
            .map(|c| Point3::new(c[0], c[1], c[2]))
            .collect::<Vec<_>>();
        let mut tris = Vec::with_capacity(faces.len() / 3);
        for (face, c) in faces.chunks_exact(3).enumerate() {
            let mut tri = [0usize; 3];
            for (slot, &raw) in tri.iter_mut().zip(c) {
                *slot = usize::try_from(raw).map_err(|_| ValidationError::FaceIndexOutOfRange {
                    face,
                    index: usize::MAX,
                    vertex_count: points.len(),
                })?;
            }
            tris.push(tri);
        }
        Mesh::new(points, tris)
    }
}

/// Ear-clip one planar polygonal face, returning triangles in the face's winding.
fn triangulate_face(vertices: &[Point3<Real>], poly: &[usize]) -> Vec<[usize; 3]> {
    // Newell normal is robust to concave and nearly collinear corners
    let mut normal: Vector3<Real> = Vector3::zeros();
    for (i, &a) in poly.iter().enumerate() {
        let (p, q) = (vertices[a], vertices[poly[(i + 1) % poly.len()]]);
        normal.x += (p.y - q.y) * (p.z + q.z);
        normal.y += (p.z - q.z) * (p.x + q.x);
        normal.z += (p.x - q.x) * (p.y + q.y);
    }
    if normal.norm() <= Real::EPSILON {
        return Vec::new();
    }
    let normal = normal.normalize();
    let helper = if normal.x.abs() < 0.9 { Vector3::x() } else { Vector3::y() };
    let u = helper.cross(&normal).normalize();
    let v = normal.cross(&u);

    let coords: Vec<Coord<Real>> = poly
        .iter()
        .map(|&i| {
            let p = vertices[i].coords;
            Coord { x: p.dot(&u), y: p.dot(&v) }
        })
        .collect();
    let polygon = GeoPolygon::new(LineString::new(coords), vec![]);
    let triangulation = polygon.earcut_triangles_raw();

    let n = poly.len();
    let mut tris: Vec<[usize; 3]> = triangulation
        .triangle_indices
        .chunks_exact(3)
        .map(|t| [poly[t[0] % n], poly[t[1] % n], poly[t[2] % n]])
        .collect();

    // earcut does not promise an orientation; match the face's own winding
    for t in &mut tris {
        let [a, b, c] = [vertices[t[0]], vertices[t[1]], vertices[t[2]]];
        if (b - a).cross(&(c - a)).dot(&normal) < 0.0 {
            t.swap(1, 2);
        }
    }
    tris
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_out_of_range_face() {
        let err = Mesh::new(vec![Point3::origin(); 2], vec![[0, 1, 2]]).unwrap_err();
        assert!(matches!(err, ValidationError::FaceIndexOutOfRange { index: 2, .. }));
    }

    #[test]
    fn new_rejects_nan() {
        let err = Mesh::new(vec![Point3::new(Real::NAN, 0.0, 0.0)], vec![]).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidCoordinate(_)));
    }

    #[test]
    fn polygon_faces_are_triangulated() {
        // Unit square in the XY plane plus a concave L-shape
        let verts = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(2.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(1.0, 2.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
        ];
        let mesh = Mesh::from_polygons(verts, &[vec![0, 1, 2, 3, 4, 5]]).expect("valid polygon");
        assert_eq!(mesh.face_count(), 4);
        let area: Real = (0..mesh.face_count())
            .map(|i| {
                let [a, b, c] = mesh.triangle(i);
                (b - a).cross(&(c - a)).z * 0.5
            })
            .sum();
        assert!((area - 3.0).abs() < 1e-9, "area {area}");
    }

    #[test]
    fn transformed_leaves_input_alone() {
        let mesh = Mesh::cube(1.0);
        let moved = mesh.transformed(&Matrix4::new_translation(&Vector3::new(5.0, 0.0, 0.0)));
        assert_eq!(mesh.bounding_box().mins.x, 0.0);
        assert_eq!(moved.bounding_box().mins.x, 5.0);
    }

    #[test]
    fn mirror_keeps_volume_positive() {
        let mesh = Mesh::cube(1.0);
        let mirrored = mesh.transformed(&Matrix4::new_nonuniform_scaling(&Vector3::new(-1.0, 1.0, 1.0)));
        assert!((mirrored.signed_volume() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn flat_roundtrip_rejects_bad_indices() {
        assert!(Mesh::from_flat(&[0.0; 9], &[0, 1, 3]).is_err());
        assert!(Mesh::from_flat(&[0.0; 9], &[0, 1, -1]).is_err());
        assert!(Mesh::from_flat(&[0.0; 8], &[]).is_err());
    }
}
