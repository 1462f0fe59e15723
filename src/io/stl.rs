use super::IoError;
use crate::float_types::Real;
use crate::mesh::Mesh;
use crate::mesh::polygon::Polygon;
use crate::mesh::vertex::Vertex;
use nalgebra::{Point3, Vector3};
use std::fmt::Write as _;
use std::io::Cursor;

fn facet_normal(tri: &[Point3<Real>; 3]) -> Vector3<Real> {
    (tri[1] - tri[0])
        .cross(&(tri[2] - tri[0]))
        .try_normalize(Real::EPSILON)
        .unwrap_or_else(Vector3::zeros)
}

/// Convert `mesh` to an **ASCII STL** string with the given solid `name`.
///
/// ```rust
/// # use meshcsg::mesh::Mesh;
/// let text = meshcsg::io::to_stl_ascii(&Mesh::cube(1.0), "cube");
/// assert!(text.starts_with("solid cube"));
/// ```
pub fn to_stl_ascii(mesh: &Mesh, name: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "solid {name}");

    for i in 0..mesh.face_count() {
        let tri = mesh.triangle(i);
        let n = facet_normal(&tri);
        let _ = writeln!(out, "  facet normal {:.6} {:.6} {:.6}", n.x, n.y, n.z);
        out.push_str("    outer loop\n");
        for p in &tri {
            let _ = writeln!(out, "      vertex {:.6} {:.6} {:.6}", p.x, p.y, p.z);
        }
        out.push_str("    endloop\n");
        out.push_str("  endfacet\n");
    }

    let _ = writeln!(out, "endsolid {name}");
    out
}

/// Convert `mesh` to a **binary STL** byte vector. Binary STL carries no solid name.
pub fn to_stl_binary(mesh: &Mesh, _name: &str) -> Result<Vec<u8>, IoError> {
    use stl_io::{Normal, Triangle, Vertex, write_stl};

    let triangles: Vec<Triangle> = (0..mesh.face_count())
        .map(|i| {
            let tri = mesh.triangle(i);
            let n = facet_normal(&tri);
            Triangle {
                normal: Normal::new([n.x as f32, n.y as f32, n.z as f32]),
                vertices: tri.map(|p| Vertex::new([p.x as f32, p.y as f32, p.z as f32])),
            }
        })
        .collect();

    let mut cursor = Cursor::new(Vec::new());
    write_stl(&mut cursor, triangles.iter())?;
    Ok(cursor.into_inner())
}

/// Read ASCII or binary STL data, welding coincident corners into shared vertices.
pub fn from_stl(stl_data: &[u8]) -> Result<Mesh, IoError> {
    let mut cursor = Cursor::new(stl_data);
    let stl_reader = stl_io::create_stl_reader(&mut cursor)?;

    let mut polygons = Vec::new();
    for tri_result in stl_reader {
        let tri = tri_result?;
        let vertices = tri
            .vertices
            .iter()
            .map(|v| Vertex::new(Point3::new(v[0] as Real, v[1] as Real, v[2] as Real)))
            .collect();
        // zero-area facets carry no volume
        if let Some(poly) = Polygon::new(vertices) {
            polygons.push(poly);
        }
    }

    if polygons.is_empty() {
        return Err(IoError::MalformedInput("STL contains no usable facets".to_string()));
    }
    Ok(Mesh::from_bsp_polygons(&polygons))
}

impl Mesh {
    pub fn to_stl_ascii(&self, name: &str) -> String {
        self::to_stl_ascii(self, name)
    }

    pub fn to_stl_binary(&self, name: &str) -> Result<Vec<u8>, IoError> {
        self::to_stl_binary(self, name)
    }

    pub fn from_stl(stl_data: &[u8]) -> Result<Mesh, IoError> {
        self::from_stl(stl_data)
    }
}
