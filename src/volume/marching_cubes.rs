//! Uniform marching cubes over an implicit function.

use crate::aabb::AabbExt;
use crate::errors::CsgError;
use crate::float_types::Real;
use crate::implicit::ImplicitFunction;
use crate::lattice::GridShape;
use crate::mesh::Mesh;
use crate::progress::CancellationToken;
use crate::volume::tables::{CORNER_OFFSETS, EDGE_CORNERS, EDGE_TABLE, TRI_TABLE};
use crate::volume::{BORDER_CUBES, find_crossing};
use hashbrown::HashMap;
use nalgebra::{Point3, Vector3};

/// Lattice edge: lower endpoint plus axis (0 = x, 1 = y, 2 = z).
type EdgeKey = (u32, u32, u32, u8);

/// Extract the zero level set of `field` with `cell_count` cubes across the
/// largest dimension of its bounds.
///
/// Corners are sampled one z-slab at a time and edge vertices are shared
/// between neighbouring cubes. Cancellation is checked once per slab.
pub fn extract(field: &ImplicitFunction, cell_count: u32, cancel: &CancellationToken) -> Result<Mesh, CsgError> {
    let bounds = field.bounds();
    if bounds.is_degenerate() || cell_count == 0 {
        return Ok(Mesh::empty());
    }

    let cube = bounds.max_dim() / cell_count as Real;
    let work = bounds.expanded(BORDER_CUBES * cube);
    let extent = work.maxs - work.mins;
    let cells = |e: Real| (e / cube).ceil().max(1.0) as u32;
    let (cx, cy, cz) = (cells(extent.x), cells(extent.y), cells(extent.z));
    let origin = work.mins;

    let point_at = |x: u32, y: u32, z: u32| {
        origin + Vector3::new(x as Real, y as Real, z as Real) * cube
    };

    // Two corner layers: slab index 0 is z, slab index 1 is z + 1
    let slab = GridShape::new(cx + 1, cy + 1, 2);
    let mut values = vec![0.0; slab.nx as usize * slab.ny as usize * 2];
    let sample_layer = |values: &mut [Real], layer: u32, z: u32| {
        for y in 0..=cy {
            for x in 0..=cx {
                values[slab.index(x, y, layer)] = field.value(&point_at(x, y, z));
            }
        }
    };
    sample_layer(&mut values, 0, 0);

    let mut vertices: Vec<Point3<Real>> = Vec::new();
    let mut faces: Vec<[usize; 3]> = Vec::new();
    let mut edge_vertex: HashMap<EdgeKey, usize> = HashMap::new();

    for z in 0..cz {
        cancel.check()?;
        sample_layer(&mut values, 1, z + 1);

        for y in 0..cy {
            for x in 0..cx {
                let mut corner_values = [0.0; 8];
                let mut case = 0usize;
                for (i, o) in CORNER_OFFSETS.iter().enumerate() {
                    let v = values[slab.index(x + o[0], y + o[1], o[2])];
                    corner_values[i] = v;
                    if v < 0.0 {
                        case |= 1 << i;
                    }
                }

                let crossed = EDGE_TABLE[case];
                if crossed == 0 {
                    continue;
                }

                let mut edge_index = [usize::MAX; 12];
                for (e, &[c0, c1]) in EDGE_CORNERS.iter().enumerate() {
                    if crossed & (1 << e) == 0 {
                        continue;
                    }
                    let (o0, o1) = (CORNER_OFFSETS[c0], CORNER_OFFSETS[c1]);
                    let axis = (0..3).find(|&a| o0[a] != o1[a]).unwrap_or(0);
                    let lo = if o0[axis] < o1[axis] { o0 } else { o1 };
                    let key = (x + lo[0], y + lo[1], z + lo[2], axis as u8);

                    edge_index[e] = *edge_vertex.entry(key).or_insert_with(|| {
                        let p0 = point_at(x + o0[0], y + o0[1], z + o0[2]);
                        let p1 = point_at(x + o1[0], y + o1[1], z + o1[2]);
                        vertices.push(find_crossing(field, p0, corner_values[c0], p1, corner_values[c1]));
                        vertices.len() - 1
                    });
                }

                // Table triangles wind toward the inside; swap to face outward
                for tri in TRI_TABLE[case].chunks_exact(3).take_while(|t| t[0] >= 0) {
                    let [a, b, c] = [tri[0], tri[1], tri[2]].map(|e| edge_index[e as usize]);
                    if a != b && b != c && a != c {
                        faces.push([a, c, b]);
                    }
                }
            }
        }

        // Slide the upper layer down
        let layer = slab.nx as usize * slab.ny as usize;
        values.copy_within(layer.., 0);
        // Edges below this z can never be looked up again
        edge_vertex.retain(|k, _| k.2 > z);
    }

    tracing::debug!(
        cube,
        vertices = vertices.len(),
        faces = faces.len(),
        "marching cubes finished"
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
    fn sphere_reconstruction_volume() {
        let sphere = Mesh::sphere(1.0, 32, 16);
        let field = implicit::build(&sphere, false, 32);
        let mesh = extract(&field, 32, &CancellationToken::new()).expect("not cancelled");
        let v = mesh.signed_volume();
        assert!((v - 4.0).abs() < 0.4, "volume {v}");
        assert!(mesh.normals.is_some());

        let bb = mesh.bounding_box();
        let cube = field.bounds().max_dim() / 32.0;
        let limit = field.bounds().expanded(3.0 * cube);
        assert!(bb.mins.x >= limit.mins.x && bb.maxs.x <= limit.maxs.x);
    }

    #[test]
    fn cancelled_before_first_slab() {
        let field = implicit::build(&Mesh::cube(1.0), false, 16);
        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(extract(&field, 16, &token), Err(CsgError::Cancelled)));
    }
}
