//! Primitive solids used by the demo binary and the test-suite.

use crate::float_types::{PI, Real, TAU};
use crate::mesh::Mesh;
use nalgebra::Point3;

impl Mesh {
    /// Axis-aligned box with one corner at the origin.
    ///
    /// ```text
    ///     4-------5
    ///    /|      /|
    ///   0-------1 |
    ///   | |     | |
    ///   | 7-----|-6
    ///   |/      |/
    ///   3-------2
    /// ```
    pub fn cuboid(width: Real, length: Real, height: Real) -> Mesh {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(width, 0.0, 0.0),
            Point3::new(width, length, 0.0),
            Point3::new(0.0, length, 0.0),
            Point3::new(0.0, 0.0, height),
            Point3::new(width, 0.0, height),
            Point3::new(width, length, height),
            Point3::new(0.0, length, height),
        ];

        // CCW from outside
        let faces = [
            [0, 3, 2, 1], // bottom, -Z
            [4, 5, 6, 7], // top, +Z
            [0, 1, 5, 4], // front, -Y
            [3, 7, 6, 2], // back, +Y
            [0, 4, 7, 3], // left, -X
            [1, 2, 6, 5], // right, +X
        ];

        let triangles = faces
            .iter()
            .flat_map(|&[a, b, c, d]| [[a, b, c], [a, c, d]])
            .collect();

        Mesh::from_parts(vertices, triangles)
    }

    /// Cube of side `size` spanning `[0, size]` on every axis
    pub fn cube(size: Real) -> Mesh {
        Self::cuboid(size, size, size)
    }

    /// UV sphere centred at the origin.
    ///
    /// `segments` is clamped to at least 3 and `stacks` to at least 2.
    pub fn sphere(radius: Real, segments: usize, stacks: usize) -> Mesh {
        let segments = segments.max(3);
        let stacks = stacks.max(2);

        let mut vertices = Vec::with_capacity(2 + (stacks - 1) * segments);
        vertices.push(Point3::new(0.0, 0.0, radius));
        for i in 1..stacks {
            let phi = PI * i as Real / stacks as Real;
            let (ring, z) = (radius * phi.sin(), radius * phi.cos());
            for j in 0..segments {
                let theta = TAU * j as Real / segments as Real;
                vertices.push(Point3::new(ring * theta.cos(), ring * theta.sin(), z));
            }
        }
        let bottom = vertices.len();
        vertices.push(Point3::new(0.0, 0.0, -radius));

        let ring = |i: usize, j: usize| 1 + (i - 1) * segments + j % segments;
        let mut faces = Vec::with_capacity(2 * stacks * segments);
        for j in 0..segments {
            faces.push([0, ring(1, j), ring(1, j + 1)]);
        }
        for i in 1..stacks - 1 {
            for j in 0..segments {
                let (a0, a1) = (ring(i, j), ring(i, j + 1));
                let (b0, b1) = (ring(i + 1, j), ring(i + 1, j + 1));
                faces.push([a0, b0, b1]);
                faces.push([a0, b1, a1]);
            }
        }
        for j in 0..segments {
            faces.push([bottom, ring(stacks - 1, j + 1), ring(stacks - 1, j)]);
        }

        Mesh::from_parts(vertices, faces)
    }
}
