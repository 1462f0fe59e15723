//! Dense signed-distance grid sampled once and queried by trilinear interpolation.

use crate::aabb::AabbExt;
use crate::float_types::{Real, parry3d::bounding_volume::Aabb};
use crate::implicit::bvh::TriangleBvh;
use crate::lattice::GridShape;
use crate::mesh::Mesh;
use nalgebra::{Point3, Vector3};
use std::collections::VecDeque;

/// Cells of padding around the mesh bounds so the surface never touches the border.
const PAD_CELLS: u32 = 2;

/// Samples closer to the surface than this many cells get an explicit winding query.
/// Must stay above one cell so no surface can pass between two samples outside the band.
const BAND_CELLS: Real = 1.5;

/// Signed distances on a regular lattice: negative inside, positive outside.
#[derive(Debug, Clone)]
pub struct DistanceGrid {
    origin: Point3<Real>,
    cell_size: Real,
    shape: GridShape,
    values: Vec<Real>,
    bounds: Aabb,
}

impl DistanceGrid {
    /// Sample the signed distance to `mesh` with the given cell size.
    ///
    /// Magnitude comes from the closest triangle, sign from the winding
    /// number, so meshes with small gaps still classify sensibly. The winding
    /// number is only evaluated in a narrow band around the surface; every
    /// other sample inherits its sign from a neighbour. Degenerate meshes or
    /// cell sizes produce an empty grid over degenerate bounds.
    pub fn new(mesh: &Mesh, cell_size: Real) -> Self {
        let bounds = mesh.bounding_box();
        if bounds.is_degenerate() || !(cell_size.is_finite() && cell_size > 0.0) {
            return Self::empty(bounds);
        }

        let bvh = TriangleBvh::new(mesh);
        bvh.precompute();

        let pad = cell_size * PAD_CELLS as Real;
        let origin = bounds.mins - Vector3::repeat(pad);
        let extent = bounds.maxs - bounds.mins;
        let count = |e: Real| (e / cell_size).ceil() as u32 + 1 + 2 * PAD_CELLS;
        let shape = GridShape::new(count(extent.x), count(extent.y), count(extent.z));

        let point_at = |i: usize| {
            let [x, y, z] = shape.coords(i);
            origin + Vector3::new(x as Real, y as Real, z as Real) * cell_size
        };

        let mut values: Vec<Real> = (0..shape.len()).map(|i| bvh.closest_distance(&point_at(i))).collect();
        let (inside, band) = classify(shape, &values, cell_size * BAND_CELLS, |i| {
            bvh.winding_number(&point_at(i)) >= 0.5
        });
        for (d, inside) in values.iter_mut().zip(inside) {
            if inside {
                *d = -*d;
            }
        }

        tracing::debug!(
            nx = shape.nx,
            ny = shape.ny,
            nz = shape.nz,
            cell_size,
            band,
            "sampled signed-distance grid"
        );

        let far = origin
            + Vector3::new(
                (shape.nx - 1) as Real,
                (shape.ny - 1) as Real,
                (shape.nz - 1) as Real,
            ) * cell_size;

        DistanceGrid {
            origin,
            cell_size,
            shape,
            values,
            bounds: Aabb::new(origin, far),
        }
    }

    fn empty(bounds: Aabb) -> Self {
        DistanceGrid {
            origin: bounds.mins,
            cell_size: 0.0,
            shape: GridShape::new(0, 0, 0),
            values: Vec::new(),
            bounds,
        }
    }

    /// World-space box covered by the samples
    pub const fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub const fn cell_size(&self) -> Real {
        self.cell_size
    }

    pub const fn origin(&self) -> Point3<Real> {
        self.origin
    }

    pub const fn shape(&self) -> GridShape {
        self.shape
    }

    #[inline]
    fn sample(&self, x: u32, y: u32, z: u32) -> Real {
        self.values[self.shape.index(x, y, z)]
    }

    /// Trilinear interpolation of the stored samples.
    ///
    /// Outside the lattice the nearest border value is extended by the
    /// distance to the lattice box, which keeps the field positive and
    /// growing away from the solid.
    pub fn value(&self, p: &Point3<Real>) -> Real {
        if self.values.is_empty() {
            return Real::MAX;
        }

        let local = (p - self.origin) / self.cell_size;
        let mut cell = [0u32; 3];
        let mut frac = [0.0; 3];
        let dims = [self.shape.nx, self.shape.ny, self.shape.nz];
        for axis in 0..3 {
            let max = (dims[axis] - 1) as Real;
            let c = local[axis].clamp(0.0, max);
            // Lower corner of the cell, never the last sample so +1 stays in range
            let i = (c.floor() as u32).min(dims[axis].saturating_sub(2));
            cell[axis] = i;
            frac[axis] = if dims[axis] > 1 { c - i as Real } else { 0.0 };
        }

        let [x, y, z] = cell;
        let step = |i: u32, axis: usize| if dims[axis] > 1 { i + 1 } else { i };
        let (x1, y1, z1) = (step(x, 0), step(y, 1), step(z, 2));
        let [fx, fy, fz] = frac;

        let lerp = |a: Real, b: Real, t: Real| a + (b - a) * t;
        let c00 = lerp(self.sample(x, y, z), self.sample(x1, y, z), fx);
        let c10 = lerp(self.sample(x, y1, z), self.sample(x1, y1, z), fx);
        let c01 = lerp(self.sample(x, y, z1), self.sample(x1, y, z1), fx);
        let c11 = lerp(self.sample(x, y1, z1), self.sample(x1, y1, z1), fx);
        let interpolated = lerp(lerp(c00, c10, fy), lerp(c01, c11, fy), fz);

        interpolated + self.bounds.distance_to(p)
    }
}

/// Inside/outside flag for every sample of `shape`, plus how many samples were
/// queried with `is_inside`.
///
/// Only samples within `band` of the surface are queried. Two adjacent samples
/// both farther than one cell from the surface cannot have it between them, so
/// the rest take their sign from a breadth-first flood out of the band.
/// Unreached samples count as outside.
fn classify(
    shape: GridShape,
    distances: &[Real],
    band: Real,
    is_inside: impl Fn(usize) -> bool,
) -> (Vec<bool>, usize) {
    let mut sign: Vec<Option<bool>> = vec![None; distances.len()];
    let mut queue = VecDeque::new();
    for (i, &d) in distances.iter().enumerate() {
        if d <= band {
            sign[i] = Some(is_inside(i));
            queue.push_back(i);
        }
    }
    let queried = queue.len();

    while let Some(i) = queue.pop_front() {
        let inside = sign[i];
        for n in shape.neighbours(i) {
            if sign[n].is_none() {
                sign[n] = inside;
                queue.push_back(n);
            }
        }
    }

    (sign.into_iter().map(|s| s.unwrap_or(false)).collect(), queried)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_distances() {
        let grid = DistanceGrid::new(&Mesh::cube(1.0), 0.1);
        // Lattice points line up with the cube faces
        assert!((grid.value(&Point3::new(0.5, 0.5, 0.5)) + 0.5).abs() < 1e-9);
        assert!((grid.value(&Point3::new(1.2, 0.5, 0.5)) - 0.2).abs() < 1e-9);
        assert!(grid.value(&Point3::new(0.0, 0.5, 0.5)).abs() < 1e-9);
    }

    #[test]
    fn outside_lattice_grows_with_distance() {
        let grid = DistanceGrid::new(&Mesh::cube(1.0), 0.1);
        let near = grid.value(&Point3::new(2.0, 0.5, 0.5));
        let far = grid.value(&Point3::new(4.0, 0.5, 0.5));
        assert!(near > 0.0);
        assert!(far > near + 1.5);
    }

    #[test]
    fn narrow_band_signs_match_full_winding() {
        let sphere = Mesh::sphere(1.0, 16, 8);
        let cell = 0.1;
        let grid = DistanceGrid::new(&sphere, cell);
        let bvh = TriangleBvh::new(&sphere);
        bvh.precompute();

        let shape = grid.shape();
        for i in 0..shape.len() {
            let d = grid.values[i];
            if d.abs() < 1e-9 {
                continue;
            }
            let [x, y, z] = shape.coords(i);
            let p = grid.origin() + Vector3::new(x as Real, y as Real, z as Real) * cell;
            assert_eq!(d < 0.0, bvh.winding_number(&p) >= 0.5, "sample {p:?} distance {d}");
        }
    }

    #[test]
    fn only_band_samples_are_queried() {
        // 1D row of distances: surface between samples 4 and 5
        let shape = GridShape::new(10, 1, 1);
        let distances = [4.5, 3.5, 2.5, 1.5, 0.5, 0.5, 1.5, 2.5, 3.5, 4.5];
        let queried = std::cell::Cell::new(0);
        let (inside, band) = classify(shape, &distances, 1.5, |i| {
            queried.set(queried.get() + 1);
            i >= 5
        });
        assert_eq!(band, 4);
        assert_eq!(queried.get(), 4);
        assert_eq!(inside, [false, false, false, false, false, true, true, true, true, true]);
    }

    #[test]
    fn degenerate_mesh_gives_degenerate_bounds() {
        let point = Mesh::new(vec![Point3::new(1.0, 1.0, 1.0); 3], vec![[0, 1, 2]]).expect("valid");
        let grid = DistanceGrid::new(&point, 0.1);
        assert!(grid.bounds().is_degenerate());
        assert!(grid.value(&Point3::origin()) > 0.0);
    }
}
