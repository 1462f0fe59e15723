//! Surface reconstruction from bounded implicit functions.
//!
//! Two extractors share the same root finder and working bounds:
//! uniform marching cubes and adaptive octree dual contouring.

pub mod marching_cubes;
pub mod octree;
pub mod tables;

use crate::errors::CsgError;
use crate::float_types::Real;
use crate::implicit::ImplicitFunction;
use crate::mesh::Mesh;
use crate::progress::CancellationToken;
use nalgebra::Point3;

/// Refinement steps of the edge root finder.
pub const LERP_STEPS: usize = 5;

/// Working bounds are grown by this many cubes so the surface is never clipped.
pub const BORDER_CUBES: Real = 3.0;

/// Reconstruct a mesh from `field` with `output_cell_count` cubes across its
/// largest dimension, using octree dual contouring when `adaptive` is set.
pub fn reconstruct(
    field: &ImplicitFunction,
    output_cell_count: u32,
    adaptive: bool,
    cancel: &CancellationToken,
) -> Result<Mesh, CsgError> {
    if adaptive {
        octree::extract(field, output_cell_count, cancel)
    } else {
        marching_cubes::extract(field, output_cell_count, cancel)
    }
}

/// Locate the zero crossing on the segment `p0`-`p1` by repeated linear
/// interpolation, keeping the sub-segment that still brackets the root.
pub fn find_crossing(
    field: &ImplicitFunction,
    mut p0: Point3<Real>,
    mut v0: Real,
    mut p1: Point3<Real>,
    mut v1: Real,
) -> Point3<Real> {
    let lerp = |p0: &Point3<Real>, v0: Real, p1: &Point3<Real>, v1: Real| {
        let denom = v0 - v1;
        let t = if denom.abs() > Real::EPSILON { (v0 / denom).clamp(0.0, 1.0) } else { 0.5 };
        p0 + (p1 - p0) * t
    };

    let mut p = lerp(&p0, v0, &p1, v1);
    for _ in 0..LERP_STEPS {
        let v = field.value(&p);
        if v == 0.0 {
            break;
        }
        if (v < 0.0) == (v0 < 0.0) {
            p0 = p;
            v0 = v;
        } else {
            p1 = p;
            v1 = v;
        }
        p = lerp(&p0, v0, &p1, v1);
    }
    p
}
