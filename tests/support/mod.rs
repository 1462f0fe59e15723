//! Test support library
//! Provides various helper functions & utilities for tests.
#![allow(dead_code)]

use meshcsg::{
    CsgEngine, Mesh,
    csg::BooleanOptions,
    float_types::Real,
    native::NoAccelerator,
};
use nalgebra::{Matrix4, Vector3};

/// Returns the bounding box `[min_x, min_y, min_z, max_x, max_y, max_z]` of a mesh's vertices.
pub fn bounding_box(mesh: &Mesh) -> [Real; 6] {
    let mut bb = [Real::MAX, Real::MAX, Real::MAX, Real::MIN, Real::MIN, Real::MIN];
    for p in &mesh.vertices {
        for axis in 0..3 {
            bb[axis] = bb[axis].min(p[axis]);
            bb[axis + 3] = bb[axis + 3].max(p[axis]);
        }
    }
    bb
}

/// Quick helper to compare floating-point results with an acceptable tolerance.
pub fn approx_eq(a: Real, b: Real, eps: Real) -> bool {
    (a - b).abs() < eps
}

pub fn assert_bbox(mesh: &Mesh, expected: [Real; 6], eps: Real) {
    let bb = bounding_box(mesh);
    for (got, want) in bb.iter().zip(expected) {
        assert!(approx_eq(*got, want, eps), "bounding box {bb:?} != {expected:?}");
    }
}

pub fn translation(x: Real, y: Real, z: Real) -> Matrix4<Real> {
    Matrix4::new_translation(&Vector3::new(x, y, z))
}

/// Engine that never consults an external accelerator.
pub fn local_engine(options: BooleanOptions) -> CsgEngine {
    CsgEngine::new(options).with_accelerator(NoAccelerator)
}
