//! Polygon-level Boolean on two triangle meshes using BSP clipping.

use crate::csg::CsgOperation;
use crate::errors::CsgError;
use crate::float_types::{Real, parry3d::bounding_volume::{Aabb, BoundingVolume}};
use crate::mesh::{Mesh, bsp::Node, polygon::Polygon};
use crate::progress::CancellationToken;

/// Split polygons into (may_touch, cannot_touch) using bounding‑box tests
fn partition_polys(polys: Vec<Polygon>, other_bb: &Aabb) -> (Vec<Polygon>, Vec<Polygon>) {
    polys
        .into_iter()
        .partition(|p| p.bounding_box().intersects(other_bb))
}

/// Combine two world-space meshes.
///
/// `on_progress` receives a phase label and a fraction local to this call.
/// Cancellation is checked before every clipping phase; a triggered token
/// aborts with [`CsgError::Cancelled`] instead of returning a partial mesh.
pub fn combine(
    a: &Mesh,
    b: &Mesh,
    operation: CsgOperation,
    on_progress: &mut dyn FnMut(&str, Real),
    cancel: &CancellationToken,
) -> Result<Mesh, CsgError> {
    const PHASES: Real = 8.0;
    let mut phase = 0.0;
    let mut step = |label: &str| -> Result<(), CsgError> {
        cancel.check()?;
        on_progress(label, phase / PHASES);
        phase += 1.0;
        Ok(())
    };

    step("Building BSP")?;
    let (a_bb, b_bb) = (a.bounding_box(), b.bounding_box());
    let (a_clip, a_passthru) = partition_polys(a.to_bsp_polygons(), &b_bb);
    let (b_clip, b_passthru) = partition_polys(b.to_bsp_polygons(), &a_bb);

    let mut na = Node::from_polygons(&a_clip);
    let mut nb = Node::from_polygons(&b_clip);

    let polygons = match operation {
        CsgOperation::Union => {
            step("Clip A to B")?;
            na.clip_to(&nb);
            step("Clip B to A")?;
            nb.clip_to(&na);
            nb.invert();
            step("Remove coplanar B")?;
            nb.clip_to(&na);
            nb.invert();
            step("Merge")?;
            na.build(&nb.all_polygons());

            let mut polys = na.all_polygons();
            polys.extend(a_passthru);
            polys.extend(b_passthru);
            polys
        },
        CsgOperation::Subtract => {
            step("Clip A to B")?;
            na.invert();
            na.clip_to(&nb);
            step("Clip B to A")?;
            nb.clip_to(&na);
            nb.invert();
            step("Remove coplanar B")?;
            nb.clip_to(&na);
            nb.invert();
            step("Merge")?;
            na.build(&nb.all_polygons());
            na.invert();

            let mut polys = na.all_polygons();
            polys.extend(a_passthru);
            polys
        },
        CsgOperation::Intersect => {
            // Faces outside the other operand's bounds cannot survive an intersection
            step("Clip B to A")?;
            na.invert();
            nb.clip_to(&na);
            nb.invert();
            step("Clip A to B")?;
            na.clip_to(&nb);
            step("Remove coplanar B")?;
            nb.clip_to(&na);
            step("Merge")?;
            na.build(&nb.all_polygons());
            na.invert();
            na.all_polygons()
        },
    };

    step("Assembling mesh")?;
    let mut result = Mesh::from_bsp_polygons(&polygons);
    result.compute_normals();
    on_progress("Done", 1.0);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Matrix4, Vector3};

    fn shifted_cubes() -> (Mesh, Mesh) {
        let a = Mesh::cube(1.0);
        let b = a.transformed(&Matrix4::new_translation(&Vector3::new(0.5, 0.0, 0.0)));
        (a, b)
    }

    fn run(op: CsgOperation) -> Mesh {
        let (a, b) = shifted_cubes();
        combine(&a, &b, op, &mut |_, _| {}, &CancellationToken::new()).expect("not cancelled")
    }

    #[test]
    fn union_volume() {
        let m = run(CsgOperation::Union);
        assert!((m.signed_volume() - 1.5).abs() < 1e-9, "volume {}", m.signed_volume());
    }

    #[test]
    fn subtract_volume() {
        let m = run(CsgOperation::Subtract);
        assert!((m.signed_volume() - 0.5).abs() < 1e-9, "volume {}", m.signed_volume());
    }

    #[test]
    fn intersect_volume() {
        let m = run(CsgOperation::Intersect);
        assert!((m.signed_volume() - 0.5).abs() < 1e-9, "volume {}", m.signed_volume());
    }

    #[test]
    fn progress_is_local_and_ends_at_one() {
        let (a, b) = shifted_cubes();
        let mut seen = Vec::new();
        combine(&a, &b, CsgOperation::Union, &mut |_, f| seen.push(f), &CancellationToken::new())
            .expect("not cancelled");
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(seen.first().copied(), Some(0.0));
        assert_eq!(seen.last().copied(), Some(1.0));
    }

    #[test]
    fn pre_cancelled_token_aborts() {
        let (a, b) = shifted_cubes();
        let token = CancellationToken::new();
        token.cancel();
        let res = combine(&a, &b, CsgOperation::Subtract, &mut |_, _| {}, &token);
        assert!(matches!(res, Err(CsgError::Cancelled)));
    }
}
