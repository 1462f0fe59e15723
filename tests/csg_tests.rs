mod support;

use std::cell::RefCell;

use meshcsg::{
    BooleanOptions, CancellationToken, CsgError, CsgOperation, Mesh, ProcessingMode, ProgressStatus,
    Resolution, float_types::Real, linear_array,
};
use nalgebra::{Matrix4, Point3, Vector3};

use crate::support::{approx_eq, assert_bbox, local_engine, translation};

fn polygon_engine() -> meshcsg::CsgEngine {
    local_engine(BooleanOptions::default())
}

#[test]
fn polygon_union_of_offset_cubes() {
    let cube = Mesh::cube(1.0);
    let result = polygon_engine()
        .do_pair(
            &cube,
            &Matrix4::identity(),
            &cube,
            &translation(0.5, 0.0, 0.0),
            CsgOperation::Union,
            None,
            &CancellationToken::new(),
        )
        .expect("union");

    assert_bbox(&result, [0.0, 0.0, 0.0, 1.5, 1.0, 1.0], 1e-9);
    assert!(approx_eq(result.signed_volume(), 1.5, 1e-6));
    assert!(result.is_manifold(), "union left open edges");
}

#[test]
fn polygon_intersect_of_offset_cubes() {
    let cube = Mesh::cube(1.0);
    let result = polygon_engine()
        .do_pair(
            &cube,
            &Matrix4::identity(),
            &cube,
            &translation(0.5, 0.0, 0.0),
            CsgOperation::Intersect,
            None,
            &CancellationToken::new(),
        )
        .expect("intersect");

    assert_bbox(&result, [0.5, 0.0, 0.0, 1.0, 1.0, 1.0], 1e-9);
    assert!(approx_eq(result.signed_volume(), 0.5, 1e-6));
    assert!(result.is_manifold(), "intersection left open edges");
}

#[test]
fn polygon_subtract_removes_overlap() {
    let cube = Mesh::cube(1.0);
    let result = polygon_engine()
        .do_pair(
            &cube,
            &Matrix4::identity(),
            &cube,
            &translation(0.5, 0.0, 0.0),
            CsgOperation::Subtract,
            None,
            &CancellationToken::new(),
        )
        .expect("subtract");

    assert_bbox(&result, [0.0, 0.0, 0.0, 0.5, 1.0, 1.0], 1e-9);
    assert!(approx_eq(result.signed_volume(), 0.5, 1e-6));
    assert!(result.is_manifold(), "difference left open edges");
}

#[test]
fn inputs_are_not_modified() {
    let a = Mesh::cube(1.0);
    let b = Mesh::sphere(0.7, 12, 6);
    let (a_before, b_before) = (a.vertices.clone(), b.vertices.clone());
    polygon_engine()
        .do_pair(
            &a,
            &translation(3.0, 0.0, 0.0),
            &b,
            &translation(3.5, 0.5, 0.5),
            CsgOperation::Subtract,
            None,
            &CancellationToken::new(),
        )
        .expect("subtract");
    assert_eq!(a.vertices, a_before);
    assert_eq!(b.vertices, b_before);
}

#[test]
fn do_array_polygon_fold() {
    let row = linear_array(&Mesh::cube(1.0), &Matrix4::identity(), 3, &Vector3::x(), 0.5);
    let result = polygon_engine()
        .do_array(&row, CsgOperation::Union, None, &CancellationToken::new())
        .expect("union");
    assert_bbox(&result, [0.0, 0.0, 0.0, 2.0, 1.0, 1.0], 1e-9);
    assert!(approx_eq(result.signed_volume(), 2.0, 1e-6));
}

#[test]
fn do_array_subtract_is_first_minus_rest() {
    let items = vec![
        (Mesh::cube(3.0), Matrix4::identity()),
        (Mesh::cube(1.0), translation(-0.5, 1.0, 1.0)),
        (Mesh::cube(1.0), translation(2.5, 1.0, 1.0)),
    ];
    let result = polygon_engine()
        .do_array(&items, CsgOperation::Subtract, None, &CancellationToken::new())
        .expect("subtract");
    // each tool cuts half of itself out of the block
    assert!(approx_eq(result.signed_volume(), 27.0 - 1.0, 1e-6));
    assert_bbox(&result, [0.0, 0.0, 0.0, 3.0, 3.0, 3.0], 1e-9);
}

#[test]
fn do_array_single_item_is_copied() {
    let sphere = Mesh::sphere(1.0, 8, 4);
    let items = vec![(sphere.clone(), translation(5.0, 0.0, 0.0))];
    for mode in [ProcessingMode::Polygon, ProcessingMode::UniformVolumetric] {
        let result = local_engine(BooleanOptions::default().with_mode(mode))
            .do_array(&items, CsgOperation::Intersect, None, &CancellationToken::new())
            .expect("single item");
        assert_eq!(result.vertices, sphere.vertices);
        assert_eq!(result.faces, sphere.faces);
    }
}

#[test]
fn do_array_empty_input() {
    let result = polygon_engine().do_array(&[], CsgOperation::Union, None, &CancellationToken::new());
    assert!(matches!(result, Err(CsgError::EmptyInput)));
}

#[test]
fn degenerate_operand_short_circuits_volumetric() {
    let triangle = Mesh::new(
        vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)],
        vec![[0, 1, 2]],
    )
    .expect("valid triangle");
    let cube = Mesh::cube(1.0);
    let placement = translation(2.0, -1.0, 0.5);
    let expected = cube.transformed(&placement);

    for mode in [ProcessingMode::UniformVolumetric, ProcessingMode::AdaptiveVolumetric] {
        let engine = local_engine(BooleanOptions::default().with_mode(mode));
        let cancel = CancellationToken::new();

        let as_b = engine
            .do_pair(&cube, &placement, &triangle, &Matrix4::identity(), CsgOperation::Subtract, None, &cancel)
            .expect("degenerate B");
        assert_eq!(as_b.vertices, expected.vertices);
        assert_eq!(as_b.faces, expected.faces);

        let as_a = engine
            .do_pair(&triangle, &Matrix4::identity(), &cube, &placement, CsgOperation::Union, None, &cancel)
            .expect("degenerate A");
        assert_eq!(as_a.vertices, expected.vertices);
    }
}

#[test]
fn cancelled_before_start() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let cube = Mesh::cube(1.0);
    for mode in [
        ProcessingMode::Polygon,
        ProcessingMode::UniformVolumetric,
        ProcessingMode::AdaptiveVolumetric,
    ] {
        let engine = local_engine(BooleanOptions::default().with_mode(mode));
        let pair = engine.do_pair(
            &cube,
            &Matrix4::identity(),
            &cube,
            &translation(0.5, 0.5, 0.5),
            CsgOperation::Union,
            None,
            &cancel,
        );
        assert!(matches!(pair, Err(CsgError::Cancelled)), "{mode:?}");

        let items = vec![(cube.clone(), Matrix4::identity()), (cube.clone(), translation(0.5, 0.0, 0.0))];
        let array = engine.do_array(&items, CsgOperation::Union, None, &cancel);
        assert!(matches!(array, Err(CsgError::Cancelled)), "{mode:?}");
    }
}

#[test]
fn cancelled_from_progress_callback() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let reporter = move |status: &ProgressStatus| {
        if status.progress_0_to_1 > 0.1 {
            trigger.cancel();
        }
    };
    let row = linear_array(&Mesh::cube(1.0), &Matrix4::identity(), 5, &Vector3::x(), 0.5);
    let result = polygon_engine().do_array(&row, CsgOperation::Union, Some(&reporter), &cancel);
    assert!(matches!(result, Err(CsgError::Cancelled)));
}

#[test]
fn progress_is_monotonic_and_completes() {
    let seen = RefCell::new(Vec::<(String, Real)>::new());
    let reporter = |status: &ProgressStatus| {
        seen.borrow_mut().push((status.status.clone(), status.progress_0_to_1));
    };
    let row = linear_array(&Mesh::cube(1.0), &Matrix4::identity(), 4, &Vector3::y(), 0.25);
    polygon_engine()
        .do_array(&row, CsgOperation::Union, Some(&reporter), &CancellationToken::new())
        .expect("union");

    let seen = seen.into_inner();
    assert!(!seen.is_empty());
    assert!(seen.windows(2).all(|w| w[0].1 <= w[1].1));
    assert!(seen.iter().all(|(_, p)| (0.0..=1.0).contains(p)));
    assert!(approx_eq(seen.last().map_or(0.0, |s| s.1), 1.0, 1e-9));
}

#[test]
fn resolution_and_operation_codes() {
    assert_eq!(Resolution::R64.cell_count(), 64);
    assert_eq!(Resolution::R512.cell_count(), 512);
    assert!(matches!(
        Resolution::from_exponent(4),
        Err(CsgError::Unsupported { value: 4, .. })
    ));
    assert!(matches!(
        CsgOperation::from_code(-1),
        Err(CsgError::Unsupported { value: -1, .. })
    ));
    for op in [CsgOperation::Union, CsgOperation::Subtract, CsgOperation::Intersect] {
        assert_eq!(CsgOperation::from_code(op.code()).expect("roundtrip"), op);
    }
}

#[test]
fn subtract_many_returns_keep_local_results() {
    let keep_placement = translation(10.0, 0.0, 0.0);
    let keep = vec![
        (Mesh::cube(2.0), keep_placement),
        (Mesh::cube(2.0), translation(0.0, 10.0, 0.0)),
    ];
    let remove = vec![(Mesh::cube(1.0), translation(10.5, 0.5, 0.5))];

    let seen = RefCell::new(Vec::<String>::new());
    let reporter = |status: &ProgressStatus| seen.borrow_mut().push(status.status.clone());
    let results = polygon_engine()
        .subtract_many(&keep, &remove, Some(&reporter), &CancellationToken::new())
        .expect("subtract many");

    assert_eq!(results.len(), 2);
    // the tool sits fully inside the first block
    assert_bbox(&results[0], [0.0, 0.0, 0.0, 2.0, 2.0, 2.0], 1e-9);
    assert!(approx_eq(results[0].signed_volume(), 7.0, 1e-6));
    // and misses the second
    assert!(approx_eq(results[1].signed_volume(), 8.0, 1e-6));

    let seen = seen.into_inner();
    // each pair announces itself before its Boolean phases run
    assert_eq!(seen[..3], ["Copy Remove", "Copy Keep", "Do CSG"]);
    let second_pair = seen.iter().rposition(|s| s == "Copy Keep").expect("second pair");
    assert_eq!(seen[second_pair + 1], "Do CSG");
    assert_ne!(seen.last().map(String::as_str), Some("Do CSG"));
}

#[test]
fn subtract_many_rejects_singular_keep_transform() {
    let keep = vec![(Mesh::cube(1.0), Matrix4::zeros())];
    let remove = vec![(Mesh::cube(1.0), Matrix4::identity())];
    let result = polygon_engine().subtract_many(&keep, &remove, None, &CancellationToken::new());
    assert!(matches!(result, Err(CsgError::SingularTransform)));
}

#[test]
fn subtract_many_with_nothing_to_remove() {
    let keep = vec![(Mesh::cube(1.0), translation(1.0, 2.0, 3.0))];
    let results = polygon_engine()
        .subtract_many(&keep, &[], None, &CancellationToken::new())
        .expect("no-op");
    assert_eq!(results[0].vertices, keep[0].0.vertices);
}
