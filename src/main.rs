// Runs every Boolean through each processing mode on a pair of overlapping
// cubes and writes the results to stl/.

use meshcsg::float_types::Real;
use meshcsg::{
    BooleanOptions, CancellationToken, CsgOperation, Mesh, ProcessingMode, ProgressStatus, Resolution,
};
use nalgebra::{Matrix4, Vector3};

fn main() {
    let _ = std::fs::create_dir_all("stl");

    let cube = Mesh::cube(2.0);
    let offset = Matrix4::new_translation(&Vector3::new(1.0, 1.0, 1.0));
    let identity = Matrix4::<Real>::identity();
    let cancel = CancellationToken::new();
    let reporter = |status: &ProgressStatus| {
        println!("  {:>5.1}% {}", status.progress_0_to_1 * 100.0, status.status);
    };

    let modes = [
        ("polygon", ProcessingMode::Polygon),
        ("uniform", ProcessingMode::UniformVolumetric),
        ("adaptive", ProcessingMode::AdaptiveVolumetric),
    ];
    let operations = [
        ("union", CsgOperation::Union),
        ("subtract", CsgOperation::Subtract),
        ("intersect", CsgOperation::Intersect),
    ];

    for (mode_name, mode) in modes {
        let options = BooleanOptions::default()
            .with_mode(mode)
            .with_input_resolution(Resolution::R64)
            .with_output_resolution(Resolution::R64);

        for (op_name, operation) in operations {
            println!("{mode_name} {op_name}");
            match meshcsg::do_pair(&cube, &identity, &cube, &offset, operation, &options, Some(&reporter), &cancel) {
                Ok(result) => {
                    println!("  {} faces, volume {:.4}", result.face_count(), result.signed_volume());
                    write_stl(&result, &format!("{mode_name}_{op_name}"));
                },
                Err(err) => eprintln!("  failed: {err}"),
            }
        }
    }

    // A row of four spheres fused in one pass
    let sphere = Mesh::sphere(1.0, 24, 12);
    let row = meshcsg::linear_array(&sphere, &identity, 4, &Vector3::x(), 1.5);
    let options = BooleanOptions::default().with_mode(ProcessingMode::UniformVolumetric);
    match meshcsg::do_array(&row, CsgOperation::Union, &options, None, &cancel) {
        Ok(result) => write_stl(&result, "sphere_row"),
        Err(err) => eprintln!("sphere row failed: {err}"),
    }
}

#[cfg(feature = "stl-io")]
fn write_stl(mesh: &Mesh, name: &str) {
    let _ = std::fs::write(format!("stl/{name}.stl"), mesh.to_stl_ascii(name));
}

#[cfg(not(feature = "stl-io"))]
fn write_stl(_mesh: &Mesh, _name: &str) {}
