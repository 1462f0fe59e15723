mod support;

use std::sync::Mutex;

use meshcsg::{
    BooleanOptions, CancellationToken, CsgEngine, CsgOperation, Mesh,
    errors::BridgeError,
    native::{Accelerator, FlatMesh, ProcessAccelerator},
};
use nalgebra::Matrix4;

use crate::support::{approx_eq, assert_bbox, translation};

/// Accelerator double that records its calls and returns a canned result.
struct FakeAccelerator {
    available: bool,
    output: FlatMesh,
    calls: Mutex<Vec<(i32, usize, usize)>>,
}

impl FakeAccelerator {
    fn new(available: bool, output: FlatMesh) -> Self {
        Self {
            available,
            output,
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl Accelerator for FakeAccelerator {
    fn is_available(&self) -> bool {
        self.available
    }

    fn boolean(
        &self,
        a: &FlatMesh,
        b: &FlatMesh,
        op_code: i32,
        _cancel: &CancellationToken,
    ) -> Result<FlatMesh, BridgeError> {
        self.calls
            .lock()
            .expect("lock")
            .push((op_code, a.vertices.len(), b.vertices.len()));
        Ok(self.output.clone())
    }
}

fn tetrahedron() -> FlatMesh {
    FlatMesh {
        vertices: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
        faces: vec![0, 2, 1, 0, 1, 3, 0, 3, 2, 1, 2, 3],
    }
}

fn run(engine: &CsgEngine, operation: CsgOperation) -> Mesh {
    let cube = Mesh::cube(1.0);
    engine
        .do_pair(
            &cube,
            &Matrix4::identity(),
            &cube,
            &translation(0.5, 0.0, 0.0),
            operation,
            None,
            &CancellationToken::new(),
        )
        .expect("boolean")
}

#[test]
fn available_accelerator_result_is_used() {
    let fake = FakeAccelerator::new(true, tetrahedron());
    let engine = CsgEngine::new(BooleanOptions::default()).with_accelerator(fake);
    let result = run(&engine, CsgOperation::Intersect);
    assert_eq!(result.vertex_count(), 4);
    assert_eq!(result.face_count(), 4);
    assert!(result.normals.is_some());
    assert!(approx_eq(result.signed_volume(), 1.0 / 6.0, 1e-9));
}

#[test]
fn accelerator_receives_world_space_operands() {
    let fake = std::sync::Arc::new(FakeAccelerator::new(true, tetrahedron()));

    struct Shared(std::sync::Arc<FakeAccelerator>);
    impl Accelerator for Shared {
        fn is_available(&self) -> bool {
            self.0.is_available()
        }
        fn boolean(
            &self,
            a: &FlatMesh,
            b: &FlatMesh,
            op_code: i32,
            cancel: &CancellationToken,
        ) -> Result<FlatMesh, BridgeError> {
            // operand B arrives already translated
            assert!(b.vertices.chunks(3).all(|p| p[0] >= 0.5));
            self.0.boolean(a, b, op_code, cancel)
        }
    }

    let engine = CsgEngine::new(BooleanOptions::default()).with_accelerator(Shared(fake.clone()));
    run(&engine, CsgOperation::Subtract);
    let calls = fake.calls.lock().expect("lock");
    assert_eq!(calls.as_slice(), &[(1, 24, 24)]);
}

#[test]
fn invalid_accelerator_output_falls_back() {
    let broken = FlatMesh {
        vertices: vec![0.0; 9],
        faces: vec![0, 1, 7],
    };
    let engine = CsgEngine::new(BooleanOptions::default()).with_accelerator(FakeAccelerator::new(true, broken));
    let result = run(&engine, CsgOperation::Union);
    assert_bbox(&result, [0.0, 0.0, 0.0, 1.5, 1.0, 1.0], 1e-9);
    assert!(approx_eq(result.signed_volume(), 1.5, 1e-6));
}

#[test]
fn unavailable_accelerator_is_never_called() {
    let fake = std::sync::Arc::new(FakeAccelerator::new(false, tetrahedron()));

    struct Shared(std::sync::Arc<FakeAccelerator>);
    impl Accelerator for Shared {
        fn is_available(&self) -> bool {
            self.0.is_available()
        }
        fn boolean(
            &self,
            a: &FlatMesh,
            b: &FlatMesh,
            op_code: i32,
            cancel: &CancellationToken,
        ) -> Result<FlatMesh, BridgeError> {
            self.0.boolean(a, b, op_code, cancel)
        }
    }

    let engine = CsgEngine::new(BooleanOptions::default()).with_accelerator(Shared(fake.clone()));
    let result = run(&engine, CsgOperation::Union);
    assert!(approx_eq(result.signed_volume(), 1.5, 1e-6));
    assert!(fake.calls.lock().expect("lock").is_empty());
}

#[test]
fn missing_executable_falls_back_to_polygon_engine() {
    let accel = ProcessAccelerator::new("/nonexistent/meshcsg-accelerator");
    assert!(!accel.is_available());
    let engine = CsgEngine::new(BooleanOptions::default()).with_accelerator(accel);
    let result = run(&engine, CsgOperation::Intersect);
    assert_bbox(&result, [0.5, 0.0, 0.0, 1.0, 1.0, 1.0], 1e-9);
}

/// Child-process accelerators backed by small shell scripts.
#[cfg(unix)]
mod process {
    use std::path::PathBuf;
    use std::time::{Duration, Instant};

    use meshcsg::{BooleanOptions, CancellationToken, CsgEngine, CsgError, CsgOperation, Mesh, native::ProcessAccelerator};
    use nalgebra::Matrix4;

    use super::run;
    use crate::support::{approx_eq, assert_bbox, translation};

    /// A response holding two empty buffers: a valid, empty mesh.
    const EMPTY_RESPONSE: &str = r"printf '\000\000\000\000\000\000\000\000\000\000\000\000\000\000\000\000'";

    /// Write an executable `#!/bin/sh` script into a fresh temp directory.
    fn script(name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let dir = std::env::temp_dir().join(format!("meshcsg-{}-{name}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("temp dir");
        let path = dir.join("accelerator.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
        path
    }

    fn engine(accelerator: ProcessAccelerator) -> CsgEngine {
        CsgEngine::new(BooleanOptions::default()).with_accelerator(accelerator)
    }

    #[test]
    fn child_response_is_used() {
        let path = script("empty", &format!("cat > /dev/null\n{EMPTY_RESPONSE}"));
        let result = run(&engine(ProcessAccelerator::new(&path)), CsgOperation::Union);
        assert!(result.is_empty());
    }

    #[test]
    fn non_zero_exit_falls_back() {
        let path = script("exit", &format!("cat > /dev/null\n{EMPTY_RESPONSE}\nexit 3"));
        let result = run(&engine(ProcessAccelerator::new(&path)), CsgOperation::Union);
        assert_bbox(&result, [0.0, 0.0, 0.0, 1.5, 1.0, 1.0], 1e-9);
        assert!(approx_eq(result.signed_volume(), 1.5, 1e-6));
    }

    #[test]
    fn garbage_output_falls_back() {
        let path = script("garbage", "cat > /dev/null\necho 'not a mesh'");
        let result = run(&engine(ProcessAccelerator::new(&path)), CsgOperation::Subtract);
        assert_bbox(&result, [0.0, 0.0, 0.0, 0.5, 1.0, 1.0], 1e-9);
        assert!(approx_eq(result.signed_volume(), 0.5, 1e-6));
    }

    #[test]
    fn slow_child_times_out_and_falls_back() {
        let path = script("slow", "exec sleep 1000");
        let accelerator = ProcessAccelerator::new(&path).with_timeout(Duration::from_millis(200));
        let started = Instant::now();
        let result = run(&engine(accelerator), CsgOperation::Intersect);
        assert!(started.elapsed() < Duration::from_secs(60));
        assert_bbox(&result, [0.5, 0.0, 0.0, 1.0, 1.0, 1.0], 1e-9);
    }

    #[test]
    fn hung_child_is_cancelled() {
        let path = script("hang", "exec sleep 1000");
        let engine = engine(ProcessAccelerator::new(&path));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(300));
            trigger.cancel();
        });

        let cube = Mesh::cube(1.0);
        let started = Instant::now();
        let result = engine.do_pair(
            &cube,
            &Matrix4::identity(),
            &cube,
            &translation(0.5, 0.0, 0.0),
            CsgOperation::Union,
            None,
            &cancel,
        );
        canceller.join().expect("canceller thread");

        assert!(matches!(result, Err(CsgError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(60));
    }
}
