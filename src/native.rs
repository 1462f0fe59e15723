//! Optional native accelerator for polygon Booleans.
//!
//! The accelerator is an external executable. It is probed before every
//! call (the artifact may appear or vanish between calls), fed both operands
//! as flat little-endian buffers on stdin, and answers with the result
//! buffers on stdout. Every failure is logged and reported as `None` so the
//! caller can fall back to the BSP engine. The child is polled rather than
//! blocked on, so cancellation and the per-call deadline both reach it.

use crate::csg::CsgOperation;
use crate::errors::{BridgeError, CsgError};
use crate::float_types::Real;
use crate::mesh::Mesh;
use crate::progress::CancellationToken;
use nalgebra::Matrix4;
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

/// Where the accelerator is looked for when no explicit path is configured.
pub const DEFAULT_ACCELERATOR_PATH: &str = "meshcsg-accelerator";

/// Environment variable overriding [`DEFAULT_ACCELERATOR_PATH`]; read on every probe.
pub const ACCELERATOR_ENV: &str = "MESHCSG_ACCELERATOR";

pub const MAGIC: &[u8; 4] = b"MCSG";
pub const PROTOCOL_VERSION: u32 = 1;

/// Upper bound on any single buffer length accepted from the wire.
const MAX_BUFFER_LEN: u64 = 1 << 31;

/// Wall-clock budget of one accelerator call unless overridden.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// How often a running child is checked for cancellation and the deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// A mesh flattened to `[x, y, z, ...]` positions and `[i, j, k, ...]` triangles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatMesh {
    pub vertices: Vec<f64>,
    pub faces: Vec<i32>,
}

impl FlatMesh {
    /// Flatten `mesh` with `transform` applied to every vertex.
    pub fn from_mesh(mesh: &Mesh, transform: &Matrix4<Real>) -> Self {
        let (vertices, faces) = mesh.to_flat(transform);
        FlatMesh { vertices, faces }
    }
}

/// Capability interface of a Boolean accelerator.
pub trait Accelerator: Send + Sync {
    /// Whether the accelerator can be used right now.
    fn is_available(&self) -> bool;

    /// Combine two world-space operands; `op_code` is [`CsgOperation::code`].
    ///
    /// Long-running implementations should give up with
    /// [`BridgeError::Cancelled`] once `cancel` is raised.
    fn boolean(
        &self,
        a: &FlatMesh,
        b: &FlatMesh,
        op_code: i32,
        cancel: &CancellationToken,
    ) -> Result<FlatMesh, BridgeError>;
}

/// Never available; forces the BSP engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAccelerator;

impl Accelerator for NoAccelerator {
    fn is_available(&self) -> bool {
        false
    }

    fn boolean(
        &self,
        _a: &FlatMesh,
        _b: &FlatMesh,
        _op_code: i32,
        _cancel: &CancellationToken,
    ) -> Result<FlatMesh, BridgeError> {
        Err(BridgeError::Protocol("no accelerator configured".into()))
    }
}

/// Accelerator running as a child process.
#[derive(Debug, Clone)]
pub struct ProcessAccelerator {
    /// Fixed executable path; `None` resolves [`ACCELERATOR_ENV`] or the default on each call
    path: Option<PathBuf>,
    /// The child is killed once a call runs longer than this
    timeout: Duration,
}

impl Default for ProcessAccelerator {
    fn default() -> Self {
        Self::from_env()
    }
}

impl ProcessAccelerator {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Resolve the location from the environment at every probe.
    pub const fn from_env() -> Self {
        Self {
            path: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn path(&self) -> PathBuf {
        match &self.path {
            Some(p) => p.clone(),
            None => std::env::var_os(ACCELERATOR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ACCELERATOR_PATH)),
        }
    }

    fn run(
        &self,
        path: &Path,
        a: &FlatMesh,
        b: &FlatMesh,
        op_code: i32,
        cancel: &CancellationToken,
    ) -> Result<FlatMesh, BridgeError> {
        let deadline = Instant::now().checked_add(self.timeout);
        let mut request = Vec::new();
        write_request(&mut request, op_code, a, b)?;

        let child = Command::new(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;
        let mut guard = ChildGuard(child);

        let mut stdin = guard
            .0
            .stdin
            .take()
            .ok_or_else(|| BridgeError::Protocol("accelerator stdin unavailable".into()))?;
        let stdout = guard
            .0
            .stdout
            .take()
            .ok_or_else(|| BridgeError::Protocol("accelerator stdout unavailable".into()))?;

        // Both pipe ends are serviced off-thread; killing the child on an early
        // return closes them and lets the helpers finish.
        thread::spawn(move || {
            // Dropping stdin afterwards gives the child EOF
            if let Err(err) = stdin.write_all(&request).and_then(|()| stdin.flush()) {
                tracing::debug!(%err, "accelerator stopped reading its request");
            }
        });
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let _ = tx.send(read_response(&mut BufReader::new(stdout)));
        });

        let result = loop {
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(response) => break response?,
                Err(RecvTimeoutError::Timeout) => self.check_interrupt(cancel, deadline)?,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(BridgeError::Protocol("accelerator reader stopped".into()));
                },
            }
        };

        let status = loop {
            if let Some(status) = guard.0.try_wait()? {
                break status;
            }
            self.check_interrupt(cancel, deadline)?;
            thread::sleep(POLL_INTERVAL);
        };
        if !status.success() {
            return Err(BridgeError::ExitStatus(status));
        }
        Ok(result)
    }

    fn check_interrupt(&self, cancel: &CancellationToken, deadline: Option<Instant>) -> Result<(), BridgeError> {
        if cancel.is_cancelled() {
            Err(BridgeError::Cancelled)
        } else if deadline.is_some_and(|d| Instant::now() >= d) {
            Err(BridgeError::Timeout(self.timeout))
        } else {
            Ok(())
        }
    }
}

impl Accelerator for ProcessAccelerator {
    fn is_available(&self) -> bool {
        cfg!(target_pointer_width = "64") && self.path().is_file()
    }

    fn boolean(
        &self,
        a: &FlatMesh,
        b: &FlatMesh,
        op_code: i32,
        cancel: &CancellationToken,
    ) -> Result<FlatMesh, BridgeError> {
        self.run(&self.path(), a, b, op_code, cancel)
    }
}

/// Owns the child so it is killed and reaped on every exit path.
struct ChildGuard(Child);

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if let Ok(None) = self.0.try_wait() {
            let _ = self.0.kill();
            let _ = self.0.wait();
        }
    }
}

fn write_f64s(w: &mut impl Write, values: &[f64]) -> io::Result<()> {
    w.write_all(&(values.len() as u64).to_le_bytes())?;
    for v in values {
        w.write_all(&v.to_le_bytes())?;
    }
    Ok(())
}

fn write_i32s(w: &mut impl Write, values: &[i32]) -> io::Result<()> {
    w.write_all(&(values.len() as u64).to_le_bytes())?;
    for v in values {
        w.write_all(&v.to_le_bytes())?;
    }
    Ok(())
}

fn read_array<const N: usize>(r: &mut impl Read) -> io::Result<[u8; N]> {
    let mut buf = [0u8; N];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

fn read_len(r: &mut impl Read) -> Result<usize, BridgeError> {
    let len = u64::from_le_bytes(read_array(r)?);
    if len > MAX_BUFFER_LEN {
        return Err(BridgeError::Protocol(format!("buffer length {len} exceeds limit")));
    }
    Ok(len as usize)
}

fn read_f64s(r: &mut impl Read) -> Result<Vec<f64>, BridgeError> {
    let len = read_len(r)?;
    (0..len)
        .map(|_| -> Result<f64, BridgeError> { Ok(f64::from_le_bytes(read_array(r)?)) })
        .collect()
}

fn read_i32s(r: &mut impl Read) -> Result<Vec<i32>, BridgeError> {
    let len = read_len(r)?;
    (0..len)
        .map(|_| -> Result<i32, BridgeError> { Ok(i32::from_le_bytes(read_array(r)?)) })
        .collect()
}

/// Encode a request: magic, version, operation code, then A and B.
pub fn write_request(w: &mut impl Write, op_code: i32, a: &FlatMesh, b: &FlatMesh) -> io::Result<()> {
    w.write_all(MAGIC)?;
    w.write_all(&PROTOCOL_VERSION.to_le_bytes())?;
    w.write_all(&op_code.to_le_bytes())?;
    for mesh in [a, b] {
        write_f64s(w, &mesh.vertices)?;
        write_i32s(w, &mesh.faces)?;
    }
    Ok(())
}

/// Decode a request written by [`write_request`]; for accelerator implementations.
pub fn read_request(r: &mut impl Read) -> Result<(i32, FlatMesh, FlatMesh), BridgeError> {
    if &read_array::<4>(r)? != MAGIC {
        return Err(BridgeError::Protocol("bad magic".into()));
    }
    let version = u32::from_le_bytes(read_array(r)?);
    if version != PROTOCOL_VERSION {
        return Err(BridgeError::Protocol(format!("unsupported protocol version {version}")));
    }
    let op_code = i32::from_le_bytes(read_array(r)?);
    let a = FlatMesh {
        vertices: read_f64s(r)?,
        faces: read_i32s(r)?,
    };
    let b = FlatMesh {
        vertices: read_f64s(r)?,
        faces: read_i32s(r)?,
    };
    Ok((op_code, a, b))
}

/// Encode the result buffers.
pub fn write_response(w: &mut impl Write, result: &FlatMesh) -> io::Result<()> {
    write_f64s(w, &result.vertices)?;
    write_i32s(w, &result.faces)
}

/// Decode the result buffers into owned memory.
pub fn read_response(r: &mut impl Read) -> Result<FlatMesh, BridgeError> {
    Ok(FlatMesh {
        vertices: read_f64s(r)?,
        faces: read_i32s(r)?,
    })
}

/// Run `operation` on the accelerator if it is usable.
///
/// Returns `Ok(None)` when the accelerator is unavailable or fails in any way;
/// failures are logged, never surfaced. Only cancellation is an error.
pub fn try_native_boolean(
    accelerator: &dyn Accelerator,
    a: &Mesh,
    transform_a: &Matrix4<Real>,
    b: &Mesh,
    transform_b: &Matrix4<Real>,
    operation: CsgOperation,
    cancel: &CancellationToken,
) -> Result<Option<Mesh>, CsgError> {
    if !accelerator.is_available() {
        tracing::debug!("native accelerator unavailable");
        return Ok(None);
    }

    let flat_a = FlatMesh::from_mesh(a, transform_a);
    let flat_b = FlatMesh::from_mesh(b, transform_b);
    let result = accelerator
        .boolean(&flat_a, &flat_b, operation.code(), cancel)
        .and_then(|out| Ok(Mesh::from_flat(&out.vertices, &out.faces)?));

    match result {
        Ok(mut mesh) => {
            mesh.compute_normals();
            tracing::debug!(faces = mesh.face_count(), "native boolean succeeded");
            Ok(Some(mesh))
        },
        Err(BridgeError::Cancelled) => {
            tracing::debug!("native boolean cancelled");
            Err(CsgError::Cancelled)
        },
        Err(err) => {
            tracing::warn!(%err, "native boolean failed, falling back to BSP engine");
            Ok(None)
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_roundtrip() {
        let a = FlatMesh {
            vertices: vec![0.0, 1.0, 2.0],
            faces: vec![0, 0, 0],
        };
        let b = FlatMesh::default();
        let mut buf = Vec::new();
        write_request(&mut buf, 2, &a, &b).expect("in-memory write");
        let (op, ra, rb) = read_request(&mut buf.as_slice()).expect("decodes");
        assert_eq!((op, ra, rb), (2, a, b));
    }

    #[test]
    fn truncated_response_is_an_error() {
        let mut buf = Vec::new();
        write_response(&mut buf, &FlatMesh { vertices: vec![1.0; 9], faces: vec![0, 1, 2] })
            .expect("in-memory write");
        buf.truncate(buf.len() - 2);
        assert!(read_response(&mut buf.as_slice()).is_err());
    }

    #[test]
    fn missing_artifact_is_unavailable() {
        let accel = ProcessAccelerator::new("/nonexistent/meshcsg-accelerator");
        assert!(!accel.is_available());
        let cube = Mesh::cube(1.0);
        let id = Matrix4::identity();
        let cancel = CancellationToken::new();
        let outcome = try_native_boolean(&accel, &cube, &id, &cube, &id, CsgOperation::Union, &cancel);
        assert!(matches!(outcome, Ok(None)));
    }

    /// Accelerator that only returns once it observes cancellation.
    struct Blocking;

    impl Accelerator for Blocking {
        fn is_available(&self) -> bool {
            true
        }

        fn boolean(
            &self,
            _a: &FlatMesh,
            _b: &FlatMesh,
            _op_code: i32,
            cancel: &CancellationToken,
        ) -> Result<FlatMesh, BridgeError> {
            while !cancel.is_cancelled() {
                thread::sleep(POLL_INTERVAL);
            }
            Err(BridgeError::Cancelled)
        }
    }

    #[test]
    fn cancellation_is_surfaced_not_swallowed() {
        let cube = Mesh::cube(1.0);
        let id = Matrix4::identity();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = try_native_boolean(&Blocking, &cube, &id, &cube, &id, CsgOperation::Union, &cancel);
        assert!(matches!(outcome, Err(CsgError::Cancelled)));
    }

    #[test]
    fn default_deadline_is_configurable() {
        let accel = ProcessAccelerator::default();
        assert_eq!(accel.timeout(), DEFAULT_TIMEOUT);
        let accel = accel.with_timeout(Duration::from_millis(5));
        assert_eq!(accel.timeout(), Duration::from_millis(5));
    }
}
