//! Top-level Boolean entry points and strategy dispatch.
//!
//! Polygon mode tries the native accelerator and falls back to the BSP
//! engine. Volumetric modes turn every operand into an implicit function,
//! combine them, and reconstruct once.

use crate::errors::CsgError;
use crate::float_types::Real;
use crate::implicit::{self, ImplicitFunction};
use crate::mesh::{Mesh, boolean};
use crate::native::{self, Accelerator, ProcessAccelerator};
use crate::progress::{CancellationToken, ProgressReporter, ProgressTracker};
use crate::volume;
use nalgebra::{Matrix4, Vector3};
use tracing::{debug, info, instrument};

/// Boolean operation. Discriminants are the accelerator's operation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CsgOperation {
    Union = 0,
    Subtract = 1,
    Intersect = 2,
}

impl CsgOperation {
    pub const fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Result<Self, CsgError> {
        match code {
            0 => Ok(CsgOperation::Union),
            1 => Ok(CsgOperation::Subtract),
            2 => Ok(CsgOperation::Intersect),
            other => Err(CsgError::Unsupported {
                kind: "operation code",
                value: other.into(),
            }),
        }
    }
}

/// Which strategy computes the Boolean. Chosen by the caller, never by content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProcessingMode {
    /// BSP polygon clipping, via the native accelerator when present
    #[default]
    Polygon,
    /// Implicit functions reconstructed with marching cubes
    UniformVolumetric,
    /// Implicit functions reconstructed with octree dual contouring
    AdaptiveVolumetric,
}

impl ProcessingMode {
    pub const fn is_volumetric(self) -> bool {
        !matches!(self, ProcessingMode::Polygon)
    }
}

/// Power-of-two sampling density, stored as the exponent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Resolution {
    #[default]
    R64 = 6,
    R128 = 7,
    R256 = 8,
    R512 = 9,
}

impl Resolution {
    pub const fn exponent(self) -> u32 {
        self as u32
    }

    /// Cells across the largest dimension: `1 << exponent`
    pub const fn cell_count(self) -> u32 {
        1 << self.exponent()
    }

    pub fn from_exponent(exponent: i64) -> Result<Self, CsgError> {
        match exponent {
            6 => Ok(Resolution::R64),
            7 => Ok(Resolution::R128),
            8 => Ok(Resolution::R256),
            9 => Ok(Resolution::R512),
            other => Err(CsgError::Unsupported {
                kind: "resolution exponent",
                value: other,
            }),
        }
    }
}

/// How meshes become implicit functions in the volumetric modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImplicitMethod {
    /// Signed-distance grid: faster but less accurate
    #[default]
    Grid,
    /// Fast winding number: slower but more accurate
    Exact,
}

/// Per-call configuration of a Boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BooleanOptions {
    pub mode: ProcessingMode,
    pub input_resolution: Resolution,
    pub output_resolution: Resolution,
    pub implicit_method: ImplicitMethod,
}

impl BooleanOptions {
    pub const fn with_mode(mut self, mode: ProcessingMode) -> Self {
        self.mode = mode;
        self
    }

    pub const fn with_input_resolution(mut self, resolution: Resolution) -> Self {
        self.input_resolution = resolution;
        self
    }

    pub const fn with_output_resolution(mut self, resolution: Resolution) -> Self {
        self.output_resolution = resolution;
        self
    }

    pub const fn with_implicit_method(mut self, method: ImplicitMethod) -> Self {
        self.implicit_method = method;
        self
    }
}

/// Combine implicit operands according to `operation`.
///
/// Difference is the first operand minus the union of the rest.
fn combine_fields(operation: CsgOperation, mut fields: Vec<ImplicitFunction>) -> ImplicitFunction {
    match operation {
        CsgOperation::Union => ImplicitFunction::union(fields),
        CsgOperation::Intersect => ImplicitFunction::intersection(fields),
        CsgOperation::Subtract => {
            let first = fields.remove(0);
            ImplicitFunction::difference(first, fields)
        },
    }
}

/// Runs Booleans with a fixed configuration and accelerator.
pub struct CsgEngine {
    options: BooleanOptions,
    accelerator: Box<dyn Accelerator>,
}

impl Default for CsgEngine {
    fn default() -> Self {
        Self::new(BooleanOptions::default())
    }
}

impl CsgEngine {
    /// Engine probing the accelerator named by the environment on every call.
    pub fn new(options: BooleanOptions) -> Self {
        Self {
            options,
            accelerator: Box::new(ProcessAccelerator::from_env()),
        }
    }

    pub fn with_accelerator(mut self, accelerator: impl Accelerator + 'static) -> Self {
        self.accelerator = Box::new(accelerator);
        self
    }

    pub const fn options(&self) -> &BooleanOptions {
        &self.options
    }

    /// Boolean of `a` (placed by `transform_a`) with `b` (placed by `transform_b`).
    ///
    /// Inputs are never modified; the result is a new world-space mesh.
    #[allow(clippy::too_many_arguments)]
    #[instrument(skip_all, fields(operation = ?operation, mode = ?self.options.mode))]
    pub fn do_pair(
        &self,
        a: &Mesh,
        transform_a: &Matrix4<Real>,
        b: &Mesh,
        transform_b: &Matrix4<Real>,
        operation: CsgOperation,
        reporter: Option<&dyn ProgressReporter>,
        cancel: &CancellationToken,
    ) -> Result<Mesh, CsgError> {
        info!("pairwise boolean");
        let mut tracker = ProgressTracker::new(reporter);
        self.pair_windowed(a, transform_a, b, transform_b, operation, &mut tracker, 0.0, 1.0, cancel)
    }

    /// Pairwise Boolean whose progress occupies `[start, start + span]` of `tracker`.
    #[allow(clippy::too_many_arguments)]
    fn pair_windowed(
        &self,
        a: &Mesh,
        transform_a: &Matrix4<Real>,
        b: &Mesh,
        transform_b: &Matrix4<Real>,
        operation: CsgOperation,
        tracker: &mut ProgressTracker<'_>,
        start: Real,
        span: Real,
        cancel: &CancellationToken,
    ) -> Result<Mesh, CsgError> {
        cancel.check()?;

        if !self.options.mode.is_volumetric() {
            if let Some(mesh) = native::try_native_boolean(
                self.accelerator.as_ref(),
                a,
                transform_a,
                b,
                transform_b,
                operation,
                cancel,
            )? {
                tracker.report("Native boolean", start + span);
                return Ok(mesh);
            }

            let world_a = a.transformed(transform_a);
            let world_b = b.transformed(transform_b);
            let mut on_progress = |label: &str, local: Real| tracker.report_window(label, start, span, local);
            return boolean::combine(&world_a, &world_b, operation, &mut on_progress, cancel);
        }

        let world_a = a.transformed(transform_a);
        let world_b = b.transformed(transform_b);
        if world_a.face_count() < 4 {
            debug!(faces = world_a.face_count(), "operand A is degenerate, returning B");
            return Ok(world_b);
        } else if world_b.face_count() < 4 {
            debug!(faces = world_b.face_count(), "operand B is degenerate, returning A");
            return Ok(world_a);
        }

        let exact = self.options.implicit_method == ImplicitMethod::Exact;
        let input_cells = self.options.input_resolution.cell_count();

        tracker.report_window("Building implicit A", start, span, 0.0);
        let field_a = implicit::build(&world_a, exact, input_cells);
        cancel.check()?;
        tracker.report_window("Building implicit B", start, span, 1.0 / 3.0);
        let field_b = implicit::build(&world_b, exact, input_cells);
        cancel.check()?;

        tracker.report_window("Reconstructing", start, span, 2.0 / 3.0);
        let combined = combine_fields(operation, vec![field_a, field_b]);
        let mesh = self.reconstruct(&combined, cancel)?;
        tracker.report_window("Done", start, span, 1.0);
        Ok(mesh)
    }

    fn reconstruct(&self, field: &ImplicitFunction, cancel: &CancellationToken) -> Result<Mesh, CsgError> {
        volume::reconstruct(
            field,
            self.options.output_resolution.cell_count(),
            self.options.mode == ProcessingMode::AdaptiveVolumetric,
            cancel,
        )
    }

    /// N-ary Boolean over `(mesh, transform)` items.
    ///
    /// Polygon mode folds left to right through pairwise Booleans; the
    /// volumetric modes combine every operand at once and reconstruct a single
    /// time. A single item yields a copy of its mesh.
    #[instrument(skip_all, fields(operation = ?operation, mode = ?self.options.mode, items = items.len()))]
    pub fn do_array(
        &self,
        items: &[(Mesh, Matrix4<Real>)],
        operation: CsgOperation,
        reporter: Option<&dyn ProgressReporter>,
        cancel: &CancellationToken,
    ) -> Result<Mesh, CsgError> {
        let Some(((first_mesh, first_transform), rest)) = items.split_first() else {
            return Err(CsgError::EmptyInput);
        };
        if rest.is_empty() {
            return Ok(first_mesh.clone());
        }
        info!("n-ary boolean");

        let mut tracker = ProgressTracker::new(reporter);

        if !self.options.mode.is_volumetric() {
            let amount_per_operation = 1.0 / rest.len() as Real;
            let mut percent_completed = 0.0;
            let mut result = first_mesh.clone();
            let mut result_transform = *first_transform;

            for (mesh, transform) in rest {
                cancel.check()?;
                result = self.pair_windowed(
                    &result,
                    &result_transform,
                    mesh,
                    transform,
                    operation,
                    &mut tracker,
                    percent_completed,
                    amount_per_operation,
                    cancel,
                )?;
                // The accumulator now lives in world space
                result_transform = Matrix4::identity();
                percent_completed += amount_per_operation;
                tracker.report("Combining", percent_completed);
            }
            return Ok(result);
        }

        let exact = self.options.implicit_method == ImplicitMethod::Exact;
        let input_cells = self.options.input_resolution.cell_count();
        let mut fields = Vec::with_capacity(items.len());
        for (i, (mesh, transform)) in items.iter().enumerate() {
            cancel.check()?;
            tracker.report("Building implicit", 0.5 * i as Real / items.len() as Real);
            fields.push(implicit::build(&mesh.transformed(transform), exact, input_cells));
        }

        tracker.report("Reconstructing", 0.5);
        let combined = combine_fields(operation, fields);
        let mesh = self.reconstruct(&combined, cancel)?;
        tracker.report("Done", 1.0);
        Ok(mesh)
    }

    /// Subtract every `remove` item from every `keep` item.
    ///
    /// Each result is returned in its keep item's local space, i.e. with the
    /// inverse of the keep transform applied. Progress is split evenly over
    /// all `remove × keep` pairs.
    #[instrument(skip_all, fields(keep = keep.len(), remove = remove.len()))]
    pub fn subtract_many(
        &self,
        keep: &[(Mesh, Matrix4<Real>)],
        remove: &[(Mesh, Matrix4<Real>)],
        reporter: Option<&dyn ProgressReporter>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Mesh>, CsgError> {
        if keep.is_empty() || remove.is_empty() {
            return Ok(keep.iter().map(|(mesh, _)| mesh.clone()).collect());
        }

        let inverses = keep
            .iter()
            .map(|(_, t)| t.try_inverse().ok_or(CsgError::SingularTransform))
            .collect::<Result<Vec<_>, _>>()?;

        let mut tracker = ProgressTracker::new(reporter);
        let amount_per_operation = 1.0 / (keep.len() * remove.len()) as Real;
        let mut percent_completed = 0.0;
        let identity = Matrix4::identity();

        let mut results: Vec<Mesh> = keep.iter().map(|(mesh, t)| mesh.transformed(t)).collect();
        for (remove_mesh, remove_transform) in remove {
            tracker.report("Copy Remove", percent_completed);
            let world_remove = remove_mesh.transformed(remove_transform);

            for result in results.iter_mut() {
                cancel.check()?;
                tracker.report("Copy Keep", percent_completed);
                tracker.report("Do CSG", percent_completed);
                *result = self.pair_windowed(
                    result,
                    &identity,
                    &world_remove,
                    &identity,
                    CsgOperation::Subtract,
                    &mut tracker,
                    percent_completed,
                    amount_per_operation,
                    cancel,
                )?;
                percent_completed += amount_per_operation;
            }
        }

        for (result, inverse) in results.iter_mut().zip(&inverses) {
            result.transform_mut(inverse);
        }
        Ok(results)
    }
}

/// Pairwise Boolean with an engine built from `options`.
#[allow(clippy::too_many_arguments)]
pub fn do_pair(
    a: &Mesh,
    transform_a: &Matrix4<Real>,
    b: &Mesh,
    transform_b: &Matrix4<Real>,
    operation: CsgOperation,
    options: &BooleanOptions,
    reporter: Option<&dyn ProgressReporter>,
    cancel: &CancellationToken,
) -> Result<Mesh, CsgError> {
    CsgEngine::new(*options).do_pair(a, transform_a, b, transform_b, operation, reporter, cancel)
}

/// N-ary Boolean with an engine built from `options`.
pub fn do_array(
    items: &[(Mesh, Matrix4<Real>)],
    operation: CsgOperation,
    options: &BooleanOptions,
    reporter: Option<&dyn ProgressReporter>,
    cancel: &CancellationToken,
) -> Result<Mesh, CsgError> {
    CsgEngine::new(*options).do_array(items, operation, reporter, cancel)
}

/// `count` copies of `mesh` spaced `distance` apart along `direction`.
///
/// Copy `i` is placed by `transform` followed by a world translation of
/// `normalize(direction) * distance * i`. At least one copy is produced.
pub fn linear_array(
    mesh: &Mesh,
    transform: &Matrix4<Real>,
    count: usize,
    direction: &Vector3<Real>,
    distance: Real,
) -> Vec<(Mesh, Matrix4<Real>)> {
    let step = direction.try_normalize(Real::EPSILON).unwrap_or_else(Vector3::zeros) * distance;
    (0..count.max(1))
        .map(|i| {
            let offset = Matrix4::new_translation(&(step * i as Real));
            (mesh.clone(), offset * transform)
        })
        .collect()
}
