//! Validation and Boolean-operation errors

use crate::float_types::Real;
use nalgebra::Point3;
use std::fmt::Display;

/// All the possible validation issues we might encounter while building a mesh
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// (FaceIndexOutOfRange) A face references a vertex that does not exist
    FaceIndexOutOfRange { face: usize, index: usize, vertex_count: usize },
    /// (InvalidCoordinate) The coordinate has a NaN or infinite
    InvalidCoordinate(Point3<Real>),
    /// (TooFewPoints) A face has fewer than three vertices
    TooFewPoints { face: usize, count: usize },
    /// In general, anything else
    Other(String, Option<Point3<Real>>),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::FaceIndexOutOfRange { face, index, vertex_count } => write!(
                f,
                "(FaceIndexOutOfRange) Face {face} references vertex {index} but only {vertex_count} vertices exist"
            ),
            ValidationError::InvalidCoordinate(opoint) => {
                write!(f, "(InvalidCoordinate) The coordinate ({}) has a NaN or infinite", opoint)
            },
            ValidationError::TooFewPoints { face, count } => {
                write!(f, "(TooFewPoints) Face {face} has {count} vertices, at least 3 are required")
            },
            ValidationError::Other(str, opoint) => {
                if let Some(opoint) = opoint {
                    write!(f, "{} at: {}", str, opoint)
                } else {
                    write!(f, "{}", str)
                }
            },
        }
    }
}

/// Errors surfaced by the Boolean entry points.
#[derive(Debug, thiserror::Error)]
pub enum CsgError {
    /// The shared cancellation token was triggered at a checkpoint.
    #[error("operation cancelled")]
    Cancelled,
    /// `do_array` was handed no items.
    #[error("at least one item is required")]
    EmptyInput,
    /// An enumeration code outside the supported set.
    #[error("unsupported {kind}: {value}")]
    Unsupported { kind: &'static str, value: i64 },
    /// A transform had to be inverted but is singular.
    #[error("transform is not invertible")]
    SingularTransform,
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Failures inside the out-of-process accelerator.
///
/// These never reach callers of the Boolean entry points; they are logged and
/// treated as "accelerator unavailable". `Cancelled` surfaces as
/// [`CsgError::Cancelled`].
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("accelerator i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("accelerator protocol violation: {0}")]
    Protocol(String),
    #[error("accelerator exited with {0}")]
    ExitStatus(std::process::ExitStatus),
    #[error("accelerator returned an invalid mesh: {0}")]
    InvalidOutput(#[from] ValidationError),
    #[error("accelerator call was cancelled")]
    Cancelled,
    #[error("accelerator did not finish within {0:?}")]
    Timeout(std::time::Duration),
}
