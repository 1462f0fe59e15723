//! Boolean operations (*union*, *subtract*, *intersect*) on closed triangle meshes.
//!
//! Three strategies share one entry point in [`csg`]:
//! - **Polygon**: exact BSP clipping, delegated to an external native
//!   accelerator process when one is installed
//! - **Uniform volumetric**: meshes become implicit functions (winding number
//!   or signed-distance grid) that are combined and re-meshed with marching cubes
//! - **Adaptive volumetric**: the same implicit pipeline re-meshed with octree
//!   dual contouring
//!
//! Every operation takes an optional [`progress::ProgressReporter`] and a
//! [`progress::CancellationToken`].
//!
//! # Features
//! #### Default
//! - [**stl-io**](https://en.wikipedia.org/wiki/STL_(file_format)): `.stl` import/export
//!
//! # Environment
//! - `MESHCSG_ACCELERATOR` (runtime): path to the native accelerator executable
//! - `MESHCSG_TOLERANCE` (build time): vertex weld tolerance

#![forbid(unsafe_code)]
#![deny(unused)]
#![warn(clippy::missing_const_for_fn, clippy::approx_constant, clippy::all)]

pub mod aabb;
pub mod csg;
pub mod errors;
pub mod float_types;
pub mod implicit;
pub mod io;
pub mod lattice;
pub mod mesh;
pub mod native;
pub mod progress;
pub mod volume;

pub use csg::{
    BooleanOptions, CsgEngine, CsgOperation, ImplicitMethod, ProcessingMode, Resolution, do_array,
    do_pair, linear_array,
};
pub use errors::{BridgeError, CsgError, ValidationError};
pub use mesh::Mesh;
pub use progress::{CancellationToken, ProgressReporter, ProgressStatus};
