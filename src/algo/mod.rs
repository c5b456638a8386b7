//! Mapping and patching algorithms.
//!
//! The pipeline stages, in the order a branch flows through them:
//!
//! 1. [`metrics::compute_branch_metrics`]: angular and abscissa metrics
//!    on the whole surface.
//! 2. [`refsys::compute_bifurcation_reference_systems`]: one local frame
//!    per bifurcation.
//! 3. [`split::split_surface`]: per-branch sub-meshes.
//! 4. [`mapping::compute_branch_mapping`]: boundary, harmonic and
//!    stretched coordinates per branch.
//! 5. [`patching::compute_branch_patching`]: the patch grid and raster.
//! 6. [`varmap::extract_variable_map`]: dense matrices from raster layers.
//!
//! [`crate::pipeline`] drives all six; the stages are public for callers
//! that need to intervene between steps.

pub mod mapping;
pub mod metrics;
pub mod patching;
pub mod progress;
pub mod refsys;
pub mod sparse;
pub mod split;
pub mod varmap;

pub use mapping::{compute_branch_mapping, MappingOptions, INTERIOR_BOUNDARY_METRIC};
pub use metrics::compute_branch_metrics;
pub use patching::{compute_branch_patching, PatchingOptions};
pub use progress::{CancelToken, Progress};
pub use refsys::{compute_bifurcation_reference_systems, ReferenceSystem};
pub use split::split_surface;
pub use varmap::extract_variable_map;
