//! # Vesselmap
//!
//! Branch-based mapping and patching of vascular surface meshes.
//!
//! Vesselmap takes a vessel wall surface plus its branch-segmented
//! centerline tree and flattens each branch onto a rectangular patch grid,
//! so that scalar fields (wall shear stress, thickness, any CFD payload)
//! can be compared patch-by-patch across subjects and time points.
//!
//! ## Pipeline
//!
//! - **Metrics**: circumferential and longitudinal coordinates for every
//!   surface vertex, measured against the centerline.
//! - **Reference systems**: one local frame per bifurcation, anchoring
//!   the circumferential seam.
//! - **Splitting**: per-branch sub-meshes cut along the centerline's
//!   maximal-inscribed-sphere tubes.
//! - **Mapping**: boundary, harmonic and stretched coordinates turning
//!   each branch into a flattened cylinder.
//! - **Patching**: fixed-size longitudinal slabs crossed with equal-angle
//!   sectors, with area-weighted means per patch.
//! - **Variable maps**: any patch layer as a dense `slabs × sectors`
//!   matrix.
//!
//! ## Quick Start
//!
//! ```no_run
//! use vesselmap::prelude::*;
//!
//! let surface = vesselmap::io::load_surface("wall.vtk").unwrap();
//! let centerline = vesselmap::io::load_centerline("centerline.vtk").unwrap();
//!
//! let output = process_branches(&surface, &centerline, &PipelineOptions::default()).unwrap();
//! for branch in &output.branches {
//!     let map = extract_variable_map(&branch.raster, &Field::PatchArea).unwrap();
//!     println!("branch {}: {} x {} patches", branch.group_id, map.nrows(), map.ncols());
//! }
//! ```
//!
//! Each stage is also callable on its own through [`algo`]; see
//! [`pipeline::process_branches`] for the orchestration the one-shot entry
//! point performs.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algo;
pub mod centerline;
pub mod error;
pub mod field;
pub mod io;
pub mod mesh;
pub mod pipeline;
pub mod raster;

/// Prelude module for convenient imports.
///
/// This module re-exports the most commonly used types and functions:
///
/// ```
/// use vesselmap::prelude::*;
/// ```
pub mod prelude {
    pub use crate::algo::{
        compute_bifurcation_reference_systems, compute_branch_mapping, compute_branch_metrics,
        compute_branch_patching, extract_variable_map, split_surface, CancelToken,
        MappingOptions, PatchingOptions, Progress, ReferenceSystem,
    };
    pub use crate::centerline::Centerline;
    pub use crate::error::{MapError, Result};
    pub use crate::field::Field;
    pub use crate::mesh::{Attribute, AttributeSet, Surface};
    pub use crate::pipeline::{process_branches, PipelineOptions, PipelineOutput};
    pub use crate::raster::PatchRaster;
}

// Re-export nalgebra types for convenience
pub use nalgebra;
