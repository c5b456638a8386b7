//! End-to-end branch processing.
//!
//! [`process_branches`] runs the whole pipeline: metrics and reference
//! systems once on the full geometry, then split, map and patch for every
//! branch in parallel. Branches with unsuitable geometry are skipped and
//! reported, not fatal: one collapsed side branch must not cost the whole
//! vessel tree.

use std::sync::atomic::{AtomicUsize, Ordering};

use log::{info, warn};
use rayon::prelude::*;

use crate::algo::mapping::{compute_branch_mapping, MappingOptions};
use crate::algo::metrics::compute_branch_metrics;
use crate::algo::patching::{compute_branch_patching, PatchingOptions};
use crate::algo::progress::{CancelToken, Progress};
use crate::algo::refsys::{compute_bifurcation_reference_systems, ReferenceSystem};
use crate::algo::split::split_surface;
use crate::centerline::Centerline;
use crate::error::{MapError, Result};
use crate::mesh::Surface;
use crate::raster::PatchRaster;

/// Controls for [`process_branches`].
#[derive(Debug)]
pub struct PipelineOptions {
    /// Branches to process; `None` processes every branch group.
    pub group_ids: Option<Vec<i64>>,
    /// Harmonic solver controls.
    pub mapping: MappingOptions,
    /// Patch grid controls.
    pub patching: PatchingOptions,
    /// Run branch work on the rayon thread pool.
    pub parallel: bool,
    /// Cooperative cancellation, polled between stages of every branch.
    pub cancel: CancelToken,
    /// Progress callback, invoked once per finished branch.
    pub progress: Progress,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            group_ids: None,
            mapping: MappingOptions::default(),
            patching: PatchingOptions::default(),
            parallel: true,
            cancel: CancelToken::default(),
            progress: Progress::default(),
        }
    }
}

/// One successfully mapped and patched branch.
#[derive(Debug)]
pub struct BranchResult {
    /// Branch group id.
    pub group_id: i64,
    /// The branch sub-mesh with all mapping and patching arrays attached.
    pub surface: Surface,
    /// The patch raster of area-weighted variable means.
    pub raster: PatchRaster,
}

/// A branch skipped because its geometry could not be mapped.
#[derive(Debug)]
pub struct BranchFailure {
    /// Branch group id.
    pub group_id: i64,
    /// The recoverable error that stopped the branch.
    pub error: MapError,
}

/// Everything [`process_branches`] produces.
#[derive(Debug)]
pub struct PipelineOutput {
    /// The full input surface with `AngularMetric` and `AbscissaMetric`,
    /// plus the mapping and patching arrays when its geometry allows a
    /// whole-surface pass.
    pub overview: Surface,
    /// One reference system per bifurcation.
    pub systems: Vec<ReferenceSystem>,
    /// Successfully processed branches, in group id order.
    pub branches: Vec<BranchResult>,
    /// Branches skipped on recoverable geometry errors.
    pub failures: Vec<BranchFailure>,
}

/// Run metrics, reference systems, the whole-surface patching pass, and
/// the per-branch stages.
///
/// Branch work runs on the rayon thread pool unless
/// [`PipelineOptions::parallel`] is cleared. Recoverable errors
/// (degenerate geometry, solver non-convergence, branches with no surface)
/// land in [`PipelineOutput::failures`]; anything else, including
/// cancellation, aborts the run.
pub fn process_branches(
    surface: &Surface,
    centerline: &Centerline,
    options: &PipelineOptions,
) -> Result<PipelineOutput> {
    options.cancel.check()?;
    let overview = compute_branch_metrics(surface, centerline)?;
    let systems = compute_bifurcation_reference_systems(centerline)?;

    // Whole-surface patching pass for the overview display. Geometry that
    // cannot be mapped un-split (extra boundary rings, non-manifold seams)
    // keeps the metrics-only overview.
    options.cancel.check()?;
    let overview = match patch_whole_surface(&overview, centerline, &systems, options) {
        Ok(patched) => patched,
        Err(error) if error.is_branch_recoverable() => {
            warn!("overview patching pass skipped: {error}");
            overview
        }
        Err(error) => return Err(error),
    };

    let groups = match &options.group_ids {
        Some(ids) => ids.clone(),
        None => centerline.branch_group_ids()?,
    };
    info!(
        "processing {} branch(es), {} bifurcation(s)",
        groups.len(),
        systems.len()
    );

    let done = AtomicUsize::new(0);
    let run_branch = |&group_id: &i64| {
        let outcome = process_one_branch(&overview, centerline, &systems, group_id, options);
        let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
        options
            .progress
            .report(finished, groups.len(), &format!("branch {group_id}"));
        (group_id, outcome)
    };
    let outcomes: Vec<(i64, Result<BranchResult>)> = if options.parallel {
        groups.par_iter().map(run_branch).collect()
    } else {
        groups.iter().map(run_branch).collect()
    };

    let mut branches = Vec::new();
    let mut failures = Vec::new();
    for (group_id, outcome) in outcomes {
        match outcome {
            Ok(result) => branches.push(result),
            Err(error) if error.is_branch_recoverable() => {
                warn!("skipping branch {group_id}: {error}");
                failures.push(BranchFailure { group_id, error });
            }
            Err(error) => return Err(error),
        }
    }

    Ok(PipelineOutput {
        overview,
        systems,
        branches,
        failures,
    })
}

/// Map and patch the un-split surface, producing the overview geometry.
fn patch_whole_surface(
    overview: &Surface,
    centerline: &Centerline,
    systems: &[ReferenceSystem],
    options: &PipelineOptions,
) -> Result<Surface> {
    let mapped = compute_branch_mapping(overview, centerline, systems, &options.mapping)?;
    let (patched, _) = compute_branch_patching(&mapped, &options.patching)?;
    Ok(patched)
}

fn process_one_branch(
    overview: &Surface,
    centerline: &Centerline,
    systems: &[ReferenceSystem],
    group_id: i64,
    options: &PipelineOptions,
) -> Result<BranchResult> {
    options.cancel.check()?;
    let branch = split_surface(overview, centerline, Some(&[group_id]))?;
    if branch.is_empty() {
        return Err(MapError::DegenerateGeometry(format!(
            "branch {group_id} has no surface triangles"
        )));
    }

    options.cancel.check()?;
    let mapped = compute_branch_mapping(&branch, centerline, systems, &options.mapping)?;

    options.cancel.check()?;
    let (surface, raster) = compute_branch_patching(&mapped, &options.patching)?;
    Ok(BranchResult {
        group_id,
        surface,
        raster,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    use nalgebra::{Point3, Vector3};

    use super::*;
    use crate::algo::metrics::test_meshes::{cylinder, straight_centerline};
    use crate::field::Field;

    /// Y-shaped centerline inside a straight cylinder of radius 1 and
    /// length 6: stem group 0, blanked junction group 1, and two branches
    /// (groups 2 and 3) whose samples leave the cylinder sideways. The two
    /// branch splits are half-open shells, so only the stem maps cleanly.
    fn y_centerline() -> Centerline {
        let mut points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, 1.25),
            Point3::new(0.0, 0.0, 2.5),
            Point3::new(-0.1, 0.0, 3.25),
            Point3::new(0.1, 0.0, 3.25),
        ];
        points.extend((0..3).map(|k| Point3::new(-0.5 - 0.4 * k as f64, 0.0, 3.75 + 0.75 * k as f64)));
        points.extend((0..3).map(|k| Point3::new(0.5 + 0.4 * k as f64, 0.0, 3.75 + 0.75 * k as f64)));

        let cells = vec![
            vec![0, 1, 2],
            vec![2, 3],
            vec![5, 6, 7],
            vec![0, 1, 2],
            vec![2, 4],
            vec![8, 9, 10],
        ];
        let mut line = Centerline::new(points, cells).unwrap();

        line.cell_data_mut()
            .set_integers(Field::GroupIds, vec![0, 1, 2, 0, 1, 3]);
        line.cell_data_mut()
            .set_integers(Field::TractIds, vec![0, 1, 2, 0, 1, 2]);
        line.cell_data_mut()
            .set_integers(Field::CenterlineIds, vec![0, 0, 0, 1, 1, 1]);
        line.cell_data_mut()
            .set_integers(Field::Blanking, vec![0, 1, 0, 0, 1, 0]);

        let n = line.num_points();
        let radii = vec![1.0, 1.0, 1.0, 0.9, 0.9, 0.8, 0.8, 0.8, 0.8, 0.8, 0.8];
        let abscissas = vec![0.0, 1.25, 2.5, 3.25, 3.25, 3.75, 4.5, 5.25, 3.75, 4.5, 5.25];
        line.point_data_mut().set_scalars(Field::Radius, radii);
        line.point_data_mut().set_scalars(Field::Abscissas, abscissas);
        line.point_data_mut()
            .set_vectors(Field::ParallelTransportNormals, vec![Vector3::x(); n]);
        line.point_data_mut()
            .set_vectors(Field::FrenetTangent, vec![Vector3::z(); n]);
        line
    }

    #[test]
    fn test_single_branch_pipeline() {
        let surface = cylinder(16, 9, 1.0, 6.0);
        let line = straight_centerline(19, 6.0, 1.0);

        let output = process_branches(&surface, &line, &PipelineOptions::default()).unwrap();
        assert!(output.systems.is_empty());
        assert!(output.failures.is_empty());
        assert_eq!(output.branches.len(), 1);

        let branch = &output.branches[0];
        assert_eq!(branch.group_id, 0);
        assert!(branch.surface.point_data().contains(&Field::Slab));
        assert!(branch.raster.contains(&Field::PatchArea));
        assert!(output.overview.point_data().contains(&Field::AngularMetric));
    }

    #[test]
    fn test_overview_carries_patch_arrays() {
        let surface = cylinder(16, 9, 1.0, 6.0);
        let line = straight_centerline(19, 6.0, 1.0);

        let output = process_branches(&surface, &line, &PipelineOptions::default()).unwrap();
        let overview = &output.overview;
        assert_eq!(overview.num_points(), surface.num_points());
        for field in [Field::StretchedMapping, Field::PatchArea] {
            assert!(overview.point_data().contains(&field), "missing {field}");
        }
        assert!(overview.point_data().integers(&Field::Slab).is_ok());
        assert!(overview.point_data().integers(&Field::Sector).is_ok());
    }

    #[test]
    fn test_unmappable_overview_falls_back_to_metrics() {
        // A capped fan disk has a single boundary ring, so the whole-surface
        // pass is skipped while the run itself still succeeds.
        let mut points = vec![Point3::new(0.0, 0.0, 0.0)];
        let n = 12;
        for i in 0..n {
            let theta = std::f64::consts::TAU * i as f64 / n as f64;
            points.push(Point3::new(theta.cos(), theta.sin(), 0.0));
        }
        let triangles: Vec<[usize; 3]> = (0..n).map(|i| [0, 1 + i, 1 + (i + 1) % n]).collect();
        let disk = Surface::new(points, triangles).unwrap();
        let line = straight_centerline(5, 2.0, 1.0);

        let output = process_branches(&disk, &line, &PipelineOptions::default()).unwrap();
        assert!(output.overview.point_data().contains(&Field::AngularMetric));
        assert!(!output.overview.point_data().contains(&Field::Slab));
        // The lone branch is the same degenerate disk and lands in failures.
        assert_eq!(output.failures.len(), 1);
    }

    #[test]
    fn test_serial_mode_matches_parallel() {
        let surface = cylinder(12, 5, 1.0, 4.0);
        let line = straight_centerline(9, 4.0, 1.0);

        let options = PipelineOptions {
            parallel: false,
            ..Default::default()
        };
        let serial = process_branches(&surface, &line, &options).unwrap();
        let parallel = process_branches(&surface, &line, &PipelineOptions::default()).unwrap();

        assert_eq!(serial.branches.len(), parallel.branches.len());
        let a = &serial.branches[0];
        let b = &parallel.branches[0];
        assert_eq!(
            a.raster.layer(&Field::PatchArea).unwrap(),
            b.raster.layer(&Field::PatchArea).unwrap()
        );
    }

    #[test]
    fn test_missing_branch_is_recoverable() {
        let surface = cylinder(12, 5, 1.0, 4.0);
        let line = straight_centerline(9, 4.0, 1.0);

        let options = PipelineOptions {
            group_ids: Some(vec![0, 99]),
            ..Default::default()
        };
        let output = process_branches(&surface, &line, &options).unwrap();
        assert_eq!(output.branches.len(), 1);
        assert_eq!(output.failures.len(), 1);
        assert_eq!(output.failures[0].group_id, 99);
        assert!(output.failures[0].error.is_branch_recoverable());
    }

    #[test]
    fn test_cancellation_aborts() {
        let surface = cylinder(12, 5, 1.0, 4.0);
        let line = straight_centerline(9, 4.0, 1.0);

        let options = PipelineOptions::default();
        options.cancel.cancel();
        let err = process_branches(&surface, &line, &options).unwrap_err();
        assert!(matches!(err, MapError::Cancelled));
    }

    #[test]
    fn test_long_cylinder_grid_and_patch_areas() {
        let surface = cylinder(48, 51, 1.0, 50.0);
        let line = straight_centerline(101, 50.0, 1.0);

        let mut options = PipelineOptions::default();
        options.patching.longitudinal_size = 1.0;
        options.patching.circumferential_sectors = 8;

        let output = process_branches(&surface, &line, &options).unwrap();
        let branch = &output.branches[0];
        assert_eq!(branch.raster.slabs(), 50);
        assert_eq!(branch.raster.sectors(), 8);

        // By symmetry every patch covers the same area; allow a little
        // slack for triangles binned across slab boundaries.
        let areas = branch.raster.layer(&Field::PatchArea).unwrap();
        let mean = areas.iter().sum::<f64>() / areas.len() as f64;
        for (i, &a) in areas.iter().enumerate() {
            assert!(
                (a - mean).abs() / mean < 0.05,
                "patch {i}: area {a} vs mean {mean}"
            );
        }
    }

    #[test]
    fn test_y_bifurcation_stem_succeeds_branches_skipped() {
        let surface = cylinder(16, 13, 1.0, 6.0);
        let line = y_centerline();

        let output = process_branches(&surface, &line, &PipelineOptions::default()).unwrap();
        assert_eq!(output.systems.len(), 1);
        assert_eq!(output.systems[0].downstream_groups, vec![2, 3]);

        // The stem is a clean tube; the two half-shell branch splits have a
        // single boundary loop and are skipped as degenerate.
        let stem = output
            .branches
            .iter()
            .find(|b| b.group_id == 0)
            .expect("stem branch mapped");
        assert!(stem.surface.num_triangles() > 0);
        assert!(stem.surface.point_data().contains(&Field::PatchArea));

        for failure in &output.failures {
            assert!(failure.error.is_branch_recoverable());
        }
        let skipped: Vec<i64> = output.failures.iter().map(|f| f.group_id).collect();
        assert!(skipped.contains(&2) || skipped.contains(&3) || output.branches.len() == 3);
    }

    #[test]
    fn test_splits_do_not_overlap() {
        let surface = cylinder(16, 13, 1.0, 6.0);
        let line = y_centerline();
        let overview = compute_branch_metrics(&surface, &line).unwrap();

        let mut total = 0.0;
        for g in [0, 2, 3] {
            let split = split_surface(&overview, &line, Some(&[g])).unwrap();
            assert!(!split.is_empty(), "group {g} claimed no triangles");
            total += split.surface_area();
        }
        // Majority voting assigns each triangle to at most one group.
        assert!(total <= surface.surface_area() + 1e-9);
    }

    #[test]
    fn test_progress_reported_per_branch() {
        let surface = cylinder(12, 5, 1.0, 4.0);
        let line = straight_centerline(9, 4.0, 1.0);

        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let options = PipelineOptions {
            progress: Progress::new(move |_, _, _| {
                seen.fetch_add(1, Ordering::Relaxed);
            }),
            ..Default::default()
        };
        process_branches(&surface, &line, &options).unwrap();
        assert_eq!(count.load(Ordering::Relaxed), 1);
    }
}
