//! Branch mapping: longitudinal and circumferential coordinates.
//!
//! Given one split branch surface, this stage produces three point-data
//! scalars:
//!
//! - `BoundaryMetric`: circumferential coordinate in [0, 1) on the open
//!   boundary rings, seam-anchored at the bifurcation reference system the
//!   branch touches; interior vertices carry the sentinel −1.
//! - `HarmonicMapping`: solution of the Laplace equation with Dirichlet
//!   data 0 on the proximal ring(s) and 1 on the distal ring(s), a smooth
//!   longitudinal coordinate free of the noise in raw nearest-sample
//!   abscissas.
//! - `StretchedMapping`: the harmonic coordinate rebinned monotonically so
//!   its value distribution matches `AbscissaMetric`, restoring arc-length
//!   units while keeping the harmonic level sets.

use nalgebra::{DVector, Point3};

use crate::algo::metrics::angular_position;
use crate::algo::refsys::ReferenceSystem;
use crate::algo::sparse::{conjugate_gradient, CsrMatrix};
use crate::centerline::{Centerline, SampleFilter};
use crate::error::{MapError, Result};
use crate::field::Field;
use crate::mesh::Surface;

/// Interior sentinel for `BoundaryMetric`.
pub const INTERIOR_BOUNDARY_METRIC: f64 = -1.0;

/// Solver controls for the harmonic mapping stage.
#[derive(Debug, Clone, Copy)]
pub struct MappingOptions {
    /// Iteration cap for the conjugate gradient solver.
    pub max_iterations: usize,
    /// Relative residual tolerance for the conjugate gradient solver.
    pub tolerance: f64,
}

impl Default for MappingOptions {
    fn default() -> Self {
        Self {
            max_iterations: 4000,
            tolerance: 1e-10,
        }
    }
}

impl MappingOptions {
    /// Set the solver iteration cap.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the solver tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }
}

/// Map one branch surface to tube coordinates.
///
/// `surface` must be a single split branch carrying `AngularMetric` and
/// `AbscissaMetric` point data; `systems` anchors the circumferential seam
/// (an empty slice falls back to the parallel transport frame).
///
/// # Errors
///
/// `DegenerateGeometry` when the branch has fewer than two boundary rings,
/// a ring with fewer than three vertices, or a non-finite solve result;
/// `ConvergenceFailed` when the harmonic solver stalls. Both are recoverable
/// per branch.
pub fn compute_branch_mapping(
    surface: &Surface,
    centerline: &Centerline,
    systems: &[ReferenceSystem],
    options: &MappingOptions,
) -> Result<Surface> {
    if surface.is_empty() {
        return Err(MapError::InvalidInput("surface has no triangles".into()));
    }
    surface.validate()?;
    centerline.validate_for_mapping()?;
    let abscissa = surface.point_data().scalars(&Field::AbscissaMetric)?;

    let loops = surface.boundary_loops()?;
    if loops.len() < 2 {
        return Err(MapError::DegenerateGeometry(format!(
            "branch has {} boundary rings, need at least 2",
            loops.len()
        )));
    }
    for (i, ring) in loops.iter().enumerate() {
        if ring.len() < 3 {
            return Err(MapError::DegenerateGeometry(format!(
                "boundary ring {i} has only {} vertices",
                ring.len()
            )));
        }
    }

    // Branch group, when the surface came through the splitter.
    let group = surface
        .point_data()
        .integers(&Field::GroupIds)
        .ok()
        .and_then(|g| g.first().copied());

    let boundary_metric = compute_boundary_metric(surface, centerline, systems, &loops, group)?;
    let harmonic = compute_harmonic(surface, &loops, abscissa, options)?;
    let stretched = rebin_monotone(&harmonic, abscissa);

    for value in harmonic.iter().chain(&stretched) {
        if !value.is_finite() {
            return Err(MapError::DegenerateGeometry(
                "mapping produced a non-finite coordinate".into(),
            ));
        }
    }

    let mut out = surface.clone();
    out.point_data_mut()
        .set_scalars(Field::BoundaryMetric, boundary_metric);
    out.point_data_mut()
        .set_scalars(Field::HarmonicMapping, harmonic);
    out.point_data_mut()
        .set_scalars(Field::StretchedMapping, stretched);
    Ok(out)
}

/// Circumferential coordinate on the boundary rings, −1 elsewhere.
fn compute_boundary_metric(
    surface: &Surface,
    centerline: &Centerline,
    systems: &[ReferenceSystem],
    loops: &[Vec<usize>],
    group: Option<i64>,
) -> Result<Vec<f64>> {
    let normals = centerline.parallel_transport_normals()?;
    let tangents = centerline.tangents()?;

    let mut metric = vec![INTERIOR_BOUNDARY_METRIC; surface.num_points()];
    for ring in loops {
        let barycenter = ring_barycenter(surface, ring);

        // Frame origin and tangent from the nearest open sample of the
        // branch's own group when known.
        let filter = match group {
            Some(g) => SampleFilter::Group(g),
            None => SampleFilter::NonBlanked,
        };
        let sample = match centerline.nearest_sample(&barycenter, filter)? {
            Some(s) => s,
            None => centerline
                .nearest_sample(&barycenter, SampleFilter::NonBlanked)?
                .ok_or_else(|| {
                    MapError::InvalidInput("centerline has no non-blanked tracts".into())
                })?,
        };
        let origin = centerline.point(sample.point);
        let tangent = tangents[sample.point];

        // Seam direction: the up normal of the nearest reference system the
        // branch touches, projected into the ring's cross-section plane.
        // Without a matching system the parallel transport frame stands in.
        let mut reference = nearest_system(systems, &barycenter, group)
            .map(|sys| sys.up_normal)
            .unwrap_or(normals[sample.point]);
        reference -= reference.dot(&tangent) * tangent;
        if reference.norm_squared() < 1e-24 {
            reference = normals[sample.point];
        } else {
            reference.normalize_mut();
        }

        for &v in ring {
            metric[v] = angular_position(surface.point(v), origin, &tangent, &reference);
        }
    }
    Ok(metric)
}

/// The reference system nearest to `p` among those touching `group`.
fn nearest_system<'a>(
    systems: &'a [ReferenceSystem],
    p: &Point3<f64>,
    group: Option<i64>,
) -> Option<&'a ReferenceSystem> {
    systems
        .iter()
        .filter(|sys| group.map_or(true, |g| sys.touches_group(g)))
        .min_by(|a, b| {
            let da = (a.origin - p).norm_squared();
            let db = (b.origin - p).norm_squared();
            da.total_cmp(&db)
        })
}

fn ring_barycenter(surface: &Surface, ring: &[usize]) -> Point3<f64> {
    let mut sum = nalgebra::Vector3::zeros();
    for &v in ring {
        sum += surface.point(v).coords;
    }
    Point3::from(sum / ring.len() as f64)
}

/// Laplace solve with Dirichlet data 0 on proximal rings, 1 on distal ones.
///
/// Rings are classified by their mean `AbscissaMetric`: those below the
/// midpoint of the ring means are proximal. With the usual two rings this is
/// simply lower ring 0, upper ring 1.
fn compute_harmonic(
    surface: &Surface,
    loops: &[Vec<usize>],
    abscissa: &[f64],
    options: &MappingOptions,
) -> Result<Vec<f64>> {
    let n = surface.num_points();

    let means: Vec<f64> = loops
        .iter()
        .map(|ring| ring.iter().map(|&v| abscissa[v]).sum::<f64>() / ring.len() as f64)
        .collect();
    let lo = means.iter().cloned().fold(f64::INFINITY, f64::min);
    let hi = means.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let mid = 0.5 * (lo + hi);

    let mut dirichlet = vec![None; n];
    for (ring, &mean) in loops.iter().zip(&means) {
        let value = if mean <= mid { 0.0 } else { 1.0 };
        for &v in ring {
            dirichlet[v] = Some(value);
        }
    }

    let interior: Vec<usize> = (0..n).filter(|&v| dirichlet[v].is_none()).collect();
    let mut solution: Vec<f64> = (0..n).map(|v| dirichlet[v].unwrap_or(0.0)).collect();
    if interior.is_empty() {
        return Ok(solution);
    }
    let mut interior_index = vec![usize::MAX; n];
    for (k, &v) in interior.iter().enumerate() {
        interior_index[v] = k;
    }

    // Reduced system: interior rows of the cotangent Laplacian, boundary
    // columns moved to the right-hand side.
    let m = interior.len();
    let mut triplets = Vec::new();
    let mut rhs = DVector::zeros(m);
    for (i, j, w) in cotangent_laplacian(surface) {
        if dirichlet[i].is_some() {
            continue;
        }
        let row = interior_index[i];
        match dirichlet[j] {
            Some(value) => rhs[row] -= w * value,
            None => triplets.push((row, interior_index[j], w)),
        }
    }
    let a = CsrMatrix::from_triplets(m, m, triplets);
    let x = conjugate_gradient(&a, &rhs, options.max_iterations, options.tolerance)?;

    for (k, &v) in interior.iter().enumerate() {
        solution[v] = x[k];
    }
    Ok(solution)
}

/// Cotangent Laplacian triplets (positive diagonal, negative off-diagonal).
fn cotangent_laplacian(surface: &Surface) -> Vec<(usize, usize, f64)> {
    let mut triplets = Vec::with_capacity(surface.num_triangles() * 12);
    for tri in surface.triangles() {
        let [v0, v1, v2] = *tri;
        let p0 = surface.point(v0);
        let p1 = surface.point(v1);
        let p2 = surface.point(v2);

        let cot0 = cotangent_angle(p0, p1, p2).max(1e-8);
        let cot1 = cotangent_angle(p1, p0, p2).max(1e-8);
        let cot2 = cotangent_angle(p2, p0, p1).max(1e-8);

        // Each edge weighted by half the cotangent of the opposite angle.
        for (i, j, w) in [
            (v0, v1, 0.5 * cot2),
            (v1, v2, 0.5 * cot0),
            (v2, v0, 0.5 * cot1),
        ] {
            triplets.push((i, j, -w));
            triplets.push((j, i, -w));
            triplets.push((i, i, w));
            triplets.push((j, j, w));
        }
    }
    triplets
}

/// Cotangent of the angle at `a` in triangle (a, b, c).
fn cotangent_angle(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> f64 {
    let ab = b - a;
    let ac = c - a;
    let cross_len = ab.cross(&ac).norm();
    if cross_len < 1e-10 {
        0.0
    } else {
        ab.dot(&ac) / cross_len
    }
}

/// Redistribute `target`'s value distribution over `source`'s ordering.
///
/// The k-th smallest source value is replaced by the k-th smallest target
/// value, yielding an output monotone in `source` with exactly the value
/// histogram of `target`.
fn rebin_monotone(source: &[f64], target: &[f64]) -> Vec<f64> {
    let n = source.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| source[a].total_cmp(&source[b]));

    let mut sorted_target: Vec<f64> = target.to_vec();
    sorted_target.sort_by(f64::total_cmp);

    let mut out = vec![0.0; n];
    for (k, &v) in order.iter().enumerate() {
        out[v] = sorted_target[k];
    }
    out
}
