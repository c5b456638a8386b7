//! Branch metric computation.
//!
//! Augments a surface with two point-data scalars measured against the
//! nearest centerline branch:
//!
//! - `AngularMetric` ∈ [0, 1): circumferential position around the local
//!   branch cross-section, measured from the parallel-transported reference
//!   direction in the plane orthogonal to the local tangent.
//! - `AbscissaMetric`: longitudinal position, the arc-length of the nearest
//!   centerline sample. Bifurcation (blanked) tracts are included in this
//!   search so the coordinate stays continuous across branch joins.
//!
//! The inscribed-sphere radius is a local scale hint only; it never weights
//! the angular computation.

use std::f64::consts::TAU;

use nalgebra::{Point3, Vector3};

use crate::centerline::{Centerline, SampleFilter};
use crate::error::{MapError, Result};
use crate::field::Field;
use crate::mesh::Surface;

/// Compute `AngularMetric` and `AbscissaMetric` for every surface vertex.
///
/// Returns a new surface with the two arrays appended; all existing data is
/// carried over. Idempotent: repeated calls on the same inputs produce
/// identical arrays.
///
/// # Errors
///
/// `InvalidInput` when the surface is empty, `MissingField` when the
/// centerline lacks part of its attribute contract.
pub fn compute_branch_metrics(surface: &Surface, centerline: &Centerline) -> Result<Surface> {
    if surface.is_empty() {
        return Err(MapError::InvalidInput("surface has no triangles".into()));
    }
    surface.validate()?;
    centerline.validate_for_mapping()?;

    let tangents = centerline.tangents()?;
    let normals = centerline.parallel_transport_normals()?;
    let abscissas = centerline.abscissas()?;

    let mut angular = Vec::with_capacity(surface.num_points());
    let mut abscissa = Vec::with_capacity(surface.num_points());

    for p in surface.points() {
        // Angular frame from the nearest non-blanked tract; vertices whose
        // nearest tract is blanked fall back to the closest open frame.
        let frame = centerline
            .nearest_sample(p, SampleFilter::NonBlanked)?
            .ok_or_else(|| {
                MapError::InvalidInput("centerline has no non-blanked tracts".into())
            })?;
        angular.push(angular_position(
            p,
            centerline.point(frame.point),
            &tangents[frame.point],
            &normals[frame.point],
        ));

        // Longitudinal coordinate flows through bifurcations.
        let along = centerline
            .nearest_sample(p, SampleFilter::All)?
            .ok_or_else(|| MapError::InvalidInput("centerline has no samples".into()))?;
        abscissa.push(abscissas[along.point]);
    }

    let mut out = surface.clone();
    out.point_data_mut().set_scalars(Field::AngularMetric, angular);
    out.point_data_mut().set_scalars(Field::AbscissaMetric, abscissa);
    Ok(out)
}

/// Signed angle of `p` around the local frame, normalized to [0, 1).
///
/// Projects the vertex offset onto the plane orthogonal to `tangent` and
/// measures from `reference` (the parallel-transported normal). A vertex on
/// the axis itself has no defined angle and is pinned to 0.
pub(crate) fn angular_position(
    p: &Point3<f64>,
    origin: &Point3<f64>,
    tangent: &Vector3<f64>,
    reference: &Vector3<f64>,
) -> f64 {
    let offset = p - origin;
    let planar = offset - offset.dot(tangent) * tangent;
    if planar.norm_squared() < 1e-24 {
        return 0.0;
    }
    let binormal = tangent.cross(reference);
    let angle = planar.dot(&binormal).atan2(planar.dot(reference));
    let turn = angle / TAU;
    // atan2 range maps to [-0.5, 0.5); wrap into [0, 1).
    (turn + 1.0).fract()
}
