//! Bifurcation reference systems.
//!
//! Each bifurcation region (a blanked group on the centerline) gets a local
//! frame: an origin at the radius-weighted barycenter of its samples, the
//! bifurcation plane normal, and an in-plane up direction pointing toward
//! the downstream branches. Branch mapping anchors its circumferential seam
//! to these frames so that patch sectors are comparable across subjects.

use nalgebra::{Matrix3, Point3, SymmetricEigen, Vector3};

use crate::centerline::Centerline;
use crate::error::{MapError, Result};
use crate::field::Field;

/// The local frame of one bifurcation region.
#[derive(Debug, Clone)]
pub struct ReferenceSystem {
    /// Radius²-weighted barycenter of the bifurcation samples.
    pub origin: Point3<f64>,
    /// Bifurcation plane normal, perpendicular to the branch directions.
    pub normal: Vector3<f64>,
    /// In-plane direction toward the downstream branches.
    pub up_normal: Vector3<f64>,
    /// Blanked group id of the bifurcation region.
    pub group_id: i64,
    /// Group ids of the branches leaving this bifurcation.
    pub downstream_groups: Vec<i64>,
    /// Group ids of the branches entering this bifurcation.
    pub upstream_groups: Vec<i64>,
}

impl ReferenceSystem {
    /// True when `group` touches this bifurcation from either side.
    pub fn touches_group(&self, group: i64) -> bool {
        self.upstream_groups.contains(&group) || self.downstream_groups.contains(&group)
    }
}

/// Compute a [`ReferenceSystem`] for every bifurcation region.
///
/// Regions are identified as the blanked groups of the centerline
/// segmentation; a centerline without blanked tracts (a single unbranched
/// vessel) yields an empty vector, which is not an error.
pub fn compute_bifurcation_reference_systems(
    centerline: &Centerline,
) -> Result<Vec<ReferenceSystem>> {
    centerline.validate_for_mapping()?;

    let groups = centerline.cell_data().integers(&Field::GroupIds)?;
    let blanking = centerline.cell_data().integers(&Field::Blanking)?;
    let radii = centerline.radii()?;
    let tangents = centerline.tangents()?;
    let paths = centerline.cells_by_path()?;

    let mut blanked_groups: Vec<i64> = (0..centerline.num_cells())
        .filter(|&c| blanking[c] != 0)
        .map(|c| groups[c])
        .collect();
    blanked_groups.sort_unstable();
    blanked_groups.dedup();

    let mut systems = Vec::with_capacity(blanked_groups.len());
    for gid in blanked_groups {
        let cells: Vec<usize> = (0..centerline.num_cells())
            .filter(|&c| blanking[c] != 0 && groups[c] == gid)
            .collect();

        // Neighbouring groups along each traced path: the tract before a
        // blanked cell feeds the bifurcation, the tract after leaves it.
        let mut upstream = Vec::new();
        let mut downstream = Vec::new();
        for path in paths.values() {
            for (i, &c) in path.iter().enumerate() {
                if groups[c] != gid || blanking[c] == 0 {
                    continue;
                }
                if i > 0 && blanking[path[i - 1]] == 0 {
                    upstream.push(groups[path[i - 1]]);
                }
                if i + 1 < path.len() && blanking[path[i + 1]] == 0 {
                    downstream.push(groups[path[i + 1]]);
                }
            }
        }
        upstream.sort_unstable();
        upstream.dedup();
        downstream.sort_unstable();
        downstream.dedup();

        let samples: Vec<usize> = cells
            .iter()
            .flat_map(|&c| centerline.cell(c).iter().copied())
            .collect();
        if samples.is_empty() {
            return Err(MapError::DegenerateGeometry(format!(
                "bifurcation group {gid} has no samples"
            )));
        }

        // Radius²-weighted barycenter; larger vessels dominate the origin.
        let mut weight_sum = 0.0;
        let mut origin = Vector3::zeros();
        for &s in &samples {
            let w = radii[s] * radii[s];
            origin += w * centerline.point(s).coords;
            weight_sum += w;
        }
        if weight_sum <= 0.0 {
            return Err(MapError::DegenerateGeometry(format!(
                "bifurcation group {gid} has zero total radius weight"
            )));
        }
        let origin = Point3::from(origin / weight_sum);

        // Mean tangent over the bifurcation samples, the flow-through
        // direction of the junction.
        let mut flow = Vector3::zeros();
        for &s in &samples {
            flow += tangents[s];
        }
        let normal = bifurcation_plane_normal(centerline, &samples, radii, &origin, &flow)?;

        // Up direction: from the origin toward the downstream branch
        // openings, projected into the bifurcation plane.
        let mut toward = Vector3::zeros();
        for &g in &downstream {
            for c in centerline.cells_of_group(g)? {
                let first = centerline.cell(c)[0];
                toward += centerline.point(first) - origin;
            }
        }
        if toward.norm_squared() < 1e-24 {
            toward = flow;
        }
        let mut up_normal = toward - toward.dot(&normal) * normal;
        if up_normal.norm_squared() < 1e-24 {
            // Downstream direction parallel to the normal; pick any
            // in-plane axis deterministically.
            up_normal = orthogonal_to(&normal);
        }
        let up_normal = up_normal.normalize();

        systems.push(ReferenceSystem {
            origin,
            normal,
            up_normal,
            group_id: gid,
            downstream_groups: downstream,
            upstream_groups: upstream,
        });
    }
    Ok(systems)
}

/// Smallest-variance direction of the weighted sample cloud, the out-of-plane
/// axis of the bifurcation. Falls back to a direction orthogonal to the flow
/// when the cloud is too small to define a plane.
fn bifurcation_plane_normal(
    centerline: &Centerline,
    samples: &[usize],
    radii: &[f64],
    origin: &Point3<f64>,
    flow: &Vector3<f64>,
) -> Result<Vector3<f64>> {
    if flow.norm_squared() < 1e-24 {
        return Err(MapError::DegenerateGeometry(
            "bifurcation has a vanishing mean tangent".into(),
        ));
    }
    if samples.len() < 3 {
        return Ok(canonical_sign(orthogonal_to(flow)));
    }

    let mut covariance = Matrix3::zeros();
    for &s in samples {
        let w = radii[s] * radii[s];
        let d = centerline.point(s) - origin;
        covariance += w * d * d.transpose();
    }

    let eigen = SymmetricEigen::new(covariance);
    let mut min_idx = 0;
    for i in 1..3 {
        if eigen.eigenvalues[i] < eigen.eigenvalues[min_idx] {
            min_idx = i;
        }
    }
    let mut normal: Vector3<f64> = eigen.eigenvectors.column(min_idx).into();
    if normal.norm_squared() < 1e-24 {
        return Ok(canonical_sign(orthogonal_to(flow)));
    }
    normal.normalize_mut();
    Ok(canonical_sign(normal))
}

/// Resolve the arbitrary sign of an eigenvector: flip so the component of
/// largest magnitude is positive.
fn canonical_sign(v: Vector3<f64>) -> Vector3<f64> {
    let dominant = if v.x.abs() >= v.y.abs() && v.x.abs() >= v.z.abs() {
        v.x
    } else if v.y.abs() >= v.z.abs() {
        v.y
    } else {
        v.z
    };
    if dominant < 0.0 {
        -v
    } else {
        v
    }
}

/// A deterministic unit vector orthogonal to `v`.
fn orthogonal_to(v: &Vector3<f64>) -> Vector3<f64> {
    let axis = if v.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    v.cross(&axis).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::centerline::Centerline;

    /// Symmetric Y bifurcation in the x-z plane: a stem up the z-axis
    /// (group 0), a blanked junction region (group 1), and two branches
    /// (groups 2 and 3) diverging in ±x. Two traced paths share the stem.
    fn y_centerline() -> Centerline {
        let mut points = Vec::new();
        // Stem: z in [0, 2].
        points.extend((0..3).map(|i| Point3::new(0.0, 0.0, i as f64)));
        // Junction samples straddling the split, still near the axis.
        points.push(Point3::new(-0.2, 0.0, 2.5));
        points.push(Point3::new(0.2, 0.0, 2.5));
        // Left branch.
        points.extend((0..3).map(|i| Point3::new(-1.0 - i as f64, 0.0, 3.0 + i as f64)));
        // Right branch.
        points.extend((0..3).map(|i| Point3::new(1.0 + i as f64, 0.0, 3.0 + i as f64)));

        let cells = vec![
            vec![0, 1, 2],    // path 0, stem
            vec![2, 3],       // path 0, blanked
            vec![5, 6, 7],    // path 0, left branch
            vec![0, 1, 2],    // path 1, stem
            vec![2, 4],       // path 1, blanked
            vec![8, 9, 10],   // path 1, right branch
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
        line.point_data_mut().set_scalars(Field::Radius, vec![0.5; n]);
        line.point_data_mut()
            .set_scalars(Field::Abscissas, (0..n).map(|i| i as f64).collect());
        line.point_data_mut()
            .set_vectors(Field::ParallelTransportNormals, vec![Vector3::x(); n]);
        line.point_data_mut()
            .set_vectors(Field::FrenetTangent, vec![Vector3::z(); n]);
        line
    }

    #[test]
    fn test_unbranched_centerline_has_no_systems() {
        let line = crate::algo::metrics::test_meshes::straight_centerline(9, 4.0, 1.0);
        let systems = compute_bifurcation_reference_systems(&line).unwrap();
        assert!(systems.is_empty());
    }

    #[test]
    fn test_y_bifurcation_topology() {
        let systems = compute_bifurcation_reference_systems(&y_centerline()).unwrap();
        assert_eq!(systems.len(), 1);

        let sys = &systems[0];
        assert_eq!(sys.group_id, 1);
        assert_eq!(sys.upstream_groups, vec![0]);
        assert_eq!(sys.downstream_groups, vec![2, 3]);
        assert!(sys.touches_group(0));
        assert!(sys.touches_group(3));
        assert!(!sys.touches_group(1));
    }

    #[test]
    fn test_origin_at_weighted_barycenter() {
        let systems = compute_bifurcation_reference_systems(&y_centerline()).unwrap();
        let sys = &systems[0];
        // Junction samples: (0,0,2) twice, (±0.2, 0, 2.5); equal radii.
        assert!((sys.origin.x - 0.0).abs() < 1e-12);
        assert!((sys.origin.y - 0.0).abs() < 1e-12);
        assert!((sys.origin.z - 2.25).abs() < 1e-12);
    }

    #[test]
    fn test_frame_is_orthonormal() {
        let systems = compute_bifurcation_reference_systems(&y_centerline()).unwrap();
        let sys = &systems[0];
        assert!((sys.normal.norm() - 1.0).abs() < 1e-9);
        assert!((sys.up_normal.norm() - 1.0).abs() < 1e-9);
        assert!(sys.normal.dot(&sys.up_normal).abs() < 1e-9);
        // The Y lies in the x-z plane, so the plane normal is ±y,
        // canonicalized to +y.
        assert!(sys.normal.dot(&Vector3::y()) > 0.99);
        // Up direction points downstream along the stem axis.
        assert!(sys.up_normal.dot(&Vector3::z()) > 0.99);
    }
}
