//! Branch-based surface splitting.
//!
//! Partitions a surface into per-branch sub-meshes using the centerline's
//! group and radius attributes. A vertex belongs to the branch whose
//! maximal-inscribed-sphere tube it penetrates deepest (minimum of
//! `|v − c| − r` over the branch's non-blanked samples); a triangle follows
//! the majority of its vertices, so the cut falls exactly at the branch
//! boundary curve with no overlap.

use log::debug;

use crate::centerline::{Centerline, SampleFilter};
use crate::error::{MapError, Result};
use crate::field::Field;
use crate::mesh::Surface;

/// Extract the sub-mesh belonging to the requested branch groups.
///
/// `group_ids = None` keeps every branch (callers iterating branches pass
/// one id at a time). With an explicit group list, a connectivity filter
/// keeps only the connected triangle patch nearest the requested branches,
/// discarding disconnected same-group fragments elsewhere on the mesh.
///
/// A requested id with no matching triangles yields an **empty** surface,
/// not an error; callers must check [`Surface::is_empty`] before mapping.
/// The result also carries per-vertex `GroupIds` point data recording the
/// branch assignment.
pub fn split_surface(
    surface: &Surface,
    centerline: &Centerline,
    group_ids: Option<&[i64]>,
) -> Result<Surface> {
    if surface.is_empty() {
        return Err(MapError::InvalidInput("surface has no triangles".into()));
    }
    surface.validate()?;
    centerline.validate_for_mapping()?;

    let all_groups = centerline.branch_group_ids()?;
    if all_groups.is_empty() {
        return Err(MapError::InvalidInput(
            "centerline has no non-blanked branch groups".into(),
        ));
    }

    let assignment = assign_vertex_groups(surface, centerline, &all_groups)?;

    let requested: Vec<i64> = match group_ids {
        Some(ids) => ids.to_vec(),
        None => all_groups.clone(),
    };

    // Majority vote: a triangle follows at least 2 of its 3 vertices, so
    // each triangle lands in exactly one group's split.
    let kept: Vec<usize> = (0..surface.num_triangles())
        .filter(|&t| {
            let tri = surface.triangle(t);
            let votes = tri
                .iter()
                .filter(|&&v| requested.contains(&assignment[v]))
                .count();
            votes >= 2
        })
        .collect();

    if kept.is_empty() {
        debug!("split: no triangles matched groups {requested:?}");
        return Ok(Surface::empty());
    }

    let mut annotated = surface.clone();
    annotated
        .point_data_mut()
        .set_integers(Field::GroupIds, assignment);

    let mut split = annotated.extract_triangles(&kept);

    // Connectivity filter only applies when the caller named the branches;
    // an unrestricted split keeps the whole surface.
    if group_ids.is_some() && split.num_components() > 1 {
        split = nearest_component(&split, centerline, &requested)?;
    }
    Ok(split)
}

/// Assign every vertex to the branch group with the deepest tube penetration.
fn assign_vertex_groups(
    surface: &Surface,
    centerline: &Centerline,
    groups: &[i64],
) -> Result<Vec<i64>> {
    let mut assignment = Vec::with_capacity(surface.num_points());
    for p in surface.points() {
        let mut best_group = groups[0];
        let mut best = f64::INFINITY;
        for &g in groups {
            if let Some(d) = centerline.tube_distance(p, g)? {
                if d < best {
                    best = d;
                    best_group = g;
                }
            }
        }
        assignment.push(best_group);
    }
    Ok(assignment)
}

/// Keep the connected component whose triangles come closest to the
/// requested groups' centerline samples.
fn nearest_component(
    split: &Surface,
    centerline: &Centerline,
    groups: &[i64],
) -> Result<Surface> {
    let labels = split.connected_components();
    let num_components = labels.iter().max().map_or(0, |m| m + 1);

    let mut closest = vec![f64::INFINITY; num_components];
    for t in 0..split.num_triangles() {
        let centroid = split.triangle_centroid(t);
        for &g in groups {
            if let Some(sample) = centerline.nearest_sample(&centroid, SampleFilter::Group(g))? {
                let slot = &mut closest[labels[t]];
                if sample.distance < *slot {
                    *slot = sample.distance;
                }
            }
        }
    }

    let best = closest
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap_or(0);

    let kept: Vec<usize> = (0..split.num_triangles())
        .filter(|&t| labels[t] == best)
        .collect();
    debug!(
        "split: connectivity filter kept component {best} ({} of {} triangles)",
        kept.len(),
        split.num_triangles()
    );
    Ok(split.extract_triangles(&kept))
}

#[cfg(test)]
mod tests {
    use nalgebra::{Point3, Vector3};

    use super::*;
    use crate::algo::metrics::test_meshes::{cylinder, straight_centerline};
    use crate::centerline::Centerline;

    /// Two straight branches: group 0 on the z-axis, group 1 shifted to
    /// x = 5. No shared bifurcation; used to exercise group selection.
    fn two_branch_centerline() -> Centerline {
        let n = 5;
        let mut points: Vec<Point3<f64>> = (0..n)
            .map(|i| Point3::new(0.0, 0.0, i as f64))
            .collect();
        points.extend((0..n).map(|i| Point3::new(5.0, 0.0, i as f64)));
        let cells = vec![(0..n).collect::<Vec<_>>(), (n..2 * n).collect::<Vec<_>>()];
        let mut line = Centerline::new(points, cells).unwrap();

        line.cell_data_mut().set_integers(Field::GroupIds, vec![0, 1]);
        line.cell_data_mut().set_integers(Field::TractIds, vec![0, 0]);
        line.cell_data_mut()
            .set_integers(Field::CenterlineIds, vec![0, 1]);
        line.cell_data_mut().set_integers(Field::Blanking, vec![0, 0]);

        let total = 2 * n;
        line.point_data_mut()
            .set_scalars(Field::Radius, vec![1.0; total]);
        line.point_data_mut().set_scalars(
            Field::Abscissas,
            (0..total).map(|i| (i % n) as f64).collect(),
        );
        line.point_data_mut()
            .set_vectors(Field::ParallelTransportNormals, vec![Vector3::x(); total]);
        line.point_data_mut()
            .set_vectors(Field::FrenetTangent, vec![Vector3::z(); total]);
        line
    }

    /// Two disjoint cylinders matching the two branches.
    fn two_cylinders() -> Surface {
        let a = cylinder(12, 5, 1.0, 4.0);
        let b = cylinder(12, 5, 1.0, 4.0);

        let mut points: Vec<Point3<f64>> = a.points().to_vec();
        let offset = points.len();
        points.extend(b.points().iter().map(|p| Point3::new(p.x + 5.0, p.y, p.z)));

        let mut triangles = a.triangles().to_vec();
        triangles.extend(
            b.triangles()
                .iter()
                .map(|t| [t[0] + offset, t[1] + offset, t[2] + offset]),
        );
        Surface::new(points, triangles).unwrap()
    }

    #[test]
    fn test_single_group_keeps_whole_branch() {
        let surface = cylinder(12, 5, 1.0, 4.0);
        let line = straight_centerline(9, 4.0, 1.0);
        let split = split_surface(&surface, &line, Some(&[0])).unwrap();
        assert_eq!(split.num_triangles(), surface.num_triangles());
    }

    #[test]
    fn test_partition_covers_surface() {
        let surface = two_cylinders();
        let line = two_branch_centerline();

        let s0 = split_surface(&surface, &line, Some(&[0])).unwrap();
        let s1 = split_surface(&surface, &line, Some(&[1])).unwrap();

        assert!(s0.num_triangles() <= surface.num_triangles());
        assert!(s1.num_triangles() <= surface.num_triangles());
        let covered = s0.surface_area() + s1.surface_area();
        assert!((covered - surface.surface_area()).abs() < 1e-9);
    }

    #[test]
    fn test_missing_group_yields_empty_surface() {
        let surface = cylinder(12, 5, 1.0, 4.0);
        let line = straight_centerline(9, 4.0, 1.0);
        let split = split_surface(&surface, &line, Some(&[42])).unwrap();
        assert!(split.is_empty());
    }

    #[test]
    fn test_connectivity_drops_distant_fragment() {
        // Both cylinders sit in group 0's split candidacy only through
        // their own vertices; requesting group 0 must keep the z-axis
        // cylinder alone even though the mesh has two components.
        let surface = two_cylinders();
        let line = two_branch_centerline();

        let split = split_surface(&surface, &line, Some(&[0])).unwrap();
        assert_eq!(split.num_components(), 1);
        // Every kept point lies near the z-axis.
        for p in split.points() {
            assert!(p.x.abs() < 2.0);
        }
    }

    #[test]
    fn test_split_carries_group_assignment() {
        let surface = two_cylinders();
        let line = two_branch_centerline();
        let split = split_surface(&surface, &line, Some(&[1])).unwrap();
        let groups = split.point_data().integers(&Field::GroupIds).unwrap();
        assert!(groups.iter().all(|&g| g == 1));
    }
}
