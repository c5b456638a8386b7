//! Branch patching: discretizing a mapped branch into a patch grid.
//!
//! Bins the triangles of a mapped branch into `slabs × sectors` patches:
//! slabs of fixed physical length along `StretchedMapping`, equal-angle
//! sectors around `AngularMetric`. Each triangle is assigned whole, by its
//! centroid coordinates, so patch areas sum exactly to the branch area.
//! The output is the annotated surface (point data `Slab`, `Sector` and
//! `PatchArea`) plus a [`PatchRaster`] of area-weighted patch means for
//! every scalar variable riding on the surface.

use std::collections::BTreeMap;
use std::f64::consts::TAU;

use crate::error::{MapError, Result};
use crate::field::Field;
use crate::mesh::{Attribute, Surface};
use crate::raster::PatchRaster;

/// Grid controls for the patching stage.
#[derive(Debug, Clone, Copy)]
pub struct PatchingOptions {
    /// Physical length of one slab, in the units of `StretchedMapping`.
    pub longitudinal_size: f64,
    /// Number of equal-angle circumferential sectors.
    pub circumferential_sectors: usize,
}

impl Default for PatchingOptions {
    fn default() -> Self {
        Self {
            longitudinal_size: 1.0,
            circumferential_sectors: 8,
        }
    }
}

impl PatchingOptions {
    /// Set the slab length.
    pub fn with_longitudinal_size(mut self, size: f64) -> Self {
        self.longitudinal_size = size;
        self
    }

    /// Set the sector count.
    pub fn with_sectors(mut self, sectors: usize) -> Self {
        self.circumferential_sectors = sectors;
        self
    }
}

/// Bin a mapped branch into patches.
///
/// `surface` must carry `StretchedMapping` and `AngularMetric` point data.
/// The slab count is `ceil(extent / size)`, so the distal slab may be
/// shorter than the requested size; it is kept rather than merged.
///
/// The returned surface gains integer point data `Slab` and `Sector` (each
/// vertex's own bin) and scalar `PatchArea` (true area of the containing
/// patch). Every scalar point-data variable except the bookkeeping metrics
/// becomes a raster layer of area-weighted patch means; patches no triangle
/// falls into hold 0. The raster always carries a `PatchArea` layer. When
/// the surface has stray disconnected geometry, raster aggregation covers
/// only the largest connected component.
pub fn compute_branch_patching(
    surface: &Surface,
    options: &PatchingOptions,
) -> Result<(Surface, PatchRaster)> {
    if surface.is_empty() {
        return Err(MapError::InvalidInput("surface has no triangles".into()));
    }
    if !(options.longitudinal_size > 0.0) {
        return Err(MapError::InvalidInput(format!(
            "longitudinal patch size must be positive, got {}",
            options.longitudinal_size
        )));
    }
    if options.circumferential_sectors == 0 {
        return Err(MapError::InvalidInput(
            "circumferential sector count must be at least 1".into(),
        ));
    }
    surface.validate()?;
    let stretched = surface.point_data().scalars(&Field::StretchedMapping)?;
    let angular = surface.point_data().scalars(&Field::AngularMetric)?;

    let lo = stretched.iter().cloned().fold(f64::INFINITY, f64::min);
    let hi = stretched.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let extent = hi - lo;
    if !extent.is_finite() {
        return Err(MapError::DegenerateGeometry(
            "stretched mapping holds non-finite values".into(),
        ));
    }
    let sectors = options.circumferential_sectors;
    let slabs = ((extent / options.longitudinal_size).ceil() as usize).max(1);

    // Stray fragments do not contribute to the raster.
    let labels = surface.connected_components();
    let main = largest_component(surface, &labels);

    // Triangles are binned whole by centroid coordinates.
    let mut tri_slab = Vec::with_capacity(surface.num_triangles());
    let mut tri_sector = Vec::with_capacity(surface.num_triangles());
    let mut patch_area = vec![0.0; slabs * sectors];
    for (t, tri) in surface.triangles().iter().enumerate() {
        let along = tri.iter().map(|&v| stretched[v]).sum::<f64>() / 3.0;
        let slab = (((along - lo) / options.longitudinal_size) as usize).min(slabs - 1);

        let turn = circular_mean(tri.iter().map(|&v| angular[v]));
        let sector = ((turn * sectors as f64) as usize).min(sectors - 1);

        tri_slab.push(slab);
        tri_sector.push(sector);
        if labels[t] == main {
            patch_area[slab * sectors + sector] += surface.triangle_area(t);
        }
    }

    let mut raster = PatchRaster::new(slabs, sectors);
    for (field, layer) in
        rasterize_scalars(surface, &labels, main, &tri_slab, &tri_sector, slabs, sectors)
    {
        raster.set_layer(field, layer)?;
    }
    raster.set_layer(Field::PatchArea, patch_area.clone())?;

    // Per-vertex bins and containing-patch areas.
    let mut slab_ids = Vec::with_capacity(surface.num_points());
    let mut sector_ids = Vec::with_capacity(surface.num_points());
    let mut point_area = Vec::with_capacity(surface.num_points());
    for v in 0..surface.num_points() {
        let slab = (((stretched[v] - lo) / options.longitudinal_size) as usize).min(slabs - 1);
        let sector = ((angular[v] * sectors as f64) as usize).min(sectors - 1);
        slab_ids.push(slab as i64);
        sector_ids.push(sector as i64);
        point_area.push(patch_area[slab * sectors + sector]);
    }

    let mut out = surface.clone();
    out.point_data_mut().set_integers(Field::Slab, slab_ids);
    out.point_data_mut().set_integers(Field::Sector, sector_ids);
    out.point_data_mut().set_scalars(Field::PatchArea, point_area);
    Ok((out, raster))
}

/// Component label covering the most surface area.
fn largest_component(surface: &Surface, labels: &[usize]) -> usize {
    let num_components = labels.iter().max().map_or(0, |m| m + 1);
    let mut areas = vec![0.0; num_components];
    for (t, &label) in labels.iter().enumerate() {
        areas[label] += surface.triangle_area(t);
    }
    areas
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Area-weighted patch means for every scalar point-data variable.
///
/// `BoundaryMetric` is skipped (its interior sentinel would poison the
/// means); the index metrics are point data, not patch variables, but they
/// average cleanly and are kept for inspection.
fn rasterize_scalars(
    surface: &Surface,
    labels: &[usize],
    main: usize,
    tri_slab: &[usize],
    tri_sector: &[usize],
    slabs: usize,
    sectors: usize,
) -> BTreeMap<Field, Vec<f64>> {
    let mut weights = vec![0.0; slabs * sectors];
    for (t, (&slab, &sector)) in tri_slab.iter().zip(tri_sector).enumerate() {
        if labels[t] == main {
            weights[slab * sectors + sector] += surface.triangle_area(t);
        }
    }

    let mut layers = BTreeMap::new();
    for (field, attr) in surface.point_data().iter() {
        let Attribute::Scalars(values) = attr else {
            continue;
        };
        if *field == Field::BoundaryMetric {
            continue;
        }

        let mut sums = vec![0.0; slabs * sectors];
        for (t, (&slab, &sector)) in tri_slab.iter().zip(tri_sector).enumerate() {
            if labels[t] != main {
                continue;
            }
            let tri = surface.triangle(t);
            let mean = tri.iter().map(|&v| values[v]).sum::<f64>() / 3.0;
            sums[slab * sectors + sector] += mean * surface.triangle_area(t);
        }
        for (sum, &w) in sums.iter_mut().zip(&weights) {
            if w > 0.0 {
                *sum /= w;
            }
        }
        layers.insert(field.clone(), sums);
    }
    layers
}

/// Circular mean of turn fractions in [0, 1), mapped back into [0, 1).
///
/// Triangles straddling the seam average to a value near 0 or 1 instead of
/// the arithmetic-mean artefact near 0.5.
fn circular_mean(turns: impl Iterator<Item = f64>) -> f64 {
    let (mut sin, mut cos) = (0.0, 0.0);
    for t in turns {
        let angle = t * TAU;
        sin += angle.sin();
        cos += angle.cos();
    }
    if sin.abs() < 1e-15 && cos.abs() < 1e-15 {
        return 0.0;
    }
    let mean = sin.atan2(cos) / TAU;
    (mean + 1.0).fract()
}

#[cfg(test)]
mod tests {
    use nalgebra::Point3;

    use super::*;
    use crate::algo::mapping::{compute_branch_mapping, MappingOptions};
    use crate::algo::metrics::compute_branch_metrics;
    use crate::algo::metrics::test_meshes::{cylinder, straight_centerline};

    fn mapped_cylinder(n_circ: usize, n_rings: usize, length: f64) -> Surface {
        let surface = cylinder(n_circ, n_rings, 1.0, length);
        let line = straight_centerline(2 * n_rings + 1, length, 1.0);
        let with_metrics = compute_branch_metrics(&surface, &line).unwrap();
        compute_branch_mapping(&with_metrics, &line, &[], &MappingOptions::default()).unwrap()
    }

    #[test]
    fn test_grid_dimensions() {
        let mapped = mapped_cylinder(16, 9, 6.0);
        let options = PatchingOptions::default()
            .with_longitudinal_size(1.0)
            .with_sectors(4);
        let (_, raster) = compute_branch_patching(&mapped, &options).unwrap();
        assert_eq!(raster.slabs(), 6);
        assert_eq!(raster.sectors(), 4);
    }

    #[test]
    fn test_partial_last_slab_kept() {
        let mapped = mapped_cylinder(16, 9, 5.0);
        let options = PatchingOptions::default()
            .with_longitudinal_size(2.0)
            .with_sectors(4);
        let (_, raster) = compute_branch_patching(&mapped, &options).unwrap();
        // Extent 5.0 at size 2.0: two full slabs and one half slab.
        assert_eq!(raster.slabs(), 3);
    }

    #[test]
    fn test_patch_areas_sum_to_surface_area() {
        let mapped = mapped_cylinder(24, 11, 8.0);
        let options = PatchingOptions::default()
            .with_longitudinal_size(1.0)
            .with_sectors(8);
        let (annotated, raster) = compute_branch_patching(&mapped, &options).unwrap();

        let total: f64 = raster.layer(&Field::PatchArea).unwrap().iter().sum();
        assert!((total - annotated.surface_area()).abs() < 1e-9);
    }

    #[test]
    fn test_point_indices_within_grid() {
        let mapped = mapped_cylinder(16, 7, 4.0);
        let options = PatchingOptions::default()
            .with_longitudinal_size(1.0)
            .with_sectors(6);
        let (annotated, raster) = compute_branch_patching(&mapped, &options).unwrap();

        let slabs = annotated.point_data().integers(&Field::Slab).unwrap();
        let sectors = annotated.point_data().integers(&Field::Sector).unwrap();
        let areas = annotated.point_data().scalars(&Field::PatchArea).unwrap();
        assert_eq!(slabs.len(), annotated.num_points());
        for ((&slab, &sector), &area) in slabs.iter().zip(sectors).zip(areas) {
            assert!((0..raster.slabs() as i64).contains(&slab));
            assert!((0..raster.sectors() as i64).contains(&sector));
            let expected = raster
                .value(&Field::PatchArea, slab as usize, sector as usize)
                .unwrap();
            assert_eq!(area, expected);
        }
    }

    #[test]
    fn test_stray_fragment_excluded_from_raster() {
        let mapped = mapped_cylinder(16, 7, 4.0);
        let main_area = mapped.surface_area();

        // Graft a far-away triangle carrying extreme metric values.
        let mut points = mapped.points().to_vec();
        let base = points.len();
        points.push(Point3::new(50.0, 0.0, 0.0));
        points.push(Point3::new(51.0, 0.0, 0.0));
        points.push(Point3::new(50.0, 1.0, 0.0));
        let mut triangles = mapped.triangles().to_vec();
        triangles.push([base, base + 1, base + 2]);
        let mut with_fragment = Surface::new(points, triangles).unwrap();
        for (field, attr) in mapped.point_data().iter() {
            if let crate::mesh::Attribute::Scalars(values) = attr {
                let mut extended = values.clone();
                extended.extend([0.0; 3]);
                with_fragment
                    .point_data_mut()
                    .set_scalars(field.clone(), extended);
            }
        }

        let options = PatchingOptions::default()
            .with_longitudinal_size(1.0)
            .with_sectors(4);
        let (_, raster) = compute_branch_patching(&with_fragment, &options).unwrap();
        let total: f64 = raster.layer(&Field::PatchArea).unwrap().iter().sum();
        assert!((total - main_area).abs() < 1e-9);
    }

    #[test]
    fn test_uniform_variable_survives_averaging() {
        let mut mapped = mapped_cylinder(16, 7, 4.0);
        let n = mapped.num_points();
        mapped
            .point_data_mut()
            .set_scalars(Field::Named("WallShearStress".into()), vec![2.5; n]);

        let options = PatchingOptions::default()
            .with_longitudinal_size(1.0)
            .with_sectors(4);
        let (_, raster) = compute_branch_patching(&mapped, &options).unwrap();
        let layer = raster
            .layer(&Field::Named("WallShearStress".into()))
            .unwrap();
        for (i, &v) in layer.iter().enumerate() {
            // Empty patches are zero-filled; occupied ones keep the value.
            assert!(v == 0.0 || (v - 2.5).abs() < 1e-12, "patch {i}: {v}");
        }
    }

    #[test]
    fn test_raster_is_area_weighted_bin_average() {
        let mut mapped = mapped_cylinder(16, 9, 6.0);
        let values: Vec<f64> = mapped
            .points()
            .iter()
            .map(|p| (1.3 * p.z).sin() + 0.5 * p.x)
            .collect();
        let field = Field::Named("WallShearStress".into());
        mapped.point_data_mut().set_scalars(field.clone(), values.clone());

        let options = PatchingOptions::default()
            .with_longitudinal_size(1.0)
            .with_sectors(4);
        let (_, raster) = compute_branch_patching(&mapped, &options).unwrap();

        // Recompute the bin means from scratch: triangles binned by centroid
        // coordinates, each contributing its area times its vertex mean.
        let stretched = mapped.point_data().scalars(&Field::StretchedMapping).unwrap();
        let angular = mapped.point_data().scalars(&Field::AngularMetric).unwrap();
        let lo = stretched.iter().cloned().fold(f64::INFINITY, f64::min);

        let mut sums = vec![0.0; raster.num_patches()];
        let mut weights = vec![0.0; raster.num_patches()];
        for (t, tri) in mapped.triangles().iter().enumerate() {
            let along = tri.iter().map(|&v| stretched[v]).sum::<f64>() / 3.0;
            let slab = (((along - lo) / options.longitudinal_size) as usize)
                .min(raster.slabs() - 1);
            let turn = circular_mean(tri.iter().map(|&v| angular[v]));
            let sector = ((turn * raster.sectors() as f64) as usize).min(raster.sectors() - 1);

            let area = mapped.triangle_area(t);
            let mean = tri.iter().map(|&v| values[v]).sum::<f64>() / 3.0;
            sums[raster.patch_index(slab, sector)] += mean * area;
            weights[raster.patch_index(slab, sector)] += area;
        }

        let layer = raster.layer(&field).unwrap();
        for (i, &v) in layer.iter().enumerate() {
            let expected = if weights[i] > 0.0 { sums[i] / weights[i] } else { 0.0 };
            assert!((v - expected).abs() < 1e-12, "patch {i}: {v} vs {expected}");
        }
    }

    #[test]
    fn test_seam_triangles_do_not_flip_sector() {
        // Angles straddling 0: circular mean stays near the seam.
        let mean = circular_mean([0.98, 0.01, 0.03].into_iter());
        assert!(mean > 0.9 || mean < 0.1, "{mean}");
    }

    #[test]
    fn test_invalid_options_rejected() {
        let mapped = mapped_cylinder(8, 3, 2.0);
        let err = compute_branch_patching(
            &mapped,
            &PatchingOptions::default().with_longitudinal_size(0.0),
        )
        .unwrap_err();
        assert!(matches!(err, MapError::InvalidInput(_)));

        let err =
            compute_branch_patching(&mapped, &PatchingOptions::default().with_sectors(0))
                .unwrap_err();
        assert!(matches!(err, MapError::InvalidInput(_)));
    }
}
