//! Centerline polyline tree.
//!
//! A [`Centerline`] is the branch-segmented, attributed vessel skeleton
//! produced by the upstream extraction service: an ordered point set plus
//! polyline cells, each cell one traversal tract from an endpoint toward a
//! bifurcation or another endpoint.
//!
//! Cell data carries the segmentation (`GroupIds`, `CenterlineIds`,
//! `TractIds`, `Blanking`), point data carries the geometric attributes
//! (`Radius`, `Abscissas`, `ParallelTransportNormals`, `FrenetTangent`,
//! `FrenetNormal`). All mapping and patching stages treat the centerline as
//! read-only.

use std::collections::BTreeMap;

use nalgebra::{Point3, Vector3};

use crate::error::{MapError, Result};
use crate::field::Field;
use crate::mesh::AttributeSet;

/// Which centerline samples a nearest-point query may consider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFilter {
    /// Every sample, including bifurcation (blanked) tracts.
    All,
    /// Only samples on non-blanked tracts.
    NonBlanked,
    /// Only samples on non-blanked tracts of one branch group.
    Group(i64),
}

/// A centerline sample found by a nearest-point query.
#[derive(Debug, Clone, Copy)]
pub struct NearestSample {
    /// The polyline cell the sample belongs to.
    pub cell: usize,
    /// Global point index of the sample.
    pub point: usize,
    /// Euclidean distance from the query point.
    pub distance: f64,
}

/// A branch-segmented, attributed centerline tree.
#[derive(Debug, Clone)]
pub struct Centerline {
    points: Vec<Point3<f64>>,
    cells: Vec<Vec<usize>>,
    point_data: AttributeSet,
    cell_data: AttributeSet,
}

impl Centerline {
    /// Build a centerline from points and polyline cells, checking bounds.
    pub fn new(points: Vec<Point3<f64>>, cells: Vec<Vec<usize>>) -> Result<Self> {
        for (c, cell) in cells.iter().enumerate() {
            if cell.len() < 2 {
                return Err(MapError::InvalidInput(format!(
                    "centerline cell {c} has fewer than 2 points"
                )));
            }
            for &p in cell {
                if p >= points.len() {
                    return Err(MapError::InvalidInput(format!(
                        "centerline cell {c} references invalid point {p}"
                    )));
                }
            }
        }
        Ok(Self {
            points,
            cells,
            point_data: AttributeSet::points(),
            cell_data: AttributeSet::cells(),
        })
    }

    // ==================== Accessors ====================

    /// Number of points.
    #[inline]
    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    /// Number of polyline cells.
    #[inline]
    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    /// Position of a point.
    #[inline]
    pub fn point(&self, i: usize) -> &Point3<f64> {
        &self.points[i]
    }

    /// All point positions.
    #[inline]
    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    /// Point indices of a polyline cell.
    #[inline]
    pub fn cell(&self, c: usize) -> &[usize] {
        &self.cells[c]
    }

    /// All polyline cells.
    #[inline]
    pub fn cells(&self) -> &[Vec<usize>] {
        &self.cells
    }

    /// Point-attached attributes.
    #[inline]
    pub fn point_data(&self) -> &AttributeSet {
        &self.point_data
    }

    /// Mutable point-attached attributes.
    #[inline]
    pub fn point_data_mut(&mut self) -> &mut AttributeSet {
        &mut self.point_data
    }

    /// Cell-attached attributes.
    #[inline]
    pub fn cell_data(&self) -> &AttributeSet {
        &self.cell_data
    }

    /// Mutable cell-attached attributes.
    #[inline]
    pub fn cell_data_mut(&mut self) -> &mut AttributeSet {
        &mut self.cell_data
    }

    // ==================== Segmentation queries ====================

    /// Branch group id of a cell.
    pub fn group_of(&self, cell: usize) -> Result<i64> {
        Ok(self.cell_data.integers(&Field::GroupIds)?[cell])
    }

    /// True when a cell lies inside a bifurcation region.
    pub fn is_blanked(&self, cell: usize) -> Result<bool> {
        Ok(self.cell_data.integers(&Field::Blanking)?[cell] != 0)
    }

    /// Sorted unique group ids of the non-blanked tracts, the set of vessel
    /// branches a caller iterates over.
    pub fn branch_group_ids(&self) -> Result<Vec<i64>> {
        let groups = self.cell_data.integers(&Field::GroupIds)?;
        let blanking = self.cell_data.integers(&Field::Blanking)?;
        let mut ids: Vec<i64> = groups
            .iter()
            .zip(blanking)
            .filter(|(_, &b)| b == 0)
            .map(|(&g, _)| g)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    /// Indices of the non-blanked cells belonging to one group.
    pub fn cells_of_group(&self, group: i64) -> Result<Vec<usize>> {
        let groups = self.cell_data.integers(&Field::GroupIds)?;
        let blanking = self.cell_data.integers(&Field::Blanking)?;
        Ok((0..self.cells.len())
            .filter(|&c| groups[c] == group && blanking[c] == 0)
            .collect())
    }

    /// Cells of each traced path, keyed by `CenterlineIds` and ordered by
    /// `TractIds`. Bifurcating trees are represented as multiple overlapping
    /// paths; this view recovers the along-path tract order.
    pub fn cells_by_path(&self) -> Result<BTreeMap<i64, Vec<usize>>> {
        let path_ids = self.cell_data.integers(&Field::CenterlineIds)?;
        let tract_ids = self.cell_data.integers(&Field::TractIds)?;

        let mut paths: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for c in 0..self.cells.len() {
            paths.entry(path_ids[c]).or_default().push(c);
        }
        for cells in paths.values_mut() {
            cells.sort_by_key(|&c| tract_ids[c]);
        }
        Ok(paths)
    }

    // ==================== Geometric attributes ====================

    /// Per-point inscribed-sphere radii.
    pub fn radii(&self) -> Result<&[f64]> {
        self.point_data.scalars(&Field::Radius)
    }

    /// Per-point arc-length coordinates.
    pub fn abscissas(&self) -> Result<&[f64]> {
        self.point_data.scalars(&Field::Abscissas)
    }

    /// Per-point parallel-transported frame normals.
    pub fn parallel_transport_normals(&self) -> Result<&[Vector3<f64>]> {
        self.point_data.vectors(&Field::ParallelTransportNormals)
    }

    /// Per-point Frenet tangents.
    pub fn tangents(&self) -> Result<&[Vector3<f64>]> {
        self.point_data.vectors(&Field::FrenetTangent)
    }

    // ==================== Nearest-sample search ====================

    /// Find the centerline sample nearest to `p` among the samples admitted
    /// by `filter`. Returns `None` when the filter admits no sample.
    pub fn nearest_sample(&self, p: &Point3<f64>, filter: SampleFilter) -> Result<Option<NearestSample>> {
        let groups = self.cell_data.integers(&Field::GroupIds)?;
        let blanking = self.cell_data.integers(&Field::Blanking)?;

        let mut best: Option<NearestSample> = None;
        for (c, cell) in self.cells.iter().enumerate() {
            let admitted = match filter {
                SampleFilter::All => true,
                SampleFilter::NonBlanked => blanking[c] == 0,
                SampleFilter::Group(g) => blanking[c] == 0 && groups[c] == g,
            };
            if !admitted {
                continue;
            }
            for &pt in cell {
                let d2 = (self.points[pt] - p).norm_squared();
                if best.map_or(true, |b| d2 < b.distance) {
                    best = Some(NearestSample {
                        cell: c,
                        point: pt,
                        distance: d2,
                    });
                }
            }
        }
        Ok(best.map(|mut b| {
            b.distance = b.distance.sqrt();
            b
        }))
    }

    /// Minimum tube function `|p − c| − r` of `p` against the non-blanked
    /// samples of `group`. Used by the splitter: a vertex belongs to the
    /// branch whose maximal-inscribed-sphere tube it penetrates deepest.
    pub fn tube_distance(&self, p: &Point3<f64>, group: i64) -> Result<Option<f64>> {
        let groups = self.cell_data.integers(&Field::GroupIds)?;
        let blanking = self.cell_data.integers(&Field::Blanking)?;
        let radii = self.radii()?;

        let mut best: Option<f64> = None;
        for (c, cell) in self.cells.iter().enumerate() {
            if blanking[c] != 0 || groups[c] != group {
                continue;
            }
            for &pt in cell {
                let d = (self.points[pt] - p).norm() - radii[pt];
                if best.map_or(true, |b| d < b) {
                    best = Some(d);
                }
            }
        }
        Ok(best)
    }

    // ==================== Validation ====================

    /// Check that the attribute contract needed by the mapping pipeline is
    /// present and consistently sized.
    pub fn validate_for_mapping(&self) -> Result<()> {
        if self.cells.is_empty() {
            return Err(MapError::InvalidInput("centerline has no cells".into()));
        }
        for field in [
            Field::GroupIds,
            Field::TractIds,
            Field::CenterlineIds,
            Field::Blanking,
        ] {
            if !self.cell_data.contains(&field) {
                return Err(MapError::missing_cell_field(field));
            }
        }
        for field in [Field::Radius, Field::Abscissas] {
            if !self.point_data.contains(&field) {
                return Err(MapError::missing_point_field(field));
            }
        }
        for field in [Field::ParallelTransportNormals, Field::FrenetTangent] {
            if !self.point_data.contains(&field) {
                return Err(MapError::missing_point_field(field));
            }
        }
        self.point_data.validate_len(self.points.len())?;
        self.cell_data.validate_len(self.cells.len())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Straight two-cell centerline along +z: one ordinary tract and one
    /// blanked tract, groups 0 and 1.
    fn straight_segmented() -> Centerline {
        let points: Vec<Point3<f64>> =
            (0..6).map(|i| Point3::new(0.0, 0.0, i as f64)).collect();
        let cells = vec![vec![0, 1, 2], vec![3, 4, 5]];
        let mut line = Centerline::new(points, cells).unwrap();

        line.cell_data_mut().set_integers(Field::GroupIds, vec![0, 1]);
        line.cell_data_mut().set_integers(Field::TractIds, vec![0, 1]);
        line.cell_data_mut()
            .set_integers(Field::CenterlineIds, vec![0, 0]);
        line.cell_data_mut().set_integers(Field::Blanking, vec![0, 1]);

        line.point_data_mut()
            .set_scalars(Field::Radius, vec![1.0; 6]);
        line.point_data_mut()
            .set_scalars(Field::Abscissas, (0..6).map(|i| i as f64).collect());
        line.point_data_mut().set_vectors(
            Field::ParallelTransportNormals,
            vec![Vector3::x(); 6],
        );
        line.point_data_mut()
            .set_vectors(Field::FrenetTangent, vec![Vector3::z(); 6]);
        line
    }

    #[test]
    fn test_branch_groups_exclude_blanked() {
        let line = straight_segmented();
        assert_eq!(line.branch_group_ids().unwrap(), vec![0]);
        assert_eq!(line.cells_of_group(0).unwrap(), vec![0]);
        assert!(line.cells_of_group(1).unwrap().is_empty());
    }

    #[test]
    fn test_nearest_sample_filters() {
        let line = straight_segmented();
        let query = Point3::new(0.0, 0.0, 5.2);

        let all = line
            .nearest_sample(&query, SampleFilter::All)
            .unwrap()
            .unwrap();
        assert_eq!(all.point, 5);

        // Blanked tract excluded: nearest admitted sample drops to point 2.
        let open = line
            .nearest_sample(&query, SampleFilter::NonBlanked)
            .unwrap()
            .unwrap();
        assert_eq!(open.point, 2);
        assert!((open.distance - 3.2).abs() < 1e-12);
    }

    #[test]
    fn test_tube_distance() {
        let line = straight_segmented();
        let d = line
            .tube_distance(&Point3::new(0.0, 1.5, 1.0), 0)
            .unwrap()
            .unwrap();
        // Distance 1.5 to the axis sample, minus unit radius.
        assert!((d - 0.5).abs() < 1e-12);
        assert!(line
            .tube_distance(&Point3::origin(), 42)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_validate_for_mapping() {
        let line = straight_segmented();
        line.validate_for_mapping().unwrap();

        let mut broken = line.clone();
        broken.point_data_mut().remove(&Field::Abscissas);
        let err = broken.validate_for_mapping().unwrap_err();
        assert!(matches!(err, MapError::MissingField { .. }));
    }

    #[test]
    fn test_cells_by_path_orders_by_tract() {
        let mut line = straight_segmented();
        line.cell_data_mut().set_integers(Field::TractIds, vec![1, 0]);
        let paths = line.cells_by_path().unwrap();
        assert_eq!(paths[&0], vec![1, 0]);
    }
}
